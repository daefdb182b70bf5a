//! Tests for schema bootstrap from files.

mod common;
use common::*;

use std::fs;

use patch_data::{DataBase, DataConfig, DataError};
use patch_sql_core::{fields, DbValue};

const ITEMS_YAML: &str = "\
name: catalog
tables:
  - name: items
    fields:
      - { name: id, type: INTEGER }
      - { name: label, type: TEXT, length: 40 }
    constraint:
      primaryKey: [id]
";

const TAGS_JSON: &str = r#"{
  "name": "tags",
  "tables": [
    {
      "name": "tags",
      "fields": [
        { "name": "item", "type": "INTEGER" },
        { "name": "tag", "type": "TEXT" }
      ],
      "constraint": {
        "primaryKey": ["item", "tag"],
        "foreignKeys": [
          { "fields": ["item"], "references": { "foreignTable": "items", "foreignField": ["id"] } }
        ]
      }
    }
  ],
  "sql": "CREATE INDEX IF NOT EXISTS tags_tag ON tags (tag)"
}"#;

#[tokio::test]
async fn directory_loads_every_kind() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("01_items.yaml"), ITEMS_YAML).unwrap();
    fs::write(dir.path().join("02_tags.json"), TAGS_JSON).unwrap();
    fs::write(
        dir.path().join("03_seed.sql"),
        "INSERT INTO items (id, label) VALUES (1, 'semi;colon');\n\
         -- seeded by hand;\n\
         INSERT INTO tags (item, tag) VALUES (1, 'new');\n",
    )
    .unwrap();

    let db = test_db().await;
    db.bootstrap(dir.path()).await.unwrap();

    let items = db.select("items", vec![], None, None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(text(&items[0], "label"), "semi;colon");
    let tags = db.select("tags", fields(&["tag"]), None, None).await.unwrap();
    assert_eq!(tags[0].get("tag"), Some(&DbValue::from("new")));

    // Loading again is harmless for the tables but the seed rows conflict.
    assert!(matches!(
        db.bootstrap(dir.path()).await,
        Err(DataError::InitFile(p)) if p.ends_with("03_seed.sql")
    ));
}

#[tokio::test]
async fn unsupported_file_stops_before_running() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("01_items.yaml"), ITEMS_YAML).unwrap();
    fs::write(dir.path().join("02_notes.txt"), "not sql").unwrap();

    let db = test_db().await;
    assert!(matches!(
        db.bootstrap(dir.path()).await,
        Err(DataError::UnsupportedInitFile(_))
    ));
    assert!(matches!(
        db.select("items", vec![], None, None).await,
        Err(DataError::Select)
    ));
}

#[tokio::test]
async fn failing_file_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.sql");
    fs::write(
        &file,
        "CREATE TABLE first_half (x TEXT);\nCREATE TABLE oops (;\n",
    )
    .unwrap();

    let db = test_db().await;
    assert!(matches!(
        db.bootstrap(&file).await,
        Err(DataError::InitFile(_))
    ));
    assert!(db.select("first_half", vec![], None, None).await.is_err());
}

#[tokio::test]
async fn init_uses_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("schema.yml");
    fs::write(&file, ITEMS_YAML).unwrap();

    let config = DataConfig {
        init_file: Some(file),
        ..DataConfig::default()
    };
    let db = DataBase::with_pool(create_test_pool().await, config);
    db.init().await.unwrap();
    assert!(db.select("items", vec![], None, None).await.unwrap().is_empty());

    // Without a file there is nothing to do.
    test_db().await.init().await.unwrap();
}
