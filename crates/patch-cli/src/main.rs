//! patchctl
//!
//! Command-line tool for bootstrapping a PaT-CH database and managing its
//! user accounts.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use patch_data::{ConfigMap, DataBase, DataConfig, UserPatch};
use patch_sql_core::{FieldName, WhereMap};

/// PaT-CH data layer administration.
#[derive(Parser)]
#[command(name = "patchctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL; overrides the config file.
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// YAML or JSON config file. Settings are read from its `db` section
    /// when present, from the top level otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a schema bootstrap file or directory.
    Init {
        /// `.sql`, `.json`, `.yaml` or `.yml` file, or a directory of them.
        path: PathBuf,
    },

    /// Print rows of a table.
    Select {
        /// Table to read.
        table: String,

        /// Columns to print (all if not specified).
        #[arg(short, long)]
        field: Vec<String>,

        /// Equality filter as `column=value`; repeat to combine.
        #[arg(short = 'w', long = "where", value_parser = parse_clause)]
        filter: Vec<(String, String)>,

        /// Maximum number of rows.
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user.
    Create {
        name: String,
        email: String,
        #[arg(long, env = "PATCH_PASSWORD")]
        password: String,
    },

    /// Show a user by name, e-mail or id; all users if none given.
    Show { user: Option<String> },

    /// Change a user's name or e-mail.
    Update {
        user: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Replace a user's password.
    Passwd {
        user: String,
        #[arg(long, env = "PATCH_PASSWORD")]
        password: String,
    },

    /// Delete a user by name or id.
    Delete { user: String },

    /// Check a password for a name or e-mail.
    Auth {
        user: String,
        #[arg(long, env = "PATCH_PASSWORD")]
        password: String,
    },
}

fn parse_clause(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected column=value, got `{s}`"))
}

fn load_config(cli: &Cli) -> anyhow::Result<DataConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let map = ConfigMap::load(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let section = map.sub("db").unwrap_or(map);
            DataConfig::from_config(&section)?
        }
        None => DataConfig::default(),
    };
    if let Some(url) = &cli.database {
        config.url.clone_from(url);
    }
    Ok(config)
}

async fn find_user(db: &DataBase, user: &str) -> anyhow::Result<patch_data::User> {
    let users = db.users();
    let found = if let Ok(id) = user.parse::<i64>() {
        users.get_by_id(id).await
    } else if user.contains('@') {
        users.get_by_email(user).await
    } else {
        users.get_by_name(user).await
    };
    found.with_context(|| format!("looking up {user}"))
}

fn print_user(user: &patch_data::User) {
    println!(
        "{:>5}  {:<20} {:<30} created {}  updated {}",
        user.id(),
        user.name,
        user.email,
        user.created_at.format("%Y-%m-%d %H:%M:%S"),
        user.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;
    let db = DataBase::connect(config)
        .await?
        .with_span(tracing::info_span!("patchctl"));
    db.init().await?;

    let outcome = run(&db, cli.command).await;
    db.close().await;
    outcome
}

async fn run(db: &DataBase, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { path } => {
            db.bootstrap(&path).await?;
            info!("Loaded {}", path.display());
        }

        Commands::Select {
            table,
            field,
            filter,
            limit,
        } => {
            let filter = (!filter.is_empty()).then(|| filter.into_iter().collect::<WhereMap>());
            let limit = limit.map(|n| format!("LIMIT {n}"));
            let rows = db
                .select(
                    &table,
                    field.into_iter().map(FieldName::from).collect(),
                    filter,
                    limit.as_deref(),
                )
                .await?;
            for row in &rows {
                let line: Vec<String> = row.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("{}", line.join("  "));
            }
            info!("{} row(s)", rows.len());
        }

        Commands::User { command } => {
            let users = db.users();
            users.create_table().await?;
            match command {
                UserCommands::Create {
                    name,
                    email,
                    password,
                } => {
                    let user = users.create(&name, &email, &password).await?;
                    info!("Created user {} with id {}", user.name, user.id());
                }
                UserCommands::Show { user: Some(user) } => {
                    print_user(&find_user(db, &user).await?);
                }
                UserCommands::Show { user: None } => {
                    let all = users.get_all().await?;
                    if all.is_empty() {
                        info!("No users.");
                    }
                    for user in &all {
                        print_user(user);
                    }
                }
                UserCommands::Update { user, name, email } => {
                    let current = find_user(db, &user).await?;
                    let updated = users.update(&current, UserPatch { name, email }).await?;
                    print_user(&updated);
                }
                UserCommands::Passwd { user, password } => {
                    let current = find_user(db, &user).await?;
                    users.update_password(&current, &password).await?;
                    info!("Password changed for {}", current.name);
                }
                UserCommands::Delete { user } => {
                    if let Ok(id) = user.parse::<i64>() {
                        users.delete_by_id(id).await?;
                    } else {
                        users.delete_by_name(&user).await?;
                    }
                    info!("Deleted {user}");
                }
                UserCommands::Auth { user, password } => {
                    let user = users.authenticate(&user, &password).await?;
                    info!("Authenticated {} (id {})", user.name, user.id());
                }
            }
        }
    }

    Ok(())
}
