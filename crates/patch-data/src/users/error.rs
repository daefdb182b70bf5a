//! Error types for the user repository.

use thiserror::Error;

use crate::error::DataError;

/// User repository errors.
#[derive(Debug, Error)]
pub enum UserError {
    /// The data layer failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// No user matches the lookup.
    #[error("user not found")]
    NoUser,

    /// A user with that name or e-mail already exists.
    #[error("user already exists")]
    UserExists,

    /// The password does not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User names may not contain whitespace.
    #[error("invalid user name")]
    InvalidName,

    /// The password could not be hashed.
    #[error("password hashing error")]
    PasswordHash,

    /// The user was written but could not be read back.
    #[error("failed to create user")]
    CreateUser,
}

/// Result type alias for user repository operations.
pub type Result<T> = std::result::Result<T, UserError>;
