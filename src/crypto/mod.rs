pub mod password;

pub use password::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Unsupported password hash scheme: {0}")]
    UnsupportedScheme(String),
}
