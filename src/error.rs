// src/error.rs
//
// Library-wide error type. The binary wraps these in anyhow with context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("malformed OVF file: {0}")]
    Ovf(String),

    #[error("malformed table: {0}")]
    Table(String),

    #[error("plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
