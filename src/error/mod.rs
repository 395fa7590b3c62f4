// illustrator-relay/src/error/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Centralized error handling for the relay.
//!
//! Uses `thiserror` to define structured errors and `anyhow` for convenient propagation.
//! All modules return `Result<T, RelayError>` for internal logic,
//! and `anyhow::Result<T>` for top-level functions like `main`.

use std::path::PathBuf;
use thiserror::Error;

/// The root error type for all relay failures.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The command names an action that has no handler.
    #[error("Unknown command action: {0}")]
    UnknownAction(String),

    /// The action needs an open document and none is open.
    #[error("NoActiveDocument: command {0} requires an active document")]
    NoActiveDocument(String),

    /// `createShape` was asked for a shape it does not know.
    #[error("Unknown shape type: {0}")]
    UnknownShapeType(String),

    /// Any failure raised by the host document API, script evaluation included.
    #[error("{0}")]
    HostApi(String),

    /// A font lookup failed. Handlers recover from this locally.
    #[error("Font {0} not found")]
    FontNotFound(String),

    /// Command parameters could not be decoded.
    #[error("Invalid parameters for {action}: {reason}")]
    InvalidParams {
        action: String,
        reason: String,
    },

    /// Socket / websocket level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An emit was attempted while no socket is connected.
    #[error("Socket is not connected")]
    NotConnected,

    /// Configuration loading or parsing error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error with associated path for better diagnostics
    #[error("I/O error at {path:?}: {source}")]
    IoWithPath {
        source: std::io::Error,
        path: PathBuf,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General-purpose error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Creates an `IoWithPath` error from a path and an I/O error.
    pub fn io_with_path<E: Into<std::io::Error>>(path: PathBuf, source: E) -> Self {
        Self::IoWithPath {
            source: source.into(),
            path,
        }
    }

    pub fn invalid_params(action: &str, reason: impl ToString) -> Self {
        Self::InvalidParams {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

/// Convenient alias for `Result<T, RelayError>`.
pub type Result<T> = std::result::Result<T, RelayError>;

pub use anyhow::Result as AnyResult;
