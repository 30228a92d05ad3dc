// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;

/// Failure categories surfaced by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Hardware probe/open failed or the device vanished mid-stream.
    DeviceUnavailable,
    /// Operation forbidden in the current mode; state unchanged.
    Busy,
    /// Validation rejected the input; state unchanged.
    InvalidConfig,
    /// Recording storage budget reached.
    StorageExhausted,
    /// Referenced recording or resource does not exist.
    NotFound,
    /// Malformed command frame.
    Protocol,
    /// Unexpected worker-side condition.
    Internal,
}

/// Error type returned by session requests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::DeviceUnavailable,
            message: msg.into(),
        }
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Busy,
            message: msg.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidConfig,
            message: msg.into(),
        }
    }

    pub fn storage_exhausted(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::StorageExhausted,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: msg.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Protocol,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(SessionError::busy("x").kind, ErrorKind::Busy);
        assert_eq!(
            SessionError::invalid_config("x").kind,
            ErrorKind::InvalidConfig
        );
        assert_eq!(
            SessionError::device_unavailable("x").kind,
            ErrorKind::DeviceUnavailable
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::StorageExhausted).unwrap();
        assert_eq!(json, "\"storage_exhausted\"");
    }
}
