//! Error types for device registry access, SSH sessions and configuration.
//!
//! Transport failures are carried as [`ConnectError`] inside the crate and
//! reduced to an [`ErrorKind`] at the engine boundary, so callers always get a
//! classified result instead of a raw SSH error.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::CommandOutput;

/// Classified cause carried on every engine result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call completed without a failure.
    #[default]
    None,
    /// The device rejected the supplied credentials.
    AuthenticationFailed,
    /// Network, protocol or timeout failure while talking to the device.
    TransportError,
    /// The host has no record in the device registry.
    DeviceNotFound,
    /// The registry backend could not be read (strict registry mode only).
    StorageUnavailable,
    /// Anything that does not fit the other kinds.
    Unknown,
}

impl ErrorKind {
    /// Returns true for [`ErrorKind::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, ErrorKind::None)
    }
}

/// Errors that can occur while connecting to a device or running a command.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The device rejected the username/password pair.
    #[error("authentication rejected for user '{0}'")]
    AuthenticationFailed(String),

    /// Connect or command execution did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The SSH channel closed before the command produced any output.
    #[error("channel closed before command completed")]
    ChannelDisconnectError,

    /// The SSH channel closed mid-command; `partial` is what arrived first.
    #[error(
        "channel closed before command completed ({} bytes of output received)",
        .partial.stdout.len() + .partial.stderr.len()
    )]
    CommandInterrupted { partial: CommandOutput },

    /// The session was already closed when a command was submitted.
    #[error("session already closed")]
    ConnectClosedError,

    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2Error(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    RusshError(#[from] russh::Error),

    /// Socket level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure that is not a transport or authentication problem.
    #[error("internal error: {0}")]
    InternalServerError(String),
}

impl ConnectError {
    /// Maps the error onto the kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            ConnectError::Ssh2Error(err) => match err {
                async_ssh2_tokio::Error::PasswordWrong | async_ssh2_tokio::Error::KeyAuthFailed => {
                    ErrorKind::AuthenticationFailed
                }
                _ => ErrorKind::TransportError,
            },
            ConnectError::Timeout(_)
            | ConnectError::ChannelDisconnectError
            | ConnectError::CommandInterrupted { .. }
            | ConnectError::ConnectClosedError
            | ConnectError::RusshError(_)
            | ConnectError::Io(_) => ErrorKind::TransportError,
            ConnectError::InternalServerError(_) => ErrorKind::Unknown,
        }
    }
}

/// Errors raised by a registry storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("registry io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing document is not valid registry JSON.
    #[error("registry document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A writer panicked while holding the registry lock.
    #[error("registry lock poisoned")]
    Poisoned,

    /// The secret codec could not encode or decode a stored password.
    #[error("credential codec failed: {0}")]
    Codec(String),
}

/// Errors raised while loading [`crate::config::EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rejection_is_authentication_failure() {
        let err = ConnectError::Ssh2Error(async_ssh2_tokio::Error::PasswordWrong);
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn timeout_is_transport_failure() {
        let err = ConnectError::Timeout(Duration::from_secs(10));
        assert_eq!(err.kind(), ErrorKind::TransportError);
    }

    #[test]
    fn io_failure_is_transport_failure() {
        let err = ConnectError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(err.kind(), ErrorKind::TransportError);
    }

    #[test]
    fn interrupted_command_is_transport_failure() {
        let err = ConnectError::CommandInterrupted {
            partial: CommandOutput {
                stdout: "Building configuration...\n".to_string(),
                ..Default::default()
            },
        };
        assert_eq!(err.kind(), ErrorKind::TransportError);
        assert!(err.to_string().contains("26 bytes"));
    }

    #[test]
    fn internal_failure_is_unknown() {
        let err = ConnectError::InternalServerError("boom".to_string());
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
