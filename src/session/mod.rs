//! SSH session transport.
//!
//! The engine talks to devices only through the [`Transport`] and [`Session`]
//! traits. [`SshTransport`] is the production implementation built on
//! `async-ssh2-tokio`; tests plug in stubs that count calls.
//!
//! # Main Components
//!
//! - [`Transport`] - Opens one authenticated session per call, never retries
//! - [`Session`] - Runs a command stream and tears the connection down
//! - [`SshTransport`] / [`SshSession`] - `russh` backed implementation
//! - [`ConnectionSecurityOptions`] - Algorithm and host key policy

use async_ssh2_tokio::ServerCheckMethod;
use async_ssh2_tokio::client::{AuthMethod, Client};
use async_trait::async_trait;
use log::{debug, trace};
use russh::{ChannelMsg, Preferred};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use crate::config::{self, EngineConfig, SecurityConfig};
use crate::error::ConnectError;

pub use client::{SshSession, SshTransport};
pub use security::{ConnectionSecurityOptions, HostKeyPolicy, SecurityLevel};

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Bound on connection establishment.
    pub timeout: Duration,
}

impl ConnectTarget {
    /// `user@host:port`, used as the log key for a connection.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Output collected from one command submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, when the remote side reports one.
    pub exit_status: Option<u32>,
}

/// A capability that opens authenticated remote-shell sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    type Session: Session;

    /// Makes exactly one connection attempt.
    async fn connect(&self, target: &ConnectTarget) -> Result<Self::Session, ConnectError>;
}

/// An open remote-shell session.
#[async_trait]
pub trait Session: Send {
    /// Sends `command` (possibly several newline separated lines) as a single
    /// command stream and waits for it to complete.
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ConnectError>;

    /// Tears the connection down. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ConnectError>;
}

mod client;
mod security;
