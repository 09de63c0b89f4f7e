//! Stub transport that records every call the engine makes.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fleetssh::brand::BrandKnowledge;
use fleetssh::config::EngineConfig;
use fleetssh::engine::CommandEngine;
use fleetssh::error::ConnectError;
use fleetssh::registry::DeviceRegistry;
use fleetssh::session::{CommandOutput, ConnectTarget, Session, Transport};

#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum ConnectMode {
    Accept,
    RejectAuth,
    Refuse,
    Hang,
    Broken,
}

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum ExecMode {
    Output { stdout: String, stderr: String },
    Fail,
    /// Output arrives, then the channel drops before the command finishes.
    Interrupted { stdout: String },
    Hang,
}

#[derive(Default)]
pub struct Calls {
    pub connects: AtomicUsize,
    pub executes: AtomicUsize,
    pub closes: AtomicUsize,
    pub credentials: Mutex<Vec<(String, String)>>,
    pub commands: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl Calls {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_credentials(&self) -> Option<(String, String)> {
        self.credentials.lock().expect("lock").last().cloned()
    }
}

pub struct StubTransport {
    pub calls: Arc<Calls>,
    connect: ConnectMode,
    exec: ExecMode,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new(connect: ConnectMode, exec: ExecMode) -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            connect,
            exec,
        }
    }

    pub fn returning(stdout: &str, stderr: &str) -> Self {
        Self::new(
            ConnectMode::Accept,
            ExecMode::Output {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        )
    }
}

pub struct StubSession {
    calls: Arc<Calls>,
    exec: ExecMode,
}

#[async_trait]
impl Transport for StubTransport {
    type Session = StubSession;

    async fn connect(&self, target: &ConnectTarget) -> Result<StubSession, ConnectError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        self.calls
            .credentials
            .lock()
            .expect("lock")
            .push((target.username.clone(), target.password.clone()));
        match self.connect {
            ConnectMode::Accept => Ok(StubSession {
                calls: self.calls.clone(),
                exec: self.exec.clone(),
            }),
            ConnectMode::RejectAuth => {
                Err(ConnectError::AuthenticationFailed(target.username.clone()))
            }
            ConnectMode::Refuse => Err(ConnectError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            ConnectMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            ConnectMode::Broken => Err(ConnectError::InternalServerError(
                "stub transport broken".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Session for StubSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ConnectError> {
        self.calls.executes.fetch_add(1, Ordering::SeqCst);
        self.calls
            .commands
            .lock()
            .expect("lock")
            .push(command.to_string());
        match &self.exec {
            ExecMode::Output { stdout, stderr } => Ok(CommandOutput {
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                exit_status: Some(0),
            }),
            ExecMode::Fail => Err(ConnectError::ChannelDisconnectError),
            ExecMode::Interrupted { stdout } => Err(ConnectError::CommandInterrupted {
                partial: CommandOutput {
                    stdout: stdout.clone(),
                    ..Default::default()
                },
            }),
            ExecMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine over an in-memory registry, short timeouts and the stub transport.
#[allow(dead_code)]
pub fn engine_with(
    registry: Arc<DeviceRegistry>,
    transport: StubTransport,
    config: EngineConfig,
) -> (CommandEngine<StubTransport>, Arc<Calls>) {
    let calls = transport.calls.clone();
    let engine = CommandEngine::new(config, registry, BrandKnowledge::builtin(), transport);
    (engine, calls)
}

#[allow(dead_code)]
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        connect_timeout_secs: 1,
        command_timeout_secs: 1,
        ..Default::default()
    }
}
