//! Command execution engine and connectivity probe.
//!
//! Every call is one self-contained unit of work: registry lookup, at most one
//! connect, at most one command submission, then close. Sessions are never
//! cached between calls.
//!
//! The engine does not prepend vendor mode-switch commands (`enable`,
//! `system-view`, ...) to what the caller submits. It advertises them through
//! the suggestion path (empty command) and the brand tag on results; building
//! the command stream is the caller's job, see
//! [`BrandProfile::with_mode_switch`](crate::brand::BrandProfile::with_mode_switch).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::brand::{BrandKnowledge, GENERIC_COMMANDS, brand_catalog};
use crate::config::{EngineConfig, RegistryMode};
use crate::error::{ConnectError, ErrorKind, StorageError};
use crate::registry::{DeviceRecord, DeviceRegistry};
use crate::session::{CommandOutput, ConnectTarget, Session, SshTransport, Transport};

/// Input of the `ssh_command` capability.
#[derive(Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteRequest {
    /// Device IP address or registered name.
    pub host: String,
    /// Login user; the registry value is used when empty.
    #[serde(default)]
    pub username: Option<String>,
    /// Login password; the registry value is used when empty.
    #[serde(default)]
    pub password: Option<String>,
    /// Command text, several lines allowed. Empty asks for brand suggestions.
    #[serde(default)]
    pub command: Option<String>,
    /// SSH port, 22 when unset.
    #[serde(default)]
    pub port: Option<u16>,
}

impl ExecuteRequest {
    pub fn new(host: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            command: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Input of the `ssh_test` capability.
#[derive(Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProbeRequest {
    /// Device IP address or registered name.
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ProbeRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// What an `execute` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The command ran; stdout/stderr are populated.
    Executed,
    /// No command was given; `message` carries brand suggestions.
    Suggestion,
    /// Nothing ran; `error_kind` says why.
    Failed,
}

/// Result of [`CommandEngine::execute`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionResult {
    pub host: String,
    /// Resolved brand, lower-cased.
    pub brand: String,
    /// `[BRAND: X]` marker prefixed onto clean output.
    pub brand_tag: String,
    pub outcome: Outcome,
    pub error_kind: ErrorKind,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
    /// Human-readable composite handed to the caller.
    pub message: String,
}

impl SessionResult {
    fn new(
        host: &str,
        brand: &str,
        outcome: Outcome,
        error_kind: ErrorKind,
        message: String,
    ) -> Self {
        Self {
            host: host.to_string(),
            brand: brand.to_string(),
            brand_tag: brand_tag(brand),
            outcome,
            error_kind,
            stdout: String::new(),
            stderr: String::new(),
            exit_status: None,
            message,
        }
    }

    fn executed(host: &str, brand: &str, output: CommandOutput) -> Self {
        let tag = brand_tag(brand);
        let message = if output.stderr.is_empty() {
            format!("{tag} {}", output.stdout)
        } else {
            format!(
                "Command output:\n{}\n\nError output:\n{}",
                output.stdout, output.stderr
            )
        };
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_status: output.exit_status,
            ..Self::new(host, brand, Outcome::Executed, ErrorKind::None, message)
        }
    }

    fn failed(host: &str, brand: &str, failure: Failure) -> Self {
        Self::new(host, brand, Outcome::Failed, failure.kind, failure.message)
    }

    /// Failure that still carries whatever output arrived before the channel
    /// was lost.
    fn interrupted(host: &str, brand: &str, failure: Failure, partial: CommandOutput) -> Self {
        let mut message = failure.message;
        if !partial.stdout.is_empty() {
            message.push_str(&format!("\n\nPartial output:\n{}", partial.stdout));
        }
        if !partial.stderr.is_empty() {
            message.push_str(&format!("\n\nPartial error output:\n{}", partial.stderr));
        }
        Self {
            stdout: partial.stdout,
            stderr: partial.stderr,
            ..Self::new(host, brand, Outcome::Failed, failure.kind, message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome != Outcome::Failed
    }
}

impl fmt::Display for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of [`CommandEngine::probe`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProbeResult {
    pub ok: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Brand as registered, `Unknown` when the device is missing.
    pub brand: String,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Name, description and input schema of one engine capability.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Describes `ssh_command` and `ssh_test` for an agent or CLI layer.
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let knowledge = BrandKnowledge::builtin();
    let mode_rules = brand_catalog()
        .into_iter()
        .filter_map(|meta| {
            let profile = knowledge.profile(&meta.name)?;
            (!profile.mode_switch_sequence.is_empty()).then(|| {
                format!(
                    "- {}: {}",
                    meta.vendor,
                    profile.mode_switch_sequence.join(" -> ")
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ToolDescriptor {
            name: "ssh_command",
            description: format!(
                "Run a command on a registered network device over SSH. Credentials and brand come \
                 from the device registry; explicit username/password override them. The result is \
                 prefixed with the device brand. Privileged and configuration commands must be \
                 preceded by the brand's mode-switch commands on separate lines, e.g. \
                 'enable\\nshow running-config'. Leave the command empty to get suggestions.\n\
                 Mode switch by brand:\n{mode_rules}"
            ),
            input_schema: schema_value(schemars::schema_for!(ExecuteRequest)),
        },
        ToolDescriptor {
            name: "ssh_test",
            description: "Check that a registered device accepts an SSH login, without running \
                          any command."
                .to_string(),
            input_schema: schema_value(schemars::schema_for!(ProbeRequest)),
        },
    ]
}

fn schema_value(schema: schemars::Schema) -> serde_json::Value {
    serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null)
}

/// The engine's public contract, for callers that hold it behind a trait object.
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> SessionResult;
    async fn probe(&self, request: ProbeRequest) -> ProbeResult;
}

/// Registry-backed command engine.
pub struct CommandEngine<T = SshTransport> {
    config: EngineConfig,
    registry: Arc<DeviceRegistry>,
    knowledge: BrandKnowledge,
    transport: T,
}

impl CommandEngine<SshTransport> {
    /// Builds the production engine: JSON registry, SSH transport and the
    /// knowledge document named by the configuration (built-in otherwise).
    pub fn from_config(config: EngineConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::open(&config.registry_path));
        let knowledge = config
            .knowledge_path
            .as_ref()
            .map(BrandKnowledge::from_path)
            .unwrap_or_default();
        let transport = SshTransport::from(&config);
        Self::new(config, registry, knowledge, transport)
    }
}

/// Classified failure with its user-facing message.
struct Failure {
    kind: ErrorKind,
    message: String,
}

/// Registry data merged with caller overrides.
struct ResolvedDevice {
    username: String,
    password: String,
    brand: String,
    registered_brand: String,
}

impl<T: Transport> CommandEngine<T> {
    pub fn new(
        config: EngineConfig,
        registry: Arc<DeviceRegistry>,
        knowledge: BrandKnowledge,
        transport: T,
    ) -> Self {
        Self {
            config,
            registry,
            knowledge,
            transport,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry management surface.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn knowledge(&self) -> &BrandKnowledge {
        &self.knowledge
    }

    /// Runs `request.command` on the device, or returns brand suggestions when
    /// the command is empty. Never fails; the cause is in `error_kind`.
    pub async fn execute(&self, request: ExecuteRequest) -> SessionResult {
        let host = request.host.as_str();
        let device = match self.resolve(
            host,
            request.username.as_deref(),
            request.password.as_deref(),
        ) {
            Ok(device) => device,
            Err(failure) => return SessionResult::failed(host, "unknown", failure),
        };

        // Whitespace-only text is still a command and is submitted as-is.
        let command = request.command.as_deref().unwrap_or_default();
        if command.is_empty() {
            return self.suggest(host, &device.brand);
        }

        let target = self.target(host, request.port, &device);
        debug!("Executing on {} ({})", target.device_addr(), device.brand);
        match self.run(&target, command).await {
            Ok(output) => SessionResult::executed(host, &device.brand, output),
            Err(err) => {
                let failure = command_failure(&target, &err);
                match err {
                    ConnectError::CommandInterrupted { partial } => {
                        SessionResult::interrupted(host, &device.brand, failure, partial)
                    }
                    _ => SessionResult::failed(host, &device.brand, failure),
                }
            }
        }
    }

    /// Opens and immediately closes a session to check reachability and login.
    pub async fn probe(&self, request: ProbeRequest) -> ProbeResult {
        let host = request.host.as_str();
        let port = request.port.unwrap_or(self.config.default_port);
        let device = match self.resolve(
            host,
            request.username.as_deref(),
            request.password.as_deref(),
        ) {
            Ok(device) => device,
            Err(failure) => {
                return ProbeResult {
                    ok: false,
                    host: host.to_string(),
                    port,
                    username: request.username.unwrap_or_default(),
                    brand: crate::registry::DEFAULT_BRAND.to_string(),
                    error_kind: failure.kind,
                    message: failure.message,
                };
            }
        };

        let target = self.target(host, Some(port), &device);
        let result = match self.connect(&target).await {
            Ok(mut session) => {
                self.close(&target, &mut session).await;
                Ok(())
            }
            Err(err) => Err(err),
        };

        let (ok, error_kind, message) = match result {
            Ok(()) => (
                true,
                ErrorKind::None,
                format!(
                    "SSH connection succeeded.\n\nTarget: {}:{} (user: {})\nBrand: {}",
                    target.host,
                    target.port,
                    target.username,
                    device.registered_brand.to_uppercase()
                ),
            ),
            Err(err) => {
                let failure = probe_failure(&err);
                (false, failure.kind, failure.message)
            }
        };
        ProbeResult {
            ok,
            host: host.to_string(),
            port: target.port,
            username: target.username,
            brand: device.registered_brand,
            error_kind,
            message,
        }
    }

    fn lookup(&self, host: &str) -> Result<Option<DeviceRecord>, StorageError> {
        match self.config.registry_mode {
            RegistryMode::Compat => Ok(self.registry.lookup(host)),
            RegistryMode::Strict => self.registry.try_lookup(host),
        }
    }

    fn resolve(
        &self,
        host: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<ResolvedDevice, Failure> {
        let record = match self.lookup(host) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(Failure {
                    kind: ErrorKind::DeviceNotFound,
                    message: format!(
                        "Device '{host}' was not found in the registry. \
                         Register it first with add_device."
                    ),
                });
            }
            Err(err) => {
                return Err(Failure {
                    kind: ErrorKind::StorageUnavailable,
                    message: format!(
                        "Device registry unavailable while looking up '{host}': {err}\n\
                         Check that the registry file is readable and well-formed."
                    ),
                });
            }
        };

        let brand = if record.brand.is_empty() {
            "unknown".to_string()
        } else {
            record.brand.to_lowercase()
        };
        Ok(ResolvedDevice {
            username: pick(username, &record.username, &self.config.default_username),
            password: pick(password, &record.password, ""),
            brand,
            registered_brand: record.brand,
        })
    }

    fn suggest(&self, host: &str, brand: &str) -> SessionResult {
        let message = match self.knowledge.resolve_suggestions(brand) {
            Some(text) => format!(
                "Device {host} is a {} device. Suggested commands:\n{text}",
                brand.to_uppercase()
            ),
            None => format!(
                "Device {host} has an unrecognized brand ({brand}). Try generic commands: {}",
                GENERIC_COMMANDS.join(", ")
            ),
        };
        SessionResult::new(host, brand, Outcome::Suggestion, ErrorKind::None, message)
    }

    fn target(&self, host: &str, port: Option<u16>, device: &ResolvedDevice) -> ConnectTarget {
        ConnectTarget {
            host: host.to_string(),
            port: port.unwrap_or(self.config.default_port),
            username: device.username.clone(),
            password: device.password.clone(),
            timeout: self.config.connect_timeout(),
        }
    }

    async fn connect(&self, target: &ConnectTarget) -> Result<T::Session, ConnectError> {
        tokio::time::timeout(target.timeout, self.transport.connect(target))
            .await
            .map_err(|_| ConnectError::Timeout(target.timeout))?
    }

    async fn close(&self, target: &ConnectTarget, session: &mut T::Session) {
        if let Err(e) = session.close().await {
            warn!("Failed to close session {}: {}", target.device_addr(), e);
        }
    }

    /// Connect, execute, close. The session is closed on every path once
    /// connected, including a command timeout.
    async fn run(
        &self,
        target: &ConnectTarget,
        command: &str,
    ) -> Result<CommandOutput, ConnectError> {
        let mut session = self.connect(target).await?;
        let timeout = self.config.command_timeout();
        let result = match tokio::time::timeout(timeout, session.execute(command)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout(timeout)),
        };
        self.close(target, &mut session).await;
        result
    }
}

#[async_trait]
impl<T: Transport> DeviceCommands for CommandEngine<T> {
    async fn execute(&self, request: ExecuteRequest) -> SessionResult {
        CommandEngine::execute(self, request).await
    }

    async fn probe(&self, request: ProbeRequest) -> ProbeResult {
        CommandEngine::probe(self, request).await
    }
}

fn pick(caller: Option<&str>, stored: &str, fallback: &str) -> String {
    caller
        .filter(|v| !v.is_empty())
        .or(Some(stored).filter(|v| !v.is_empty()))
        .unwrap_or(fallback)
        .to_string()
}

fn brand_tag(brand: &str) -> String {
    format!("[BRAND: {}]", brand.to_uppercase())
}

fn command_failure(target: &ConnectTarget, err: &ConnectError) -> Failure {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::AuthenticationFailed => format!(
            "SSH authentication failed for {}: {err}\nCheck the username and password.",
            target.device_addr()
        ),
        ErrorKind::TransportError => format!(
            "SSH connection error on {}:{}: {err}\nCheck that the device is reachable \
             and its SSH service listens on port {}.",
            target.host, target.port, target.port
        ),
        _ => format!(
            "Connection or command execution failed on {}: {err}\n\
             Probe the device with ssh_test before retrying.",
            target.host
        ),
    };
    Failure { kind, message }
}

fn probe_failure(err: &ConnectError) -> Failure {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::AuthenticationFailed => format!(
            "SSH authentication failed: {err}\n\nSuggested fixes:\n\
             1. Check the username and password\n\
             2. Confirm the device accepts password authentication\n\
             3. Check the account's privileges"
        ),
        ErrorKind::TransportError => format!(
            "SSH connection error: {err}\n\nPossible causes:\n\
             1. The SSH service is not running on the device\n\
             2. Wrong port number\n\
             3. Network path is down\n\
             4. A firewall blocks the connection"
        ),
        _ => format!("Connection test failed: {err}"),
    };
    Failure { kind, message }
}
