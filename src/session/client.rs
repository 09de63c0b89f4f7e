use super::*;

/// Idle bound on an established connection when none is configured.
const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens password-authenticated SSH sessions with `async-ssh2-tokio`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    security_options: ConnectionSecurityOptions,
    inactivity_timeout: Option<Duration>,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new(ConnectionSecurityOptions::default())
    }
}

impl From<&EngineConfig> for SshTransport {
    /// A silent command may stay idle for the whole command timeout; the
    /// connect timeout only bounds session establishment.
    fn from(config: &EngineConfig) -> Self {
        Self::new(ConnectionSecurityOptions::from(config.security))
            .with_inactivity_timeout(Some(config.command_timeout()))
    }
}

impl SshTransport {
    pub fn new(security_options: ConnectionSecurityOptions) -> Self {
        Self {
            security_options,
            inactivity_timeout: Some(DEFAULT_INACTIVITY_TIMEOUT),
        }
    }

    /// How long an established connection may see no traffic before russh
    /// drops it. `None` disables the check.
    pub fn with_inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn security_options(&self) -> &ConnectionSecurityOptions {
        &self.security_options
    }

    pub fn inactivity_timeout(&self) -> Option<Duration> {
        self.inactivity_timeout
    }
}

#[async_trait]
impl Transport for SshTransport {
    type Session = SshSession;

    async fn connect(&self, target: &ConnectTarget) -> Result<SshSession, ConnectError> {
        let device_addr = target.device_addr();

        let config = async_ssh2_tokio::Config {
            preferred: self.security_options.preferred(),
            inactivity_timeout: self.inactivity_timeout,
            ..Default::default()
        };

        let client = Client::connect_with_config(
            (target.host.clone(), target.port),
            &target.username,
            AuthMethod::with_password(&target.password),
            self.security_options.server_check(),
            config,
        )
        .await?;
        debug!("{} SSH session established", device_addr);

        Ok(SshSession {
            client: Some(client),
            device_addr,
        })
    }
}

/// One SSH connection; each [`Session::execute`] opens a fresh exec channel.
pub struct SshSession {
    client: Option<Client>,
    device_addr: String,
}

impl SshSession {
    /// Checks if the underlying SSH connection is still active.
    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|client| !client.is_closed())
    }
}

#[async_trait]
impl Session for SshSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ConnectError> {
        let client = self
            .client
            .as_ref()
            .ok_or(ConnectError::ConnectClosedError)?;

        let mut channel = client.get_channel().await?;
        channel.exec(true, command).await?;
        debug!("{} command submitted", self.device_addr);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        let mut finished = false;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // Extended data type 1 is stderr.
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => {
                    exit_status = Some(code);
                    finished = true;
                }
                ChannelMsg::Eof => finished = true,
                _ => {}
            }
        }

        trace!(
            "{} collected {} stdout bytes, {} stderr bytes",
            self.device_addr,
            stdout.len(),
            stderr.len()
        );

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        };
        // Neither EOF nor an exit status: the channel or connection died.
        let received = !output.stdout.is_empty() || !output.stderr.is_empty();
        match (finished, received) {
            (true, _) => Ok(output),
            (false, false) => Err(ConnectError::ChannelDisconnectError),
            (false, true) => Err(ConnectError::CommandInterrupted { partial: output }),
        }
    }

    async fn close(&mut self) -> Result<(), ConnectError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        debug!("Closing SSH connection {}", self.device_addr);
        if client.is_closed() {
            return Ok(());
        }
        client.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_defaults_to_legacy_profile() {
        let transport = SshTransport::default();
        assert_eq!(
            transport.security_options().level,
            SecurityLevel::LegacyCompatible
        );
    }

    #[test]
    fn inactivity_follows_command_timeout_not_connect_timeout() {
        let config = EngineConfig {
            connect_timeout_secs: 2,
            command_timeout_secs: 45,
            ..Default::default()
        };
        let transport = SshTransport::from(&config);
        let expected = Some(Duration::from_secs(45));
        assert_eq!(transport.inactivity_timeout(), expected);
        assert_eq!(
            SshTransport::default().inactivity_timeout(),
            Some(DEFAULT_INACTIVITY_TIMEOUT)
        );
    }

    #[test]
    fn connect_target_debug_hides_password() {
        let target = ConnectTarget {
            host: "10.0.0.1".to_string(),
            port: 22,
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            timeout: Duration::from_secs(10),
        };
        let rendered = format!("{target:?}");
        assert!(rendered.contains("10.0.0.1"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(target.device_addr(), "admin@10.0.0.1:22");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails_as_transport_error() {
        let transport = SshTransport::default();
        let target = ConnectTarget {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "admin".to_string(),
            password: "pw".to_string(),
            timeout: Duration::from_secs(2),
        };
        let err = match transport.connect(&target).await {
            Ok(_) => panic!("nothing listens on port 1"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::TransportError);
    }
}
