use super::*;

/// Security level used for SSH algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Strict modern algorithms.
    Secure,
    /// Good security with broader compatibility.
    Balanced,
    /// Maximum compatibility with legacy devices.
    LegacyCompatible,
}

/// How the server host key is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Check against `~/.ssh/known_hosts`.
    KnownHosts,
    /// Accept any host key.
    NoCheck,
}

/// Connection security options for SSH establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    pub level: SecurityLevel,
    pub host_key: HostKeyPolicy,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self::legacy_compatible()
    }
}

impl From<SecurityConfig> for ConnectionSecurityOptions {
    fn from(config: SecurityConfig) -> Self {
        Self {
            level: config.level,
            host_key: config.host_key,
        }
    }
}

impl ConnectionSecurityOptions {
    /// Modern algorithms and known-hosts verification.
    pub fn secure_default() -> Self {
        Self {
            level: SecurityLevel::Secure,
            host_key: HostKeyPolicy::KnownHosts,
        }
    }

    pub fn balanced() -> Self {
        Self {
            level: SecurityLevel::Balanced,
            host_key: HostKeyPolicy::KnownHosts,
        }
    }

    /// Profile for older switches and firewalls; host keys are auto-accepted.
    pub fn legacy_compatible() -> Self {
        Self {
            level: SecurityLevel::LegacyCompatible,
            host_key: HostKeyPolicy::NoCheck,
        }
    }

    pub(super) fn server_check(&self) -> ServerCheckMethod {
        match self.host_key {
            HostKeyPolicy::KnownHosts => ServerCheckMethod::DefaultKnownHostsFile,
            HostKeyPolicy::NoCheck => ServerCheckMethod::NoCheck,
        }
    }

    pub(super) fn preferred(&self) -> Preferred {
        match self.level {
            SecurityLevel::Secure => Preferred {
                kex: Cow::Borrowed(config::SECURE_KEX_ORDER),
                key: Cow::Borrowed(config::SECURE_KEY_TYPES),
                cipher: Cow::Borrowed(config::SECURE_CIPHERS),
                mac: Cow::Borrowed(config::SECURE_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::Balanced => Preferred {
                kex: Cow::Borrowed(config::BALANCED_KEX_ORDER),
                key: Cow::Borrowed(config::BALANCED_KEY_TYPES),
                cipher: Cow::Borrowed(config::BALANCED_CIPHERS),
                mac: Cow::Borrowed(config::BALANCED_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::LegacyCompatible => Preferred {
                kex: Cow::Borrowed(config::LEGACY_KEX_ORDER),
                key: Cow::Borrowed(config::LEGACY_KEY_TYPES),
                cipher: Cow::Borrowed(config::LEGACY_CIPHERS),
                mac: Cow::Borrowed(config::LEGACY_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
        }
    }
}
