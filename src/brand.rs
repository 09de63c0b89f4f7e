//! Brand profiles.
//!
//! A brand profile tells the caller how a vendor's CLI expects to be driven:
//! which commands elevate the session into privileged or configuration mode,
//! which commands are commonly useful and how configuration is saved. Profiles
//! are parsed on demand from a knowledge document organised in one section per
//! vendor:
//!
//! ```text
//! #### Cisco devices
//! - **Command style**: IOS / IOS-XE
//! - **Mode switch**: enable -> configure terminal
//! - **Common commands**: show version, show running-config
//! - **Config save**: write memory
//! - **Special features**: VLAN, STP
//! ```
//!
//! The engine only uses profiles to answer "what should I run?"; it never
//! inserts mode-switch commands itself.

use std::path::Path;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Brand keys with a section in the knowledge document.
pub const BUILTIN_BRANDS: &[&str] = &[
    "cisco", "arista", "juniper", "huawei", "h3c", "fortinet", "palo",
];

/// Commands suggested when the brand has no profile.
pub const GENERIC_COMMANDS: &[&str] = &["show version", "show interfaces", "show running-config"];

/// Built-in knowledge document.
pub const BUILTIN_KNOWLEDGE: &str = "\
### Brand command reference

#### Cisco devices
- **Command style**: IOS / IOS-XE
- **Mode switch**: enable -> configure terminal
- **Common commands**: show version, show running-config, show ip interface brief, show vlan brief, show interfaces status
- **Config save**: write memory
- **Special features**: VLAN, STP, EtherChannel, HSRP

#### Arista devices
- **Command style**: EOS, close to Cisco IOS
- **Mode switch**: enable -> configure
- **Common commands**: show version, show running-config, show interfaces status, show vlan, show ip route
- **Config save**: write memory
- **Special features**: MLAG, VXLAN, eAPI

#### Juniper devices
- **Command style**: JunOS, hierarchical set/delete
- **Mode switch**: configure
- **Common commands**: show version, show configuration, show interfaces terse, show route, show system uptime
- **Config save**: commit
- **Special features**: commit confirmed, rollback, routing instances

#### Huawei devices
- **Command style**: VRP
- **Mode switch**: system-view
- **Common commands**: display version, display current-configuration, display interface brief, display vlan, display ip routing-table
- **Config save**: save
- **Special features**: undo commands, iStack, Eth-Trunk

#### H3C devices
- **Command style**: Comware
- **Mode switch**: system-view
- **Common commands**: display version, display current-configuration, display interface brief, display vlan, display ip routing-table
- **Config save**: save force
- **Special features**: IRF, undo commands

#### Fortinet devices
- **Command style**: FortiOS
- **Mode switch**: config system global
- **Common commands**: get system status, show full-configuration, get system interface, get router info routing-table all
- **Config save**: end
- **Special features**: VDOM, security policies

#### Palo Alto devices
- **Command style**: PAN-OS
- **Mode switch**: configure
- **Common commands**: show system info, show interface all, show routing route, show config running
- **Config save**: commit
- **Special features**: App-ID, security zones
";

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^- \*\*(?P<key>[^*]+)\*\*:\s*(?P<value>.*)$").expect("valid field regex")
});

/// Catalog entry for a brand known to the built-in document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BrandMetadata {
    /// Lower-case key, as stored on the engine side.
    pub name: String,
    pub vendor: String,
    /// Section heading in the knowledge document, without the `#### ` marker.
    pub heading: String,
}

fn metadata_for(name: &str) -> Option<BrandMetadata> {
    let vendor = match name {
        "cisco" => "Cisco",
        "arista" => "Arista",
        "juniper" => "Juniper",
        "huawei" => "Huawei",
        "h3c" => "H3C",
        "fortinet" => "Fortinet",
        "palo" => "Palo Alto",
        _ => return None,
    };
    Some(BrandMetadata {
        name: name.to_string(),
        vendor: vendor.to_string(),
        heading: format!("{vendor} devices"),
    })
}

/// Metadata for all brands with a knowledge section.
pub fn brand_catalog() -> Vec<BrandMetadata> {
    BUILTIN_BRANDS
        .iter()
        .filter_map(|name| metadata_for(name))
        .collect()
}

/// Metadata for one brand (case-insensitive).
pub fn brand_metadata(name: &str) -> Option<BrandMetadata> {
    metadata_for(&name.trim().to_ascii_lowercase())
}

/// Parsed knowledge section for one brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BrandProfile {
    pub brand: String,
    pub command_style: Option<String>,
    /// Commands that elevate the session, in order.
    pub mode_switch_sequence: Vec<String>,
    pub common_commands: Vec<String>,
    pub config_save_command: Option<String>,
    pub special_features: Option<String>,
}

impl BrandProfile {
    fn is_empty(&self) -> bool {
        self.command_style.is_none()
            && self.mode_switch_sequence.is_empty()
            && self.common_commands.is_empty()
            && self.config_save_command.is_none()
            && self.special_features.is_none()
    }

    /// Prefixes `command` with this brand's mode-switch sequence, one command
    /// per line, ready to hand to the engine as a single command stream.
    pub fn with_mode_switch(&self, command: &str) -> String {
        self.mode_switch_sequence
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(command))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human-readable suggestion block: mode switch, common commands, config
    /// save and special features, in that order. `None` if the section had
    /// none of them.
    pub fn suggestions(&self) -> Option<String> {
        let mut lines = Vec::new();
        if !self.mode_switch_sequence.is_empty() {
            let sequence = self.mode_switch_sequence.join(" -> ");
            lines.push(format!("Mode switch: {sequence}"));
        }
        let commands = self
            .common_commands
            .iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>();
        if !commands.is_empty() {
            lines.push("Common commands:".to_string());
            lines.extend(commands.iter().map(|c| format!("  - {c}")));
        }
        if let Some(save) = &self.config_save_command {
            lines.push(format!("Config save: {save}"));
        }
        if let Some(features) = &self.special_features {
            lines.push(format!("Special features: {features}"));
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

/// Static brand knowledge source.
#[derive(Debug, Clone)]
pub struct BrandKnowledge {
    content: Option<String>,
}

impl Default for BrandKnowledge {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BrandKnowledge {
    /// The document shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_text(BUILTIN_KNOWLEDGE)
    }

    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Reads a knowledge document; an unreadable file yields an unavailable
    /// source rather than an error, so suggestions degrade to generic ones.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_text(content),
            Err(e) => {
                warn!("Brand knowledge {} unavailable: {}", path.display(), e);
                Self::unavailable()
            }
        }
    }

    /// A source with no content; every lookup returns `None`.
    pub fn unavailable() -> Self {
        Self { content: None }
    }

    pub fn is_available(&self) -> bool {
        self.content.is_some()
    }

    /// Parses the section for `brand` (case-insensitive).
    pub fn profile(&self, brand: &str) -> Option<BrandProfile> {
        let content = self.content.as_deref()?;
        let meta = brand_metadata(brand)?;
        let heading = format!("#### {}", meta.heading);

        let mut profile = BrandProfile {
            brand: meta.name,
            ..Default::default()
        };
        let mut in_section = false;
        for line in content.lines().map(str::trim) {
            if line.starts_with("#### ") {
                if in_section {
                    break;
                }
                in_section = line == heading;
                continue;
            }
            if !in_section {
                continue;
            }
            let Some(caps) = FIELD_RE.captures(line) else {
                continue;
            };
            let value = caps["value"].trim();
            match caps["key"].trim() {
                "Command style" => profile.command_style = Some(value.to_string()),
                "Mode switch" => profile.mode_switch_sequence = split_list(value, "->"),
                "Common commands" => profile.common_commands = split_list(value, ","),
                "Config save" => profile.config_save_command = Some(value.to_string()),
                "Special features" => profile.special_features = Some(value.to_string()),
                _ => {}
            }
        }

        (!profile.is_empty()).then_some(profile)
    }

    /// Suggestion text for `brand`, or `None` when the brand is unknown or the
    /// source is unavailable.
    pub fn resolve_suggestions(&self, brand: &str) -> Option<String> {
        self.profile(brand)?.suggestions()
    }
}

fn split_list(value: &str, separator: &str) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
