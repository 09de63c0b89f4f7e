//! # fleetssh - Registry-backed SSH command execution for network devices
//!
//! `fleetssh` runs commands on switches, routers and firewalls from mixed
//! vendors. Credentials and brand live in a device registry, so callers only
//! name the host; every call opens a fresh SSH session, runs one command
//! stream and closes the session again.
//!
//! ## Features
//!
//! - **Device Registry**: JSON-backed, lock-protected store of host credentials and brand
//! - **Brand Profiles**: Mode-switch sequences and common commands per vendor
//! - **Classified Results**: Authentication, transport and registry failures are told apart
//! - **Connectivity Probe**: Validates reachability and login without running anything
//! - **Maximum Compatibility**: Legacy SSH algorithms for older network gear
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetssh::config::EngineConfig;
//! use fleetssh::engine::{CommandEngine, ExecuteRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = CommandEngine::from_config(EngineConfig::default());
//!     engine.registry().upsert("172.21.1.167", "admin", "secret", "Arista");
//!
//!     // Privileged commands need the brand's mode switch on a preceding line.
//!     let result = engine
//!         .execute(ExecuteRequest::new("172.21.1.167", "enable\nshow running-config"))
//!         .await;
//!     println!("{result}");
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`engine::CommandEngine`] - Resolves credentials, executes and probes
//! - [`registry::DeviceRegistry`] - Persistent host → credentials/brand store
//! - [`brand::BrandKnowledge`] - Vendor mode-switch and command reference
//! - [`session::Transport`] - SSH capability used by the engine
//! - [`error`] - Error types and the [`error::ErrorKind`] classification

pub mod brand;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod session;
