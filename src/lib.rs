//! glean-boot library
//!
//! Brings up networking on a freshly booted instance. If the cloud attached
//! a config drive, it is mounted and the configuration engine applies SSH
//! keys, hostname and interface configuration from its metadata. Otherwise
//! the engine falls back to DHCP on whatever interfaces are live.
//!
//! # Design Principles
//!
//! - **Availability first**: nothing about the config drive may stop the
//!   DHCP fallback from running
//! - **Idempotent hotplug**: an interface with existing configuration is
//!   left alone
//! - **Thin**: the engine's exit status is the result; no policy is
//!   duplicated here

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod gate;
pub mod plan;
pub mod volume;

mod error;

pub use bootstrap::{BootRequest, Bootstrap, Outcome, RunReport, Trigger};
pub use config::BootConfig;
pub use error::BootError;
