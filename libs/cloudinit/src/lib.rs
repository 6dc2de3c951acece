//! # fleetinit-cloudinit
//!
//! Safe mutation of base64-encoded cloud-config user-data.
//!
//! ## Format
//!
//! A cloud-config document is a YAML mapping whose first non-blank line is
//! the literal header `#cloud-config`:
//!
//! ```text
//! #cloud-config
//! fqdn: myhostname.example.com
//! environment:
//!   REGION: eu-west-1
//! ```
//!
//! Compute APIs carry it base64-encoded (standard alphabet). The patcher
//! decodes it, exposes top-level get/patch plus an `environment` mapping,
//! and re-encodes it with the header restored.

mod error;
mod patcher;

pub use error::CloudInitError;
pub use patcher::{CloudInitPatcher, CLOUD_CONFIG_HEADER, ENVIRONMENT_KEY};

/// Re-export the YAML value type used by the patcher API.
pub use serde_yaml::Value;
