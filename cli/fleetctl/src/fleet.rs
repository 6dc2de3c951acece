//! Fleet file parsing and allocation state persistence.
//!
//! A fleet file is TOML:
//!
//! ```toml
//! user_data = "I2Nsb3VkLWNvbmZpZwo="   # or: user_data_file = "cloud-config.yaml"
//! replicas = ["web-0", "web-1"]
//!
//! [[substitutions]]
//! type = "ipv4Address"
//! key = "$ipv4Address"
//! unique = true
//! additionalProperties = { cidr = "10.0.0.0/24" }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fleetinit_cloudinit::CloudInitPatcher;
use fleetinit_substitution::{Identifier, StateSnapshot, Substitution};
use serde::Deserialize;
use tracing::debug;

use crate::error::CliError;

/// Fleet file as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FleetFile {
    /// Base64 user-data.
    #[serde(default)]
    user_data: Option<String>,

    /// Plain cloud-config file, relative to the fleet file.
    #[serde(default)]
    user_data_file: Option<PathBuf>,

    replicas: Vec<String>,

    #[serde(default)]
    substitutions: Vec<Substitution>,
}

/// A validated fleet ready to render.
#[derive(Debug)]
pub struct Fleet {
    pub template: CloudInitPatcher,
    pub replicas: Vec<Identifier>,
    pub substitutions: Vec<Substitution>,
}

impl Fleet {
    /// Load and validate a fleet file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fleet file: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&contents, base_dir)
            .with_context(|| format!("invalid fleet file: {}", path.display()))
    }

    /// Parse a fleet from TOML, resolving `user_data_file` against `base_dir`.
    pub fn from_toml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let file: FleetFile = toml::from_str(contents).context("invalid fleet TOML")?;

        let template = match (file.user_data, file.user_data_file) {
            (Some(_), Some(_)) => return Err(CliError::AmbiguousUserData.into()),
            (Some(raw), None) => CloudInitPatcher::new(&raw).context("invalid user_data")?,
            (None, Some(rel)) => {
                let path = base_dir.join(rel);
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read user-data: {}", path.display()))?;
                CloudInitPatcher::from_document(&text)
                    .with_context(|| format!("invalid user-data: {}", path.display()))?
            }
            (None, None) => CloudInitPatcher::new("")?,
        };

        let mut seen = HashSet::new();
        let mut replicas = Vec::with_capacity(file.replicas.len());
        for name in file.replicas {
            if !seen.insert(name.clone()) {
                return Err(CliError::DuplicateReplica(name).into());
            }
            replicas.push(Identifier::new(name)?);
        }

        for substitution in &file.substitutions {
            substitution.validate()?;
        }

        debug!(
            replicas = replicas.len(),
            substitutions = file.substitutions.len(),
            "loaded fleet"
        );

        Ok(Self {
            template,
            replicas,
            substitutions: file.substitutions,
        })
    }
}

/// Load an allocation snapshot. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<StateSnapshot> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file, starting empty");
        return Ok(StateSnapshot::new());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid state file: {}", path.display()))
}

/// Write an allocation snapshot, replacing the file atomically.
pub fn save_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("failed to serialize state")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, json + "\n")
        .with_context(|| format!("failed to write state file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file: {}", path.display()))?;
    Ok(())
}
