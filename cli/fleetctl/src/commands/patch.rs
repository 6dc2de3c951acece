//! Patch command.

use anyhow::Result;
use clap::Args;
use fleetinit_cloudinit::{CloudInitPatcher, Value};
use serde::Serialize;
use tracing::debug;

use crate::error::CliError;
use crate::output::{print_json, OutputFormat};

/// Set top-level keys and environment variables in base64 user-data.
#[derive(Debug, Args)]
pub struct PatchCommand {
    /// Base64 user-data to patch.
    #[arg(long, value_name = "BASE64")]
    user_data: String,

    /// Set a top-level key (KEY=VALUE, VALUE parsed as YAML). Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Set an environment variable (KEY=VALUE). Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PatchOutput {
    user_data: String,
}

impl PatchCommand {
    pub fn run(self, format: OutputFormat) -> Result<()> {
        let mut patcher = CloudInitPatcher::new(&self.user_data)?;
        apply_assignments(&mut patcher, &self.set, &self.env)?;

        let user_data = patcher.encode()?;
        match format {
            OutputFormat::Json => print_json(&PatchOutput { user_data }),
            OutputFormat::Table => println!("{}", user_data),
        }
        Ok(())
    }
}

fn apply_assignments(
    patcher: &mut CloudInitPatcher,
    set: &[String],
    env: &[String],
) -> Result<(), CliError> {
    for assignment in set {
        let (key, value) = split_assignment(assignment)?;
        debug!(key, "setting key");
        patcher.patch(key, parse_value(value));
    }

    for assignment in env {
        let (key, value) = split_assignment(assignment)?;
        debug!(key, "setting environment variable");
        patcher.set_env(key, parse_value(value));
    }

    Ok(())
}

fn split_assignment(assignment: &str) -> Result<(&str, &str), CliError> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CliError::InvalidAssignment(assignment.to_string())),
    }
}

/// Interpret a value as YAML, keeping it as a plain string when it does not
/// parse or parses to nothing.
fn parse_value(value: &str) -> Value {
    match serde_yaml::from_str::<Value>(value) {
        Ok(Value::Null) | Err(_) => Value::String(value.to_string()),
        Ok(parsed) => parsed,
    }
}
