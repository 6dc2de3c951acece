//! Render command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use fleetinit_substitution::{
    GlobalState, Identifier, Registry, State, StateSnapshot, SubstitutionManager,
};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use crate::error::CliError;
use crate::fleet::{self, Fleet};
use crate::output::{print_info, print_output, print_success, OutputFormat};

/// Resolve a fleet's substitutions.
#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Fleet file path (TOML).
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,

    /// Allocation state file (JSON). Loaded before and saved after a
    /// successful render.
    #[arg(long, value_name = "PATH", env = "FLEETINIT_STATE_FILE")]
    state: Option<PathBuf>,

    /// Only render these replicas (repeatable). Defaults to all.
    #[arg(long = "replica", value_name = "NAME")]
    replicas: Vec<String>,
}

/// One replica's rendered user-data.
#[derive(Debug, Serialize)]
pub struct RenderedReplica {
    pub replica: Identifier,
    pub values: Vec<State>,
    pub user_data: String,
}

#[derive(Tabled)]
struct RenderedRow {
    #[tabled(rename = "REPLICA")]
    replica: String,
    #[tabled(rename = "VALUES")]
    values: String,
    #[tabled(rename = "USER DATA")]
    user_data: String,
}

impl RenderCommand {
    pub fn run(self, format: OutputFormat) -> Result<()> {
        let fleet = Fleet::load(&self.fleet)?;

        let snapshot = match &self.state {
            Some(path) => fleet::load_snapshot(path)?,
            None => StateSnapshot::new(),
        };

        let selected = select_replicas(&fleet, &self.replicas)?;
        let registry = Registry::with_builtin_handlers();
        let state = GlobalState::from_snapshot(snapshot);

        let rendered = render_fleet(&registry, &fleet, &selected, &state)?;

        print_output(&rendered, format, |r| RenderedRow {
            replica: r.replica.to_string(),
            values: r
                .values
                .iter()
                .map(|s| format!("{}={}", s.key, s.value))
                .collect::<Vec<_>>()
                .join(", "),
            user_data: r.user_data.clone(),
        });

        match &self.state {
            Some(path) => save_state(path, &state)?,
            None => print_info("allocations were not persisted (no --state file)"),
        }

        Ok(())
    }
}

/// Render the selected replicas, stopping at the first failure.
pub fn render_fleet(
    registry: &Registry,
    fleet: &Fleet,
    replicas: &[Identifier],
    state: &GlobalState,
) -> Result<Vec<RenderedReplica>> {
    let manager = SubstitutionManager::new(registry);
    let mut rendered = Vec::with_capacity(replicas.len());

    for replica in replicas {
        let to_error = |source| CliError::Replica {
            replica: replica.to_string(),
            source,
        };

        let values = manager
            .resolve(replica, &fleet.substitutions, state)
            .map_err(to_error)?;
        let patcher = manager
            .render(replica, &fleet.substitutions, state, &fleet.template)
            .map_err(to_error)?;
        let user_data = patcher
            .encode()
            .map_err(|e| to_error(e.into()))?;

        rendered.push(RenderedReplica {
            replica: replica.clone(),
            values,
            user_data,
        });
    }

    info!(replicas = rendered.len(), "rendered fleet");
    Ok(rendered)
}

fn select_replicas(fleet: &Fleet, names: &[String]) -> Result<Vec<Identifier>> {
    if names.is_empty() {
        return Ok(fleet.replicas.clone());
    }

    names
        .iter()
        .map(|name| {
            fleet
                .replicas
                .iter()
                .find(|r| r.as_str() == name)
                .cloned()
                .with_context(|| format!("replica '{name}' is not part of the fleet"))
        })
        .collect()
}

fn save_state(path: &Path, state: &GlobalState) -> Result<()> {
    fleet::save_snapshot(path, &state.snapshot())?;
    print_success(&format!(
        "saved allocations for {} replica(s) to {}",
        state.len(),
        path.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use fleetinit_cloudinit::CloudInitPatcher;
    use fleetinit_substitution::SubstitutionError;
    use fleetinit_testing::{decode_base64, encode_base64, fixtures};

    use super::*;

    fn fleet(cidr: &str, replicas: &[&str]) -> Fleet {
        let names = replicas
            .iter()
            .map(|r| format!("\"{r}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"
user_data = "{}"
replicas = [{names}]

[[substitutions]]
type = "ipv4Address"
key = "$ipv4Address"
unique = true
additionalProperties = {{ cidr = "{cidr}" }}
"#,
            encode_base64("#cloud-config\nbootcmd:\n  - ip addr add $ipv4Address/24 dev eth1\n")
        );
        Fleet::from_toml_str(&toml, Path::new(".")).unwrap()
    }

    #[test]
    fn test_render_fleet() {
        let registry = Registry::with_builtin_handlers();
        let fleet = fleet("10.3.0.0/24", &["web-0", "web-1", "web-2"]);
        let state = GlobalState::new();

        let rendered = render_fleet(&registry, &fleet, &fleet.replicas, &state).unwrap();
        assert_eq!(rendered.len(), 3);

        let mut addresses = HashSet::new();
        for replica in &rendered {
            let address = &replica.values[0].value;
            assert!(addresses.insert(address.clone()));

            let decoded = decode_base64(&replica.user_data);
            assert!(decoded.contains(&format!("ip addr add {address}/24 dev eth1")));
            assert!(CloudInitPatcher::new(&replica.user_data).is_ok());
        }
    }

    #[test]
    fn test_render_reports_failing_replica() {
        let registry = Registry::with_builtin_handlers();
        let fleet = fleet("10.3.0.0/30", &["web-0", "web-1", "web-2"]);
        let state = GlobalState::new();

        let err = render_fleet(&registry, &fleet, &fleet.replicas, &state).unwrap_err();
        match err.downcast_ref::<CliError>() {
            Some(CliError::Replica { replica, source }) => {
                assert_eq!(replica, "web-2");
                assert!(matches!(
                    source,
                    SubstitutionError::ExhaustedAddressSpace { .. }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rerender_with_restored_state_is_stable() {
        let registry = Registry::with_builtin_handlers();
        let fleet = fleet("10.3.0.0/16", &["web-0", "web-1"]);

        let first = GlobalState::new();
        let before = render_fleet(&registry, &fleet, &fleet.replicas, &first).unwrap();

        let second = GlobalState::from_snapshot(first.snapshot());
        let after = render_fleet(&registry, &fleet, &fleet.replicas, &second).unwrap();

        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.values, b.values);
            assert_eq!(a.user_data, b.user_data);
        }
    }

    #[test]
    fn test_select_replicas() {
        let fleet = fleet("10.3.0.0/24", &["web-0", "web-1"]);

        let all = select_replicas(&fleet, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let one = select_replicas(&fleet, &["web-1".to_string()]).unwrap();
        assert_eq!(one[0].as_str(), "web-1");

        assert!(select_replicas(&fleet, &["web-9".to_string()]).is_err());
    }

    #[test]
    fn test_fixture_template_renders() {
        let registry = Registry::with_builtin_handlers();
        let toml = format!(
            r#"
user_data = "{}"
replicas = ["db-0"]

[[substitutions]]
type = "ipv4Address"
key = "$ipv4Address"
additionalProperties = {{ cidr = "10.8.0.0/24" }}

[[substitutions]]
type = "ipv6Address"
key = "$ipv6Address"
additionalProperties = {{ cidr = "fd08::/64", strategy = "sequential" }}
"#,
            encode_base64(fixtures::NETWORK_TEMPLATE)
        );
        let fleet = Fleet::from_toml_str(&toml, Path::new(".")).unwrap();
        let state = GlobalState::new();

        let rendered = render_fleet(&registry, &fleet, &fleet.replicas, &state).unwrap();
        let decoded = decode_base64(&rendered[0].user_data);
        assert!(decoded.contains("fd08::1"));
        assert_eq!(rendered[0].values[1].value, "fd08::1");
    }
}
