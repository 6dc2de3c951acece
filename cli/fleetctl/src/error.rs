//! Error handling and display for the CLI.

use colored::Colorize;
use fleetinit_cloudinit::CloudInitError;
use fleetinit_substitution::SubstitutionError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("fleet file sets both user_data and user_data_file")]
    AmbiguousUserData,

    #[error("fleet file lists replica '{0}' more than once")]
    DuplicateReplica(String),

    #[error("invalid assignment '{0}' (expected KEY=VALUE)")]
    InvalidAssignment(String),

    #[error("failed to render replica '{replica}'")]
    Replica {
        replica: String,
        #[source]
        source: SubstitutionError,
    },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }

    if let Some(hint) = hint_for(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<SubstitutionError>() {
            return match e {
                SubstitutionError::ExhaustedAddressSpace { .. } => {
                    Some("Widen the CIDR or reduce the number of replicas.")
                }
                SubstitutionError::UnknownSubstitutionType(_) => {
                    Some("Run `fleetctl handlers` to list the supported substitution types.")
                }
                e if e.is_configuration_error() => {
                    Some("Check the substitutions declared in the fleet file.")
                }
                _ => None,
            };
        }

        if let Some(e) = cause.downcast_ref::<CloudInitError>() {
            return match e {
                CloudInitError::Decode(_) => Some("User-data must be standard base64."),
                CloudInitError::NoCloudConfig { .. } => {
                    Some("The decoded document must start with '#cloud-config'.")
                }
                _ => None,
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_through_context() {
        let err = anyhow::Error::new(CliError::Replica {
            replica: "web-0".to_string(),
            source: SubstitutionError::ExhaustedAddressSpace {
                cidr: "10.0.0.0/31".to_string(),
                attempts: 0,
            },
        });
        assert_eq!(
            hint_for(&err),
            Some("Widen the CIDR or reduce the number of replicas.")
        );
    }

    #[test]
    fn test_hint_for_decode_error() {
        let err = anyhow::Error::new(CloudInitError::Decode("bad".to_string()))
            .context("failed to read user-data");
        assert_eq!(hint_for(&err), Some("User-data must be standard base64."));
    }

    #[test]
    fn test_no_hint_for_other_errors() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(hint_for(&err), None);
    }
}
