//! Handlers command.

use anyhow::Result;
use fleetinit_substitution::Registry;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_output, OutputFormat};

#[derive(Debug, Serialize)]
struct HandlerInfo {
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Tabled)]
struct HandlerRow {
    #[tabled(rename = "TYPE")]
    type_name: String,
}

/// List the substitution types the built-in registry resolves.
pub fn run(format: OutputFormat) -> Result<()> {
    print_output(&builtin_handlers(), format, |h| HandlerRow {
        type_name: h.type_name.clone(),
    });
    Ok(())
}

fn builtin_handlers() -> Vec<HandlerInfo> {
    Registry::with_builtin_handlers()
        .type_names()
        .into_iter()
        .map(|name| HandlerInfo {
            type_name: name.to_string(),
        })
        .collect()
}
