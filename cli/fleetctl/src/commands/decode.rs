//! Decode command.

use anyhow::Result;
use clap::Args;
use fleetinit_cloudinit::CloudInitPatcher;

/// Decode base64 user-data.
#[derive(Debug, Args)]
pub struct DecodeCommand {
    /// Base64 user-data to decode.
    #[arg(long, value_name = "BASE64")]
    user_data: String,

    /// Print the decoded text as received instead of the normalized document.
    #[arg(long)]
    raw: bool,
}

impl DecodeCommand {
    pub fn run(self) -> Result<()> {
        print!("{}", self.decode()?);
        Ok(())
    }

    fn decode(&self) -> Result<String> {
        let patcher = CloudInitPatcher::new(&self.user_data)?;
        if self.raw {
            Ok(patcher.decoded().to_string())
        } else {
            Ok(patcher.render()?)
        }
    }
}
