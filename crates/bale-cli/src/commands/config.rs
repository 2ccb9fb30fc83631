//! `bale config show` and `bale config schema`

use bale_config::{Overrides, json_schema};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalArgs};
use crate::commands::utils;
use crate::error::{CliError, Result};

pub fn execute(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    let output = match args.command {
        ConfigCommand::Show => {
            let (_, config) = utils::load_config(global, &Overrides::default())?;
            toml::to_string_pretty(&config).map_err(|e| CliError::Render(e.to_string()))?
        }
        ConfigCommand::Schema => serde_json::to_string_pretty(&json_schema())
            .map_err(|e| CliError::Render(e.to_string()))?,
    };
    println!("{}", output.trim_end());
    Ok(())
}
