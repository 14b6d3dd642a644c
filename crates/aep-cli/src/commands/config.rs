use aep_cli::cli::ConfigCommands;
use aep_cli::config::{resolve_config, write_template};
use anyhow::{Context, Result};

pub fn handle(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { out, force } => {
            write_template(out, *force)?;
            println!("Wrote configuration template to {}", out.display());
            Ok(())
        }
        ConfigCommands::Show { settings } => {
            let config = resolve_config(settings)?;
            // surface validation errors before printing
            config.validate()?;
            let rendered =
                toml::to_string_pretty(&config).context("rendering configuration as TOML")?;
            print!("{rendered}");
            Ok(())
        }
    }
}
