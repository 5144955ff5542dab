use crate::config::{Config, ConfigBuilder, load_config};
use crate::probe::{load_probes, select_probes};
use anyhow::{Context, Result, anyhow};
use std::path::Path;

/// Config subcommands
#[derive(Debug, Clone, clap::Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration
    Show {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ShowFormat,
    },

    /// Validate the configuration file and its probe definitions
    Validate,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ShowFormat {
    Yaml,
    Json,
}

/// Execute config command
pub fn cmd_config(config_file: &str, config: &Config, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { format } => {
            println!("{}", render_config(config, *format)?);
            Ok(())
        }
        ConfigCommands::Validate => {
            validate_config_file(config_file)?;
            println!("✅ Configuration file '{}' is valid", config_file);
            Ok(())
        }
    }
}

fn render_config(config: &Config, format: ShowFormat) -> Result<String> {
    match format {
        ShowFormat::Yaml => Ok(serde_yaml::to_string(config)?),
        ShowFormat::Json => Ok(serde_json::to_string_pretty(config)?),
    }
}

/// Parse, resolve and load probes from a config file without running anything
fn validate_config_file(config_file: &str) -> Result<()> {
    if !Path::new(config_file).exists() {
        return Err(anyhow!("Configuration file '{}' not found", config_file));
    }

    let (input, base_dir) = load_config(config_file)?;
    let config = ConfigBuilder::new()
        .with_file(input)
        .with_base_dir(base_dir)
        .resolve()
        .with_context(|| format!("Invalid configuration in {}", config_file))?;

    for script in &config.probes.setup_scripts {
        if !script.exists() {
            return Err(anyhow!("Setup script not found: {}", script.display()));
        }
    }

    let probes = load_probes(&config)?;
    select_probes(probes, &config)?;

    Ok(())
}
