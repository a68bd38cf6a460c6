//! Config Commands

use anyhow::Result;
use clap::Subcommand;
use std::path::Path;

use crate::config::FetchkitConfig;
use crate::output::print_success;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn execute(cmd: ConfigCommands, config: &FetchkitConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(config)?);
        }

        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            FetchkitConfig::default().save(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}
