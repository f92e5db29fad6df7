//! Config subcommand: inspect or initialise the settings file.

use crate::config::{AppSettings, Paths};
use crate::output;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Show the effective settings, or write a default settings file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Write the current settings to the settings file
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing settings file with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

impl ConfigCommand {
    pub fn execute(&self, settings: &AppSettings, explicit: Option<&Path>) -> Result<()> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Paths::discover()?.settings_file(),
        };

        if self.init {
            return self.init_file(settings, path);
        }

        output::print_info(&format!("Settings file: {}", path.display()));
        println!("{}", serde_json::to_string_pretty(settings)?);
        Ok(())
    }

    fn init_file(&self, settings: &AppSettings, path: PathBuf) -> Result<()> {
        if path.exists() && !self.force {
            output::print_warning(&format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ));
            return Ok(());
        }
        settings
            .save_to(&path)
            .with_context(|| format!("could not initialise {}", path.display()))?;
        output::print_success(&format!("Wrote {}", path.display()));
        Ok(())
    }
}
