//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use race_control_core::{render_pipeline_table, PipelineRegistry, PROGRAM_NAME};

#[derive(Parser)]
#[command(name = PROGRAM_NAME)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available components
    List {
        /// What to list
        #[arg(value_enum)]
        what: ListTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ListTarget {
    /// Race pipelines
    Pipelines,
}

impl Cli {
    /// Run the selected command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::List {
                what: ListTarget::Pipelines,
            } => {
                let registry = PipelineRegistry::with_builtin();
                tracing::debug!(pipelines = registry.len(), "Listing pipelines");
                print!("{}", render_pipeline_table(&registry));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_pipelines() {
        let cli = Cli::try_parse_from([PROGRAM_NAME, "list", "pipelines", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::List {
                what: ListTarget::Pipelines
            }
        ));
    }

    #[test]
    fn test_unknown_list_target_is_rejected() {
        assert!(Cli::try_parse_from([PROGRAM_NAME, "list", "tracks"]).is_err());
    }
}
