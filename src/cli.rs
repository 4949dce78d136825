//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logkeeper")]
#[command(version)]
#[command(about = "Multi-tenant log collection service with API-key access control and mail reports")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml")]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// Seed tenant records from a JSON array
    Seed {
        /// Tenant list file
        #[arg(short, long, default_value = "services.json")]
        file: PathBuf,

        /// Remove all existing tenants first
        #[arg(long)]
        drop: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_command() {
        let cli = Cli::parse_from(["logkeeper", "-c", "dev.toml", "seed", "--drop"]);
        assert_eq!(cli.config, PathBuf::from("dev.toml"));
        match cli.command {
            Some(Commands::Seed { file, drop }) => {
                assert_eq!(file, PathBuf::from("services.json"));
                assert!(drop);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_runs_server() {
        let cli = Cli::parse_from(["logkeeper"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }
}
