use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keel_core::{AppConfig, FailurePolicy};

/// Keel: a plugin runtime driven by on-disk manifests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    pub ping: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags overriding values from the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file (.json, .yaml, .yml or .toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Root searched for plugin directories; repeat for several roots
    #[arg(long = "base-path", short = 'b', global = true)]
    pub base_paths: Vec<PathBuf>,

    /// Plugin directory name looked up under every base path; repeatable
    #[arg(long = "directory", short = 'd', global = true)]
    pub directories: Vec<String>,

    /// Stop at the first failing phase instead of running degraded
    #[arg(long, global = true)]
    pub abort_on_error: bool,
}

impl ConfigArgs {
    /// Apply the flags on top of `config`
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if !self.base_paths.is_empty() {
            config.base_paths = self.base_paths.clone();
        }
        if !self.directories.is_empty() {
            config.directories = self.directories.clone();
        }
        if self.abort_on_error {
            config.failure_policy = FailurePolicy::Abort;
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the full pipeline, then stop every plugin
    Run {
        /// Keep running until Ctrl-C before stopping
        #[arg(long)]
        wait: bool,
    },
    /// Discover, register, resolve and prioritize, then list plugins
    Plugins,
    /// Initialize plugins and list the components they registered
    Components,
}
