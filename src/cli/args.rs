//! CLI argument definitions using clap derive

use crate::answers::AnswerFlags;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// lzc-dtl - docker-compose to LazyCat converter
///
/// Turns a compose project into a LazyCat application package (.lpk):
/// a manifest, an icon and the host files its volumes need.
#[derive(Parser, Debug)]
#[command(name = "lzc-dtl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LZC_DTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a compose project into an .lpk package
    Convert(Box<ConvertArgs>),

    /// Show or edit the global configuration
    Config(ConfigArgs),

    /// Inspect or clear the decisions cached for a project
    Cache(CacheArgs),

    /// Print shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the convert command
#[derive(Parser, Debug, Default)]
pub struct ConvertArgs {
    /// Compose file (prompted for among *.yml/*.yaml in the current directory)
    #[arg(short = 'f', long)]
    pub compose: Option<PathBuf>,

    /// Application icon
    #[arg(long)]
    pub icon: Option<PathBuf>,

    /// Directory the package is written to (defaults to the compose file's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Application name
    #[arg(long)]
    pub name: Option<String>,

    /// Package identifier, e.g. cloud.lazycat.app.demo
    #[arg(long)]
    pub package: Option<String>,

    /// Application version (semver)
    #[arg(long)]
    pub version: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub homepage: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    /// Subdomain the application is served on
    #[arg(long)]
    pub subdomain: Option<String>,

    /// Keep running in the background
    #[arg(long, value_name = "BOOL")]
    pub background_task: Option<bool>,

    /// One instance per user
    #[arg(long, value_name = "BOOL")]
    pub multi_instance: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub gpu_accel: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub kvm_accel: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub usb_accel: Option<bool>,

    /// Paths reachable without login (comma-separated)
    #[arg(long)]
    pub public_paths: Option<String>,

    /// MIME type the application opens (repeatable)
    #[arg(long = "mime")]
    pub mime: Vec<String>,

    /// File extension the application opens (repeatable)
    #[arg(long = "extension")]
    pub extensions: Vec<String>,

    /// URL opened for a file, e.g. /open?file=%u
    #[arg(long)]
    pub open_action: Option<String>,

    /// Routes as a JSON array instead of asking per published port
    #[arg(long)]
    pub routes: Option<String>,

    /// Never prompt; fail on anything not given by flags or the cache
    #[arg(long)]
    pub non_interactive: bool,

    /// Copy existing images to the registry instead of asking
    #[arg(long)]
    pub push: bool,

    /// Registry images are pushed to
    #[arg(long, env = "LZC_DTL_REGISTRY")]
    pub registry: Option<String>,

    /// Ignore cached image tags: pull, build and push again
    #[arg(long)]
    pub refresh_images: bool,
}

impl ConvertArgs {
    /// The application answers given on the command line
    pub fn answer_flags(&self) -> AnswerFlags {
        AnswerFlags {
            name: self.name.clone(),
            package: self.package.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            homepage: self.homepage.clone(),
            author: self.author.clone(),
            subdomain: self.subdomain.clone(),
            background_task: self.background_task,
            multi_instance: self.multi_instance,
            gpu_accel: self.gpu_accel,
            kvm_accel: self.kvm_accel,
            usb_accel: self.usb_accel,
            public_paths: self.public_paths.clone(),
            mime: self.mime.clone(),
            extensions: self.extensions.clone(),
            open_action: self.open_action.clone(),
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., registry, timeouts.build_secs)
        key: String,
        /// Value to set
        value: String,
    },

    /// Remove an optional value
    Unset {
        /// Configuration key (registry or platform)
        key: String,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Directory holding the compose file (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cached decisions
    Show,

    /// Print the cache file path
    Path,

    /// Delete the cache file
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_convert() {
        let cli = Cli::parse_from([
            "lzc-dtl",
            "convert",
            "-f",
            "docker-compose.yml",
            "--name",
            "Demo",
            "--background-task",
            "false",
            "--mime",
            "text/plain",
            "--mime",
            "text/markdown",
            "--non-interactive",
        ]);
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.compose, Some(PathBuf::from("docker-compose.yml")));
                assert_eq!(args.background_task, Some(false));
                assert!(args.non_interactive);

                let flags = args.answer_flags();
                assert_eq!(flags.name.as_deref(), Some("Demo"));
                assert_eq!(flags.mime, vec!["text/plain", "text/markdown"]);
                assert_eq!(flags.multi_instance, None);
            }
            _ => panic!("expected Convert command"),
        }
    }

    #[test]
    fn cli_rejects_non_boolean_flag() {
        assert!(Cli::try_parse_from(["lzc-dtl", "convert", "--multi-instance", "maybe"]).is_err());
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["lzc-dtl", "config", "set", "registry", "reg.example.com"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Set { key, value }),
            }) => {
                assert_eq!(key, "registry");
                assert_eq!(value, "reg.example.com");
            }
            _ => panic!("expected Config set"),
        }
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["lzc-dtl", "cache", "clear", "--yes", "--project", "app"]);
        match cli.command {
            Commands::Cache(args) => {
                assert!(matches!(args.action, CacheAction::Clear { yes: true }));
                assert_eq!(args.project, Some(PathBuf::from("app")));
            }
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from(["lzc-dtl", "-vv", "--log-format", "json", "config", "path"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_parses_completions() {
        let cli = Cli::parse_from(["lzc-dtl", "completions", "bash"]);
        assert!(matches!(cli.command, Commands::Completions { shell: Shell::Bash }));
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
