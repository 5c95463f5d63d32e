//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

use heartlink_types::DecoderMode;

/// Heart Rate Measurement payload decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecoderArg {
    /// Always read a 16-bit value at offset 1
    Literal,
    /// Honor the flags byte
    Standard,
}

impl From<DecoderArg> for DecoderMode {
    fn from(arg: DecoderArg) -> Self {
        match arg {
            DecoderArg::Literal => DecoderMode::Literal,
            DecoderArg::Standard => DecoderMode::Standard,
        }
    }
}

#[derive(Parser)]
#[command(name = "heartlink")]
#[command(author, version, about = "Client for BLE heart-rate monitors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments for the watch command
#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Advertised name of the peripheral to connect to
    #[arg(short, long, env = "HEARTLINK_TARGET")]
    pub target: Option<String>,

    /// Payload decoder
    #[arg(short, long, value_enum)]
    pub decoder: Option<DecoderArg>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after this many readings
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: Option<u32>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for the target peripheral and stream its heart rate
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from([
            "heartlink",
            "watch",
            "--target",
            "Polar H10",
            "--decoder",
            "standard",
            "-n",
            "5",
            "--json",
        ])
        .unwrap();

        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.target.as_deref(), Some("Polar H10"));
        assert_eq!(args.decoder, Some(DecoderArg::Standard));
        assert_eq!(args.count, Some(5));
        assert!(args.json);
        assert!(args.timeout.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["heartlink", "config", "path", "--quiet"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn test_invalid_decoder_rejected() {
        assert!(Cli::try_parse_from(["heartlink", "watch", "--decoder", "fancy"]).is_err());
    }

    #[test]
    fn test_zero_count_rejected() {
        assert!(Cli::try_parse_from(["heartlink", "watch", "-n", "0"]).is_err());
        assert!(Cli::try_parse_from(["heartlink", "watch", "--timeout", "0"]).is_err());

        let cli = Cli::try_parse_from(["heartlink", "watch", "-n", "1"]).unwrap();
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.count, Some(1));
    }

    #[test]
    fn test_decoder_arg_conversion() {
        assert_eq!(DecoderMode::from(DecoderArg::Literal), DecoderMode::Literal);
        assert_eq!(
            DecoderMode::from(DecoderArg::Standard),
            DecoderMode::Standard
        );
    }
}
