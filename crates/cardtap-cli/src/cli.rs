//! Command line definition.

use cardtap_reader::DetectionPriority;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cardtap")]
#[command(about = "Read MIFARE Classic and EMV contactless cards")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "CARDTAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for readings
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Override the configured detection priority
    #[arg(long, global = true, value_enum)]
    pub priority: Option<PriorityArg>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read every tag presented to a PC/SC reader until Ctrl-C
    Watch {
        /// Reader name (first reader when omitted)
        #[arg(short, long)]
        reader: Option<String>,
    },

    /// Read a simulated tag and print the result
    Simulate {
        #[arg(value_enum)]
        scenario: Scenario,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable status lines
    Text,
    /// One JSON object per reading
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    MemoryCardFirst,
    ApplicationProtocolFirst,
}

impl From<PriorityArg> for DetectionPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::MemoryCardFirst => Self::MemoryCardFirst,
            PriorityArg::ApplicationProtocolFirst => Self::ApplicationProtocolFirst,
        }
    }
}

/// Simulated tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// MIFARE Classic 1K with text in a few blocks
    Memory,
    /// MIFARE Classic 1K with two sectors under a non-default key
    Locked,
    /// MIFARE Classic 1K that leaves the field mid-read
    TornMemory,
    /// Visa card answering the full EMV read sequence
    Emv,
    /// ISO-DEP tag with no payment application
    BadEmv,
    /// EMV card that leaves the field mid-read
    LostEmv,
    /// Tag exposing only NFC-A
    Unsupported,
    /// Tag exposing both MIFARE Classic and ISO-DEP
    Dual,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_with_globals() {
        let cli = Cli::try_parse_from([
            "cardtap",
            "simulate",
            "bad-emv",
            "-vv",
            "--format",
            "json",
            "--priority",
            "application-protocol-first",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.priority, Some(PriorityArg::ApplicationProtocolFirst));
        assert!(matches!(
            cli.command,
            Command::Simulate {
                scenario: Scenario::BadEmv
            }
        ));
    }
}
