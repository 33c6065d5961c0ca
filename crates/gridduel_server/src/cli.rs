//! Command-line interface for gridduel.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gridduel - two-player grid game server over WebSockets
#[derive(Parser, Debug)]
#[command(name = "gridduel")]
#[command(about = "Shared two-player N-in-a-row game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Board edge length
        #[arg(long)]
        board_size: Option<usize>,

        /// Marks in a line needed to win
        #[arg(long)]
        run_length: Option<usize>,

        /// Delay before a finished round is reset, in milliseconds
        #[arg(long)]
        reset_delay_ms: Option<u64>,

        /// Interval between liveness pings, in milliseconds
        #[arg(long)]
        ping_interval_ms: Option<u64>,

        /// Unanswered pings tolerated before a connection is dropped
        #[arg(long)]
        max_missed_pongs: Option<u32>,

        /// Refuse a connection whose client id is already playing
        #[arg(long)]
        reject_duplicate_clients: Option<bool>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_parse() {
        let cli = Cli::parse_from([
            "gridduel",
            "serve",
            "--port",
            "9000",
            "--board-size",
            "5",
            "--run-length",
            "4",
        ]);
        let Command::Serve {
            port,
            board_size,
            run_length,
            host,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(port, Some(9000));
        assert_eq!(board_size, Some(5));
        assert_eq!(run_length, Some(4));
        assert_eq!(host, None);
    }

    #[test]
    fn test_liveness_flags_parse() {
        let cli = Cli::parse_from([
            "gridduel",
            "serve",
            "--ping-interval-ms",
            "250",
            "--max-missed-pongs",
            "3",
            "--reject-duplicate-clients",
            "false",
        ]);
        let Command::Serve {
            ping_interval_ms,
            max_missed_pongs,
            reject_duplicate_clients,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(ping_interval_ms, Some(250));
        assert_eq!(max_missed_pongs, Some(3));
        assert_eq!(reject_duplicate_clients, Some(false));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
