//! CLI argument definitions.

use clap::Parser;

use crate::commands::Command;

/// Storefront API client for manual exploration.
#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(author, version = env!("STOREFRONT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// API base URL (overrides STOREFRONT_API_URL and the saved session)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "storefront",
            "get",
            "/products",
            "-vv",
            "--base-url",
            "http://localhost:8080",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8080"));
    }
}
