use clap::{Parser, Subcommand};

/// MediaURL - discover and call media addons
#[derive(Parser, Debug)]
#[command(name = "mediaurl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log per-endpoint probe failures
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use legacy `.watched` routes for old addons (default: MEDIAURL_LEGACY_ROUTES)
    #[arg(long, global = true, value_name = "BOOL", value_parser = clap::builder::BoolishValueParser::new())]
    pub legacy_routes: Option<bool>,

    /// Per-probe timeout in milliseconds (default: from env or 5000)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the candidate URLs probed for a piece of user input
    Candidates {
        /// Host, host:port or URL as typed by the user
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Find the addons reachable from user input (servers are expanded)
    Discover {
        /// Host, host:port or URL as typed by the user
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Discover an addon and call one of its actions
    Call {
        /// Addon URL
        #[arg(value_name = "URL")]
        url: String,

        /// Action name (addon, catalog, item, source, subtitle, ...)
        #[arg(value_name = "ACTION")]
        action: String,

        /// Input JSON string. Use "-" to read from stdin
        #[arg(long, value_name = "JSON")]
        input: Option<String>,

        /// Request signature (default: from MEDIAURL_SIGNATURE)
        #[arg(long, value_name = "SIG")]
        signature: Option<String>,
    },
}
