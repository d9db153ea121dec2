//! CLI argument parsing for the shuttle-planner binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shuttle-planner", about = "Shuttle route planning worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Print a signed access token for local testing
    IssueToken {
        /// User id (subject)
        #[arg(long)]
        user: uuid::Uuid,
        /// Organization the token is scoped to
        #[arg(long)]
        org: uuid::Uuid,
        #[arg(long, default_value = "admin")]
        role: String,
        /// Granted permissions; repeat the flag. Defaults to "*"
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
}
