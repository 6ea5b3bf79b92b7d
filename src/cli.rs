use clap::{Parser, Subcommand};

/// Workflow SLA tracking and approval analytics service
#[derive(Parser)]
#[command(name = "workflow-analytics", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides WFA_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect SLA policies
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List the built-in SLA policies
    List {
        /// Only show policies for this workflow type
        #[arg(long)]
        workflow_type: Option<String>,
    },
}
