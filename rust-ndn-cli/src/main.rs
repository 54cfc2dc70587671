use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// NDN consumer/producer command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Transport URI of the forwarder (unix://path or tcp://host:port);
    /// the NDN_CLIENT_TRANSPORT environment variable takes precedence
    #[clap(short, long, global = true)]
    transport: Option<String>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an Interest and print the Data it returns
    Interest {
        /// Name to request (NDN URI format)
        name: String,

        /// Interest lifetime in milliseconds
        #[clap(short, long, default_value = "4000")]
        lifetime: u64,

        /// Accept Data whose name extends the requested prefix
        #[clap(short, long)]
        prefix: bool,
    },

    /// Register a prefix and serve Data under it
    Publish {
        /// Name prefix to publish under (NDN URI format)
        name: String,

        /// Content to serve (string)
        content: String,

        /// Freshness period in milliseconds
        #[clap(short, long, default_value = "10000")]
        freshness: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    match cli.command {
        Commands::Interest {
            name,
            lifetime,
            prefix,
        } => {
            commands::interest::send_interest(&name, lifetime, prefix, cli.transport.as_deref())?;
        }
        Commands::Publish {
            name,
            content,
            freshness,
        } => {
            commands::publish::publish_data(&name, content, freshness, cli.transport.as_deref())?;
        }
    }

    Ok(())
}
