use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

/// tinyNDN command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a packet and print it as hex
    Encode {
        #[clap(subcommand)]
        cmd: EncodeCommands,
    },

    /// Decode a hex packet and print its fields
    Decode {
        /// Packet bytes in hex
        hex: String,

        /// Print the fields as JSON
        #[clap(long)]
        json: bool,
    },

    /// Run the consumer/producer scenario on in-memory faces
    Demo,

    /// Run a forwarder on UDP faces
    Run {
        /// Node configuration file (TOML, JSON or YAML)
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Override the listen address
        #[clap(short, long)]
        listen: Option<String>,

        /// Stop after this many seconds
        #[clap(short, long)]
        duration: Option<u64>,
    },
}

#[derive(Subcommand)]
enum EncodeCommands {
    /// Encode an Interest
    Interest {
        /// Name to request (NDN URI format)
        name: String,

        /// Interest lifetime in milliseconds
        #[clap(short, long, default_value = "4000")]
        lifetime: u32,

        /// Fixed nonce (random by default)
        #[clap(short, long)]
        nonce: Option<u32>,

        /// Hop limit
        #[clap(long)]
        hop_limit: Option<u8>,

        /// Allow Data under a longer name
        #[clap(long)]
        can_be_prefix: bool,

        /// Require fresh Data
        #[clap(long)]
        must_be_fresh: bool,
    },

    /// Encode a Data packet
    Data {
        /// Name to publish under (NDN URI format)
        name: String,

        /// Content to publish (string)
        content: String,

        /// Freshness period in milliseconds
        #[clap(short, long)]
        freshness: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    match cli.command {
        Commands::Encode { cmd } => commands::encode::handle_command(cmd)?,
        Commands::Decode { hex, json } => commands::decode::decode_packet(&hex, json)?,
        Commands::Demo => commands::demo::run_demo()?,
        Commands::Run {
            config,
            listen,
            duration,
        } => commands::run::run_node(config, listen, duration).await?,
    }

    Ok(())
}
