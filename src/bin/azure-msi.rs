//! CLI binary for the azure-msi crate.

use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

use azure_msi::{
    ImdsClient, InstanceApiVersion, ManagedIdentity, DEFAULT_BASE_URL, DEFAULT_RESOURCE,
};
use clap::{Args, Parser, Subcommand};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "azure-msi")]
#[command(
    author,
    version,
    about = "Fetch Azure VM instance metadata and managed identity tokens"
)]
struct Cli {
    /// Metadata service base URL
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds (no timeout if omitted)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Maximum response size in bytes to accept (fails if exceeded)
    #[arg(short, long, global = true)]
    max_size: Option<usize>,

    /// Log format written to stderr
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Log requests at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the VM's identity metadata as JSON
    Metadata {
        /// Instance metadata API version
        #[arg(long, default_value = "2019-08-15")]
        api_version: InstanceApiVersion,
    },

    /// Fetch a managed identity access token
    Token {
        /// Resource to request the token for
        #[arg(default_value = DEFAULT_RESOURCE)]
        resource: String,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: TokenFormat,
    },
}

#[derive(Args)]
#[group(multiple = false)]
struct IdentityArgs {
    /// Client id of a user-assigned identity
    #[arg(long)]
    client_id: Option<String>,

    /// Object id of a user-assigned identity
    #[arg(long)]
    object_id: Option<String>,

    /// ARM resource id of a user-assigned identity
    #[arg(long)]
    msi_res_id: Option<String>,
}

impl IdentityArgs {
    fn into_identity(self) -> ManagedIdentity {
        match (self.client_id, self.object_id, self.msi_res_id) {
            (Some(id), _, _) => ManagedIdentity::ClientId(id),
            (_, Some(id), _) => ManagedIdentity::ObjectId(id),
            (_, _, Some(id)) => ManagedIdentity::ResourceId(id),
            _ => ManagedIdentity::SystemAssigned,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TokenFormat {
    #[default]
    Json,
    Raw,
    Header,
}

impl std::str::FromStr for TokenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TokenFormat::Json),
            "raw" => Ok(TokenFormat::Raw),
            "header" => Ok(TokenFormat::Header),
            _ => Err(format!("unknown format: {}", s)),
        }
    }
}

/// Build a stderr logger; it is handed to the client rather than installed globally.
fn logger(format: LogFormat, verbose: bool) -> Dispatch {
    let default_level = if verbose { "azure_msi=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => Dispatch::new(builder.finish()),
        LogFormat::Json => Dispatch::new(builder.json().finish()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let client = ImdsClient::new(cli.timeout.map(Duration::from_secs), &cli.base_url)?
        .with_dispatch(logger(cli.log_format, cli.verbose));
    let client = match cli.max_size {
        Some(size) => client.with_max_size(size),
        None => client,
    };

    match cli.command {
        Commands::Metadata { api_version } => {
            let metadata = client.instance_metadata_for(api_version).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }

        Commands::Token {
            resource,
            identity,
            format,
        } => {
            let token = client
                .access_token_for(&resource, &identity.into_identity())
                .await?;
            match format {
                TokenFormat::Json => println!("{}", serde_json::to_string_pretty(&token)?),
                TokenFormat::Raw => println!("{}", token.access_token),
                TokenFormat::Header => println!("{}", token.authorization_header()),
            }
        }
    }
    Ok(())
}
