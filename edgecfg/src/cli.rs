use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use edgecfg::model::Service;
use edgecfg::schema::SchemaVersion;

#[derive(Parser, Debug)]
#[command(name = "edgecfg")]
#[command(about = "Export and import edge gateway NAT, firewall and routing configuration")]
pub struct Cli {
    /// Log debug detail (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Fetch one edge gateway's configuration and write it as CSV records.
    Export(ExportArgs),
    /// Read exported records and submit them to a target edge gateway.
    Import(ImportArgs),
}

/// Control-plane connection settings shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// API host, with optional scheme and port.
    #[arg(long)]
    pub host: Option<String>,
    /// Organization the user logs into.
    #[arg(long)]
    pub org: Option<String>,
    #[arg(long, env = "EDGECFG_USER")]
    pub user: Option<String>,
    #[arg(long, env = "EDGECFG_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Accept self-signed certificates.
    #[arg(long)]
    pub insecure: bool,
    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
    /// Directory holding `<schema>.toml` API profiles that replace the built-in ones.
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Name of the edge gateway to export.
    #[arg(long)]
    pub edge: String,
    #[arg(long, value_enum, default_value_t = SchemaArg::V1)]
    pub schema: SchemaArg,
    /// Directory the record files are written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Read the configuration document from a file instead of the API.
    #[arg(long)]
    pub from_file: Option<PathBuf>,
    /// Also save the fetched configuration document.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Edge gateway the records were exported from.
    #[arg(long)]
    pub source_edge: String,
    /// Edge gateway to configure.
    #[arg(long)]
    pub target_edge: String,
    #[arg(long, value_enum, default_value_t = SchemaArg::V1)]
    pub schema: SchemaArg,
    /// Directory holding the exported record files.
    #[arg(long, default_value = ".")]
    pub input_dir: PathBuf,
    /// Services to submit (default: all).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub only: Vec<ServiceArg>,
    /// Write request bodies into this directory instead of submitting.
    #[arg(long)]
    pub dry_run: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SchemaArg {
    V1,
    V2,
}

impl From<SchemaArg> for SchemaVersion {
    fn from(value: SchemaArg) -> Self {
        match value {
            SchemaArg::V1 => SchemaVersion::V1,
            SchemaArg::V2 => SchemaVersion::V2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    Nat,
    Firewall,
    Routing,
}

impl From<ServiceArg> for Service {
    fn from(value: ServiceArg) -> Self {
        match value {
            ServiceArg::Nat => Service::Nat,
            ServiceArg::Firewall => Service::Firewall,
            ServiceArg::Routing => Service::Routing,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
