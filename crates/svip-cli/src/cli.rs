use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use svip_model::OutputVersion;

#[derive(Parser)]
#[command(
    name = "svip",
    about = "Inspect and re-encode X Studio .svip projects",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the top-level records of a project stream
    Inspect(InspectArgs),
    /// Show the format version and a project summary
    Info(InfoArgs),
    /// Decode a project and encode it again, optionally under another version
    Convert(ConvertArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct InfoArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// auto, 7.0.0, 6.0.0 or compat; overrides the config file
    #[arg(long)]
    pub version: Option<OutputVersion>,
    /// TOML file with `version` and `[parse]` settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}
