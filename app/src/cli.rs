use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamtrack")]
#[command(author, version, about = "List the tracks of a DASH or HLS manifest")]
pub struct Cli {
    /// Manifest URL or path to a manifest file
    #[arg(required = true)]
    pub source: String,

    /// Manifest format; detected from the content when omitted
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Language for streams that do not state one
    #[arg(short, long, default_value = "en")]
    pub lang: String,

    /// Drop the trailing segment margin before building tracks
    #[arg(long)]
    pub trim: bool,

    /// Base URL for relative references when SOURCE is a file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
