use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "imagegate")]
#[command(about = "Asynchronous image-processing job-orchestration service", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file; falls back to env vars and defaults.
    #[arg(long)]
    pub config: Option<String>,
}
