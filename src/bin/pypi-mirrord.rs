use clap::Parser;
use pypi_mirror::{ServiceOptions, run_service};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// pip usage:
///   pip install --index-url http://HOST:8000/simple/ --trusted-host HOST PROJECT
#[derive(Parser, Debug)]
#[command(name = "pypi-mirrord")]
#[command(about = "PyPI mirror server (PEP 503 simple repository)", long_about = None)]
#[command(version = VERSION)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port to serve on (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Mirror root directory (overrides configuration)
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    run_service(ServiceOptions {
        config_path: args.config,
        port: args.port,
        root: args.root,
    })
    .await
}
