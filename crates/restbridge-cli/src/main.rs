//! CLI for `restbridge`, the REST-to-gRPC transcoding gateway.
//!
//! ```text
//! restbridge --config config.yaml
//! restbridge --config config.yaml --validate
//! ```

#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Parser;
use restbridge_cli::{App, AppConfig};

/// REST-to-gRPC transcoding gateway.
#[derive(Parser, Debug)]
#[command(name = "restbridge", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Load and validate configuration, then exit without binding a
    /// listener or dialing the backend.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tonic's TLS transport needs a process-wide crypto provider installed
    // before any TLS-backed channel is built; `ring` matches the feature
    // selected for the `rustls` dependency.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let args = Cli::parse();

    let config = AppConfig::load(&args.config)?;

    if args.validate {
        println!("configuration is valid");
        return Ok(());
    }

    restbridge_cli::logging::init(&config.logging);
    tracing::debug!(?args);

    let app = App::bootstrap(config).await?;
    app.run().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
