//! apicache - fetch a URL through the read-through disk cache
//!
//! Writes the response body to stdout and logs to stderr.

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use apicache::cli::{parse_url_arg, Cli};
use apicache::ApiCache;

/// Initializes the tracing subscriber
///
/// `--debug` forces DEBUG; otherwise `RUST_LOG` is honored, defaulting to INFO.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    // Validate only; the key is derived from the URL exactly as given
    parse_url_arg(&cli.url)?;
    let cache = ApiCache::new(cli.cache_config()?)?;

    let body = cache.get_request(&cli.url, &cli.name).await?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
