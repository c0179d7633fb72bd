mod error;
mod parse;
mod record;
mod sampler;
mod util;

use crate::parse::{Args, exit_status, usage};
use crate::sampler::RevisionSampler;
use crate::util::print_hms;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::io;
use std::time::Instant;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --version goes to stdout with status 0, everything else is a usage error
            let _ = e.print();
            std::process::exit(exit_status(&e));
        }
    };
    if args.help {
        usage(Some("Help for this tool\n"));
    }

    init_logging(args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => usage(Some(&e.to_string())),
    };

    let sampler = RevisionSampler::new(&config.domain)?
        .with_delay(config.delay)
        .with_max_retry_passes(config.max_retry_passes)
        .with_dry_run(config.dry_run);

    let end_rev = match config.end_rev {
        Some(end_rev) => end_rev,
        None if config.dry_run => {
            println!("GET {}", sampler.max_revision_url());
            return Ok(());
        }
        None => match sampler.get_max_revision().await {
            Ok(max) => max,
            Err(e) => {
                error!(
                    "Could not resolve the maximum revision id for {}: {}",
                    config.domain, e
                );
                std::process::exit(1);
            }
        },
    };

    if config.verbose {
        eprintln!("running with configuration: {:?}, resolved endrev {}", config, end_rev);
    }

    let start = Instant::now();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = sampler
        .sample_range(config.start_rev, end_rev, &mut out)
        .await?;

    print_hms(&start);
    info!(
        "Printed {} revisions in {} retry passes ({} failed batches, {} abandoned ids)",
        summary.printed,
        summary.retry_passes,
        summary.failed_batches,
        summary.abandoned.len()
    );

    Ok(())
}
