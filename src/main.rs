//! CLI entry point for `pingsweep`.
use std::process;

use anyhow::Context;
use log::debug;

use pingsweep::address::parse_network;
use pingsweep::input::{Config, Opts};
use pingsweep::report::{self, SweepMetadata};
use pingsweep::scanner::Sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);

    debug!("main() `opts` argument is {opts:?}");

    // Sweep-wide configuration errors abort before any probing with a
    // usage-style exit code; everything past this point is per-host data.
    if let Err(message) = opts.validate() {
        eprintln!("Error: {message}");
        process::exit(2);
    }

    let network = match parse_network(&opts.network) {
        Ok(network) => network,
        Err(error) => {
            eprintln!("Error: {error}");
            process::exit(2);
        }
    };

    let meta = SweepMetadata::capture(&opts.network, opts.timeout, opts.concurrency, opts.count);

    let sweeper = Sweeper::new(
        network,
        opts.concurrency,
        opts.timeout,
        opts.count,
        opts.only_online,
    );
    let results = sweeper.run().await;

    if let Some(path) = &opts.json {
        report::write_json(path, &meta, &results)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
    }
    if let Some(path) = &opts.csv {
        report::write_csv(path, &meta, &results)
            .with_context(|| format!("writing CSV report to {}", path.display()))?;
    }

    if !opts.quiet {
        report::print_summary(&opts.network, &results);
    }

    Ok(())
}
