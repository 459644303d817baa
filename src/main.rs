use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smr_hash_map_bench::bench::{execute, report, validate_config, Registry, RunReport};
use smr_hash_map_bench::config::cli::{self, BenchWriter};
use smr_hash_map_bench::Result;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        #[global_allocator]
        static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "benchmark aborted");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let registry = Registry::with_defaults();
    let opts = cli::parse(&cli::command().get_matches())?;

    if opts.list {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = &opts.config;
    let names: Vec<String> = if config.variants.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        config.variants.clone()
    };
    // Resolve every variant and check every thread group before setting up
    // any map.
    validate_config(&config.benchmark, &config.execution)?;
    let builders = names
        .iter()
        .map(|name| registry.get(name))
        .collect::<Result<Vec<_>>>()?;

    if opts.dry_run {
        return Ok(());
    }

    let mut output = BenchWriter::new(opts.output.as_deref())?;
    let mut reports: Vec<RunReport> = Vec::with_capacity(builders.len());
    for builder in builders {
        let descriptor = builder.descriptor();
        println!("{}: {} threads", descriptor.name(), config.execution.thread_count());
        info!(variant = %descriptor, "setting up");

        let benchmark = builder.build(&config.benchmark)?;
        let report = execute(benchmark.as_ref(), &config.execution)?;
        // Tear down the map before the next variant is set up.
        drop(benchmark);

        println!("{report}");
        output.write_record(config, &report)?;
        reports.push(report);
    }

    if let Some(path) = &opts.report {
        report::write_json(path, &reports)?;
    }
    Ok(())
}
