use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use csv::Writer;
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};

use super::map::{Config, ThreadConfig};
use crate::bench::RunReport;
use crate::error::Result;

/// Parsed command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub config: Config,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub list: bool,
    pub dry_run: bool,
}

pub fn command() -> Command {
    Command::new("hash-map-bench")
        .about("Mixed insert/remove/get workload on concurrent hash maps")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("JSON configuration file. Command line flags take precedence."),
        )
        .arg(
            Arg::new("variant")
                .short('v')
                .long("variant")
                .action(ArgAction::Append)
                .help("Variant(s) to run, e.g. harris_michael_hash_map/epoch_based"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .value_parser(value_parser!(u32))
                .help("Number of mixed threads. Replaces the configured thread groups."),
        )
        .arg(
            Arg::new("range")
                .short('r')
                .value_parser(value_parser!(u64))
                .help("Key range: [0..RANGE)"),
        )
        .arg(
            Arg::new("prefill")
                .short('p')
                .value_parser(value_parser!(u64))
                .help("Entries inserted before measuring. Defaults to 10% of the key range."),
        )
        .arg(
            Arg::new("insert ratio")
                .long("insert-ratio")
                .value_parser(value_parser!(f64))
                .help("Proportion of insert operations in every thread group"),
        )
        .arg(
            Arg::new("remove ratio")
                .long("remove-ratio")
                .value_parser(value_parser!(f64))
                .help("Proportion of remove operations in every thread group"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .value_parser(value_parser!(u64))
                .help("Time interval in seconds to run the benchmark"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed of the per-thread random streams"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .value_parser(value_parser!(PathBuf))
                .help("Output CSV filename. Appends the data if the file already exists."),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .value_parser(value_parser!(PathBuf))
                .help("Write the full reports of all variants as JSON"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .action(ArgAction::SetTrue)
                .help("List the available variants and exit"),
        )
        .arg(
            Arg::new("dry run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Check whether the arguments are parsable, without running a benchmark"),
        )
}

pub fn parse(m: &ArgMatches) -> Result<Options> {
    let mut config = match m.get_one::<PathBuf>("config") {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    if let Some(variants) = m.get_many::<String>("variant") {
        config.variants = variants.cloned().collect();
    }
    if let Some(&threads) = m.get_one::<u32>("threads") {
        let base = config.execution.threads.first().cloned().unwrap_or_default();
        config.execution.threads = vec![ThreadConfig {
            count: threads,
            ..base
        }];
    }
    if let Some(&range) = m.get_one::<u64>("range") {
        config.benchmark.key_range = range;
    }
    if let Some(&prefill) = m.get_one::<u64>("prefill") {
        config.benchmark.prefill = Some(prefill);
    }
    if let Some(&ratio) = m.get_one::<f64>("insert ratio") {
        config.execution.threads.iter_mut().for_each(|t| t.insert_ratio = ratio);
    }
    if let Some(&ratio) = m.get_one::<f64>("remove ratio") {
        config.execution.threads.iter_mut().for_each(|t| t.remove_ratio = ratio);
    }
    if let Some(&interval) = m.get_one::<u64>("interval") {
        config.execution.runtime_ms = interval.saturating_mul(1000);
    }
    if let Some(&seed) = m.get_one::<u64>("seed") {
        config.benchmark.seed = Some(seed);
    }

    Ok(Options {
        config,
        output: m.get_one::<PathBuf>("output").cloned(),
        report: m.get_one::<PathBuf>("report").cloned(),
        list: m.get_flag("list"),
        dry_run: m.get_flag("dry run"),
    })
}

/// Appends one CSV row per finished variant.
pub struct BenchWriter {
    output: Option<Writer<File>>,
}

const HEADER: [&str; 10] = [
    "variant",
    "threads",
    "key_range",
    "prefill",
    "runtime",
    "insert",
    "remove",
    "get",
    "operations",
    "throughput",
];

impl BenchWriter {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let output = match path {
            Some(path) => Some(Self::open(path)?),
            None => None,
        };
        Ok(Self { output })
    }

    fn open(path: &Path) -> Result<Writer<File>> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        match OpenOptions::new().read(true).append(true).open(path) {
            Ok(f) => Ok(Writer::from_writer(f)),
            Err(_) => {
                let f = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                let mut output = Writer::from_writer(f);
                output.write_record(HEADER)?;
                output.flush()?;
                Ok(output)
            }
        }
    }

    pub fn write_record(&mut self, config: &Config, report: &RunReport) -> Result<()> {
        if let Some(output) = &mut self.output {
            output.write_record(&[
                report.variant.name(),
                report.threads.len().to_string(),
                config.benchmark.key_range.to_string(),
                config.benchmark.prefill().to_string(),
                format!("{:.3}", report.runtime),
                report.totals.insert.to_string(),
                report.totals.remove.to_string(),
                report.totals.get.to_string(),
                report.totals.operations.to_string(),
                report.throughput.to_string(),
            ])?;
            output.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{validate_config, MixedData, ThreadReport};
    use crate::ds_impl::Descriptor;
    use crate::error::Error;
    use std::time::Duration;

    fn options(args: &[&str]) -> Options {
        let m = command()
            .try_get_matches_from(std::iter::once("hash-map-bench").chain(args.iter().copied()))
            .unwrap();
        parse(&m).unwrap()
    }

    #[test]
    fn defaults() {
        let opts = options(&[]);
        assert_eq!(opts.config, Config::default());
        assert!(!opts.list && !opts.dry_run);
        assert!(opts.output.is_none());
    }

    #[test]
    fn flags_override() {
        let opts = options(&[
            "-t", "4", "-r", "1000", "-p", "100", "-i", "2", "--insert-ratio", "0.1",
            "-v", "a/b", "-v", "c/d", "--seed", "9", "--dry-run",
        ]);
        let config = &opts.config;
        assert_eq!(config.variants, vec!["a/b", "c/d"]);
        assert_eq!(config.benchmark.key_range, 1000);
        assert_eq!(config.benchmark.prefill(), 100);
        assert_eq!(config.benchmark.seed, Some(9));
        assert_eq!(config.execution.runtime_ms, 2000);
        assert_eq!(config.execution.threads.len(), 1);
        assert_eq!(config.execution.threads[0].count, 4);
        assert_eq!(config.execution.threads[0].insert_ratio, 0.1);
        assert_eq!(config.execution.threads[0].remove_ratio, 0.2);
        assert!(opts.dry_run);
    }

    #[test]
    fn dry_run_still_checks_thread_groups() {
        let opts = options(&["--dry-run", "--insert-ratio", "0.9", "--remove-ratio", "0.9"]);
        assert!(opts.dry_run);
        let config = &opts.config;
        assert!(matches!(
            validate_config(&config.benchmark, &config.execution),
            Err(Error::Config { param: "insert_ratio + remove_ratio", .. })
        ));

        let opts = options(&["--dry-run", "-t", "8", "--insert-ratio", "0.5"]);
        assert!(validate_config(&opts.config.benchmark, &opts.config.execution).is_ok());
    }

    #[test]
    fn config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "benchmark": { "key_range": 64 }, "execution": { "threads": [ { "count": 2 }, { "count": 3 } ] } }"#,
        )
        .unwrap();
        let opts = options(&["-c", path.to_str().unwrap(), "--remove-ratio", "0.5"]);
        assert_eq!(opts.config.benchmark.key_range, 64);
        assert_eq!(opts.config.execution.thread_count(), 5);
        assert!(opts.config.execution.threads.iter().all(|t| t.remove_ratio == 0.5));
    }

    #[test]
    fn csv_appends_below_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("bench.csv");
        let report = RunReport::aggregate(
            Descriptor::new("map").with_reclaimer(Descriptor::new("ebr")),
            vec![ThreadReport::new(
                0,
                MixedData {
                    runtime: 1.0,
                    insert: 1,
                    remove: 2,
                    get: 3,
                },
            )],
            Duration::from_secs(1),
        );
        for _ in 0..2 {
            let mut writer = BenchWriter::new(Some(&path)).unwrap();
            writer.write_record(&Config::default(), &report).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "map/ebr,1,2048,204,1000.000,1,2,3,6,6");
        assert_eq!(lines[1], lines[2]);
    }
}
