use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sleep_windows::console::{print_bis, print_ter};
use sleep_windows::data::loader::{load_labels, load_store};
use sleep_windows::data::model::WindowStore;
use sleep_windows::{accessor, AccessError, Boundaries, Config, FeatureSignals};

/// Inspect subjects and signals in a windowed sleep-recording store.
#[derive(Parser, Debug)]
#[command(name = "sleep-windows", version, about)]
struct Cli {
    /// JSON config with feature frequencies and default paths
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store file (.parquet, .json, .csv, or .h5 with the `hdf5` feature)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Sleep-stage label CSV (`index,sleep_stage`)
    #[arg(short, long, global = true)]
    labels: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List distinct subject ids
    Subjects,
    /// List feature columns
    Features,
    /// Print the absolute row range of a subject
    Boundaries {
        subject: i64,
        /// Print `start..=end` instead of `start..end`
        #[arg(long)]
        inclusive: bool,
    },
    /// Print a subject's feature as CSV
    Signals {
        subject: i64,
        feature: String,
        /// Stitch windows into one series indexed by offset (ns)
        #[arg(long)]
        timeseries: bool,
    },
    /// Print a subject's sleep stages as CSV
    Stages { subject: i64 },
    /// Check every subject, optionally rebuilding one feature's timeline
    Scan {
        #[arg(long)]
        feature: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_overrides(cli.store.clone(), cli.labels.clone());

    let store_path = config
        .store
        .clone()
        .context("no store given (use --store or set \"store\" in the config)")?;
    let store = open_store(&store_path)?;

    match cli.command {
        Command::Subjects => {
            for sid in accessor::get_subject_ids(store.as_ref())? {
                println!("{sid}");
            }
        }
        Command::Features => {
            for name in store.feature_names() {
                println!("{name}");
            }
        }
        Command::Boundaries { subject, inclusive } => {
            match accessor::get_subject_boundaries(store.as_ref(), subject, !inclusive)? {
                Boundaries::Slice(r) => println!("{}..{}", r.start, r.end),
                Boundaries::Inclusive(r) => println!("{}..={}", r.start(), r.end()),
            }
        }
        Command::Signals {
            subject,
            feature,
            timeseries,
        } => {
            let signals = accessor::get_subject_feature_signals(
                store.as_ref(),
                &config.frequencies,
                subject,
                &feature,
                timeseries,
            )?;
            write_signals(&signals)?;
        }
        Command::Stages { subject } => {
            let labels_path = config
                .labels
                .as_deref()
                .context("no labels given (use --labels or set \"labels\" in the config)")?;
            let labels = load_labels(labels_path)?;
            let stages = accessor::get_subject_sleep_stage(subject, store.as_ref(), &labels)?;

            let mut wtr = csv::Writer::from_writer(io::stdout().lock());
            wtr.write_record(["index", "sleep_stage"])?;
            for (offset, stage) in stages {
                wtr.write_record([offset.to_string(), i64::from(stage).to_string()])?;
            }
            wtr.flush()?;
        }
        Command::Scan { feature } => scan(store.as_ref(), &config, feature.as_deref())?,
    }

    Ok(())
}

fn open_store(path: &Path) -> Result<Box<dyn WindowStore>> {
    #[cfg(feature = "hdf5")]
    {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if matches!(ext.as_str(), "h5" | "hdf5") {
            let store = sleep_windows::data::hdf5::Hdf5Store::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            return Ok(Box::new(store));
        }
    }

    let store = load_store(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(Box::new(store))
}

fn write_signals(signals: &FeatureSignals) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(io::stdout().lock());

    match signals {
        FeatureSignals::Blocks(blocks) => {
            for (window, block) in blocks.iter().enumerate() {
                let mut record = vec![window.to_string()];
                record.extend(block.iter().map(|v| v.to_string()));
                wtr.write_record(&record)?;
            }
        }
        FeatureSignals::Series(series) => {
            wtr.write_record(["offset_ns", "value"])?;
            for (offset, value) in series.iter() {
                wtr.write_record([offset.as_nanos().to_string(), value.to_string()])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Walk all subjects, redrawing one progress line, and report failures at
/// the end.
fn scan(store: &dyn WindowStore, config: &Config, feature: Option<&str>) -> Result<()> {
    let subjects = accessor::get_subject_ids(store)?;
    let total = subjects.len();
    let mut failures: Vec<(i64, AccessError)> = Vec::new();

    for (i, sid) in subjects.into_iter().enumerate() {
        print_bis(&format!("subject {}/{total} (id {sid})", i + 1));

        let outcome = match feature {
            Some(name) => {
                accessor::get_subject_feature_timeseries(store, &config.frequencies, sid, name)
                    .map(|_| ())
            }
            None => accessor::get_subject_boundaries(store, sid, true).map(|_| ()),
        };
        if let Err(err) = outcome {
            log::warn!("subject {sid}: {err}");
            failures.push((sid, err));
        }
    }

    print_ter(&format!(
        "scanned {total} subjects, {} failed",
        failures.len()
    ));
    for (sid, err) in &failures {
        println!("  {sid}: {err}");
    }
    Ok(())
}
