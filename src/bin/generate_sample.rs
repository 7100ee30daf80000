use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Builder, Int64Array, ListArray, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use sleep_windows::timeline::WINDOW_SECONDS;
use sleep_windows::{Config, FrequencyTable, SleepStage};

/// Features written to the sample store and their sampling rates (Hz).
const FEATURES: [(&str, u32); 3] = [("eeg", 50), ("pulse", 10), ("x", 10)];

/// Windows recorded for each sample subject.
const SUBJECTS: [(i64, usize); 3] = [(1, 40), (2, 55), (7, 30)];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// A plausible hypnogram: wake, then repeating N1 → N2 → N3 → N2 → REM cycles.
fn stage_for(window: usize) -> SleepStage {
    const CYCLE: [SleepStage; 10] = [
        SleepStage::N1,
        SleepStage::N2,
        SleepStage::N2,
        SleepStage::N3,
        SleepStage::N3,
        SleepStage::N3,
        SleepStage::N2,
        SleepStage::Rem,
        SleepStage::Rem,
        SleepStage::Wake,
    ];
    if window < 3 {
        SleepStage::Wake
    } else {
        CYCLE[(window - 3) % CYCLE.len()]
    }
}

/// Dominant oscillation (Hz) and amplitude of each feature in a given stage.
fn rhythm(feature: &str, stage: SleepStage) -> (f64, f64) {
    match (feature, stage) {
        ("eeg", SleepStage::Wake) => (10.0, 20.0),
        ("eeg", SleepStage::N1) => (6.0, 30.0),
        ("eeg", SleepStage::N2) => (13.0, 40.0),
        ("eeg", SleepStage::N3) => (1.5, 80.0),
        ("eeg", SleepStage::Rem) => (7.0, 25.0),
        ("pulse", SleepStage::Wake) => (1.2, 1.0),
        ("pulse", _) => (1.0, 0.8),
        (_, SleepStage::Wake) => (0.3, 0.5),
        _ => (0.05, 0.05),
    }
}

fn generate_window(
    feature: &str,
    hz: u32,
    window: usize,
    stage: SleepStage,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    let (freq, amplitude) = rhythm(feature, stage);
    let n = hz as usize * WINDOW_SECONDS as usize;
    (0..n)
        .map(|i| {
            let t = window as f64 * WINDOW_SECONDS as f64 + i as f64 / hz as f64;
            amplitude * (2.0 * std::f64::consts::PI * freq * t).sin() + rng.gauss(0.0, amplitude * 0.1)
        })
        .collect()
}

fn list_column(rows: &[Vec<f64>]) -> ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let mut all_index: Vec<i64> = Vec::new();
    let mut all_absolute: Vec<i64> = Vec::new();
    let mut all_window: Vec<i64> = Vec::new();
    let mut all_stage: Vec<SleepStage> = Vec::new();
    let mut blocks: BTreeMap<&str, Vec<Vec<f64>>> = BTreeMap::new();

    let mut row_id: i64 = 0;
    for &(subject, n_windows) in &SUBJECTS {
        for window in 0..n_windows {
            let stage = stage_for(window);
            for &(feature, hz) in &FEATURES {
                blocks
                    .entry(feature)
                    .or_default()
                    .push(generate_window(feature, hz, window, stage, &mut rng));
            }
            all_index.push(subject);
            all_absolute.push(row_id);
            all_window.push(window as i64);
            all_stage.push(stage);
            row_id += 1;
        }
    }

    // Build Arrow arrays
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut fields = vec![
        Field::new("index", DataType::Int64, false),
        Field::new("index_absolute", DataType::Int64, false),
        Field::new("index_window", DataType::Int64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(all_index)),
        Arc::new(Int64Array::from(all_absolute.clone())),
        Arc::new(Int64Array::from(all_window)),
    ];
    for (feature, rows) in &blocks {
        fields.push(Field::new(*feature, list_type.clone(), false));
        columns.push(Arc::new(list_column(rows)));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    // Write Parquet
    let store_path = Path::new("sample_store.parquet");
    let file = std::fs::File::create(store_path).context("creating store file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;

    // Labels, keyed by absolute offset
    let labels_path = Path::new("sample_labels.csv");
    let mut wtr = csv::Writer::from_path(labels_path).context("creating label file")?;
    wtr.write_record(["index", "sleep_stage"])?;
    for (offset, stage) in all_absolute.iter().zip(&all_stage) {
        wtr.write_record([offset.to_string(), i64::from(*stage).to_string()])?;
    }
    wtr.flush()?;

    let mut frequencies = FrequencyTable::new();
    for &(feature, hz) in &FEATURES {
        frequencies.insert(feature, hz);
    }
    let config = Config {
        frequencies,
        store: Some(store_path.to_path_buf()),
        labels: Some(labels_path.to_path_buf()),
    };
    config.save(Path::new("sample_config.json"))?;

    println!(
        "Wrote {row_id} windows for {} subjects ({} features) to {}",
        SUBJECTS.len(),
        FEATURES.len(),
        store_path.display()
    );
    for (feature, hz) in config.frequencies.iter() {
        println!("  {feature}: {hz} Hz");
    }
    Ok(())
}
