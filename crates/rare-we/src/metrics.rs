use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};

/// Per-cycle summary written to the cycle log and kept in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Zero-based cycle index.
    pub cycle: usize,
    /// Walkers after resampling.
    pub walkers: usize,
    /// Lowest occupied bin after resampling.
    pub bin_low: Option<usize>,
    /// Highest occupied bin after resampling.
    pub bin_high: Option<usize>,
    /// Number of occupied bins.
    pub occupied_bins: usize,
    /// Extreme progress coordinate reached by stepping, towards the first boundary.
    pub front: Option<f64>,
    /// Coordinates right after stepping, in population order.
    pub progress: Vec<f64>,
    /// Flux per boundary in this cycle.
    pub flux: Vec<f64>,
    /// Cumulative total flux including this cycle.
    pub cumulative_flux: f64,
    /// Split operations.
    pub splits: usize,
    /// Merge operations.
    pub merges: usize,
    /// Bins left below target.
    pub starved_bins: usize,
    /// Total weight after resampling.
    pub total_weight: f64,
}

impl CycleRecord {
    /// Flux of this cycle summed over boundaries.
    pub fn total_flux(&self) -> f64 {
        self.flux.iter().sum()
    }
}

type CsvSink = Writer<BufWriter<File>>;

/// Opens a CSV sink. Appending to an existing file skips the header;
/// otherwise the file is truncated and `header` written first.
fn open_csv(path: &Path, header: &[String], append: bool) -> Result<CsvSink, RareError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("log-mkdir", err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let resume = append && path.exists();
    let file = if resume {
        OpenOptions::new().append(true).open(path)
    } else {
        File::create(path)
    }
    .map_err(|err| {
        RareError::Serde(
            ErrorInfo::new("log-open", "failed to open CSV log")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(BufWriter::new(file));
    if !resume {
        writer
            .write_record(header)
            .map_err(|err| wrap_csv("log-write-header", path, err))?;
        writer
            .flush()
            .map_err(|err| wrap_csv("log-flush", path, err.into()))?;
    }
    Ok(writer)
}

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> RareError {
    RareError::Serde(
        ErrorInfo::new(code, "CSV log failure")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

/// Append-only CSV cycle log, flushed after every row.
#[derive(Debug)]
pub struct CycleLog {
    path: PathBuf,
    writer: CsvSink,
}

impl CycleLog {
    /// Opens the log. With `append` set and an existing file the header is not
    /// repeated; otherwise the file is truncated and a header written.
    pub fn open(path: &Path, boundaries: usize, append: bool) -> Result<Self, RareError> {
        let mut header: Vec<String> = ["cycle", "walkers", "bin_low", "bin_high", "occupied_bins", "front"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        header.extend((0..boundaries).map(|boundary| format!("flux_{boundary}")));
        header.extend(
            [
                "flux_total",
                "flux_cumulative",
                "splits",
                "merges",
                "starved_bins",
                "total_weight",
            ]
            .iter()
            .map(|name| name.to_string()),
        );
        Ok(Self {
            path: path.to_path_buf(),
            writer: open_csv(path, &header, append)?,
        })
    }

    /// Location of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row and flushes it.
    pub fn record(&mut self, record: &CycleRecord) -> Result<(), RareError> {
        self.writer
            .write_record(cycle_row(record))
            .map_err(|err| wrap_csv("cycle-log-write", &self.path, err))?;
        self.writer
            .flush()
            .map_err(|err| wrap_csv("cycle-log-flush", &self.path, err.into()))
    }
}

fn cycle_row(record: &CycleRecord) -> Vec<String> {
    let optional = |value: Option<usize>| value.map(|v| v.to_string()).unwrap_or_default();
    let mut fields = vec![
        record.cycle.to_string(),
        record.walkers.to_string(),
        optional(record.bin_low),
        optional(record.bin_high),
        record.occupied_bins.to_string(),
        record
            .front
            .map(|front| format!("{front:.6}"))
            .unwrap_or_default(),
    ];
    fields.extend(record.flux.iter().map(|flux| format!("{flux:.12e}")));
    fields.push(format!("{:.12e}", record.total_flux()));
    fields.push(format!("{:.12e}", record.cumulative_flux));
    fields.push(record.splits.to_string());
    fields.push(record.merges.to_string());
    fields.push(record.starved_bins.to_string());
    fields.push(format!("{:.15}", record.total_weight));
    fields
}

/// Per-walker progress history: one row per cycle, walkers in population order.
///
/// Rows read `stage,cycle,pc_0,pc_1,...`. A fresh run starts with a `seed`
/// row holding the seed state's coordinate; every cycle adds a `step` row.
/// Row lengths vary with the walker count.
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    writer: CsvSink,
}

impl ProgressLog {
    /// Opens the log with the same append rules as [`CycleLog::open`].
    pub fn open(path: &Path, append: bool) -> Result<Self, RareError> {
        let header = vec!["stage".to_string(), "cycle".to_string(), "progress".to_string()];
        Ok(Self {
            path: path.to_path_buf(),
            writer: open_csv(path, &header, append)?,
        })
    }

    /// Location of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the coordinate of the seed state.
    pub fn record_seed(&mut self, progress: f64) -> Result<(), RareError> {
        self.write("seed", 0, &[progress])
    }

    /// Writes the post-step coordinates of `record`.
    pub fn record(&mut self, record: &CycleRecord) -> Result<(), RareError> {
        self.write("step", record.cycle, &record.progress)
    }

    fn write(&mut self, stage: &str, cycle: usize, values: &[f64]) -> Result<(), RareError> {
        let mut row = vec![stage.to_string(), cycle.to_string()];
        row.extend(values.iter().map(|value| value.to_string()));
        self.writer
            .write_record(&row)
            .map_err(|err| wrap_csv("progress-log-write", &self.path, err))?;
        self.writer
            .flush()
            .map_err(|err| wrap_csv("progress-log-flush", &self.path, err.into()))
    }
}
