use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Snapshot, WindowSampler};
use rare_engine::format_float;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::UmbrellaConfig;
use crate::ledger::{WindowLedger, WindowRecord};
use crate::restraint::RestraintTemplate;

/// Outcome of one invocation of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmbrellaSummary {
    /// Windows completed by this invocation.
    pub windows: Vec<WindowRecord>,
    /// Center the next window would use.
    pub next_center: f64,
    /// True when the schedule stopped because `r_max` was reached.
    pub reached_r_max: bool,
}

/// Mean and population standard deviation.
pub fn mean_and_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Runs windows from `start` until the center reaches `r_max`.
///
/// Each window starts from the previous window's final restart and is
/// centered `std * r_fac` beyond the previous center. A ledger in the output
/// directory lets a later invocation pick up where this one stopped, in which
/// case `start` is ignored.
pub fn run_schedule<W>(
    config: &UmbrellaConfig,
    start: Snapshot,
    sampler: &W,
) -> Result<UmbrellaSummary, RareError>
where
    W: WindowSampler + ?Sized,
{
    config.validate()?;
    let template = RestraintTemplate::load(&config.restraint_template)?;
    fs::create_dir_all(&config.output_dir)
        .map_err(|err| io_error("output-mkdir", &config.output_dir, err))?;
    let ledger_path = WindowLedger::path_in(&config.output_dir);
    let mut ledger = WindowLedger::load_or_default(&ledger_path)?;

    let (mut center, mut start, mut index) = match ledger.last() {
        Some(last) => {
            restore_metadata(&config.metadata, &ledger)?;
            let next = last.center + last.std * config.r_fac;
            info!(window = last.index, next_center = next, "resuming umbrella schedule");
            (next, Snapshot::new(last.restart.clone()), last.index)
        }
        None => {
            let existing = existing_windows(&config.metadata)?;
            if existing > 0 {
                warn!(
                    metadata = %config.metadata.display(),
                    windows = existing,
                    "appending new windows to existing metadata file"
                );
            }
            (config.r_min, start, existing)
        }
    };

    let mut completed = Vec::new();
    while center < config.r_max {
        if config.max_windows.is_some_and(|max| completed.len() >= max) {
            info!(windows = completed.len(), "window limit reached");
            break;
        }
        index += 1;
        info!(
            window = index,
            center,
            force_constant = config.r_k,
            "starting umbrella window"
        );
        let restraint = template.render(center, config.r_k, config.flank, config.lower_limit)?;
        let output = sampler
            .sample_window(&start, &restraint, index)
            .map_err(|err| err.with_context("window", index.to_string()))?;

        let stem = format!("cycle_{index:03}");
        let trajectory = match &output.trajectory {
            Some(path) => Some(copy_artifact(path, &config.output_dir, &stem)?),
            None => None,
        };
        let restart = copy_artifact(output.final_state.path(), &config.output_dir, &stem)?;
        let dist_file = config.output_dir.join(format!("{stem}.dist"));
        write_distances(&dist_file, &output.samples, config.equilibration_frames)?;

        let (mean, std) = mean_and_std(&output.samples);
        info!(
            window = index,
            mean,
            std,
            frames = output.samples.len(),
            "umbrella window complete"
        );
        let record = WindowRecord {
            index,
            center,
            force_constant: config.r_k,
            mean,
            std,
            frames: output.samples.len(),
            dist_file: dist_file.clone(),
            trajectory,
            restart: restart.clone(),
        };
        ledger.windows.push(record.clone());
        ledger.store(&ledger_path)?;
        append_metadata(&config.metadata, &dist_file, center, config.r_k)?;
        completed.push(record);

        let advance = std * config.r_fac;
        if !advance.is_finite() || advance <= 0.0 {
            return Err(RareError::Config(
                ErrorInfo::new("stalled-schedule", "window spread gives no forward progress")
                    .with_context("window", index.to_string())
                    .with_context("std", std.to_string())
                    .with_hint("check the restraint force constant and the analysis output"),
            ));
        }
        center += advance;
        start = Snapshot::new(restart);
    }

    let reached_r_max = center >= config.r_max;
    if reached_r_max {
        info!(next_center = center, "r_max reached, schedule finished");
    }
    Ok(UmbrellaSummary {
        windows: completed,
        next_center: center,
        reached_r_max,
    })
}

fn existing_windows(metadata: &Path) -> Result<usize, RareError> {
    if !metadata.exists() {
        return Ok(0);
    }
    let contents =
        fs::read_to_string(metadata).map_err(|err| io_error("metadata-read", metadata, err))?;
    Ok(contents.lines().count())
}

/// Appends metadata lines for ledger windows the metadata file lacks.
///
/// The ledger is written before the metadata line, so an interrupted
/// invocation can leave its last window out of the metadata.
fn restore_metadata(metadata: &Path, ledger: &WindowLedger) -> Result<(), RareError> {
    let listed: HashSet<String> = if metadata.exists() {
        fs::read_to_string(metadata)
            .map_err(|err| io_error("metadata-read", metadata, err))?
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    } else {
        HashSet::new()
    };
    for window in &ledger.windows {
        if listed.contains(&window.dist_file.display().to_string()) {
            continue;
        }
        warn!(window = window.index, "restoring metadata line missing for a completed window");
        append_metadata(metadata, &window.dist_file, window.center, window.force_constant)?;
    }
    Ok(())
}

fn copy_artifact(source: &Path, output_dir: &Path, stem: &str) -> Result<PathBuf, RareError> {
    let name = match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    };
    let destination = output_dir.join(name);
    fs::copy(source, &destination).map_err(|err| {
        io_error("artifact-copy", &destination, err)
            .with_context("source", source.display().to_string())
    })?;
    Ok(destination)
}

fn write_distances(path: &Path, samples: &[f64], skip: usize) -> Result<(), RareError> {
    let mut body = String::new();
    for (frame, value) in samples.iter().enumerate().skip(skip) {
        body.push_str(&format!("{:4.1} {}\n", frame as f64, value));
    }
    fs::write(path, body).map_err(|err| io_error("dist-write", path, err))
}

fn append_metadata(
    metadata: &Path,
    dist_file: &Path,
    center: f64,
    force_constant: f64,
) -> Result<(), RareError> {
    // WHAM expects twice the force constant
    let line = format!(
        "{} {} {}\n",
        dist_file.display(),
        format_float(center),
        format_float(2.0 * force_constant)
    );
    if let Some(parent) = metadata.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| io_error("metadata-mkdir", parent, err))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(metadata)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .map_err(|err| io_error("metadata-write", metadata, err))
}

fn io_error(code: &str, path: &Path, err: io::Error) -> RareError {
    RareError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}
