//! File-protocol tuning service client
//!
//! The tuning service and the trial exchange data through a trial directory
//! named by the `CROPTRAIN_TRIAL_DIR` environment variable:
//!
//! - `parameters.json`: written by the service before launching the trial;
//!   an envelope carrying the trial id and the hyperparameter mapping
//! - `metrics.jsonl`: appended by the trial; one JSON record per report
//!   with a monotonically increasing sequence number
//!
//! When the environment variable is unset the trainer runs detached from any
//! tuner and uses CLI-supplied hyperparameters instead.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::error::{CropError, Result};

use super::{TrialParams, TuningService};

/// Environment variable naming the trial directory
pub const TRIAL_DIR_ENV: &str = "CROPTRAIN_TRIAL_DIR";

/// Parameter file written by the tuning service
pub const PARAMETERS_FILE: &str = "parameters.json";

/// Metric report file appended by the trial
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Envelope around one trial's parameters, as written by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialEnvelope {
    /// Trial identifier assigned by the service
    pub parameter_id: u64,
    /// The hyperparameter configuration
    pub parameters: TrialParams,
}

/// Kind of a metric report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Intermediate,
    Final,
}

/// One metric report record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Trial identifier this report belongs to
    pub parameter_id: u64,
    /// Position of this report within the trial
    pub sequence: usize,
    /// Intermediate or final
    pub kind: MetricKind,
    /// The reported value
    pub value: f64,
}

/// Tuning service client over the trial-directory file protocol
#[derive(Debug)]
pub struct FileTuner {
    trial_dir: PathBuf,
    parameter_id: u64,
    sequence: usize,
    reported_final: bool,
}

impl FileTuner {
    /// Create a client for an explicit trial directory
    pub fn new<P: AsRef<Path>>(trial_dir: P) -> Self {
        Self {
            trial_dir: trial_dir.as_ref().to_path_buf(),
            parameter_id: 0,
            sequence: 0,
            reported_final: false,
        }
    }

    /// Create a client from the environment, or None when no tuner is attached
    pub fn from_env() -> Option<Self> {
        let dir = std::env::var_os(TRIAL_DIR_ENV)?;
        info!("Tuning service attached via {:?}", dir);
        Some(Self::new(PathBuf::from(dir)))
    }

    fn append(&self, record: &MetricRecord) -> Result<()> {
        let path = self.trial_dir.join(METRICS_FILE);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;

        debug!(
            "Reported {:?} metric #{}: {}",
            record.kind, record.sequence, record.value
        );
        Ok(())
    }

    /// Read back every report in a trial directory, in append order.
    ///
    /// This is the service-side half of the protocol; tests use it to verify
    /// what a trial reported.
    pub fn read_reports<P: AsRef<Path>>(trial_dir: P) -> Result<Vec<MetricRecord>> {
        let path = trial_dir.as_ref().join(METRICS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CropError::from))
            .collect()
    }
}

impl TuningService for FileTuner {
    fn next_parameters(&mut self) -> Result<TrialParams> {
        let path = self.trial_dir.join(PARAMETERS_FILE);
        if !path.exists() {
            return Err(CropError::Tuner(format!(
                "No parameter file at {:?}; was this trial launched by the tuning service?",
                path
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let envelope: TrialEnvelope = serde_json::from_str(&content)?;

        self.parameter_id = envelope.parameter_id;
        info!(
            "Trial {} parameters: {:?}",
            envelope.parameter_id, envelope.parameters
        );

        Ok(envelope.parameters)
    }

    fn report_intermediate(&mut self, value: f64) -> Result<()> {
        let record = MetricRecord {
            parameter_id: self.parameter_id,
            sequence: self.sequence,
            kind: MetricKind::Intermediate,
            value,
        };
        self.append(&record)?;
        self.sequence += 1;
        Ok(())
    }

    fn report_final(&mut self, value: f64) -> Result<()> {
        if self.reported_final {
            return Err(CropError::Tuner(
                "Final result was already reported for this trial".to_string(),
            ));
        }

        let record = MetricRecord {
            parameter_id: self.parameter_id,
            sequence: self.sequence,
            kind: MetricKind::Final,
            value,
        };
        self.append(&record)?;
        self.sequence += 1;
        self.reported_final = true;
        Ok(())
    }
}
