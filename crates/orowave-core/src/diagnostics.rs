//! Batch diagnostics: per-quad error records and the end-of-batch summary.

use serde::Serialize;

use crate::pipeline::QuadResult;

/// Relative deviation of a pair's summed PMF from the reference PMF.
/// `None` when the reference flux is exactly zero (relative error is
/// undefined for a degenerate reference).
pub fn relative_error(pair_sum: f64, uw_ref: f64) -> Option<f64> {
    if uw_ref == 0.0 {
        None
    } else {
        Some((pair_sum - uw_ref) / uw_ref)
    }
}

/// One fully processed quad.
#[derive(Debug, Clone, Serialize)]
pub struct QuadRecord {
    pub quad: usize,
    pub uw_ref: f64,
    pub uw_first: f64,
    pub uw_triangles: [f64; 2],
    /// Relative error at convergence; `None` for a degenerate reference.
    pub rel_err: Option<f64>,
    /// Worst absolute relative error observed during processing.
    pub max_abs_err: f64,
    pub iterations: u32,
    pub corrected: bool,
    pub converged: bool,
    pub degenerate_reference: bool,
}

impl QuadRecord {
    pub fn from_result(result: &QuadResult) -> Self {
        Self {
            quad: result.quad,
            uw_ref: result.uw_ref,
            uw_first: result.uw_first,
            uw_triangles: [result.pair[0].uw, result.pair[1].uw],
            rel_err: result.rel_err,
            max_abs_err: result.max_abs_err,
            iterations: result.iterations,
            corrected: result.corrected,
            converged: result.converged,
            degenerate_reference: result.degenerate_reference,
        }
    }
}

/// A quad that aborted; no partial numbers are recorded for it.
#[derive(Debug, Clone, Serialize)]
pub struct SkipRecord {
    pub quad: usize,
    pub reason: String,
}

/// Append-only accumulator across a batch run, owned by the driver.
#[derive(Debug, Default, Serialize)]
pub struct DiagnosticsState {
    pub records: Vec<QuadRecord>,
    pub skipped: Vec<SkipRecord>,
}

impl DiagnosticsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &QuadResult) {
        self.records.push(QuadRecord::from_result(result));
    }

    pub fn record_skipped(&mut self, quad: usize, reason: String) {
        self.skipped.push(SkipRecord { quad, reason });
    }

    /// Summarize the batch so far.
    pub fn summary(&self) -> BatchSummary {
        let errs: Vec<f64> = self.records.iter().filter_map(|r| r.rel_err).collect();

        let mean_rel_err = if errs.is_empty() {
            0.0
        } else {
            errs.iter().sum::<f64>() / errs.len() as f64
        };
        let max_rel_err = errs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_rel_err = errs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_abs_err = self
            .records
            .iter()
            .map(|r| r.max_abs_err)
            .fold(0.0, f64::max);

        BatchSummary {
            quads: self.records.len(),
            skipped: self.skipped.len(),
            corrected: self.records.iter().filter(|r| r.corrected).count(),
            unconverged: self
                .records
                .iter()
                .filter(|r| !r.converged && !r.degenerate_reference)
                .count(),
            degenerate: self
                .records
                .iter()
                .filter(|r| r.degenerate_reference)
                .count(),
            mean_rel_err,
            max_rel_err: if errs.is_empty() { 0.0 } else { max_rel_err },
            min_rel_err: if errs.is_empty() { 0.0 } else { min_rel_err },
            max_abs_err,
        }
    }
}

/// End-of-batch aggregate view.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub quads: usize,
    pub skipped: usize,
    pub corrected: usize,
    pub unconverged: usize,
    pub degenerate: usize,
    pub mean_rel_err: f64,
    pub max_rel_err: f64,
    pub min_rel_err: f64,
    pub max_abs_err: f64,
}
