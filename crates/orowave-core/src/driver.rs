//! Batch driver: one quad at a time, each fully processed (including its
//! correction loop) before the next begins.

use serde::Serialize;

use crate::cell::TerrainGrid;
use crate::config::RunParameters;
use crate::diagnostics::{BatchSummary, DiagnosticsState};
use crate::geometry::Triangulation;
use crate::pipeline::process_quad;
use crate::spectral::SpectralTransform;

/// Diagnostics of a completed batch.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub params: RunParameters,
    pub diagnostics: DiagnosticsState,
    pub summary: BatchSummary,
}

/// Process every quad in `rect_set` sequentially.
///
/// A quad either contributes a full diagnostics entry or a skipped entry;
/// a failure never crashes the batch and never leaves a partial record.
pub fn run_batch(
    grid: &TerrainGrid,
    tri: &Triangulation,
    rect_set: &[usize],
    params: &RunParameters,
) -> BatchReport {
    let mut engine = SpectralTransform::new();
    let mut diag = DiagnosticsState::new();

    for &idx in rect_set {
        match process_quad(grid, tri, idx, params, &mut engine) {
            Ok(result) => diag.record(&result),
            Err(err) => diag.record_skipped(idx, err.to_string()),
        }
    }

    let summary = diag.summary();
    BatchReport { params: params.clone(), diagnostics: diag, summary }
}

/// The even triangle indices: one entry per quad pair.
pub fn default_rect_set(tri: &Triangulation) -> Vec<usize> {
    (0..tri.len()).step_by(2).collect()
}
