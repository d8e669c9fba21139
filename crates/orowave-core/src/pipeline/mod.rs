//! Per-quad approximation pipeline: reference → first approximation →
//! second approximation → iterative correction.

pub mod correction;
pub mod stages;
pub mod window;

pub use correction::{refine, CorrectionOutcome};
pub use stages::{first_approximation, reference_stage, second_approximation, StageSolution};
pub use window::extract_window;

use crate::cell::TerrainGrid;
use crate::config::RunParameters;
use crate::diagnostics::relative_error;
use crate::error::Result;
use crate::geometry::Triangulation;
use crate::spectral::SpectralTransform;

/// Everything produced for one quad pair `(idx, idx + 1)`.
#[derive(Debug)]
pub struct QuadResult {
    /// Index of the quad's first triangle.
    pub quad: usize,
    /// Reference PMF (ground truth).
    pub uw_ref: f64,
    /// Shared first-approximation PMF over the full quad.
    pub uw_first: f64,
    /// Final per-triangle solutions (possibly corrected).
    pub pair: [StageSolution; 2],
    /// Relative error of the first approximation; `None` when the
    /// reference flux is degenerate.
    pub first_rel_err: Option<f64>,
    /// Relative error of the final pair; `None` when degenerate.
    pub rel_err: Option<f64>,
    /// Worst absolute relative error seen while processing this quad.
    pub max_abs_err: f64,
    pub iterations: u32,
    pub corrected: bool,
    pub converged: bool,
    /// The reference PMF was exactly zero; relative error is undefined and
    /// the correction loop was skipped.
    pub degenerate_reference: bool,
}

/// Run the full pipeline for the quad starting at triangle `idx`.
///
/// The stages run in fixed order and share one spectrum object per stage;
/// the correction loop is entered only when corrections are enabled and
/// the initial pair misses the tolerance.  Any error aborts the quad as a
/// whole — no partial result escapes.
pub fn process_quad(
    grid: &TerrainGrid,
    tri: &Triangulation,
    idx: usize,
    params: &RunParameters,
    engine: &mut SpectralTransform,
) -> Result<QuadResult> {
    let (quad_lat, quad_lon) = tri.quad_verts(idx);
    let tri_lat = [tri.lat_verts[idx], tri.lat_verts[idx + 1]];
    let tri_lon = [tri.lon_verts[idx], tri.lon_verts[idx + 1]];

    // Reference stage.
    let (reference, ref_topo) =
        reference_stage(grid, &quad_lat, &quad_lon, params, engine)?;

    // First approximation, shared by both triangles.
    let first = first_approximation(grid, &quad_lat, &quad_lon, params, engine, None)?;

    // Second approximation per triangle.
    let pair = [
        second_approximation(&tri_lat[0], &tri_lon[0], &first, params, engine)?,
        second_approximation(&tri_lat[1], &tri_lon[1], &first, params, engine)?,
    ];

    let Some(rel_err) = relative_error(pair[0].uw + pair[1].uw, reference.uw) else {
        // Relative error is undefined; report the uncorrected pair.
        return Ok(QuadResult {
            quad: idx,
            uw_ref: reference.uw,
            uw_first: first.uw,
            pair,
            first_rel_err: None,
            rel_err: None,
            max_abs_err: 0.0,
            iterations: 0,
            corrected: false,
            converged: false,
            degenerate_reference: true,
        });
    };
    let first_rel_err = (first.uw - reference.uw) / reference.uw;
    let mut max_abs_err = first_rel_err.abs().max(rel_err.abs());

    if rel_err.abs() <= params.tolerance || !params.corrections {
        return Ok(QuadResult {
            quad: idx,
            uw_ref: reference.uw,
            uw_first: first.uw,
            pair,
            first_rel_err: Some(first_rel_err),
            rel_err: Some(rel_err),
            max_abs_err,
            iterations: 0,
            corrected: false,
            converged: rel_err.abs() <= params.tolerance,
            degenerate_reference: false,
        });
    }

    let outcome = refine(
        grid,
        &quad_lat,
        &quad_lon,
        &tri_lat,
        &tri_lon,
        reference.uw,
        &ref_topo,
        &first,
        pair,
        rel_err,
        params,
        engine,
    )?;
    for e in &outcome.history {
        max_abs_err = max_abs_err.max(e.abs());
    }

    Ok(QuadResult {
        quad: idx,
        uw_ref: reference.uw,
        uw_first: first.uw,
        pair: outcome.pair,
        first_rel_err: Some(first_rel_err),
        rel_err: Some(outcome.rel_err),
        max_abs_err,
        iterations: outcome.iterations,
        corrected: outcome.iterations > 0,
        converged: outcome.converged,
        degenerate_reference: false,
    })
}
