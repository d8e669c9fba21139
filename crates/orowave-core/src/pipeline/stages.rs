//! The three approximation stages run per quad, in fixed order:
//! reference → first approximation → second approximation.

use crate::cell::{TerrainCell, TerrainGrid};
use crate::config::RunParameters;
use crate::error::{PipelineError, Result};
use crate::geometry::Triangle;
use crate::physics::compute_uw_pmf;
use crate::pipeline::window::extract_window;
use crate::spectral::{apply_taper, SpectralAnalysis, SpectralTransform, TransformOptions};

/// Output of one stage over one cell: the terrain patch, its spectrum and
/// the momentum-flux estimate derived from it.
#[derive(Debug, Clone)]
pub struct StageSolution {
    pub cell: TerrainCell,
    pub analysis: SpectralAnalysis,
    pub uw: f64,
}

/// Reference stage: full-resolution, unfiltered transform over the quad
/// window.  Ground truth for the correction loop.
///
/// Also returns the smoothed, uncentered window field; the correction loop
/// differences it against the accumulated reconstructions.
pub fn reference_stage(
    grid: &TerrainGrid,
    lat_verts: &[f64],
    lon_verts: &[f64],
    params: &RunParameters,
    engine: &mut SpectralTransform,
) -> Result<(StageSolution, Vec<f64>)> {
    let mut cell = extract_window(grid, lat_verts, lon_verts, None, params, engine)?;
    let ref_topo = cell.elev.clone();

    cell.center_on_mask();
    if params.taper_ref {
        apply_taper(&mut cell, params.taper_alpha);
    }

    let analysis = engine.analyze(&cell, TransformOptions::default());
    let uw = compute_uw_pmf(&analysis, &params.physics()).total;

    Ok((StageSolution { cell, analysis, uw }, ref_topo))
}

/// First approximation: the same quad window, band-limited to the
/// configured `nhi × nhj` spectral resolution.
///
/// `res_topo` replaces the window's terrain with a residual field during
/// correction iterations; it must match the window dimensions.
pub fn first_approximation(
    grid: &TerrainGrid,
    lat_verts: &[f64],
    lon_verts: &[f64],
    params: &RunParameters,
    engine: &mut SpectralTransform,
    res_topo: Option<&[f64]>,
) -> Result<StageSolution> {
    // The residual is built from already-smoothed fields; only the raw
    // terrain pass applies the window low-pass.
    let window_params = match res_topo {
        Some(_) => RunParameters { spectral_lowpass: false, ..params.clone() },
        None => params.clone(),
    };
    let mut cell = extract_window(grid, lat_verts, lon_verts, None, &window_params, engine)?;

    if let Some(res) = res_topo {
        if res.len() != cell.elev.len() {
            return Err(PipelineError::DimensionMismatch {
                found: res.len(),
                nlat: cell.nlat(),
                nlon: cell.nlon(),
            });
        }
        cell.elev = res.to_vec();
    }

    cell.center_on_mask();

    let analysis = engine.analyze(
        &cell,
        TransformOptions { lowpass: false, band_limit: Some((params.nhi, params.nhj)) },
    );
    let uw = compute_uw_pmf(&analysis, &params.physics()).total;

    Ok(StageSolution { cell, analysis, uw })
}

/// Second approximation: restrict the first approximation to one triangle.
///
/// The triangle mask is applied to the shared reconstruction, the masked
/// field is re-centered, and the transform and physics are recomputed on
/// the masked cell.
pub fn second_approximation(
    tri_lat: &[f64; 3],
    tri_lon: &[f64; 3],
    first: &StageSolution,
    params: &RunParameters,
    engine: &mut SpectralTransform,
) -> Result<StageSolution> {
    let triangle = Triangle::new(tri_lat, tri_lon)?;
    let mask = triangle.mask_for(&first.cell.lat_deg, &first.cell.lon_deg)?;

    let mut cell = TerrainCell {
        lat: first.cell.lat.clone(),
        lon: first.cell.lon.clone(),
        lat_deg: first.cell.lat_deg.clone(),
        lon_deg: first.cell.lon_deg.clone(),
        elev: first.analysis.recon.clone(),
        wlat: first.cell.wlat,
        wlon: first.cell.wlon,
        mask: Some(mask),
    };
    cell.center_on_mask();

    let analysis = engine.analyze(
        &cell,
        TransformOptions { lowpass: false, band_limit: Some((params.nhi, params.nhj)) },
    );
    let uw = compute_uw_pmf(&analysis, &params.physics()).total;

    Ok(StageSolution { cell, analysis, uw })
}
