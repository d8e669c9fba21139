//! Terrain window extraction.
//!
//! Cuts the bounding box of a set of triangle vertices out of the global
//! grid, converts its coordinates to metric offsets, optionally smooths it
//! with the Gaussian low-pass, and attaches the triangle mask.

use crate::cell::{TerrainCell, TerrainGrid};
use crate::config::RunParameters;
use crate::error::{PipelineError, Result};
use crate::geometry::{lat_to_meters, lon_to_meters, Triangle};
use crate::spectral::{SpectralTransform, TransformOptions};

/// Extract the window bounded by `lat_verts` × `lon_verts` (degrees).
///
/// `triangle` restricts the analysis region; `None` keeps the full
/// rectangle.  The returned cell is smoothed (when enabled) but not
/// mean-centered; the stages center it after taking any copies they need.
pub fn extract_window(
    grid: &TerrainGrid,
    lat_verts: &[f64],
    lon_verts: &[f64],
    triangle: Option<&Triangle>,
    params: &RunParameters,
    engine: &mut SpectralTransform,
) -> Result<TerrainCell> {
    let lat_lo = lat_verts.iter().cloned().fold(f64::INFINITY, f64::min);
    let lat_hi = lat_verts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let lon_lo = lon_verts.iter().cloned().fold(f64::INFINITY, f64::min);
    let lon_hi = lon_verts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let lat_min = TerrainGrid::closest_idx(&grid.lat, lat_lo);
    let lat_max = TerrainGrid::closest_idx(&grid.lat, lat_hi);
    let lon_min = TerrainGrid::closest_idx(&grid.lon, lon_lo);
    let lon_max = TerrainGrid::closest_idx(&grid.lon, lon_hi);

    if lat_max <= lat_min + 1 || lon_max <= lon_min + 1 {
        return Err(PipelineError::EmptyWindow(format!(
            "lat [{lat_min}, {lat_max}), lon [{lon_min}, {lon_max})"
        )));
    }

    let lat_deg = grid.lat[lat_min..lat_max].to_vec();
    let lon_deg = grid.lon[lon_min..lon_max].to_vec();

    let lat_origin = lat_deg[0];
    let lon_origin = lon_deg[0];
    let lat = lat_to_meters(&lat_deg, lon_origin);
    let lon = lon_to_meters(&lon_deg, lat_origin);

    let wlat = max_spacing(&lat);
    let wlon = max_spacing(&lon);

    let nlon_grid = grid.lon.len();
    let mut elev = Vec::with_capacity(lat_deg.len() * lon_deg.len());
    for j in lat_min..lat_max {
        elev.extend_from_slice(&grid.elev[j * nlon_grid + lon_min..j * nlon_grid + lon_max]);
    }

    let mask = match triangle {
        Some(tri) => Some(tri.mask_for(&lat_deg, &lon_deg)?),
        None => None,
    };

    let mut cell = TerrainCell { lat, lon, lat_deg, lon_deg, elev, wlat, wlon, mask };

    if params.spectral_lowpass {
        // Smooth the raw window with the fixed-cutoff low-pass; the mask
        // plays no role here, the transform needs the full rectangle.
        let analysis = engine.analyze(
            &cell,
            TransformOptions { lowpass: true, band_limit: None },
        );
        cell.elev = analysis.recon;
    }

    Ok(cell)
}

fn max_spacing(arr: &[f64]) -> f64 {
    arr.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max)
}
