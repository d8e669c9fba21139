//! Iterative spectral correction.
//!
//! When the summed two-triangle estimate misses the reference by more than
//! the tolerance, the residual terrain (reference minus everything
//! reconstructed so far) is pushed back through the first and second
//! approximation stages, the per-triangle spectra are updated additively,
//! and the retained modes are re-truncated to the fixed budget.  Each
//! iteration produces a fresh pair snapshot; nothing is mutated in place.

use rustfft::num_complex::Complex64;

use crate::cell::TerrainGrid;
use crate::config::RunParameters;
use crate::error::Result;
use crate::physics::compute_uw_pmf;
use crate::pipeline::stages::{first_approximation, second_approximation, StageSolution};
use crate::spectral::{truncate_modes, SpectralAnalysis, SpectralTransform};

/// Result of the correction loop for one quad.
#[derive(Debug)]
pub struct CorrectionOutcome {
    /// The last refined triangle pair; used downstream even when the loop
    /// hit the iteration cap.
    pub pair: [StageSolution; 2],
    /// Relative error after the last iteration.
    pub rel_err: f64,
    pub iterations: u32,
    /// False when the loop stopped at `max_iterations` above tolerance.
    pub converged: bool,
    /// Relative error after each iteration, for inspection.
    pub history: Vec<f64>,
}

/// Run the correction loop until `|rel_err| <= tolerance` or the iteration
/// cap is reached.
///
/// `ref_topo` is the smoothed, uncentered reference window; `first` is the
/// initial first-approximation solution whose reconstruction seeds the
/// running terrain sum.  The caller has already established that
/// `uw_ref != 0` and that `|rel_err| > tolerance`.
#[allow(clippy::too_many_arguments)]
pub fn refine(
    grid: &TerrainGrid,
    quad_lat: &[f64],
    quad_lon: &[f64],
    tri_lat: &[[f64; 3]; 2],
    tri_lon: &[[f64; 3]; 2],
    uw_ref: f64,
    ref_topo: &[f64],
    first: &StageSolution,
    pair: [StageSolution; 2],
    rel_err: f64,
    params: &RunParameters,
    engine: &mut SpectralTransform,
) -> Result<CorrectionOutcome> {
    let physics = params.physics();

    let mut topo_sum = vec![0.0; ref_topo.len()];
    let mut last_recon = first.analysis.recon.clone();
    let mut pair = pair;
    let mut rel_err = rel_err;
    let mut iterations = 0u32;
    let mut history = Vec::new();

    while rel_err.abs() > params.tolerance && iterations < params.max_iterations {
        let sign = rel_err.signum();

        // Residual terrain: what the accumulated reconstructions still owe
        // the reference, mean-centered.
        for (s, r) in topo_sum.iter_mut().zip(last_recon.iter()) {
            *s += r;
        }
        let mut res_topo: Vec<f64> = ref_topo
            .iter()
            .zip(topo_sum.iter())
            .map(|(r, s)| -sign * (r - s))
            .collect();
        let mean = res_topo.iter().sum::<f64>() / res_topo.len() as f64;
        for v in &mut res_topo {
            *v -= mean;
        }

        let fa = first_approximation(grid, quad_lat, quad_lon, params, engine, Some(&res_topo))?;
        last_recon = fa.analysis.recon.clone();

        let next: Result<Vec<StageSolution>> = (0..2)
            .map(|cnt| {
                let rf = second_approximation(&tri_lat[cnt], &tri_lon[cnt], &fa, params, engine)?;

                // Additive spectrum update, then re-truncate to the budget.
                let mut ampls: Vec<Complex64> = pair[cnt]
                    .analysis
                    .ampls
                    .iter()
                    .zip(rf.analysis.ampls.iter())
                    .map(|(old, corr)| *old - *corr * sign)
                    .collect();
                truncate_modes(&mut ampls, params.n_modes);

                let nlat = rf.analysis.nlat();
                let nlon = rf.analysis.nlon();
                let recon = engine.reconstruct(&ampls, nlat, nlon);
                let analysis = SpectralAnalysis {
                    ampls,
                    kks: rf.analysis.kks.clone(),
                    lls: rf.analysis.lls.clone(),
                    wlat: rf.analysis.wlat,
                    wlon: rf.analysis.wlon,
                    recon,
                };
                let uw = compute_uw_pmf(&analysis, &physics).total;

                Ok(StageSolution { cell: rf.cell, analysis, uw })
            })
            .collect();
        let next = next?;
        pair = match <[StageSolution; 2]>::try_from(next) {
            Ok(p) => p,
            Err(_) => unreachable!("exactly two triangles per quad"),
        };

        iterations += 1;
        rel_err = (pair[0].uw + pair[1].uw - uw_ref) / uw_ref;
        history.push(rel_err);
    }

    Ok(CorrectionOutcome {
        converged: rel_err.abs() <= params.tolerance,
        pair,
        rel_err,
        iterations,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::reference_stage;
    use crate::synthetic;

    fn setup() -> (TerrainGrid, RunParameters, SpectralTransform) {
        let elev: Vec<f64> = synthetic::diffusion_terrain(48, 48, 99, 300)
            .into_iter()
            .map(|v| v * 800.0)
            .collect();
        let grid = synthetic::synthetic_grid(48, 48, (50.0, 51.0), (10.0, 11.0), elev);
        let params = RunParameters { nhi: 12, nhj: 12, n_modes: 60, ..Default::default() };
        (grid, params, SpectralTransform::new())
    }

    fn quad_setup(
        grid: &TerrainGrid,
        params: &RunParameters,
        engine: &mut SpectralTransform,
    ) -> (Vec<f64>, Vec<f64>, [[f64; 3]; 2], [[f64; 3]; 2], StageSolution, Vec<f64>, f64, [StageSolution; 2])
    {
        let tri_lat = [[50.1, 50.1, 50.8], [50.8, 50.8, 50.1]];
        let tri_lon = [[10.1, 10.8, 10.1], [10.8, 10.1, 10.8]];
        let quad_lat: Vec<f64> = tri_lat.iter().flatten().cloned().collect();
        let quad_lon: Vec<f64> = tri_lon.iter().flatten().cloned().collect();

        let (reference, ref_topo) =
            reference_stage(grid, &quad_lat, &quad_lon, params, engine).unwrap();
        let first =
            first_approximation(grid, &quad_lat, &quad_lon, params, engine, None).unwrap();
        let pair = [
            second_approximation(&tri_lat[0], &tri_lon[0], &first, params, engine).unwrap(),
            second_approximation(&tri_lat[1], &tri_lon[1], &first, params, engine).unwrap(),
        ];
        (quad_lat, quad_lon, tri_lat, tri_lon, first, ref_topo, reference.uw, pair)
    }

    #[test]
    fn within_tolerance_runs_zero_iterations() {
        let (grid, params, mut engine) = setup();
        let (quad_lat, quad_lon, tri_lat, tri_lon, first, ref_topo, uw_ref, pair) =
            quad_setup(&grid, &params, &mut engine);

        // Zero-residual premise: the pair already matches the reference.
        let rel_err = 0.0;
        let out = refine(
            &grid, &quad_lat, &quad_lon, &tri_lat, &tri_lon, uw_ref, &ref_topo, &first, pair,
            rel_err, &params, &mut engine,
        )
        .unwrap();
        assert_eq!(out.iterations, 0);
        assert!(out.converged);
        assert_eq!(out.rel_err, 0.0);
        assert!(out.history.is_empty());
    }

    #[test]
    fn iteration_cap_reports_unconverged() {
        let (grid, params, mut engine) = setup();
        // Impossible tolerance forces the cap.
        let params = RunParameters { tolerance: 0.0, max_iterations: 3, ..params };
        let (quad_lat, quad_lon, tri_lat, tri_lon, first, ref_topo, uw_ref, pair) =
            quad_setup(&grid, &params, &mut engine);

        let rel_err = (pair[0].uw + pair[1].uw - uw_ref) / uw_ref;
        let out = refine(
            &grid, &quad_lat, &quad_lon, &tri_lat, &tri_lon, uw_ref, &ref_topo, &first, pair,
            rel_err, &params, &mut engine,
        )
        .unwrap();
        assert_eq!(out.iterations, 3);
        assert!(!out.converged);
        assert_eq!(out.history.len(), 3);
        assert!(out.pair[0].uw.is_finite() && out.pair[1].uw.is_finite());
    }

    #[test]
    fn refined_spectra_stay_within_the_mode_budget() {
        let (grid, params, mut engine) = setup();
        let params = RunParameters { tolerance: 1e-6, max_iterations: 2, ..params };
        let (quad_lat, quad_lon, tri_lat, tri_lon, first, ref_topo, uw_ref, pair) =
            quad_setup(&grid, &params, &mut engine);

        let rel_err = (pair[0].uw + pair[1].uw - uw_ref) / uw_ref;
        let out = refine(
            &grid, &quad_lat, &quad_lon, &tri_lat, &tri_lon, uw_ref, &ref_topo, &first, pair,
            rel_err, &params, &mut engine,
        )
        .unwrap();

        if out.iterations > 0 {
            for sol in &out.pair {
                // A small tie margin: conjugate-symmetric magnitudes share
                // the cutoff value.
                assert!(sol.analysis.active_modes() <= params.n_modes + 4);
            }
        }
    }
}
