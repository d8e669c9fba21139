//! Idealized pseudo-momentum flux model.
//!
//! Maps a Fourier amplitude spectrum plus background wind and stability to
//! a per-mode (or summed) momentum flux through the linear gravity-wave
//! dispersion relation.  Every division that can go singular is sanitized
//! immediately, in a fixed order, before the next step consumes it.

use serde::{Deserialize, Serialize};

use crate::spectral::SpectralAnalysis;

/// Background state of the idealized wave response.
///
/// A fixed record: there are exactly four knobs, no ad-hoc overrides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// Background zonal wind, m/s.
    pub u: f64,
    /// Background meridional wind, m/s.
    pub v: f64,
    /// Brunt–Väisälä frequency, 1/s.
    pub n: f64,
    /// Earth radius, m.
    pub earth_radius: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            n: 0.02,
            u: -10.0,
            v: 2.0,
            earth_radius: 6_371_000.8,
        }
    }
}

/// Per-mode and summed pseudo-momentum flux for one spectrum.
#[derive(Debug, Clone)]
pub struct PmfEstimate {
    /// Flux per Fourier mode, same row-major indexing as the amplitudes.
    pub per_mode: Vec<f64>,
    /// Sum over all modes.
    pub total: f64,
}

/// Replace a non-finite intermediate with zero.
///
/// The dispersion chain divides by the intrinsic frequency and by the total
/// wavenumber; each result passes through this guard before the next step,
/// so no NaN or Inf ever reaches downstream arithmetic.
#[inline]
fn guarded(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

/// Compute the `u'w'` pseudo-momentum flux for every mode of `analysis`.
///
/// Per mode with cycle wavenumbers `(kk, ll)`:
/// 1. `k = 2π·kk / wlon`, `l = 2π·ll / wlat`
/// 2. `ω = -kU - lV`
/// 3. `m² = N²(k²+l²)/ω² - (k²+l²)`, non-finite → 0, negative
///    (evanescent) → 0, then `m = √m²`
/// 4. wave action `A = -½|a|²N²/ω`, non-finite → 0 (this zeroes the DC
///    and any zero-frequency mode)
/// 5. `cgz = N·√(k²+l²)·m / (k²+l²+m²)^{3/2}`, non-finite → 0
/// 6. `uw = A·k·cgz`
pub fn compute_uw_pmf(analysis: &SpectralAnalysis, params: &PhysicsParams) -> PmfEstimate {
    let two_pi = std::f64::consts::TAU;
    let n = params.n;
    let nsq = n * n;

    let nlon = analysis.nlon();
    let mut per_mode = vec![0.0; analysis.ampls.len()];
    let mut total = 0.0;

    for (j, &ll_cycle) in analysis.lls.iter().enumerate() {
        let l = two_pi * ll_cycle / analysis.wlat;
        for (i, &kk_cycle) in analysis.kks.iter().enumerate() {
            let k = two_pi * kk_cycle / analysis.wlon;
            let khsq = k * k + l * l;

            let om = -k * params.u - l * params.v;

            let mut msq = guarded(nsq * khsq / (om * om) - khsq);
            if msq < 0.0 {
                msq = 0.0;
            }
            let m = msq.sqrt();

            let amp = analysis.ampls[j * nlon + i].norm();
            let wave_action = guarded(-0.5 * amp * amp * nsq / om);

            let cgz = guarded(n * khsq.sqrt() * m / (khsq + msq).powf(1.5));

            let uw = wave_action * k * cgz;
            per_mode[j * nlon + i] = uw;
            total += uw;
        }
    }

    PmfEstimate { per_mode, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex64;

    use crate::spectral::fftfreq;

    /// Spectrum on an n×n grid with a single amplitude placed at cycle
    /// indices (ki, li).
    fn single_mode(nlat: usize, nlon: usize, li: usize, ki: usize, amp: f64) -> SpectralAnalysis {
        let mut ampls = vec![Complex64::new(0.0, 0.0); nlat * nlon];
        ampls[li * nlon + ki] = Complex64::new(amp, 0.0);
        SpectralAnalysis {
            ampls,
            kks: fftfreq(nlon),
            lls: fftfreq(nlat),
            wlat: 1000.0,
            wlon: 1000.0,
            recon: vec![0.0; nlat * nlon],
        }
    }

    #[test]
    fn single_mode_flux_is_finite_with_sign_of_u() {
        // k = 2π/16000 ≈ 3.9e-4 rad/m, well below N/|U| = 2e-3, so m² > 0.
        for u in [10.0, -10.0] {
            let params = PhysicsParams { u, v: 0.0, ..Default::default() };
            let analysis = single_mode(16, 16, 0, 1, 50.0);
            let est = compute_uw_pmf(&analysis, &params);
            assert!(est.total.is_finite());
            assert!(est.total != 0.0);
            assert_eq!(est.total.signum(), u.signum(), "U = {u}");
        }
    }

    #[test]
    fn zero_frequency_mode_contributes_nothing() {
        // U = V = 0 makes ω vanish for every mode; any amplitude must
        // produce exactly zero flux.
        let params = PhysicsParams { u: 0.0, v: 0.0, ..Default::default() };
        let mut analysis = single_mode(8, 8, 2, 3, 1.0e6);
        for a in &mut analysis.ampls {
            *a = Complex64::new(123.0, -7.0);
        }
        let est = compute_uw_pmf(&analysis, &params);
        assert_eq!(est.total, 0.0);
        assert!(est.per_mode.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn dc_mode_contributes_nothing() {
        let params = PhysicsParams::default();
        let analysis = single_mode(8, 8, 0, 0, 9999.0);
        let est = compute_uw_pmf(&analysis, &params);
        assert_eq!(est.total, 0.0);
    }

    #[test]
    fn evanescent_mode_contributes_nothing() {
        // A short wave: k = 2π·0.5/10 ≈ 0.31 rad/m with |U| = 10 gives
        // m² = N²/U² − k² < 0, so the wave is evanescent.
        let mut analysis = single_mode(8, 8, 0, 4, 100.0);
        analysis.wlon = 10.0;
        analysis.wlat = 10.0;
        let params = PhysicsParams { u: 10.0, v: 0.0, ..Default::default() };
        let est = compute_uw_pmf(&analysis, &params);
        assert_eq!(est.total, 0.0);
    }

    #[test]
    fn flat_spectrum_yields_zero_flux_for_any_background() {
        let analysis = single_mode(8, 8, 0, 0, 0.0);
        for (u, v) in [(10.0, 0.0), (-3.0, 7.0), (0.0, 0.0)] {
            let params = PhysicsParams { u, v, ..Default::default() };
            let est = compute_uw_pmf(&analysis, &params);
            assert_eq!(est.total, 0.0);
        }
    }

    #[test]
    fn every_mode_is_finite_for_a_dense_spectrum() {
        let mut analysis = single_mode(16, 16, 0, 0, 0.0);
        for (idx, a) in analysis.ampls.iter_mut().enumerate() {
            *a = Complex64::new((idx as f64 * 0.37).sin() * 40.0, (idx as f64 * 0.11).cos() * 25.0);
        }
        let params = PhysicsParams::default();
        let est = compute_uw_pmf(&analysis, &params);
        assert!(est.total.is_finite());
        assert!(est.per_mode.iter().all(|x| x.is_finite()));
    }
}
