//! Spectral transform engine.
//!
//! 2D discrete Fourier transforms of elevation fields, built from rustfft's
//! 1D kernels (rows, then columns through a transpose).  Amplitudes are
//! normalized by the total sample count so that the unnormalized inverse
//! reconstructs the input exactly, up to any explicit spectral masking.

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::cell::TerrainCell;

/// Physical cutoff wavelength of the Gaussian low-pass, metres.
pub const LOWPASS_CUTOFF_M: f64 = 5000.0;

/// Result of a Fourier decomposition of one terrain cell.
#[derive(Debug, Clone)]
pub struct SpectralAnalysis {
    /// Complex amplitudes, row-major `[l][k]`, normalized by sample count.
    pub ampls: Vec<Complex64>,
    /// Cycle wavenumbers along lon (cycles per sample), fftfreq layout.
    pub kks: Vec<f64>,
    /// Cycle wavenumbers along lat, fftfreq layout.
    pub lls: Vec<f64>,
    /// Metric sample spacing carried over from the cell, metres.
    pub wlat: f64,
    pub wlon: f64,
    /// Real-space reconstruction of the (possibly masked) spectrum.
    pub recon: Vec<f64>,
}

impl SpectralAnalysis {
    pub fn nlat(&self) -> usize {
        self.lls.len()
    }

    pub fn nlon(&self) -> usize {
        self.kks.len()
    }

    /// Number of amplitudes with non-zero magnitude.
    pub fn active_modes(&self) -> usize {
        self.ampls.iter().filter(|a| a.norm() > 0.0).count()
    }
}

/// Sample cycle frequencies in numpy `fftfreq` order:
/// `[0, 1, ..., n/2-1, -n/2, ..., -1] / n` for even `n`.
pub fn fftfreq(n: usize) -> Vec<f64> {
    let half = (n - 1) / 2;
    (0..n)
        .map(|i| {
            let v = if i <= half { i as f64 } else { i as f64 - n as f64 };
            v / n as f64
        })
        .collect()
}

/// Signed integer cycle index corresponding to a `fftfreq` entry.
#[inline]
fn cycle_index(freq: f64, n: usize) -> i64 {
    (freq * n as f64).round() as i64
}

/// Options applied to a forward analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    /// Gaussian low-pass with the fixed 5000 m cutoff.
    pub lowpass: bool,
    /// Retain only the `(nhi, nhj)` lowest cycle indices per axis.
    pub band_limit: Option<(usize, usize)>,
}

/// The transform engine. Owns the FFT planner so repeated analyses over a
/// batch reuse the planned kernels.
pub struct SpectralTransform {
    planner: FftPlanner<f64>,
}

impl SpectralTransform {
    pub fn new() -> Self {
        Self { planner: FftPlanner::new() }
    }

    /// Forward analysis of a cell's elevation field.
    ///
    /// The caller is responsible for mean-centering the field first (see
    /// `TerrainCell::center_on_mask`); the engine transforms the full
    /// rectangular array regardless of any mask.
    pub fn analyze(&mut self, cell: &TerrainCell, opts: TransformOptions) -> SpectralAnalysis {
        let nlat = cell.nlat();
        let nlon = cell.nlon();
        let size = (nlat * nlon) as f64;

        let mut buf: Vec<Complex64> =
            cell.elev.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.fft2(&mut buf, nlat, nlon, false);
        for a in &mut buf {
            *a /= size;
        }

        let kks = fftfreq(nlon);
        let lls = fftfreq(nlat);

        if opts.lowpass {
            apply_lowpass(&mut buf, &kks, &lls, cell.wlat, cell.wlon);
        }
        if let Some((nhi, nhj)) = opts.band_limit {
            apply_band_limit(&mut buf, &kks, &lls, nhi, nhj);
        }

        let recon = self.reconstruct(&buf, nlat, nlon);

        SpectralAnalysis {
            ampls: buf,
            kks,
            lls,
            wlat: cell.wlat,
            wlon: cell.wlon,
            recon,
        }
    }

    /// Real-space field for a normalized amplitude grid.
    pub fn reconstruct(&mut self, ampls: &[Complex64], nlat: usize, nlon: usize) -> Vec<f64> {
        let mut buf = ampls.to_vec();
        // The forward pass divided by N, the unnormalized inverse multiplies
        // by N; no extra scaling needed.
        self.fft2(&mut buf, nlat, nlon, true);
        buf.iter().map(|c| c.re).collect()
    }

    /// In-place 2D FFT: rows, transpose, rows again, transpose back.
    fn fft2(&mut self, data: &mut Vec<Complex64>, nlat: usize, nlon: usize, inverse: bool) {
        let row_fft = if inverse {
            self.planner.plan_fft_inverse(nlon)
        } else {
            self.planner.plan_fft_forward(nlon)
        };
        row_fft.process(data);

        let mut t = transpose(data, nlat, nlon);
        let col_fft = if inverse {
            self.planner.plan_fft_inverse(nlat)
        } else {
            self.planner.plan_fft_forward(nlat)
        };
        col_fft.process(&mut t);

        *data = transpose(&t, nlon, nlat);
    }
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn transpose(src: &[Complex64], rows: usize, cols: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); src.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = src[r * cols + c];
        }
    }
    out
}

/// Gaussian low-pass in physical wavenumber magnitude:
/// `a *= exp(-(|k| / (2π / cutoff))²)`.
fn apply_lowpass(ampls: &mut [Complex64], kks: &[f64], lls: &[f64], wlat: f64, wlon: f64) {
    let two_pi = std::f64::consts::TAU;
    let k_cut = two_pi / LOWPASS_CUTOFF_M;
    for (j, &ll) in lls.iter().enumerate() {
        for (i, &kk) in kks.iter().enumerate() {
            let kls = (two_pi * kk / wlon).hypot(two_pi * ll / wlat);
            ampls[j * kks.len() + i] *= (-(kls / k_cut).powi(2)).exp();
        }
    }
}

/// Zero every mode whose signed cycle index exceeds `nhi/2` along lon or
/// `nhj/2` along lat, leaving an `nhi × nhj` band around the origin.
fn apply_band_limit(ampls: &mut [Complex64], kks: &[f64], lls: &[f64], nhi: usize, nhj: usize) {
    let nlon = kks.len();
    let nlat = lls.len();
    let k_max = (nhi / 2) as i64;
    let l_max = (nhj / 2) as i64;
    for (j, &ll) in lls.iter().enumerate() {
        let l_idx = cycle_index(ll, nlat);
        for (i, &kk) in kks.iter().enumerate() {
            let k_idx = cycle_index(kk, nlon);
            if k_idx.abs() > k_max || l_idx.abs() > l_max {
                ampls[j * nlon + i] = Complex64::new(0.0, 0.0);
            }
        }
    }
}

/// Zero every amplitude smaller in magnitude than the `n_modes`-th largest,
/// enforcing the sparse-mode budget across correction iterations.
pub fn truncate_modes(ampls: &mut [Complex64], n_modes: usize) {
    if n_modes == 0 || n_modes >= ampls.len() {
        return;
    }
    let mut norms: Vec<f64> = ampls.iter().map(|a| a.norm()).collect();
    norms.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let cutoff = norms[n_modes - 1];
    for a in ampls.iter_mut() {
        if a.norm() < cutoff {
            *a = Complex64::new(0.0, 0.0);
        }
    }
}

// ── Tapering ──────────────────────────────────────────────────────────────────

/// 1D Tukey window: cosine ramps over an `alpha` fraction of each end.
fn tukey(n: usize, alpha: f64) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let edge = alpha / 2.0;
    (0..n)
        .map(|i| {
            let x = i as f64 / (n - 1) as f64;
            if x < edge {
                0.5 * (1.0 + (std::f64::consts::PI * (2.0 * x / alpha - 1.0)).cos())
            } else if x > 1.0 - edge {
                0.5 * (1.0 + (std::f64::consts::PI * (2.0 * (1.0 - x) / alpha - 1.0)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

/// Apply a separable 2D Tukey taper to the cell's elevation field.
/// Used on the reference window to suppress periodicity artefacts.
pub fn apply_taper(cell: &mut TerrainCell, alpha: f64) {
    let wy = tukey(cell.nlat(), alpha);
    let wx = tukey(cell.nlon(), alpha);
    let nlon = cell.nlon();
    for (j, &wj) in wy.iter().enumerate() {
        for (i, &wi) in wx.iter().enumerate() {
            cell.elev[j * nlon + i] *= wj * wi;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_cell(nlat: usize, nlon: usize, f: impl Fn(usize, usize) -> f64) -> TerrainCell {
        let mut elev = vec![0.0; nlat * nlon];
        for j in 0..nlat {
            for i in 0..nlon {
                elev[j * nlon + i] = f(j, i);
            }
        }
        TerrainCell {
            lat: (0..nlat).map(|j| j as f64 * 1000.0).collect(),
            lon: (0..nlon).map(|i| i as f64 * 1000.0).collect(),
            lat_deg: (0..nlat).map(|j| 50.0 + j as f64 * 0.01).collect(),
            lon_deg: (0..nlon).map(|i| 10.0 + i as f64 * 0.01).collect(),
            elev,
            wlat: 1000.0,
            wlon: 1000.0,
            mask: None,
        }
    }

    /// Deterministic bumpy field with broad spectral content.
    fn bumpy(j: usize, i: usize) -> f64 {
        let x = i as f64;
        let y = j as f64;
        (0.31 * x).sin() * 120.0 + (0.47 * y).cos() * 80.0 + (0.11 * x * y).sin() * 40.0
    }

    #[test]
    fn fftfreq_matches_numpy_layout() {
        assert_eq!(fftfreq(4), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(fftfreq(5), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn roundtrip_reconstructs_the_field() {
        let cell = make_cell(12, 16, bumpy);
        let mut engine = SpectralTransform::new();
        let analysis = engine.analyze(&cell, TransformOptions::default());
        for (orig, rec) in cell.elev.iter().zip(analysis.recon.iter()) {
            assert_relative_eq!(*orig, *rec, epsilon = 1e-9);
        }
    }

    #[test]
    fn flat_field_has_only_a_dc_mode() {
        let cell = make_cell(8, 8, |_, _| 42.0);
        let mut engine = SpectralTransform::new();
        let analysis = engine.analyze(&cell, TransformOptions::default());
        assert_relative_eq!(analysis.ampls[0].re, 42.0, epsilon = 1e-12);
        for a in &analysis.ampls[1..] {
            assert!(a.norm() < 1e-12);
        }
    }

    #[test]
    fn lowpass_attenuates_the_highest_modes_most() {
        let cell = make_cell(16, 16, bumpy);
        let mut engine = SpectralTransform::new();
        let plain = engine.analyze(&cell, TransformOptions::default());
        let filtered = engine.analyze(
            &cell,
            TransformOptions { lowpass: true, band_limit: None },
        );
        // Nyquist mode is damped harder than the first mode.
        let nyq = 8 * 16 + 8;
        let low = 16 + 1;
        let damp = |i: usize| filtered.ampls[i].norm() / plain.ampls[i].norm().max(1e-300);
        assert!(damp(nyq) < damp(low));
        assert!(damp(nyq) < 1.0);
    }

    #[test]
    fn band_limit_zeroes_modes_outside_the_band() {
        let cell = make_cell(16, 16, bumpy);
        let mut engine = SpectralTransform::new();
        let analysis = engine.analyze(
            &cell,
            TransformOptions { lowpass: false, band_limit: Some((4, 4)) },
        );
        for (j, &ll) in analysis.lls.iter().enumerate() {
            for (i, &kk) in analysis.kks.iter().enumerate() {
                let k_idx = (kk * 16.0).round() as i64;
                let l_idx = (ll * 16.0).round() as i64;
                if k_idx.abs() > 2 || l_idx.abs() > 2 {
                    assert_eq!(analysis.ampls[j * 16 + i].norm(), 0.0);
                }
            }
        }
        assert!(analysis.active_modes() <= 25);
    }

    #[test]
    fn truncation_error_is_monotone_in_n_modes() {
        let cell = make_cell(16, 16, bumpy);
        let mut engine = SpectralTransform::new();
        let full = engine.analyze(&cell, TransformOptions::default());

        let mut last_err = f64::INFINITY;
        for n_modes in [4, 16, 64, 256] {
            let mut ampls = full.ampls.clone();
            truncate_modes(&mut ampls, n_modes);
            let recon = engine.reconstruct(&ampls, 16, 16);
            let err: f64 = recon
                .iter()
                .zip(full.recon.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            assert!(err <= last_err + 1e-9, "error grew at n_modes={n_modes}");
            last_err = err;
        }
    }

    #[test]
    fn truncation_respects_the_mode_budget() {
        let cell = make_cell(16, 16, bumpy);
        let mut engine = SpectralTransform::new();
        let mut analysis = engine.analyze(&cell, TransformOptions::default());
        truncate_modes(&mut analysis.ampls, 10);
        // Conjugate-symmetric ties share a magnitude, so the cutoff keeps
        // ties; the count stays close to the budget, never far above.
        let active = analysis.active_modes();
        assert!(active <= 12, "kept {active} modes for a budget of 10");
    }

    #[test]
    fn taper_pins_edges_and_keeps_the_interior() {
        let mut cell = make_cell(16, 16, |_, _| 1.0);
        apply_taper(&mut cell, 0.5);
        assert!(cell.get(0, 0).abs() < 1e-12);
        assert!(cell.get(15, 15).abs() < 1e-12);
        assert_relative_eq!(cell.get(8, 8), 1.0, epsilon = 1e-12);
    }
}
