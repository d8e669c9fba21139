//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::physics::PhysicsParams;

/// Immutable per-run configuration bundle.
///
/// Passed by reference through every stage; nothing writes back into it.
/// Loop-scoped overrides (if any) stay local to the loop that needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParameters {
    /// Background zonal wind, m/s.
    pub u: f64,
    /// Background meridional wind, m/s.
    pub v: f64,
    /// Brunt–Väisälä frequency, 1/s.
    pub n: f64,
    /// Earth radius, m.
    pub earth_radius: f64,

    /// Retained cycle indices along lon in the first approximation.
    pub nhi: usize,
    /// Retained cycle indices along lat.
    pub nhj: usize,
    /// Sparse-mode budget enforced by the correction loop.
    pub n_modes: usize,

    /// Enable the iterative spectral correction.
    pub corrections: bool,
    /// Relative-error tolerance for convergence.
    pub tolerance: f64,
    /// Hard cap on correction iterations; hitting it reports the quad as
    /// unconverged rather than looping forever.
    pub max_iterations: u32,

    /// Gaussian low-pass smoothing of the extracted terrain window.
    pub spectral_lowpass: bool,
    /// Tukey-taper the reference window.
    pub taper_ref: bool,
    /// Ramp fraction of the Tukey taper.
    pub taper_alpha: f64,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            u: 10.0,
            v: 0.1,
            n: 0.02,
            earth_radius: 6_371_000.8,
            nhi: 24,
            nhj: 48,
            n_modes: 100,
            corrections: true,
            tolerance: 0.2,
            max_iterations: 16,
            spectral_lowpass: true,
            taper_ref: false,
            taper_alpha: 0.5,
        }
    }
}

impl RunParameters {
    /// The physics-model view of this configuration.
    pub fn physics(&self) -> PhysicsParams {
        PhysicsParams {
            u: self.u,
            v: self.v,
            n: self.n,
            earth_radius: self.earth_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_roundtrip_through_json() {
        let params = RunParameters::default();
        let json = serde_json::to_string(&params).unwrap();
        let back: RunParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_modes, params.n_modes);
        assert_eq!(back.tolerance, params.tolerance);
        assert_eq!(back.u, params.u);
    }
}
