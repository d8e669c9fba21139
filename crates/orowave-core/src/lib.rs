//! Orographic gravity-wave pseudo-momentum flux (PMF) approximation.
//!
//! Decomposes triangulated terrain cells into band-limited Fourier
//! spectra, applies an idealized linear wave-response model, and
//! iteratively corrects the retained modes against a high-resolution
//! reference until the relative flux error falls below tolerance.

pub mod cell;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod physics;
pub mod pipeline;
pub mod spectral;
pub mod synthetic;

pub use cell::{TerrainCell, TerrainGrid};
pub use config::RunParameters;
pub use diagnostics::{BatchSummary, DiagnosticsState, QuadRecord};
pub use driver::{default_rect_set, run_batch, BatchReport};
pub use error::{PipelineError, Result};
pub use geometry::{Triangle, Triangulation};
pub use physics::{compute_uw_pmf, PhysicsParams, PmfEstimate};
pub use pipeline::{process_quad, QuadResult, StageSolution};
pub use spectral::{SpectralAnalysis, SpectralTransform, TransformOptions};
