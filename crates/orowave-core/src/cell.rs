//! Terrain containers: the global grid and the per-quad working cell.

use serde::{Deserialize, Serialize};

/// A rectangular or triangular patch of elevation data in local metric
/// coordinates, created per quad and discarded when its quad is done.
///
/// `elev` is row-major `[lat][lon]` and always matches the coordinate
/// lengths.  Masked-out points are excluded from means and error
/// computations but stay in the raw array so the transform sees a complete
/// rectangular sampling.
#[derive(Debug, Clone)]
pub struct TerrainCell {
    /// Latitude samples as metre offsets from the window origin.
    pub lat: Vec<f64>,
    /// Longitude samples as metre offsets from the window origin.
    pub lon: Vec<f64>,
    /// Latitude samples in degrees (kept for triangle masking).
    pub lat_deg: Vec<f64>,
    /// Longitude samples in degrees.
    pub lon_deg: Vec<f64>,
    /// Elevation in metres, row-major `[lat][lon]`.
    pub elev: Vec<f64>,
    /// Largest adjacent latitude sample spacing, metres.
    pub wlat: f64,
    /// Largest adjacent longitude sample spacing, metres.
    pub wlon: f64,
    /// In-polygon flags, row-major; `None` means the full rectangle.
    pub mask: Option<Vec<bool>>,
}

impl TerrainCell {
    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }

    #[inline]
    pub fn get(&self, j: usize, i: usize) -> f64 {
        self.elev[j * self.lon.len() + i]
    }

    #[inline]
    pub fn set(&mut self, j: usize, i: usize, val: f64) {
        self.elev[j * self.lon.len() + i] = val;
    }

    /// True if the point at flat index `idx` is inside the cell's polygon.
    #[inline]
    pub fn in_mask(&self, idx: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m[idx])
    }

    /// Number of in-polygon points.
    pub fn mask_count(&self) -> usize {
        match &self.mask {
            Some(m) => m.iter().filter(|&&b| b).count(),
            None => self.elev.len(),
        }
    }

    /// Elevation range over the in-polygon points; `None` when the mask
    /// is empty.
    pub fn masked_min_max(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for (idx, &v) in self.elev.iter().enumerate() {
            if self.in_mask(idx) {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                    None => (v, v),
                });
            }
        }
        range
    }

    /// Mean elevation over the in-polygon points.
    pub fn masked_mean(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (idx, &v) in self.elev.iter().enumerate() {
            if self.in_mask(idx) {
                sum += v;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    /// Subtract the masked mean from the whole field so the DC mode does
    /// not bias the flux estimate. Returns the mean that was removed.
    pub fn center_on_mask(&mut self) -> f64 {
        let mean = self.masked_mean();
        for v in &mut self.elev {
            *v -= mean;
        }
        mean
    }
}

// ── Global grid ───────────────────────────────────────────────────────────────

/// The full terrain grid handed in by the ingestion collaborators: ordered
/// degree coordinates and a matching row-major elevation array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    /// Latitude samples in degrees, ascending.
    pub lat: Vec<f64>,
    /// Longitude samples in degrees, ascending.
    pub lon: Vec<f64>,
    /// Elevation in metres, row-major `[lat][lon]`.
    pub elev: Vec<f64>,
}

impl TerrainGrid {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>, elev: Vec<f64>) -> Self {
        debug_assert_eq!(elev.len(), lat.len() * lon.len());
        Self { lat, lon, elev }
    }

    /// Index of the sample closest to `val`.
    pub fn closest_idx(arr: &[f64], val: f64) -> usize {
        let mut best = 0usize;
        let mut best_d = f64::INFINITY;
        for (i, &a) in arr.iter().enumerate() {
            let d = (a - val).abs();
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_2x3(elev: Vec<f64>, mask: Option<Vec<bool>>) -> TerrainCell {
        TerrainCell {
            lat: vec![0.0, 1000.0],
            lon: vec![0.0, 1000.0, 2000.0],
            lat_deg: vec![50.0, 50.01],
            lon_deg: vec![10.0, 10.01, 10.02],
            elev,
            wlat: 1000.0,
            wlon: 1000.0,
            mask,
        }
    }

    #[test]
    fn masked_mean_ignores_out_of_polygon_points() {
        let mask = vec![true, true, false, false, true, true];
        let cell = cell_2x3(vec![1.0, 3.0, 100.0, -100.0, 5.0, 7.0], Some(mask));
        assert_eq!(cell.masked_mean(), 4.0);
        assert_eq!(cell.mask_count(), 4);
    }

    #[test]
    fn center_on_mask_shifts_the_whole_field() {
        let mask = vec![true, true, false, false, true, true];
        let mut cell = cell_2x3(vec![1.0, 3.0, 100.0, -100.0, 5.0, 7.0], Some(mask));
        let removed = cell.center_on_mask();
        assert_eq!(removed, 4.0);
        assert_eq!(cell.get(0, 0), -3.0);
        // Out-of-polygon points are shifted too; they stay in the raw array.
        assert_eq!(cell.get(0, 2), 96.0);
        assert!(cell.masked_mean().abs() < 1e-12);
    }

    #[test]
    fn masked_min_max_spans_only_in_polygon_values() {
        let mask = vec![true, true, false, false, true, true];
        let cell = cell_2x3(vec![1.0, 3.0, 100.0, -100.0, 5.0, 7.0], Some(mask));
        assert_eq!(cell.masked_min_max(), Some((1.0, 7.0)));

        let empty = cell_2x3(vec![0.0; 6], Some(vec![false; 6]));
        assert_eq!(empty.masked_min_max(), None);
    }

    #[test]
    fn closest_idx_picks_nearest_sample() {
        let arr = [50.0, 50.5, 51.0, 51.5];
        assert_eq!(TerrainGrid::closest_idx(&arr, 50.6), 1);
        assert_eq!(TerrainGrid::closest_idx(&arr, 49.0), 0);
        assert_eq!(TerrainGrid::closest_idx(&arr, 60.0), 3);
    }
}
