//! Coordinate and polygon utilities.
//!
//! Latitude/longitude arrays are converted to local metric offsets about a
//! fixed origin with the haversine formula, and triangular cells are masked
//! onto the rectangular terrain window with a crossing-ray point-in-polygon
//! test.  All coordinate math uses f64.

use crate::error::{PipelineError, Result};

/// Earth radius used by the metric conversion, in kilometres.
const HAVERSINE_RADIUS_KM: f64 = 6373.0;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lon1: f64, lon2: f64, lat1: f64, lat2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();

    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    HAVERSINE_RADIUS_KM * c
}

/// Convert an ordered latitude array (degrees) to metre offsets from its
/// first element, holding longitude fixed at `fix_lon`.
pub fn lat_to_meters(lat: &[f64], fix_lon: f64) -> Vec<f64> {
    let origin = lat[0];
    lat.iter()
        .map(|&v| haversine_km(fix_lon, fix_lon, origin, v) * 1000.0)
        .collect()
}

/// Convert an ordered longitude array (degrees) to metre offsets from its
/// first element, holding latitude fixed at `fix_lat`.
pub fn lon_to_meters(lon: &[f64], fix_lat: f64) -> Vec<f64> {
    let origin = lon[0];
    lon.iter()
        .map(|&v| haversine_km(origin, v, fix_lat, fix_lat) * 1000.0)
        .collect()
}

// ── Triangles ─────────────────────────────────────────────────────────────────

/// A triangular cell in (lon, lat) space.
///
/// Vertices are rescaled to the unit square spanned by their own bounding
/// box before any containment test, so the polygon test is insensitive to
/// the absolute coordinate scale of the grid.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Closed polygon in normalized coordinates: 3 vertices + repeat of the
    /// first, each as (x, y) = (lon, lat).
    polygon: [[f64; 2]; 4],
    lon_min: f64,
    lon_span: f64,
    lat_min: f64,
    lat_span: f64,
}

impl Triangle {
    /// Build a triangle from its latitude and longitude vertices (degrees).
    ///
    /// Fails with `InvalidGeometry` when the vertices are collinear or the
    /// bounding box collapses on an axis.
    pub fn new(lat_verts: &[f64; 3], lon_verts: &[f64; 3]) -> Result<Self> {
        let lon_min = lon_verts.iter().cloned().fold(f64::INFINITY, f64::min);
        let lon_max = lon_verts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lat_min = lat_verts.iter().cloned().fold(f64::INFINITY, f64::min);
        let lat_max = lat_verts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let lon_span = lon_max - lon_min;
        let lat_span = lat_max - lat_min;
        if lon_span <= 0.0 || lat_span <= 0.0 {
            return Err(PipelineError::InvalidGeometry(format!(
                "triangle bounding box collapsed (lon span {lon_span}, lat span {lat_span})"
            )));
        }

        let mut polygon = [[0.0; 2]; 4];
        for (i, p) in polygon.iter_mut().take(3).enumerate() {
            p[0] = (lon_verts[i] - lon_min) / lon_span;
            p[1] = (lat_verts[i] - lat_min) / lat_span;
        }
        polygon[3] = polygon[0];

        // Signed area of the normalized triangle (shoelace).
        let a = polygon[0];
        let b = polygon[1];
        let c = polygon[2];
        let area = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]));
        if area.abs() < 1e-12 {
            return Err(PipelineError::InvalidGeometry(
                "triangle has zero area".to_string(),
            ));
        }

        Ok(Self { polygon, lon_min, lon_span, lat_min, lat_span })
    }

    /// Containment test for a point in degrees. Boundary points count as
    /// inside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let x = (lon - self.lon_min) / self.lon_span;
        let y = (lat - self.lat_min) / self.lat_span;
        is_inside(&self.polygon, x, y)
    }

    /// Boolean mask over a lat × lon mesh (row-major, `[lat][lon]`), true
    /// for points inside the triangle.
    ///
    /// Fails with `InvalidGeometry` when no grid point falls inside.
    pub fn mask_for(&self, lat: &[f64], lon: &[f64]) -> Result<Vec<bool>> {
        let mut mask = vec![false; lat.len() * lon.len()];
        let mut hits = 0usize;
        for (j, &la) in lat.iter().enumerate() {
            for (i, &lo) in lon.iter().enumerate() {
                if self.contains(la, lo) {
                    mask[j * lon.len() + i] = true;
                    hits += 1;
                }
            }
        }
        if hits == 0 {
            return Err(PipelineError::InvalidGeometry(
                "triangle mask selects no grid points".to_string(),
            ));
        }
        Ok(mask)
    }
}

/// Crossing-ray polygon containment on a closed vertex list.
/// Points on an edge or vertex return true.
fn is_inside(polygon: &[[f64; 2]], x: f64, y: f64) -> bool {
    let length = polygon.len() - 1;
    let mut dy2 = y - polygon[0][1];
    let mut intersections = 0u32;
    let mut ii = 0;
    let mut jj = 1;

    while ii < length {
        let dy = dy2;
        dy2 = y - polygon[jj][1];

        // Only consider edges not entirely above/below/right of the point.
        if dy * dy2 <= 0.0 && (x >= polygon[ii][0] || x >= polygon[jj][0]) {
            if dy < 0.0 || dy2 < 0.0 {
                // Non-horizontal edge: find the crossing abscissa.
                let f = dy * (polygon[jj][0] - polygon[ii][0]) / (dy - dy2) + polygon[ii][0];
                if x > f {
                    intersections += 1;
                } else if x == f {
                    return true;
                }
            } else if dy2 == 0.0
                && (x == polygon[jj][0]
                    || (dy == 0.0 && (x - polygon[ii][0]) * (x - polygon[jj][0]) <= 0.0))
            {
                // Point on an upper peak or on a horizontal edge.
                return true;
            }
        }

        ii = jj;
        jj += 1;
    }

    intersections & 1 == 1
}

// ── Triangulation ─────────────────────────────────────────────────────────────

/// Triangle vertex lists indexed by triangle id.
///
/// Adjacent indices `2q` and `2q + 1` form the quad pair `q`; the batch
/// driver iterates over the even ("rect") indices.
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub lat_verts: Vec<[f64; 3]>,
    pub lon_verts: Vec<[f64; 3]>,
}

impl Triangulation {
    pub fn len(&self) -> usize {
        self.lat_verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat_verts.is_empty()
    }

    /// Combined vertex lists of the quad starting at triangle `idx`.
    pub fn quad_verts(&self, idx: usize) -> (Vec<f64>, Vec<f64>) {
        let mut lat = self.lat_verts[idx].to_vec();
        let mut lon = self.lon_verts[idx].to_vec();
        lat.extend_from_slice(&self.lat_verts[idx + 1]);
        lon.extend_from_slice(&self.lon_verts[idx + 1]);
        (lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_one_degree_latitude() {
        // One degree of latitude on a 6373 km sphere is ~111.2 km.
        let d = haversine_km(10.0, 10.0, 50.0, 51.0);
        assert!((d - 111.2).abs() < 0.2, "got {d} km");
    }

    #[test]
    fn lat_to_meters_starts_at_origin_and_increases() {
        let lat = [50.0, 50.25, 50.5, 51.0];
        let m = lat_to_meters(&lat, 10.0);
        assert_eq!(m[0], 0.0);
        for w in m.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert!((m[3] - 111_200.0).abs() < 200.0);
    }

    #[test]
    fn triangle_mask_covers_lower_half() {
        // Lower-left triangle of the unit square in degree space.
        let tri = Triangle::new(&[0.0, 0.0, 1.0], &[0.0, 1.0, 0.0]).unwrap();
        let lat: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let lon = lat.clone();
        let mask = tri.mask_for(&lat, &lon).unwrap();

        // Diagonal and below is inside; strictly above is outside.
        assert!(mask[0]); // (0, 0)
        assert!(mask[5 * 11 + 5]); // on the hypotenuse
        assert!(!mask[10 * 11 + 10]); // opposite corner
        let hits = mask.iter().filter(|&&m| m).count();
        assert!(hits > 50 && hits < 80, "got {hits} in-triangle points");
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let collinear = Triangle::new(&[0.0, 0.5, 1.0], &[0.0, 0.5, 1.0]);
        assert!(matches!(collinear, Err(PipelineError::InvalidGeometry(_))));

        let flat = Triangle::new(&[0.0, 0.0, 0.0], &[0.0, 0.5, 1.0]);
        assert!(flat.is_err());
    }

    #[test]
    fn mask_with_no_grid_points_is_invalid_geometry() {
        let tri = Triangle::new(&[0.0, 0.0, 0.4], &[0.0, 0.4, 0.0]).unwrap();
        // Grid entirely outside the triangle.
        let lat = [0.8, 0.9, 1.0];
        let lon = [0.8, 0.9, 1.0];
        assert!(tri.mask_for(&lat, &lon).is_err());
    }
}
