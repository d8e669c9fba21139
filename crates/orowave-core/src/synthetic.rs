//! Synthetic terrain and triangulations for drivers and tests.
//!
//! Stand-ins for the external ingestion and Delaunay collaborators: a
//! diffusion-smoothed random field, an fBm field, and a regular
//! quad-pair decomposition of a rectangular domain.

use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cell::TerrainGrid;
use crate::geometry::Triangulation;

/// Diffusion-smoothed random terrain in roughly [-1, 1], row-major
/// `[lat][lon]`.
///
/// A seeded uniform field relaxed by `iters` Jacobi steps with wrap-around
/// boundaries, then mean-removed and normalized to half its value range.
pub fn diffusion_terrain(nlat: usize, nlon: usize, seed: u64, iters: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut k: Vec<f64> = (0..nlat * nlon).map(|_| rng.gen::<f64>()).collect();

    let dt = 0.1;
    let mut next = vec![0.0; k.len()];
    for _ in 0..iters {
        for j in 0..nlat {
            let jm = (j + nlat - 1) % nlat;
            let jp = (j + 1) % nlat;
            for i in 0..nlon {
                let im = (i + nlon - 1) % nlon;
                let ip = (i + 1) % nlon;
                let lap = k[j * nlon + im] + k[j * nlon + ip] + k[jm * nlon + i]
                    + k[jp * nlon + i]
                    - 4.0 * k[j * nlon + i];
                next[j * nlon + i] = k[j * nlon + i] + dt * lap;
            }
        }
        std::mem::swap(&mut k, &mut next);
    }

    let mean = k.iter().sum::<f64>() / k.len() as f64;
    for v in &mut k {
        *v -= mean;
    }
    let max = k.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = k.iter().cloned().fold(f64::INFINITY, f64::min);
    let half_range = 0.5 * (max - min);
    if half_range > 0.0 {
        for v in &mut k {
            *v /= half_range;
        }
    }
    k
}

/// fBm terrain via Perlin octaves, unscaled (typically within ±1).
///
/// Per-octave gain is `2^(-h)`, so `h` plays the role of a Hurst exponent.
pub fn fbm_terrain(nlat: usize, nlon: usize, seed: u32, h: f64, octaves: u32) -> Vec<f64> {
    let perlin = Perlin::new(seed);
    let gain = 2.0_f64.powf(-h);
    let base_freq = 4.0;

    let mut out = vec![0.0; nlat * nlon];
    for j in 0..nlat {
        for i in 0..nlon {
            let x = i as f64 / nlon as f64 * base_freq;
            let y = j as f64 / nlat as f64 * base_freq;
            let mut value = 0.0;
            let mut amp = 1.0;
            let mut freq = 1.0;
            for _ in 0..octaves {
                value += amp * perlin.get([x * freq, y * freq]);
                amp *= gain;
                freq *= 2.0;
            }
            out[j * nlon + i] = value;
        }
    }
    out
}

/// Wrap an elevation field into a grid with evenly spaced degree axes.
pub fn synthetic_grid(
    nlat: usize,
    nlon: usize,
    lat_extent: (f64, f64),
    lon_extent: (f64, f64),
    elev: Vec<f64>,
) -> TerrainGrid {
    let lat = linspace(lat_extent.0, lat_extent.1, nlat);
    let lon = linspace(lon_extent.0, lon_extent.1, nlon);
    TerrainGrid::new(lat, lon, elev)
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect()
}

/// Split the domain into `ny × nx` rectangles, each cut into a pair of
/// triangles along its diagonal.
///
/// Triangle ids `2q` and `2q + 1` form quad `q`, matching the adjacency
/// the pipeline expects; process the even ids as rect indices.
pub fn regular_decomposition(
    lat_extent: (f64, f64),
    lon_extent: (f64, f64),
    ny: usize,
    nx: usize,
) -> Triangulation {
    let lat_edges = linspace(lat_extent.0, lat_extent.1, ny + 1);
    let lon_edges = linspace(lon_extent.0, lon_extent.1, nx + 1);

    let mut lat_verts = Vec::with_capacity(2 * nx * ny);
    let mut lon_verts = Vec::with_capacity(2 * nx * ny);
    for jy in 0..ny {
        for jx in 0..nx {
            let (la0, la1) = (lat_edges[jy], lat_edges[jy + 1]);
            let (lo0, lo1) = (lon_edges[jx], lon_edges[jx + 1]);
            // Lower-left triangle, then its upper-right partner.
            lat_verts.push([la0, la0, la1]);
            lon_verts.push([lo0, lo1, lo0]);
            lat_verts.push([la1, la1, la0]);
            lon_verts.push([lo1, lo0, lo1]);
        }
    }
    Triangulation { lat_verts, lon_verts }
}
