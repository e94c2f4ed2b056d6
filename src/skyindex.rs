//! Spatial index over source sky positions for fast cone (angular-radius) searches.
//!
//! `SkyIndex` stores sources in a HEALPix-style spherical binning:
//! latitude is partitioned into `3 * nside` bins in `z = sin(dec)`, and
//! longitude into `4 * nside` bins in right ascension, for a total of
//! `12 * nside^2` cells. Each cell maps to a compact slice of source indices.
//!
//! Query flow:
//! 1. Compute candidate cells intersecting the cone around a direction.
//! 2. Scan only sources in those cells.
//! 3. Apply exact angular filtering using a dot-product threshold.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::Vector3;

use crate::Source;

/// Upper bound on `nside` picked by [`SkyIndex::nside_for`].
const MAX_NSIDE: u32 = 1024;

#[derive(Debug, Clone)]
pub struct SkyIndex {
    nside: u32,
    n_lat: u32,
    n_lon: u32,
    /// Unit vectors of indexed sources, parallel to `source_ids`.
    uvecs: Vec<Vector3<f64>>,
    /// Position of each indexed source in the slice the index was built from.
    source_ids: Vec<usize>,
    cell_offsets: Vec<u32>,
    entry_indices: Vec<u32>,
}

impl SkyIndex {
    /// Index every source of `sources` that has a sky position.
    ///
    /// `nside` controls resolution and must be greater than zero.
    pub fn build<P>(nside: u32, sources: &[Source<P>]) -> Self {
        assert!(nside > 0, "nside must be > 0");
        let n_lat = 3 * nside;
        let n_lon = 4 * nside;
        let n_cells = (n_lat * n_lon) as usize;

        let mut uvecs = Vec::with_capacity(sources.len());
        let mut source_ids = Vec::with_capacity(sources.len());
        let mut bins: Vec<Vec<u32>> = vec![Vec::new(); n_cells];
        for (idx, source) in sources.iter().enumerate() {
            let Some([ra, dec]) = source.sky else {
                continue;
            };
            let Some(uvec) = source.uvec() else {
                continue;
            };
            let cell = Self::cell_for_radec(n_lat, n_lon, ra.to_radians(), dec.to_radians());
            bins[cell as usize].push(uvecs.len() as u32);
            uvecs.push(uvec);
            source_ids.push(idx);
        }

        let mut cell_offsets = Vec::with_capacity(n_cells + 1);
        let mut entry_indices = Vec::with_capacity(uvecs.len());
        cell_offsets.push(0);
        for cell_bin in bins {
            entry_indices.extend(cell_bin);
            cell_offsets.push(entry_indices.len() as u32);
        }

        Self {
            nside,
            n_lat,
            n_lon,
            uvecs,
            source_ids,
            cell_offsets,
            entry_indices,
        }
    }

    /// Pick a resolution whose cells are no narrower than `radius_rad`,
    /// without allocating many more cells than there are sources.
    pub fn nside_for(radius_rad: f64, n_sources: usize) -> u32 {
        let by_radius = if radius_rad > 0.0 {
            (2.0 / (3.0 * radius_rad)).floor()
        } else {
            MAX_NSIDE as f64
        };
        let by_count = ((n_sources as f64) / 3.0).sqrt().ceil();
        (by_radius.min(by_count).min(MAX_NSIDE as f64) as u32).max(1)
    }

    /// Return the index resolution parameter.
    pub fn nside(&self) -> u32 {
        self.nside
    }

    /// Number of indexed sources (sources without a sky position are skipped).
    pub fn len(&self) -> usize {
        self.uvecs.len()
    }

    /// Return `true` when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.uvecs.is_empty()
    }

    /// Unit vector of the source at `source_id`, if it was indexed.
    pub fn uvec_of(&self, source_id: usize) -> Option<&Vector3<f64>> {
        self.source_ids
            .binary_search(&source_id)
            .ok()
            .map(|entry| &self.uvecs[entry])
    }

    /// Query sources within an angular radius of a unit direction vector.
    ///
    /// Returns `(source_id, uvec)` for every hit, sorted by `source_id`.
    pub fn query(&self, dir: &Vector3<f64>, radius_rad: f64) -> Vec<(usize, Vector3<f64>)> {
        if self.is_empty() {
            return Vec::new();
        }
        let radius = radius_rad.clamp(0.0, PI);
        let cos_radius = radius.cos();

        let dec0 = dir.z.clamp(-1.0, 1.0).asin();
        let dec_min = dec0 - radius;
        let dec_max = dec0 + radius;
        let z_min = dec_min.max(-FRAC_PI_2).sin();
        let z_max = dec_max.min(FRAC_PI_2).sin();

        let mut hits = Vec::new();
        let covers_pole = dec_max >= FRAC_PI_2 || dec_min <= -FRAC_PI_2;

        for lat_bin in Self::z_bin_range(self.n_lat, z_min, z_max) {
            if covers_pole {
                for lon_bin in 0..self.n_lon {
                    self.collect_cell_matches(lat_bin, lon_bin, dir, cos_radius, &mut hits);
                }
                continue;
            }

            // RA half-width of a cap that does not contain a pole
            let lon_step = TAU / self.n_lon as f64;
            let half_span = (radius.sin() / dec0.cos()).clamp(-1.0, 1.0).asin() + lon_step;
            let mut phi = dir.y.atan2(dir.x);
            if phi < 0.0 {
                phi += TAU;
            }

            // A span this wide can wrap back into its own start bin
            if 2.0 * half_span >= TAU - lon_step {
                for lon_bin in 0..self.n_lon {
                    self.collect_cell_matches(lat_bin, lon_bin, dir, cos_radius, &mut hits);
                }
                continue;
            }

            self.for_each_wrapped_lon_bin(phi - half_span, phi + half_span, |lon_bin| {
                self.collect_cell_matches(lat_bin, lon_bin, dir, cos_radius, &mut hits);
            });
        }

        hits.sort_unstable();
        hits.dedup();
        hits.into_iter()
            .map(|entry| (self.source_ids[entry], self.uvecs[entry]))
            .collect()
    }

    fn collect_cell_matches(
        &self,
        lat_bin: u32,
        lon_bin: u32,
        dir: &Vector3<f64>,
        cos_radius: f64,
        out: &mut Vec<usize>,
    ) {
        let cell = (lat_bin * self.n_lon + lon_bin) as usize;
        let start = self.cell_offsets[cell] as usize;
        let end = self.cell_offsets[cell + 1] as usize;

        for &entry in &self.entry_indices[start..end] {
            let entry = entry as usize;
            if dir.dot(&self.uvecs[entry]) >= cos_radius {
                out.push(entry);
            }
        }
    }

    fn for_each_wrapped_lon_bin<F>(&self, lon_min: f64, lon_max: f64, mut f: F)
    where
        F: FnMut(u32),
    {
        let start_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_min));
        let end_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_max));

        if start_bin <= end_bin {
            for lon_bin in start_bin..=end_bin {
                f(lon_bin);
            }
            return;
        }

        for lon_bin in start_bin..self.n_lon {
            f(lon_bin);
        }
        for lon_bin in 0..=end_bin {
            f(lon_bin);
        }
    }

    fn z_bin_range(n_lat: u32, z_min: f64, z_max: f64) -> std::ops::RangeInclusive<u32> {
        Self::z_to_lat_bin(n_lat, z_min)..=Self::z_to_lat_bin(n_lat, z_max)
    }

    fn cell_for_radec(n_lat: u32, n_lon: u32, ra_rad: f64, dec_rad: f64) -> u32 {
        let z = dec_rad.sin().clamp(-1.0, 1.0);
        let lat_bin = Self::z_to_lat_bin(n_lat, z);
        let lon_bin = Self::phi_to_lon_bin(n_lon, wrap_angle(ra_rad));
        lat_bin * n_lon + lon_bin
    }

    fn z_to_lat_bin(n_lat: u32, z: f64) -> u32 {
        let u = ((z.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0);
        ((u * n_lat as f64).floor() as u32).min(n_lat - 1)
    }

    fn phi_to_lon_bin(n_lon: u32, phi: f64) -> u32 {
        let u = (phi / TAU).clamp(0.0, 1.0);
        ((u * n_lon as f64).floor() as u32).min(n_lon - 1)
    }
}

fn wrap_angle(theta_rad: f64) -> f64 {
    theta_rad.rem_euclid(TAU)
}

/// Great-circle separation between two unit vectors, in radians.
///
/// Uses `atan2(|a × b|, a · b)`, which stays accurate at arcsecond scales
/// where `acos` of the dot product loses precision.
pub fn angular_separation(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}
