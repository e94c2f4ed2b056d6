//! Radius-bounded spatial join between projected image sources and catalog sources.
//!
//! A join emits every `(image, catalog)` pair whose separation is within the
//! radius. The output is a raw candidate list: one image source may pair with
//! several catalog sources and vice versa. Making it one-to-one is the job of
//! [`crate::matcher::resolve`].

use tracing::debug;

use crate::Source;
use crate::skyindex::{SkyIndex, angular_separation};

/// One correspondence between an image source and a catalog source.
///
/// Produced in bulk by a join (possibly many-to-many) and pruned to a
/// one-to-one list by the resolver.
///
/// Sources are referenced by position in the slices handed to
/// [`SpatialJoiner::join`]; the position is the source's identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMatch {
    /// Index into the image source slice.
    pub image: usize,
    /// Index into the catalog source slice.
    pub catalog: usize,
    /// Separation, in the same unit as the join radius.
    pub distance: f64,
}

/// Radius-bounded nearest-neighbour join.
///
/// Implementations must emit only pairs with `0 <= distance <= radius`, must
/// skip sources without a sky position, and may emit pairs in any order.
pub trait SpatialJoiner {
    fn join<P>(&self, image: &[Source<P>], catalog: &[Source<P>], radius: f64) -> Vec<SourceMatch>;
}

/// Join on Euclidean distance in the `(a, b)` sky plane.
///
/// Suitable when the sky coordinates are already planar (tangent-plane
/// offsets, or a small field far from the poles where RA compression is
/// acceptable). Radius and distance share the unit of the sky coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarJoiner;

impl SpatialJoiner for PlanarJoiner {
    fn join<P>(&self, image: &[Source<P>], catalog: &[Source<P>], radius: f64) -> Vec<SourceMatch> {
        // Catalog positions sorted on the first axis so each image source only
        // scans the strip [a - radius, a + radius].
        let mut sorted: Vec<(usize, [f64; 2])> = catalog
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| s.sky.map(|sky| (idx, sky)))
            .collect();
        sorted.sort_by(|l, r| l.1[0].total_cmp(&r.1[0]));

        let radius_sq = radius * radius;
        let mut candidates = Vec::new();
        for (img_idx, source) in image.iter().enumerate() {
            let Some([a, b]) = source.sky else {
                continue;
            };
            let first = sorted.partition_point(|(_, sky)| sky[0] < a - radius);
            for &(cat_idx, [ca, cb]) in &sorted[first..] {
                if ca > a + radius {
                    break;
                }
                let da = ca - a;
                let db = cb - b;
                let d2 = da * da + db * db;
                if d2 <= radius_sq {
                    candidates.push(SourceMatch {
                        image: img_idx,
                        catalog: cat_idx,
                        distance: d2.sqrt().min(radius),
                    });
                }
            }
        }

        debug!(
            "Planar join: {} image x {} catalog within {} -> {} candidates",
            image.len(),
            catalog.len(),
            radius,
            candidates.len()
        );
        candidates
    }
}

/// Join on great-circle separation.
///
/// Sky coordinates are `(ra, dec)` in degrees; the radius and every emitted
/// distance are in arcseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularJoiner;

impl SpatialJoiner for AngularJoiner {
    fn join<P>(&self, image: &[Source<P>], catalog: &[Source<P>], radius: f64) -> Vec<SourceMatch> {
        let radius_rad = (radius / 3600.0).to_radians();
        let index = SkyIndex::build(SkyIndex::nside_for(radius_rad, catalog.len()), catalog);

        let mut candidates = Vec::new();
        for (img_idx, source) in image.iter().enumerate() {
            let Some(dir) = source.uvec() else {
                continue;
            };
            for (cat_idx, cat_dir) in index.query(&dir, radius_rad) {
                let distance = angular_separation(&dir, &cat_dir).to_degrees() * 3600.0;
                if distance <= radius {
                    candidates.push(SourceMatch {
                        image: img_idx,
                        catalog: cat_idx,
                        distance,
                    });
                }
            }
        }

        debug!(
            "Angular join: {} image x {} catalog within {:.3}\" (nside {}) -> {} candidates",
            image.len(),
            catalog.len(),
            radius,
            index.nside(),
            candidates.len()
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projected(a: f64, b: f64) -> Source {
        Source {
            pixel: Some([0.0, 0.0]),
            sky: Some([a, b]),
            payload: (),
        }
    }

    fn pairs(candidates: &[SourceMatch]) -> Vec<(usize, usize)> {
        let mut out: Vec<(usize, usize)> = candidates.iter().map(|c| (c.image, c.catalog)).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn planar_join_emits_many_to_many() {
        let image = vec![projected(0.0, 0.0), projected(1.0, 0.0)];
        let catalog = vec![
            Source::catalog(0.5, 0.0, ()),
            Source::catalog(10.0, 10.0, ()),
            Source::catalog(0.3, 0.1, ()),
        ];
        let candidates = PlanarJoiner.join(&image, &catalog, 0.8);
        assert_eq!(pairs(&candidates), vec![(0, 0), (0, 2), (1, 0), (1, 2)]);
        for c in &candidates {
            assert!(c.distance >= 0.0 && c.distance <= 0.8);
        }
    }

    #[test]
    fn planar_join_includes_boundary() {
        let image = vec![projected(0.0, 0.0)];
        let catalog = vec![Source::catalog(0.0, 2.0, ())];
        let candidates = PlanarJoiner.join(&image, &catalog, 2.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].distance, 2.0);
    }

    #[test]
    fn join_skips_unprojected_sources() {
        let image = vec![Source::image(0.0, 0.0, ()), projected(5.0, 5.0)];
        let catalog = vec![Source::catalog(0.0, 0.0, ()), Source::catalog(5.0, 5.0, ())];
        assert_eq!(pairs(&PlanarJoiner.join(&image, &catalog, 1.0)), vec![(1, 1)]);
        assert_eq!(pairs(&AngularJoiner.join(&image, &catalog, 1.0)), vec![(1, 1)]);
    }

    #[test]
    fn angular_join_distance_in_arcsec() {
        let image = vec![projected(150.0, 2.0)];
        let catalog = vec![
            Source::catalog(150.0, 2.0 + 1.5 / 3600.0, ()),
            Source::catalog(150.0, 2.0 + 4.0 / 3600.0, ()),
        ];
        let candidates = AngularJoiner.join(&image, &catalog, 3.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].catalog, 0);
        assert!((candidates[0].distance - 1.5).abs() < 1e-6);
    }

    #[test]
    fn angular_join_across_ra_zero() {
        let image = vec![projected(359.9999, 0.0)];
        let catalog = vec![Source::catalog(0.0001, 0.0, ())];
        let candidates = AngularJoiner.join(&image, &catalog, 1.0);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].distance - 0.72).abs() < 1e-6);
    }

    #[test]
    fn angular_join_wide_radius_small_catalog() {
        let image = vec![projected(5.73, 0.0)];
        let catalog = vec![Source::catalog(10.0, 0.0, ())];
        let candidates = AngularJoiner.join(&image, &catalog, 85.0 * 3600.0);
        assert_eq!(pairs(&candidates), vec![(0, 0)]);
        assert!((candidates[0].distance - 4.27 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn angular_join_matches_brute_force_for_tiny_catalogs() {
        let mut state: u64 = 0x1234_5678_9abc_def1;
        let mut rng = || -> f64 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as f64) / (u64::MAX as f64)
        };

        for dec in [-75.0, -30.0, 0.0, 20.0, 50.0, 80.0] {
            for n_catalog in 1..=3 {
                let image: Vec<Source> = (0..4)
                    .map(|_| projected(rng() * 360.0, dec + rng() * 8.0 - 4.0))
                    .collect();
                let catalog: Vec<Source> = (0..n_catalog)
                    .map(|_| {
                        Source::catalog(rng() * 360.0, (rng() * 2.0 - 1.0).asin().to_degrees(), ())
                    })
                    .collect();
                let radius = (20.0 + rng() * 100.0) * 3600.0;

                let mut expected = Vec::new();
                for (i, img) in image.iter().enumerate() {
                    for (c, cat) in catalog.iter().enumerate() {
                        let sep = angular_separation(&img.uvec().unwrap(), &cat.uvec().unwrap())
                            .to_degrees()
                            * 3600.0;
                        if sep <= radius {
                            expected.push((i, c));
                        }
                    }
                }

                let got = pairs(&AngularJoiner.join(&image, &catalog, radius));
                assert_eq!(got, expected, "dec {} catalog size {}", dec, n_catalog);
            }
        }
    }

    #[test]
    fn empty_inputs_yield_no_candidates() {
        let empty: Vec<Source> = Vec::new();
        let catalog = vec![Source::catalog(0.0, 0.0, ())];
        assert!(PlanarJoiner.join(&empty, &catalog, 1.0).is_empty());
        assert!(AngularJoiner.join(&catalog, &empty, 1.0).is_empty());
    }
}
