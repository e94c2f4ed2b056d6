//! # skymatch
//!
//! One-to-one matching of image detections against a reference star catalog.
//!
//! Given the sources detected on an image (pixel coordinates), a catalog of
//! reference sources (sky coordinates) and a pixel → sky projection,
//! `skymatch` projects the detections onto the sky, finds every
//! image/catalog pair within a match radius, and reduces those candidates to
//! a list in which every detection and every catalog entry appears at most
//! once. Downstream steps such as astrometric fitting can then treat each
//! pair as a unique correspondence.
//!
//! ## Example
//!
//! ```
//! use skymatch::{AngularJoiner, MatchSession, Source, TanProjector};
//!
//! // 1"/pixel TAN WCS centred on the image
//! let wcs = TanProjector::from_scale([150.0, 2.0], [512.0, 512.0], 1.0, 0.0);
//!
//! let detections = vec![
//!     Source::image(512.0, 512.0, "a"),
//!     Source::image(612.0, 480.0, "b"),
//! ];
//! let catalog: Vec<Source<&str>> = detections
//!     .iter()
//!     .map(|d| {
//!         let [x, y] = d.pixel.unwrap();
//!         let (ra, dec) = wcs.pixel_to_radec(x + 0.3, y - 0.2);
//!         Source::catalog(ra, dec, "ref")
//!     })
//!     .collect();
//!
//! // Match within 2 arcseconds
//! let session = MatchSession::new(&catalog, &detections, wcs, AngularJoiner, 2.0).unwrap();
//! assert_eq!(session.matches().len(), 2);
//! for (det, reference, sep_arcsec) in session.pairs() {
//!     println!("{} -> {} ({:.2}\")", det.payload, reference.payload, sep_arcsec);
//! }
//! ```
//!
//! ## Pipeline
//!
//! 1. **Copy**: the session clones both source sets; callers' data is never touched
//! 2. **Project**: image pixel positions → sky via a [`CoordinateProjector`]
//! 3. **Join**: all pairs within the radius via a [`SpatialJoiner`] (many-to-many)
//! 4. **Resolve**: greedy removal of the farther of any two candidates sharing a
//!    source, first by image source then by catalog source (configurable)
//!
//! The resolution is greedy and local; it does not compute a minimum-total-distance
//! assignment.

pub mod error;
pub mod join;
pub mod matcher;
pub mod projection;
pub mod skyindex;
mod source;

pub use error::MatchError;
pub use join::{AngularJoiner, PlanarJoiner, SourceMatch, SpatialJoiner};
pub use matcher::{MatchConfig, MatchSession, MatchSide, MatchStats, PassOrder};
pub use projection::{CoordinateProjector, ProjectionError, TanProjector, projector_fn};
pub use source::*;
