//! Image-to-catalog source matching.
//!
//! A [`MatchSession`] links the detections of one image to the entries of a
//! reference catalog:
//!
//! 1. **Copy**: both source sets are cloned into the session, so nothing the
//!    session does is visible through the caller's collections.
//! 2. **Project**: every image source's pixel position is mapped to the sky
//!    with the session's [`CoordinateProjector`].
//! 3. **Join**: the [`SpatialJoiner`] emits every image/catalog pair within
//!    the match radius, possibly many-to-many.
//! 4. **Resolve**: duplicates are removed side by side (see [`resolve`]),
//!    leaving a one-to-one correspondence.
//!
//! An empty result is an error ([`MatchError::NoMatchFound`]). A failed run
//! leaves the session untouched. Replacing a source set with
//! [`MatchSession::set_image_sources`] or [`MatchSession::set_catalog_sources`]
//! empties the match list until the next successful
//! [`find_matches`](MatchSession::find_matches).

pub mod resolve;

use tracing::debug;

use crate::error::MatchError;
use crate::join::{SourceMatch, SpatialJoiner};
use crate::projection::CoordinateProjector;
use crate::Source;

pub use resolve::{MatchSide, PassOrder, resolve_one_to_one, resolve_side};

/// Parameters of a matching run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Maximum separation of a legal match, in the joiner's distance unit
    /// (arcseconds for [`AngularJoiner`](crate::AngularJoiner)). Must be > 0.
    pub match_radius: f64,
    /// Order of the two duplicate-removal passes.
    pub pass_order: PassOrder,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_radius: 1.0,
            pass_order: PassOrder::ImageFirst,
        }
    }
}

/// Summary of the separations in a match list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchStats {
    pub num_matches: usize,
    /// Root-mean-square separation.
    pub rms: f64,
    /// Median separation.
    pub median: f64,
    /// Largest separation.
    pub max: f64,
}

impl MatchStats {
    /// Statistics of `matches`, or `None` when the list is empty.
    pub fn from_matches(matches: &[SourceMatch]) -> Option<Self> {
        if matches.is_empty() {
            return None;
        }
        let n = matches.len();
        let mut dists: Vec<f64> = matches.iter().map(|m| m.distance).collect();
        dists.sort_by(f64::total_cmp);

        let rms = (dists.iter().map(|d| d * d).sum::<f64>() / n as f64).sqrt();
        let median = if n % 2 == 1 {
            dists[n / 2]
        } else {
            0.5 * (dists[n / 2 - 1] + dists[n / 2])
        };
        Some(Self {
            num_matches: n,
            rms,
            median,
            max: dists[n - 1],
        })
    }
}

fn validate_radius(radius: f64) -> Result<(), MatchError> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(MatchError::InvalidArgument(format!(
            "match radius must be finite and > 0, got {radius}"
        )))
    }
}

/// A one-to-one matching between an image source set and a catalog source set.
///
/// The session owns private copies of both sets. Image copies gain their sky
/// position during projection; catalog copies are never modified. Matches
/// refer to sources by index into [`image_sources`](Self::image_sources) and
/// [`catalog_sources`](Self::catalog_sources).
#[derive(Debug, Clone)]
pub struct MatchSession<P, Pr, J> {
    catalog: Vec<Source<P>>,
    image: Vec<Source<P>>,
    projector: Pr,
    joiner: J,
    config: MatchConfig,
    matches: Vec<SourceMatch>,
}

impl<P, Pr, J> MatchSession<P, Pr, J>
where
    P: Clone,
    Pr: CoordinateProjector,
    J: SpatialJoiner,
{
    /// Copy both source sets and match them within `match_radius`.
    ///
    /// Fails with [`MatchError::InvalidArgument`] if the radius is not
    /// positive, [`MatchError::Projection`] if the projector fails, and
    /// [`MatchError::NoMatchFound`] if no correspondence survives.
    pub fn new(
        catalog: &[Source<P>],
        image: &[Source<P>],
        projector: Pr,
        joiner: J,
        match_radius: f64,
    ) -> Result<Self, MatchError> {
        let config = MatchConfig {
            match_radius,
            ..Default::default()
        };
        Self::with_config(catalog, image, projector, joiner, config)
    }

    /// Like [`new`](Self::new), with every parameter taken from `config`.
    pub fn with_config(
        catalog: &[Source<P>],
        image: &[Source<P>],
        projector: Pr,
        joiner: J,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        validate_radius(config.match_radius)?;
        let mut session = Self {
            catalog: catalog.to_vec(),
            image: image.to_vec(),
            projector,
            joiner,
            config,
            matches: Vec::new(),
        };
        session.find_matches()?;
        Ok(session)
    }

    /// Replace the match radius. Matching is not re-run; call
    /// [`find_matches`](Self::find_matches) to apply it.
    pub fn set_match_radius(&mut self, match_radius: f64) -> Result<(), MatchError> {
        validate_radius(match_radius)?;
        self.config.match_radius = match_radius;
        Ok(())
    }

    /// Replace the pass order. Matching is not re-run.
    pub fn set_pass_order(&mut self, pass_order: PassOrder) {
        self.config.pass_order = pass_order;
    }

    /// Replace the projector. Matching is not re-run.
    pub fn set_projector(&mut self, projector: Pr) {
        self.projector = projector;
    }

    /// Copy in a new image source set.
    ///
    /// Clears the match list, whose indices referred to the old set.
    pub fn set_image_sources(&mut self, image: &[Source<P>]) {
        self.image = image.to_vec();
        self.matches.clear();
    }

    /// Copy in a new catalog source set.
    ///
    /// Clears the match list, whose indices referred to the old set.
    pub fn set_catalog_sources(&mut self, catalog: &[Source<P>]) {
        self.catalog = catalog.to_vec();
        self.matches.clear();
    }

    /// Run projection, join and resolution with the current configuration.
    ///
    /// On success the projected image sources and the new match list replace
    /// the previous ones. On failure the session is left as it was.
    pub fn find_matches(&mut self) -> Result<&[SourceMatch], MatchError> {
        let projected = self.project_image()?;
        debug!("Projected {} image sources", projected.len());

        let candidates = self
            .joiner
            .join(&projected, &self.catalog, self.config.match_radius);
        let num_candidates = candidates.len();

        let [first, second] = self.config.pass_order.sides();
        let after_first = resolve_side(candidates, first);
        let num_after_first = after_first.len();
        let matches = resolve_side(after_first, second);
        debug!(
            "Resolved {} candidates: {} after {:?} pass, {} after {:?} pass",
            num_candidates,
            num_after_first,
            first,
            matches.len(),
            second
        );

        if matches.is_empty() {
            debug!(
                "No matches: {} image sources, {} catalog sources, radius {}",
                projected.len(),
                self.catalog.len(),
                self.config.match_radius
            );
            return Err(MatchError::NoMatchFound {
                image: projected.len(),
                catalog: self.catalog.len(),
            });
        }

        self.image = projected;
        self.matches = matches;
        Ok(&self.matches)
    }

    /// Copies of the image sources with their sky positions filled in.
    fn project_image(&self) -> Result<Vec<Source<P>>, MatchError> {
        self.image
            .iter()
            .enumerate()
            .map(|(idx, source)| -> Result<Source<P>, MatchError> {
                let [x, y] = source.pixel.ok_or_else(|| {
                    MatchError::InvalidArgument(format!("image source {idx} has no pixel position"))
                })?;
                let (a, b) = self.projector.project(x, y)?;
                Ok(Source {
                    sky: Some([a, b]),
                    ..source.clone()
                })
            })
            .collect()
    }
}

impl<P, Pr, J> MatchSession<P, Pr, J> {
    /// The one-to-one match list of the last successful run, or empty after
    /// a source set was replaced.
    pub fn matches(&self) -> &[SourceMatch] {
        &self.matches
    }

    /// Matches with their sources resolved: `(image, catalog, distance)`.
    pub fn pairs(&self) -> impl Iterator<Item = (&Source<P>, &Source<P>, f64)> + '_ {
        self.matches.iter().filter_map(|m| {
            let image = self.image.get(m.image)?;
            let catalog = self.catalog.get(m.catalog)?;
            Some((image, catalog, m.distance))
        })
    }

    /// Separation statistics of the current match list.
    pub fn stats(&self) -> Option<MatchStats> {
        MatchStats::from_matches(&self.matches)
    }

    /// The session's image sources (projected after a successful run).
    pub fn image_sources(&self) -> &[Source<P>] {
        &self.image
    }

    /// The session's catalog sources.
    pub fn catalog_sources(&self) -> &[Source<P>] {
        &self.catalog
    }

    pub fn match_radius(&self) -> f64 {
        self.config.match_radius
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn projector(&self) -> &Pr {
        &self.projector
    }

    pub fn joiner(&self) -> &J {
        &self.joiner
    }
}
