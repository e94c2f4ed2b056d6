//! Pixel → sky coordinate projection.
//!
//! The matcher treats the projection as an opaque collaborator behind the
//! [`CoordinateProjector`] trait. Any `Fn(f64, f64) -> Result<(f64, f64), ProjectionError>`
//! is a projector, [`projector_fn`] wraps an infallible closure, and
//! [`TanProjector`] implements the standard FITS TAN (gnomonic) WCS.
//!
//! ## Coordinate conventions
//!
//! - **Pixel coordinates**: whatever frame the detections were measured in; the
//!   projector's CRPIX must be expressed in the same frame.
//! - **Sky coordinates**: `(ra, dec)` in degrees, RA wrapped into `[0, 360)`.

use thiserror::Error;

/// A projector could not map a pixel position onto the sky.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("projection failed at pixel ({x}, {y}): {reason}")]
pub struct ProjectionError {
    pub x: f64,
    pub y: f64,
    pub reason: String,
}

impl ProjectionError {
    pub fn new(x: f64, y: f64, reason: impl Into<String>) -> Self {
        Self {
            x,
            y,
            reason: reason.into(),
        }
    }
}

/// Maps pixel coordinates to sky coordinates.
///
/// Implementations must be pure: the same input always yields the same output,
/// and a call has no side effects. A projector shared between sessions on
/// different threads must also be `Sync`.
pub trait CoordinateProjector {
    /// Project pixel `(x, y)` to sky `(a, b)`, e.g. `(ra, dec)` in degrees.
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError>;
}

impl<F> CoordinateProjector for F
where
    F: Fn(f64, f64) -> Result<(f64, f64), ProjectionError>,
{
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        self(x, y)
    }
}

/// Projector built from an infallible closure. See [`projector_fn`].
#[derive(Clone, Copy)]
pub struct FnProjector<F>(F);

impl<F> std::fmt::Debug for FnProjector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProjector").finish_non_exhaustive()
    }
}

/// Wrap an infallible `(x, y) -> (a, b)` mapping as a projector.
pub fn projector_fn<F>(f: F) -> FnProjector<F>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    FnProjector(f)
}

impl<F> CoordinateProjector for FnProjector<F>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        Ok((self.0)(x, y))
    }
}

// ── TAN projection ─────────────────────────────────────────────────────────

/// Forward gnomonic (TAN) projection.
///
/// Projects celestial point `(ra, dec)` onto the tangent plane at `(crval_ra, crval_dec)`.
/// Returns `(ξ, η)` in radians, or `None` if the point is on or behind the tangent plane.
///
/// Reference: Calabretta & Greisen (2002), FITS WCS Paper II, §5.1.1.
#[inline]
pub fn tan_project(ra: f64, dec: f64, crval_ra: f64, crval_dec: f64) -> Option<(f64, f64)> {
    let da = ra - crval_ra;
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let cos_da = da.cos();

    // cos of the angular distance from the tangent point
    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None;
    }

    let xi = cos_dec * da.sin() / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

/// Inverse gnomonic (TAN) projection.
///
/// Given tangent-plane coordinates `(ξ, η)` in radians at reference point
/// `(crval_ra, crval_dec)`, returns celestial coordinates `(ra, dec)` in radians.
#[inline]
pub fn inverse_tan_project(xi: f64, eta: f64, crval_ra: f64, crval_dec: f64) -> (f64, f64) {
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let rho_sq = xi * xi + eta * eta;

    if rho_sq < 1e-30 {
        return (crval_ra, crval_dec);
    }

    // Native distance from the tangent point: rho = tan(c)
    let rho = rho_sq.sqrt();
    let c = rho.atan();
    let (sin_c, cos_c) = c.sin_cos();

    let dec = (cos_c * sin_dec0 + eta * sin_c * cos_dec0 / rho).asin();
    let ra = crval_ra + (xi * sin_c).atan2(rho * cos_dec0 * cos_c - eta * sin_dec0 * sin_c);
    (ra, dec)
}

/// Pixel offsets from a tangent-plane offset need the inverse CD matrix;
/// singular (|det| < 1e-30) matrices give `None`.
fn cd_inverse(cd: &[[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
    if det.abs() < 1e-30 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [cd[1][1] * inv_det, -cd[0][1] * inv_det],
        [-cd[1][0] * inv_det, cd[0][0] * inv_det],
    ])
}

/// FITS TAN world coordinate system.
///
/// ```text
/// pixel → subtract crpix → CD matrix → tangent plane (deg) → deproject → (ra, dec)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TanProjector {
    /// Reference point on the sky `[ra, dec]` in degrees.
    pub crval: [f64; 2],
    /// Reference pixel `[x, y]`.
    pub crpix: [f64; 2],
    /// CD matrix in degrees per pixel: `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub cd: [[f64; 2]; 2],
}

impl TanProjector {
    pub fn new(crval: [f64; 2], crpix: [f64; 2], cd: [[f64; 2]; 2]) -> Self {
        Self { crval, crpix, cd }
    }

    /// Square pixels of `scale_arcsec` on a side, rotated by `rotation_deg`
    /// (east of north), with no parity flip.
    pub fn from_scale(crval: [f64; 2], crpix: [f64; 2], scale_arcsec: f64, rotation_deg: f64) -> Self {
        let scale_deg = scale_arcsec / 3600.0;
        let (s, c) = rotation_deg.to_radians().sin_cos();
        Self {
            crval,
            crpix,
            cd: [[c * scale_deg, -s * scale_deg], [s * scale_deg, c * scale_deg]],
        }
    }

    /// Approximate pixel scale in arcseconds per pixel from the CD determinant.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt() * 3600.0
    }

    /// Convert pixel coordinates to `(ra, dec)` in degrees.
    pub fn pixel_to_radec(&self, x: f64, y: f64) -> (f64, f64) {
        let u = x - self.crpix[0];
        let v = y - self.crpix[1];
        let xi = (self.cd[0][0] * u + self.cd[0][1] * v).to_radians();
        let eta = (self.cd[1][0] * u + self.cd[1][1] * v).to_radians();

        let (ra, dec) = inverse_tan_project(
            xi,
            eta,
            self.crval[0].to_radians(),
            self.crval[1].to_radians(),
        );
        (wrap_degrees(ra.to_degrees()), dec.to_degrees())
    }

    /// Convert `(ra, dec)` in degrees to pixel coordinates.
    ///
    /// Returns `None` if the position is behind the tangent plane or the CD
    /// matrix is singular.
    pub fn radec_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (xi, eta) = tan_project(
            ra.to_radians(),
            dec.to_radians(),
            self.crval[0].to_radians(),
            self.crval[1].to_radians(),
        )?;
        let inv = cd_inverse(&self.cd)?;
        let (xi, eta) = (xi.to_degrees(), eta.to_degrees());
        let u = inv[0][0] * xi + inv[0][1] * eta;
        let v = inv[1][0] * xi + inv[1][1] * eta;
        Some((u + self.crpix[0], v + self.crpix[1]))
    }
}

impl CoordinateProjector for TanProjector {
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::new(x, y, "non-finite pixel position"));
        }
        let (ra, dec) = self.pixel_to_radec(x, y);
        if !ra.is_finite() || !dec.is_finite() {
            return Err(ProjectionError::new(x, y, "TAN deprojection diverged"));
        }
        Ok((ra, dec))
    }
}

fn wrap_degrees(theta_deg: f64) -> f64 {
    let wrapped = theta_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
