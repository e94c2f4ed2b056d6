//! Define a source: one detection measured on an image, or one entry
//! of a reference catalog.
//!
//! Image sources carry a pixel position and receive their sky position from
//! the projector. Catalog sources carry a sky position only.

use nalgebra::Vector3;

#[derive(Debug, Clone, PartialEq)]
pub struct Source<P = ()> {
    /// Pixel position `[x, y]`. Set for image-origin sources.
    pub pixel: Option<[f64; 2]>,
    /// Sky position `[ra, dec]` in degrees.
    /// Unset for image-origin sources until they have been projected.
    pub sky: Option<[f64; 2]>,
    /// Caller data carried through matching untouched.
    pub payload: P,
}

impl<P> Source<P> {
    /// An image detection at pixel `(x, y)` with no sky position yet.
    pub fn image(x: f64, y: f64, payload: P) -> Self {
        Self {
            pixel: Some([x, y]),
            sky: None,
            payload,
        }
    }

    /// A catalog entry at `(ra, dec)` in degrees.
    pub fn catalog(ra_deg: f64, dec_deg: f64, payload: P) -> Self {
        Self {
            pixel: None,
            sky: Some([ra_deg, dec_deg]),
            payload,
        }
    }

    /// Right ascension in degrees, if known.
    pub fn ra(&self) -> Option<f64> {
        self.sky.map(|s| s[0])
    }

    /// Declination in degrees, if known.
    pub fn dec(&self) -> Option<f64> {
        self.sky.map(|s| s[1])
    }

    /// Unit vector pointing to the source's position on the celestial sphere.
    ///
    /// Treats the sky position as (RA, Dec) in degrees.
    pub fn uvec(&self) -> Option<Vector3<f64>> {
        let [ra, dec] = self.sky?;
        let (rasin, racos) = ra.to_radians().sin_cos();
        let (decsin, deccos) = dec.to_radians().sin_cos();
        Some(Vector3::new(deccos * racos, deccos * rasin, decsin))
    }
}
