//! 2×3 affine transforms in the PDF `[a b c d e f]` form.
//!
//! Points are row vectors: `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
//! Content streams concatenate matrices so the newest transform applies
//! first; [`Matrix::compose`] mirrors that convention.

/// A 2×3 affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Compose with `inner`: the returned matrix applies `inner` first,
    /// then `self`. Updating a graphics state for a `cm` operator is
    /// therefore `ctm = ctm.compose(cm)`, and mapping content space to
    /// device space is `viewport.compose(ctm)`.
    pub fn compose(&self, inner: &Matrix) -> Matrix {
        Matrix {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    /// Map a point through the matrix.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f64; 6]> for Matrix {
    fn from(m: [f64; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }
}

/// The transform from a page's content space into pixel space, plus the
/// pixel dimensions of that space.
///
/// PDF content coordinates have a bottom-left origin; pixel space has a
/// top-left origin, so the unrotated transform flips y. `/Rotate` values
/// fold into the transform the same way a renderer would fold them, which
/// also swaps the reported width and height for 90° and 270°.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub transform: Matrix,
    pub width: f64,
    pub height: f64,
    /// Page rotation in degrees, normalized to 0/90/180/270.
    pub rotation: i32,
}

impl Viewport {
    /// A viewport that maps content space straight through, with no flip
    /// and no rotation. Useful for synthetic geometry and tests.
    pub fn identity(width: f64, height: f64) -> Self {
        Self {
            transform: Matrix::IDENTITY,
            width,
            height,
            rotation: 0,
        }
    }

    /// Build the pixel-space viewport for a page.
    ///
    /// `media_box` is `[x0, y0, x1, y1]` in content units, `rotation` the
    /// page's `/Rotate` value, `scale` the pixels-per-content-unit factor.
    pub fn from_page(media_box: [f64; 4], rotation: i32, scale: f64) -> Self {
        let [x0, y0, x1, y1] = media_box;
        let center_x = (x0 + x1) / 2.0;
        let center_y = (y0 + y1) / 2.0;

        let rotation = rotation.rem_euclid(360);
        // Rotation plus the y-flip that moves the origin to the top-left.
        let (ra, rb, rc, rd) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let (offset_x, offset_y, width, height) = if ra == 0.0 {
            (
                (center_y - y0).abs() * scale,
                (center_x - x0).abs() * scale,
                (y1 - y0).abs() * scale,
                (x1 - x0).abs() * scale,
            )
        } else {
            (
                (center_x - x0).abs() * scale,
                (center_y - y0).abs() * scale,
                (x1 - x0).abs() * scale,
                (y1 - y0).abs() * scale,
            )
        };

        let transform = Matrix::new(
            ra * scale,
            rb * scale,
            rc * scale,
            rd * scale,
            offset_x - ra * scale * center_x - rc * scale * center_y,
            offset_y - rb * scale * center_x - rd * scale * center_y,
        );

        Self {
            transform,
            width,
            height,
            rotation: if rotation % 90 == 0 { rotation } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-9 && (actual.1 - expected.1).abs() < 1e-9,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_compose_applies_inner_first() {
        let scale = Matrix::scaling(2.0, 2.0);
        let translate = Matrix::translation(10.0, 20.0);
        // translate first, then scale
        let m = scale.compose(&translate);
        assert_close(m.apply(1.0, 1.0), (22.0, 42.0));
        // scale first, then translate
        let m = translate.compose(&scale);
        assert_close(m.apply(1.0, 1.0), (12.0, 22.0));
    }

    #[test]
    fn test_identity_composition_is_noop() {
        let m = Matrix::new(2.0, 0.5, -0.5, 2.0, 7.0, -3.0);
        assert_eq!(Matrix::IDENTITY.compose(&m), m);
        assert_eq!(m.compose(&Matrix::IDENTITY), m);
    }

    #[test]
    fn test_unrotated_viewport_flips_y() {
        let vp = Viewport::from_page([0.0, 0.0, 612.0, 792.0], 0, 1.0);
        assert_eq!(vp.width, 612.0);
        assert_eq!(vp.height, 792.0);
        // content origin (bottom-left) lands at pixel bottom-left
        assert_close(vp.transform.apply(0.0, 0.0), (0.0, 792.0));
        // content top-left lands at pixel origin
        assert_close(vp.transform.apply(0.0, 792.0), (0.0, 0.0));
    }

    #[test]
    fn test_rotated_viewport_swaps_dimensions() {
        let vp = Viewport::from_page([0.0, 0.0, 612.0, 792.0], 90, 1.0);
        assert_eq!(vp.width, 792.0);
        assert_eq!(vp.height, 612.0);
        assert_eq!(vp.rotation, 90);
        // all four media-box corners stay inside the rotated pixel space
        for (x, y) in [(0.0, 0.0), (612.0, 0.0), (612.0, 792.0), (0.0, 792.0)] {
            let (px, py) = vp.transform.apply(x, y);
            assert!((0.0..=vp.width).contains(&px), "x {} out of range", px);
            assert!((0.0..=vp.height).contains(&py), "y {} out of range", py);
        }
    }

    #[test]
    fn test_viewport_scale_factor() {
        let vp = Viewport::from_page([0.0, 0.0, 100.0, 200.0], 0, 2.0);
        assert_eq!(vp.width, 200.0);
        assert_eq!(vp.height, 400.0);
        assert_close(vp.transform.apply(50.0, 100.0), (100.0, 200.0));
    }

    #[test]
    fn test_nonzero_media_box_origin() {
        let vp = Viewport::from_page([10.0, 10.0, 110.0, 210.0], 0, 1.0);
        assert_eq!(vp.width, 100.0);
        assert_eq!(vp.height, 200.0);
        assert_close(vp.transform.apply(10.0, 210.0), (0.0, 0.0));
        assert_close(vp.transform.apply(110.0, 10.0), (100.0, 200.0));
    }

    #[test]
    fn test_negative_rotation_normalized() {
        let vp = Viewport::from_page([0.0, 0.0, 612.0, 792.0], -90, 1.0);
        assert_eq!(vp.rotation, 270);
        assert_eq!(vp.width, 792.0);
    }
}
