use geo::{coord, Rect};


/// A 2D affine geotransform.
///
/// Maps pixel coordinates (col, row) to CRS coordinates (x, y):
///   x = a * col + b * row + c
///   y = d * col + e * row + f
///
/// Coefficients follow the rasterio ordering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Pixel space, y growing downwards. Used for rasters without georeferencing.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// North-up transform from an upper-left origin and a square-ish pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, origin_x, 0.0, -pixel_height, origin_y)
    }

    /// Apply the forward transform: (col, row) -> (x, y).
    pub fn forward(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.a * col + self.b * row + self.c;
        let y = self.d * col + self.e * row + self.f;
        (x, y)
    }

    pub fn is_rotated(&self) -> bool {
        self.b != 0.0 || self.d != 0.0
    }

    /// Transform of a pixel window: same scale and shear, origin moved to the
    /// window's upper-left pixel corner.
    pub fn window_transform(&self, col_off: usize, row_off: usize) -> Affine {
        self.shifted(col_off as f64, row_off as f64)
    }

    /// Same scale and shear with the origin moved to pixel (col, row), which
    /// may be fractional.
    pub fn shifted(&self, col: f64, row: f64) -> Affine {
        let (x, y) = self.forward(col, row);
        Affine { c: x, f: y, ..*self }
    }

    /// Axis-aligned bounding box of a pixel window in CRS coordinates.
    ///
    /// All four corners are projected, so rotated or south-up transforms
    /// still produce a well-ordered rectangle.
    pub fn window_bounds(&self, col_off: usize, row_off: usize, width: usize, height: usize) -> Rect<f64> {
        let (c0, r0) = (col_off as f64, row_off as f64);
        let (c1, r1) = (c0 + width as f64, r0 + height as f64);
        let corners = [
            self.forward(c0, r0),
            self.forward(c1, r0),
            self.forward(c0, r1),
            self.forward(c1, r1),
        ];

        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        Rect::new(coord! { x: min.0, y: min.1 }, coord! { x: max.0, y: max.1 })
    }
}
