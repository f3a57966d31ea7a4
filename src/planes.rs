//! Contains the JuliaPlane struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at 0,0
//! and the fixed window of the complex plane the Julia set is drawn
//! over: 3.0 units wide and 2.0 units tall, centered on the origin.
use num::Complex;

/// Describes the column, row of a pixel on the integral plane.  The
/// row is always a *global* row index, never one local to a worker.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps pixels of a width x height raster onto the complex plane.
///
/// The centering uses integer halves of the width and height (so an
/// odd-sized raster is centered half a pixel off), which is what keeps
/// boundary rows identical to the reference renderings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JuliaPlane {
    width: usize,
    height: usize,
}

impl JuliaPlane {
    /// Constructor.  Neither dimension may be zero; that is checked by
    /// the configuration layer, not here.
    pub fn new(width: usize, height: usize) -> Self {
        JuliaPlane { width, height }
    }

    /// Raster width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Raster height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The total number of points in the integral grid.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Describes that the integral plane is of a size.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Real part for a column.  Shared by every row, so renderers may
    /// compute it once per column.
    #[inline]
    pub fn column_to_re(&self, column: usize) -> f64 {
        let offset = column as i64 - (self.width / 2) as i64;
        1.5 * (offset as f64) / (0.5 * self.width as f64)
    }

    /// Imaginary part for a global row.
    #[inline]
    pub fn row_to_im(&self, row: usize) -> f64 {
        let offset = row as i64 - (self.height / 2) as i64;
        (offset as f64) / (0.5 * self.height as f64)
    }

    /// Given a pixel on the integral cartesian plane, return the
    /// starting point of its orbit on the complex plane.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(self.column_to_re(pixel.0), self.row_to_im(pixel.1))
    }
}
