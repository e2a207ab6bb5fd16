//! Describes which rectangle of the complex plane a pass renders and
//! at what resolution, and maps integral grid cells onto points of
//! that rectangle.
//!
//! The rectangle is given by its center and its width.  Its height is
//! derived from the grid's aspect ratio, so cells are always square.

use num::Complex;

use crate::{Error, Result};

/// Fraction of the span width moved by one pan step.
pub const PAN_STEP: f32 = 0.2;

/// Factor by which one zoom step shrinks or grows the span.
pub const ZOOM_STEP: f32 = 1.5;

/// Where the viewport looks: the point at the center of the grid, and
/// how wide a slice of the real axis the grid covers.  This is the
/// part of a viewport that changes while a session runs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Position {
    /// The complex number under the center of the grid.
    pub center: Complex<f32>,
    /// Width of the rendered rectangle along the real axis.
    pub span: f32,
}

impl Position {
    /// A position centered on `re + im*i`, `span` units wide.
    pub fn new(re: f32, im: f32, span: f32) -> Position {
        Position {
            center: Complex::new(re, im),
            span,
        }
    }

    /// Checks that the center is finite and the span is finite and
    /// strictly positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.span.is_finite() && self.span > 0.0) {
            return Err(Error::InvalidSpan(self.span));
        }
        if !(self.center.re.is_finite() && self.center.im.is_finite()) {
            return Err(Error::InvalidCenter(self.center.re, self.center.im));
        }
        Ok(())
    }

    /// Moves the center by `dx` and `dy` pan steps.  A step is a fixed
    /// fraction of the current span, so panning feels the same at
    /// every zoom level.
    pub fn panned(&self, dx: f32, dy: f32) -> Position {
        let step = self.span * PAN_STEP;
        Position::new(
            self.center.re + dx * step,
            self.center.im + dy * step,
            self.span,
        )
    }

    /// Zooms by `steps` zoom steps; positive steps zoom in (narrow the
    /// span), negative steps zoom out.
    pub fn zoomed(&self, steps: i32) -> Position {
        Position {
            center: self.center,
            span: self.span / ZOOM_STEP.powi(steps),
        }
    }
}

impl Default for Position {
    fn default() -> Position {
        Position::new(0.0, 0.0, 2.0)
    }
}

/// Everything a kernel needs to fill a field: the position, the grid
/// dimensions, and the iteration cap.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    position: Position,
    width: usize,
    height: usize,
    max_iterations: u32,
}

impl Viewport {
    /// Constructor.  Rejects empty grids and degenerate positions.
    /// Whether `width` suits a given kernel's lane width is the
    /// kernel selector's business, not the viewport's.
    pub fn new(
        position: Position,
        width: usize,
        height: usize,
        max_iterations: u32,
    ) -> Result<Viewport> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid(width, height));
        }
        position.validate()?;
        Ok(Viewport {
            position,
            width,
            height,
            max_iterations,
        })
    }

    /// The same grid and iteration cap, looking somewhere else.
    pub fn with_position(&self, position: Position) -> Result<Viewport> {
        position.validate()?;
        Ok(Viewport { position, ..*self })
    }

    /// Where this viewport looks.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Number of cells per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Highest count a cell can receive.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Total number of cells in the grid.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Never true for a constructed viewport; here for symmetry with
    /// `len`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Height of the rendered rectangle along the imaginary axis,
    /// chosen so cells come out square.
    pub fn span_height(&self) -> f32 {
        self.position.span * self.height as f32 / self.width as f32
    }

    /// Real part of every point in column `ix`.
    ///
    /// Every kernel derives its starting points through this function
    /// and `im0`, which is what keeps their results bit-identical.
    #[inline]
    pub fn re0(&self, ix: usize) -> f32 {
        (ix as f32 / self.width as f32 - 0.5) * self.position.span + self.position.center.re
    }

    /// Imaginary part of every point in row `iy`.
    #[inline]
    pub fn im0(&self, iy: usize) -> f32 {
        (iy as f32 / self.height as f32 - 0.5) * self.span_height() + self.position.center.im
    }

    /// The point on the complex plane under cell `(ix, iy)`.
    #[inline]
    pub fn point(&self, ix: usize, iy: usize) -> Complex<f32> {
        Complex::new(self.re0(ix), self.im0(iy))
    }
}
