//! The reference kernel: one cell at a time.

use num::Complex;

use super::{Pass, EXIT_RADIUS_SQR};
use crate::cancel::CancelToken;
use crate::field::Field;
use crate::viewport::Viewport;

/// Count the steps `c` survives under `z = z * z + c`, starting from
/// `z = c`, before `|z|²` reaches the exit radius or `limit` runs out.
#[inline]
pub(crate) fn escape_time(c: Complex<f32>, limit: u32) -> u32 {
    let mut z = c;
    let mut steps = 0;
    while steps < limit && z.norm_sqr() < EXIT_RADIUS_SQR {
        z = z * z + c;
        steps += 1;
    }
    steps
}

pub(super) fn run(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    let limit = viewport.max_iterations();
    for iy in 0..viewport.height() {
        if cancel.is_cancelled() {
            return Pass::Cancelled;
        }
        let im0 = viewport.im0(iy);
        for (ix, cell) in field.row_mut(iy).iter_mut().enumerate() {
            *cell = escape_time(Complex::new(viewport.re0(ix), im0), limit);
        }
    }
    Pass::Complete
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_never_escapes() {
        assert_eq!(escape_time(Complex::new(0.0, 0.0), 256), 256);
    }

    #[test]
    fn exact_radius_counts_as_escaped() {
        // |10|² is exactly 100.
        assert_eq!(escape_time(Complex::new(10.0, 0.0), 50), 0);
        assert_eq!(escape_time(Complex::new(0.0, -10.0), 50), 0);
    }

    #[test]
    fn minus_one_minus_i_escapes_on_the_fourth_check() {
        assert_eq!(escape_time(Complex::new(-1.0, -1.0), 50), 3);
        assert_eq!(escape_time(Complex::new(-1.0, -1.0), 2), 2);
    }
}
