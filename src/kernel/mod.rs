//! The escape-time kernels.
//!
//! Each kernel fills a field with escape counts for a viewport.  The
//! per-point rule is the same for all of them:
//!
//! - start at `z = c`, where `c` is the point under the cell;
//! - while `|z|² < EXIT_RADIUS²` and fewer than `max_iterations`
//!   steps have been taken, replace `z` by `z * z + c` and count a step.
//!
//! A point already outside the radius scores 0; a point that never
//! leaves scores exactly `max_iterations`.  The vector kernels run
//! several adjacent cells of a row in lockstep and must produce the
//! same numbers as the scalar kernel, bit for bit.

use std::fmt;
use std::str::FromStr;

use crate::cancel::CancelToken;
use crate::field::Field;
use crate::viewport::Viewport;
use crate::Error;

mod block;
mod scalar;
#[cfg(target_arch = "x86_64")]
mod x86;

/// Radius of the circle a point must leave to count as escaped.
pub const EXIT_RADIUS: f32 = 10.0;

/// `EXIT_RADIUS` squared; a point has escaped once `|z|²` reaches it.
pub const EXIT_RADIUS_SQR: f32 = EXIT_RADIUS * EXIT_RADIUS;

/// How a pass ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pass {
    /// Every cell holds its final count.
    Complete,
    /// The token was cancelled; the field holds a mix of old and new
    /// rows and must not be published.
    Cancelled,
}

/// The calling convention every kernel satisfies.
///
/// `run` fills `field` with the counts for `viewport`, checking
/// `cancel` once per row.  Callers are responsible for only handing a
/// kernel viewports it can handle (see `KernelVariant::check`); a
/// kernel that is handed anything else panics.
pub trait Kernel: Send + Sync {
    /// Short name, for logs and menus.
    fn name(&self) -> &str;

    /// How many adjacent cells one step processes.  The grid width
    /// must be a multiple of this.
    fn lanes(&self) -> usize;

    /// Fill `field` for `viewport`.
    fn run(&self, viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass;
}

/// The closed set of built-in kernels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    /// One cell at a time.
    Scalar,
    /// Four cells at a time with 128-bit vectors; needs AVX.
    Avx,
    /// Eight cells at a time with 256-bit vectors; needs AVX2.
    Avx2,
    /// Eight cells at a time with plain per-lane arithmetic.  Runs
    /// anywhere; exists to check the lane bookkeeping.
    Block,
}

impl KernelVariant {
    /// Every variant, in the order a menu cycles through them.
    pub const ALL: [KernelVariant; 4] = [
        KernelVariant::Scalar,
        KernelVariant::Avx,
        KernelVariant::Avx2,
        KernelVariant::Block,
    ];

    /// The variant's name.
    pub fn as_str(self) -> &'static str {
        match self {
            KernelVariant::Scalar => "scalar",
            KernelVariant::Avx => "avx",
            KernelVariant::Avx2 => "avx2",
            KernelVariant::Block => "block",
        }
    }

    /// Run a fresh pass with no way to cancel it and return the field.
    pub fn compute(self, viewport: &Viewport) -> Field {
        let mut field = Field::new(viewport.width(), viewport.height());
        self.run(viewport, &mut field, &CancelToken::new());
        field
    }
}

impl Kernel for KernelVariant {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn lanes(&self) -> usize {
        match *self {
            KernelVariant::Scalar => 1,
            KernelVariant::Avx => 4,
            KernelVariant::Avx2 | KernelVariant::Block => 8,
        }
    }

    fn run(&self, viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
        assert_eq!(
            (field.width(), field.height()),
            (viewport.width(), viewport.height()),
            "field does not match the viewport"
        );
        match *self {
            KernelVariant::Scalar => scalar::run(viewport, field, cancel),
            KernelVariant::Block => block::run(viewport, field, cancel),
            #[cfg(target_arch = "x86_64")]
            KernelVariant::Avx => x86::run_avx(viewport, field, cancel),
            #[cfg(target_arch = "x86_64")]
            KernelVariant::Avx2 => x86::run_avx2(viewport, field, cancel),
            #[cfg(not(target_arch = "x86_64"))]
            KernelVariant::Avx | KernelVariant::Avx2 => {
                panic!("kernel `{}` needs an x86_64 CPU", self.as_str())
            }
        }
    }
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<KernelVariant, Error> {
        KernelVariant::ALL
            .iter()
            .cloned()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownKernel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Position;
    use itertools::iproduct;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn viewport(re: f32, im: f32, span: f32, w: usize, h: usize, iters: u32) -> Viewport {
        Viewport::new(Position::new(re, im, span), w, h, iters).unwrap()
    }

    fn runnable() -> Vec<KernelVariant> {
        KernelVariant::ALL
            .iter()
            .cloned()
            .filter(|k| k.is_supported())
            .collect()
    }

    /// The recurrence, written out longhand, for a single point.
    fn by_hand(re0: f32, im0: f32, max: u32) -> u32 {
        let (mut re, mut im) = (re0, im0);
        let mut steps = 0;
        while steps < max && re * re + im * im < 100.0 {
            let (re2, im2) = (re * re, im * im);
            im = 2.0 * (re * im) + im0;
            re = re2 - im2 + re0;
            steps += 1;
        }
        steps
    }

    #[test]
    fn names_round_trip() {
        for k in KernelVariant::ALL.iter() {
            assert_eq!(k.as_str().parse::<KernelVariant>().unwrap(), *k);
        }
        match "sse9".parse::<KernelVariant>() {
            Err(Error::UnknownKernel(name)) => assert_eq!(name, "sse9"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lane_widths() {
        let lanes: Vec<usize> = KernelVariant::ALL.iter().map(|k| k.lanes()).collect();
        assert_eq!(lanes, vec![1, 4, 8, 8]);
    }

    #[test]
    fn golden_eight_by_eight() {
        let vp = viewport(0.0, 0.0, 2.0, 8, 8, 50);
        for k in runnable() {
            let field = k.compute(&vp);
            // (0, 0) never escapes.
            assert_eq!(field.get(4, 4), 50, "{}", k);
            // -1-i: |z|² goes 2, 2, 10, 106.
            assert_eq!(field.get(0, 0), 3, "{}", k);
        }
    }

    #[test]
    fn two_escapes_after_two_steps() {
        // z goes 2, 6, 38.
        let vp = viewport(2.0, 0.0, 2.0, 8, 8, 50);
        assert_eq!(vp.point(4, 4).re, 2.0);
        for k in runnable() {
            assert_eq!(k.compute(&vp).get(4, 4), 2, "{}", k);
        }
    }

    #[test]
    fn landing_exactly_on_the_radius_is_an_escape() {
        // c = 10 gives |z|² == 100 before the first step.
        let vp = viewport(10.0, 0.0, 2.0, 8, 8, 50);
        assert_eq!(vp.point(4, 4), num::Complex::new(10.0, 0.0));
        for k in runnable() {
            assert_eq!(k.compute(&vp).get(4, 4), 0, "{}", k);
        }
    }

    #[test]
    fn points_outside_the_radius_score_zero() {
        let vp = viewport(20.0, 0.0, 2.0, 8, 8, 50);
        for k in runnable() {
            assert!(k.compute(&vp).counts().iter().all(|&c| c == 0), "{}", k);
        }
    }

    #[test]
    fn zero_iterations_yield_zero() {
        let vp = viewport(0.0, 0.0, 2.0, 8, 8, 0);
        for k in runnable() {
            assert!(k.compute(&vp).counts().iter().all(|&c| c == 0), "{}", k);
        }
    }

    #[test]
    fn every_cell_matches_the_longhand_recurrence() {
        let vp = viewport(-0.5, 0.1, 3.0, 32, 24, 100);
        for k in runnable() {
            let field = k.compute(&vp);
            for (iy, ix) in iproduct!(0..vp.height(), 0..vp.width()) {
                assert_eq!(
                    field.get(ix, iy),
                    by_hand(vp.re0(ix), vp.im0(iy), 100),
                    "{} at ({}, {})",
                    k,
                    ix,
                    iy
                );
            }
        }
    }

    #[test]
    fn variants_agree_bit_for_bit() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let kernels = runnable();
        for _ in 0..24 {
            let vp = viewport(
                rng.gen_range(-2.0, 1.0),
                rng.gen_range(-1.2, 1.2),
                rng.gen_range(0.001, 4.0),
                8 * rng.gen_range(1, 9),
                rng.gen_range(1, 17),
                rng.gen_range(0, 300),
            );
            let reference = KernelVariant::Scalar.compute(&vp);
            for k in &kernels {
                assert_eq!(k.compute(&vp).counts(), reference.counts(), "{} on {:?}", k, vp);
            }
        }
    }

    #[test]
    fn counts_stay_within_the_cap() {
        let vp = viewport(-0.75, 0.0, 3.0, 64, 48, 40);
        for k in runnable() {
            assert!(k.compute(&vp).counts().iter().all(|&c| c <= 40), "{}", k);
        }
    }

    #[test]
    fn raising_the_cap_only_extends_unescaped_cells() {
        let low = viewport(-0.75, 0.1, 2.5, 32, 16, 20);
        let high = viewport(-0.75, 0.1, 2.5, 32, 16, 60);
        for k in runnable() {
            let a = k.compute(&low);
            let b = k.compute(&high);
            for (&c1, &c2) in a.counts().iter().zip(b.counts()) {
                assert!(c2 >= c1, "{}", k);
                if c1 < 20 {
                    assert_eq!(c1, c2, "{}", k);
                }
            }
        }
    }

    #[test]
    fn cancelled_token_abandons_the_pass() {
        let vp = viewport(0.0, 0.0, 2.0, 16, 16, 1000);
        let cancel = CancelToken::new();
        cancel.cancel();
        for k in runnable() {
            let mut field = Field::new(16, 16);
            assert_eq!(k.run(&vp, &mut field, &cancel), Pass::Cancelled, "{}", k);
        }
    }

    #[test]
    fn scalar_handles_odd_widths() {
        let vp = viewport(0.0, 0.0, 2.0, 7, 3, 30);
        let field = KernelVariant::Scalar.compute(&vp);
        assert_eq!(field.len(), 21);
        assert_eq!(field.get(3, 1), by_hand(vp.re0(3), vp.im0(1), 30));
    }

    #[test]
    #[should_panic]
    fn block_refuses_widths_off_the_lane_grid() {
        let vp = viewport(0.0, 0.0, 2.0, 12, 4, 10);
        KernelVariant::Block.compute(&vp);
    }

    #[test]
    #[should_panic]
    fn mismatched_field_is_refused() {
        let vp = viewport(0.0, 0.0, 2.0, 8, 8, 10);
        let mut field = Field::new(16, 8);
        KernelVariant::Scalar.run(&vp, &mut field, &CancelToken::new());
    }
}
