//! A portable eight-lane kernel.
//!
//! It does what the AVX2 kernel does, one lane at a time in plain
//! arithmetic: the same lane groups, the same sticky "still inside"
//! mask, and the same early exit once the whole group has escaped.

use std::ops::{Add, Mul, Sub};

use super::{Pass, EXIT_RADIUS_SQR};
use crate::cancel::CancelToken;
use crate::field::Field;
use crate::viewport::Viewport;

const LANES: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq)]
struct Block([f32; LANES]);

impl Block {
    fn splat(v: f32) -> Block {
        Block([v; LANES])
    }

    fn from_fn<F: FnMut(usize) -> f32>(mut f: F) -> Block {
        let mut b = [0.0; LANES];
        for (i, lane) in b.iter_mut().enumerate() {
            *lane = f(i);
        }
        Block(b)
    }

    fn lt(self, bound: f32) -> [bool; LANES] {
        let mut mask = [false; LANES];
        for (m, v) in mask.iter_mut().zip(self.0.iter()) {
            *m = *v < bound;
        }
        mask
    }
}

macro_rules! lanewise {
    ($imp:ident, $method:ident, $op:tt) => {
        impl $imp for Block {
            type Output = Block;

            #[inline]
            fn $method(self, rhs: Block) -> Block {
                Block::from_fn(|i| self.0[i] $op rhs.0[i])
            }
        }
    };
}

lanewise!(Add, add, +);
lanewise!(Sub, sub, -);
lanewise!(Mul, mul, *);

pub(super) fn run(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    assert!(
        viewport.width() % LANES == 0,
        "block kernel needs a grid width divisible by {}, got {}",
        LANES,
        viewport.width()
    );

    let limit = viewport.max_iterations();
    let two = Block::splat(2.0);

    for iy in 0..viewport.height() {
        if cancel.is_cancelled() {
            return Pass::Cancelled;
        }
        let im0 = Block::splat(viewport.im0(iy));
        let row = field.row_mut(iy);

        for (group, out) in row.chunks_mut(LANES).enumerate() {
            let ix = group * LANES;
            let re0 = Block::from_fn(|i| viewport.re0(ix + i));
            let (mut re, mut im) = (re0, im0);
            let mut inside = [true; LANES];
            let mut steps = [0u32; LANES];

            for _ in 0..limit {
                let re2 = re * re;
                let im2 = im * im;
                let still = (re2 + im2).lt(EXIT_RADIUS_SQR);
                for (i, s) in inside.iter_mut().zip(still.iter()) {
                    *i &= *s;
                }
                if !inside.iter().any(|&i| i) {
                    break;
                }
                for (n, &i) in steps.iter_mut().zip(inside.iter()) {
                    *n += i as u32;
                }
                im = two * (re * im) + im0;
                re = re2 - im2 + re0;
            }

            out.copy_from_slice(&steps);
        }
    }
    Pass::Complete
}
