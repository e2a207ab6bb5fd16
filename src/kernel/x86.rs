//! Hardware vector kernels for x86_64: four lanes in 128-bit
//! registers (AVX encoding) and eight lanes in 256-bit registers
//! (AVX2).
//!
//! Both keep a sticky mask of lanes that are still inside the exit
//! radius.  A lane drops out of the mask the first time it escapes
//! and never re-enters, so it stops counting exactly where the scalar
//! kernel would have stopped.  The group stops iterating once the
//! mask is empty.

use std::arch::x86_64::*;

use super::{Pass, EXIT_RADIUS_SQR};
use crate::cancel::CancelToken;
use crate::field::Field;
use crate::viewport::Viewport;

fn check(name: &str, lanes: usize, detected: bool, viewport: &Viewport) {
    assert!(detected, "kernel `{}` run on a CPU without support", name);
    assert!(
        viewport.width() % lanes == 0,
        "kernel `{}` needs a grid width divisible by {}, got {}",
        name,
        lanes,
        viewport.width()
    );
}

pub(super) fn run_avx(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    check("avx", 4, is_x86_feature_detected!("avx"), viewport);
    // Feature presence and lane alignment were asserted above.
    unsafe { avx(viewport, field, cancel) }
}

pub(super) fn run_avx2(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    check("avx2", 8, is_x86_feature_detected!("avx2"), viewport);
    unsafe { avx2(viewport, field, cancel) }
}

#[target_feature(enable = "avx")]
unsafe fn avx(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    const LANES: usize = 4;

    let limit = viewport.max_iterations();
    let radius2 = _mm_set1_ps(EXIT_RADIUS_SQR);
    let one = _mm_set1_epi32(1);
    let two = _mm_set1_ps(2.0);
    let mut re0_lanes = [0.0f32; LANES];

    for iy in 0..viewport.height() {
        if cancel.is_cancelled() {
            return Pass::Cancelled;
        }
        let im0 = _mm_set1_ps(viewport.im0(iy));
        let row = field.row_mut(iy);

        for ix in (0..viewport.width()).step_by(LANES) {
            for (i, lane) in re0_lanes.iter_mut().enumerate() {
                *lane = viewport.re0(ix + i);
            }
            let re0 = _mm_loadu_ps(re0_lanes.as_ptr());
            let (mut re, mut im) = (re0, im0);
            let mut inside = _mm_castsi128_ps(_mm_set1_epi32(-1));
            let mut steps = _mm_setzero_si128();

            for _ in 0..limit {
                let re2 = _mm_mul_ps(re, re);
                let im2 = _mm_mul_ps(im, im);
                let dist = _mm_add_ps(re2, im2);
                inside = _mm_and_ps(inside, _mm_cmp_ps(dist, radius2, _CMP_LT_OQ));
                if _mm_movemask_ps(inside) == 0 {
                    break;
                }
                steps = _mm_add_epi32(steps, _mm_and_si128(one, _mm_castps_si128(inside)));
                im = _mm_add_ps(_mm_mul_ps(two, _mm_mul_ps(re, im)), im0);
                re = _mm_add_ps(_mm_sub_ps(re2, im2), re0);
            }

            let out = row[ix..ix + LANES].as_mut_ptr();
            debug_assert_eq!(out as usize % 16, 0);
            _mm_store_si128(out as *mut __m128i, steps);
        }
    }
    Pass::Complete
}

#[target_feature(enable = "avx2")]
unsafe fn avx2(viewport: &Viewport, field: &mut Field, cancel: &CancelToken) -> Pass {
    const LANES: usize = 8;

    let limit = viewport.max_iterations();
    let radius2 = _mm256_set1_ps(EXIT_RADIUS_SQR);
    let one = _mm256_set1_epi32(1);
    let two = _mm256_set1_ps(2.0);
    let mut re0_lanes = [0.0f32; LANES];

    for iy in 0..viewport.height() {
        if cancel.is_cancelled() {
            return Pass::Cancelled;
        }
        let im0 = _mm256_set1_ps(viewport.im0(iy));
        let row = field.row_mut(iy);

        for ix in (0..viewport.width()).step_by(LANES) {
            for (i, lane) in re0_lanes.iter_mut().enumerate() {
                *lane = viewport.re0(ix + i);
            }
            let re0 = _mm256_loadu_ps(re0_lanes.as_ptr());
            let (mut re, mut im) = (re0, im0);
            let mut inside = _mm256_castsi256_ps(_mm256_set1_epi32(-1));
            let mut steps = _mm256_setzero_si256();

            for _ in 0..limit {
                let re2 = _mm256_mul_ps(re, re);
                let im2 = _mm256_mul_ps(im, im);
                let dist = _mm256_add_ps(re2, im2);
                inside = _mm256_and_ps(inside, _mm256_cmp_ps(dist, radius2, _CMP_LT_OQ));
                if _mm256_movemask_ps(inside) == 0 {
                    break;
                }
                steps = _mm256_add_epi32(steps, _mm256_and_si256(one, _mm256_castps_si256(inside)));
                im = _mm256_add_ps(_mm256_mul_ps(two, _mm256_mul_ps(re, im)), im0);
                re = _mm256_add_ps(_mm256_sub_ps(re2, im2), re0);
            }

            let out = row[ix..ix + LANES].as_mut_ptr();
            debug_assert_eq!(out as usize % 32, 0);
            _mm256_store_si256(out as *mut __m256i, steps);
        }
    }
    Pass::Complete
}
