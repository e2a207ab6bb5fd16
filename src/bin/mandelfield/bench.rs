//! A stability benchmark: repeat passes until the timings in the
//! last window agree to within a given ratio, then report on that
//! window.

use std::time::Instant;

use itertools::Itertools;

use mandelfield::{CancelToken, Field, Kernel, Viewport};

/// What a finished benchmark found.
#[derive(Debug, PartialEq)]
pub struct Report {
    pub warmup: usize,
    pub mean: f32,
    pub deviation: f32,
    pub outliers: usize,
}

/// Ratio of the slowest to the fastest timing in `times`.
fn spread(times: &[f32]) -> f32 {
    match times.iter().cloned().minmax().into_option() {
        Some((min, max)) if min == max => 1.0,
        Some((min, max)) => max / min,
        None => std::f32::INFINITY,
    }
}

/// Mean, standard deviation, and the number of samples more than
/// three deviations from the mean.
pub fn summarize(times: &[f32]) -> (f32, f32, usize) {
    let n = times.len() as f32;
    let mean = times.iter().sum::<f32>() / n;
    let deviation = (times.iter().map(|t| (t - mean).powi(2)).sum::<f32>() / n).sqrt();
    let outliers = times
        .iter()
        .filter(|&&t| deviation > 0.0 && (t - mean).abs() / deviation > 3.0)
        .count();
    (mean, deviation, outliers)
}

/// Times passes of `kernel` over `viewport` until the last `window`
/// timings have a max/min ratio of at most `variation`.
pub fn run<K: Kernel>(kernel: &K, viewport: &Viewport, window: usize, variation: f32) -> Report {
    let mut field = Field::new(viewport.width(), viewport.height());
    let cancel = CancelToken::new();
    let mut times = vec![std::f32::INFINITY; window];
    let mut runs = 0;

    loop {
        let started = Instant::now();
        kernel.run(viewport, &mut field, &cancel);
        let ms = started.elapsed().as_secs_f32() * 1000.0;
        times[runs % window] = ms;
        runs += 1;

        let ratio = spread(&times);
        info!(
            "run {:<4} took {:<8.4} ms; last {} runs vary by {:.4}",
            runs, ms, window, ratio
        );
        if runs >= window && ratio <= variation {
            break;
        }
    }

    let (mean, deviation, outliers) = summarize(&times);
    Report {
        warmup: runs - window,
        mean,
        deviation,
        outliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mandelfield::{KernelVariant, Position};

    #[test]
    fn summary_of_a_flat_series() {
        assert_eq!(summarize(&[2.0, 2.0, 2.0, 2.0]), (2.0, 0.0, 0));
    }

    #[test]
    fn summary_flags_far_outliers() {
        let mut times = vec![1.0; 40];
        times.push(50.0);
        let (_, _, outliers) = summarize(&times);
        assert_eq!(outliers, 1);
    }

    #[test]
    fn unfilled_window_never_looks_stable() {
        assert!(spread(&[1.0, std::f32::INFINITY]).is_infinite());
        assert_eq!(spread(&[2.0, 3.0]), 1.5);
    }

    #[test]
    fn loose_tolerance_stops_after_one_window() {
        let vp = Viewport::new(Position::default(), 8, 8, 4).unwrap();
        let report = run(&KernelVariant::Scalar, &vp, 3, std::f32::INFINITY);
        assert_eq!(report.warmup, 0);
        assert!(report.mean >= 0.0);
    }
}
