#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot escape-time field engine
//!
//! The Mandelbrot set is the set of points `c` on the complex plane
//! for which the recurrence `z = z * z + c`, started at `z = c`,
//! never runs off to infinity.  For every point of a rectangular grid
//! we count how many steps the recurrence survives before `|z|`
//! leaves a circle of radius 10.  That grid of counts is a *field*;
//! something else (a window, an image encoder) turns it into colors.
//!
//! The same computation is provided by several interchangeable
//! kernels: one point at a time, four points at a time with 128-bit
//! vectors, eight at a time with 256-bit vectors, and a portable
//! eight-lane block kernel that does the lane bookkeeping by hand.
//! All of them produce exactly the same counts.
//!
//! A session runs a kernel over and over on a producer thread and
//! hands every completed field to a consumer through a three-slot
//! exchange.  The consumer never waits for the producer, and the
//! producer never waits for the consumer: a field the consumer was
//! too slow to pick up is simply replaced by the next one.

use failure::Fail;
use std::io;

pub mod cancel;
pub mod capability;
pub mod exchange;
pub mod field;
pub mod kernel;
pub mod session;
pub mod viewport;

pub use cancel::CancelToken;
pub use exchange::{Consumer, FieldExchange, Frame, Producer};
pub use field::Field;
pub use kernel::{Kernel, KernelVariant, Pass, EXIT_RADIUS};
pub use session::{Session, SessionConfig};
pub use viewport::{Position, Viewport};

/// Everything that can go wrong while describing a viewport, picking
/// a kernel, or starting a session.  Failures inside a running
/// kernel are not represented here: they are assertions.
#[derive(Debug, Fail)]
pub enum Error {
    /// The span width must be finite and strictly positive.
    #[fail(display = "span width must be finite and positive, got {}", _0)]
    InvalidSpan(f32),

    /// The center must be a finite complex number.
    #[fail(display = "center must be finite, got {},{}", _0, _1)]
    InvalidCenter(f32, f32),

    /// Both grid dimensions must be at least one.
    #[fail(display = "grid must be at least 1x1, got {}x{}", _0, _1)]
    EmptyGrid(usize, usize),

    /// No kernel goes by that name.
    #[fail(display = "there is no kernel named `{}`", _0)]
    UnknownKernel(String),

    /// The kernel exists, but this CPU cannot run it.
    #[fail(display = "kernel `{}` is not supported by this CPU", _0)]
    Unsupported(&'static str),

    /// The grid width is not a multiple of the kernel's lane width.
    #[fail(
        display = "grid width {} is not a multiple of {}, the lane width of kernel `{}`",
        width, lanes, kernel
    )]
    LaneMismatch {
        /// Name of the rejected kernel.
        kernel: &'static str,
        /// Its lane width.
        lanes: usize,
        /// The grid width it was asked to fill.
        width: usize,
    },

    /// The producer thread could not be started.
    #[fail(display = "could not start the producer thread: {}", _0)]
    Spawn(#[cause] io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
