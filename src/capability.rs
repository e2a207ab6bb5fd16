//! Decides which kernels may run here.
//!
//! A kernel may run when the CPU has its instruction set and the grid
//! width is a multiple of its lane width.  Both questions are answered
//! once, before a kernel is handed to a producer; the kernels only
//! re-assert them.

use log::debug;

use crate::kernel::{Kernel, KernelVariant};
use crate::viewport::Viewport;
use crate::{Error, Result};

impl KernelVariant {
    /// Can this CPU run the variant at all?
    pub fn is_supported(self) -> bool {
        match self {
            KernelVariant::Scalar | KernelVariant::Block => true,
            #[cfg(target_arch = "x86_64")]
            KernelVariant::Avx => is_x86_feature_detected!("avx"),
            #[cfg(target_arch = "x86_64")]
            KernelVariant::Avx2 => is_x86_feature_detected!("avx2"),
            #[cfg(not(target_arch = "x86_64"))]
            KernelVariant::Avx | KernelVariant::Avx2 => false,
        }
    }

    /// Can the variant fill this viewport on this CPU?
    pub fn check(self, viewport: &Viewport) -> Result<()> {
        if !self.is_supported() {
            return Err(Error::Unsupported(self.as_str()));
        }
        if viewport.width() % self.lanes() != 0 {
            return Err(Error::LaneMismatch {
                kernel: self.as_str(),
                lanes: self.lanes(),
                width: viewport.width(),
            });
        }
        Ok(())
    }

    /// The next variant after this one, in menu order, that can fill
    /// the viewport.  Comes back around to `self` if nothing else can.
    pub fn next_usable(self, viewport: &Viewport) -> KernelVariant {
        let all = &KernelVariant::ALL;
        let start = all.iter().position(|&k| k == self).unwrap_or(0);
        (1..=all.len())
            .map(|offset| all[(start + offset) % all.len()])
            .find(|k| k.check(viewport).is_ok())
            .unwrap_or(self)
    }
}

/// Every variant that can fill the viewport on this CPU, in menu order.
pub fn usable(viewport: &Viewport) -> Vec<KernelVariant> {
    KernelVariant::ALL
        .iter()
        .cloned()
        .filter(|k| k.check(viewport).is_ok())
        .collect()
}

/// Pick the kernel for a viewport.  A named kernel is used if it can
/// run, and is an error otherwise.  Without a name, the fastest
/// usable hardware kernel is chosen, falling back to the scalar one.
pub fn select(name: Option<&str>, viewport: &Viewport) -> Result<KernelVariant> {
    let chosen = match name {
        Some(name) => {
            let kernel: KernelVariant = name.parse()?;
            kernel.check(viewport)?;
            kernel
        }
        // The block kernel is there for checking, not for speed.
        None => usable(viewport)
            .into_iter()
            .filter(|&k| k != KernelVariant::Block)
            .max_by_key(|k| k.lanes())
            .unwrap_or(KernelVariant::Scalar),
    };
    debug!("selected kernel `{}` for a {}x{} grid", chosen, viewport.width(), viewport.height());
    Ok(chosen)
}
