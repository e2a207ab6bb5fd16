//! Turns escape counts into pixels.

use std::str::FromStr;

/// The palettes the viewer knows about.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Colorizer {
    /// Square-root ramp from black to white; the set itself is black.
    Grayscale,
    /// Banded reds and yellows.
    RedYellow,
    /// Blues and cyans fading to black near the set.
    Blue,
}

pub const NAMES: [&str; 3] = ["grayscale", "red-yellow", "blue"];

impl Colorizer {
    /// Maps one cell to RGB.
    pub fn color(self, steps: u32, max_steps: u32) -> [u8; 3] {
        if max_steps == 0 {
            return [0, 0, 0];
        }
        match self {
            Colorizer::Grayscale => {
                let steps = if steps == max_steps { 0 } else { steps };
                let c = ((steps as f32 / max_steps as f32).sqrt() * 255.0) as u8;
                [c, c, c]
            }
            Colorizer::RedYellow => {
                let inv = 255 - (u64::from(steps) * 255 / u64::from(max_steps)) as u32;
                [inv as u8, ((inv % 8) * 32) as u8, ((inv % 2) * 255) as u8]
            }
            Colorizer::Blue => {
                let t = steps as f32 / max_steps as f32;
                let g = ((t - 0.25).max(0.0) / 0.75).sqrt() * 255.0;
                let b = t.sqrt() * 255.0;
                let fade = 1.0 - ((t - 0.75).max(0.0) / 0.25).powi(4);
                [0, (g as u8 as f32 * fade) as u8, (b as u8 as f32 * fade) as u8]
            }
        }
    }

    /// Colors a whole grid into packed RGB bytes.
    pub fn paint(self, counts: &[u32], max_steps: u32) -> Vec<u8> {
        counts
            .iter()
            .flat_map(|&steps| self.color(steps, max_steps).to_vec())
            .collect()
    }
}

impl FromStr for Colorizer {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<Colorizer, failure::Error> {
        match s {
            "grayscale" => Ok(Colorizer::Grayscale),
            "red-yellow" => Ok(Colorizer::RedYellow),
            "blue" => Ok(Colorizer::Blue),
            _ => Err(format_err!("there is no colorizer named `{}`", s)),
        }
    }
}
