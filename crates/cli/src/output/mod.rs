//! Output formatting

mod formatter;

pub use formatter::{Formatter, Theme};

/// Output settings shared by every command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// One JSON object per line instead of human-readable text
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}

impl OutputConfig {
    /// Progress verbosity handed to the engine
    pub fn progress_verbosity(&self) -> u8 {
        if self.json || self.quiet { 0 } else { 1 }
    }
}
