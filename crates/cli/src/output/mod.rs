//! Output formatting for human and JSON modes

mod formatter;

pub use formatter::{Formatter, format_size, format_timestamp};

/// Output settings resolved from the global flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Emit JSON instead of human-readable text
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}
