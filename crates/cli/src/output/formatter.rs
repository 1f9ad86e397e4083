//! Output formatter for human-readable and JSON output
//!
//! Every command prints through a [`Formatter`] so that `--json`, `--quiet`
//! and `--no-color` behave the same everywhere. Results go to stdout;
//! errors, warnings and progress go to stderr.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use jiff::Timestamp;
use serde::Serialize;

use super::OutputConfig;

/// Color theme for styled output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Common prefixes - blue + bold
    pub dir: Style,
    /// Object keys - default
    pub file: Style,
    /// Sizes - green
    pub size: Style,
    /// Timestamps - dim
    pub date: Style,
    /// Property keys (stat output) - cyan
    pub key: Style,
    /// Bucket names - bold
    pub name: Style,
    pub success: Style,
    pub error: Style,
    pub warning: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            dir: Style::new().blue().bold(),
            file: Style::new(),
            size: Style::new().green(),
            date: Style::new().dim(),
            key: Style::new().cyan(),
            name: Style::new().bold(),
            success: Style::new().green(),
            error: Style::new().red(),
            warning: Style::new().yellow(),
        }
    }
}

impl Theme {
    /// Returns a theme with no styling (for no-color mode)
    pub fn plain() -> Self {
        Self {
            dir: Style::new(),
            file: Style::new(),
            size: Style::new(),
            date: Style::new(),
            key: Style::new(),
            name: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warning: Style::new(),
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled, all output is strict JSON without colors or
/// progress indicators.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self { config, theme }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    // ========== Style helper methods ==========

    pub fn style_dir(&self, text: &str) -> String {
        self.theme.dir.apply_to(text).to_string()
    }

    pub fn style_file(&self, text: &str) -> String {
        self.theme.file.apply_to(text).to_string()
    }

    pub fn style_size(&self, text: &str) -> String {
        self.theme.size.apply_to(text).to_string()
    }

    pub fn style_date(&self, text: &str) -> String {
        self.theme.date.apply_to(text).to_string()
    }

    pub fn style_key(&self, text: &str) -> String {
        self.theme.key.apply_to(text).to_string()
    }

    pub fn style_name(&self, text: &str) -> String {
        self.theme.name.apply_to(text).to_string()
    }

    // ========== Output methods ==========

    /// Output a success message
    ///
    /// In JSON mode success is carried by the exit code and the result
    /// document, so nothing is printed.
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let checkmark = self.theme.success.apply_to("✓");
        println!("{checkmark} {message}");
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!("{error}");
        } else {
            let cross = self.theme.error.apply_to("✗");
            eprintln!("{cross} {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let warn_icon = self.theme.warning.apply_to("⚠");
        eprintln!("{warn_icon} {message}");
    }

    /// Announce a mutation that `--dry-run` skipped
    pub fn dry_run(&self, action: &str, target: &str) {
        if self.config.json {
            let planned = serde_json::json!({ "dry_run": true, "action": action, "target": target });
            println!("{planned}");
        } else if !self.config.quiet {
            println!("{} {action} {target}", self.theme.warning.apply_to("(dry-run)"));
        }
    }

    /// Output a pretty-printed JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Output one compact JSON document per line
    ///
    /// Used by streaming commands so entries appear as pages arrive.
    pub fn json_line<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// Spinner on stderr for long transfers
    ///
    /// Returns `None` in JSON or quiet mode.
    pub fn spinner(&self, message: String) -> Option<ProgressBar> {
        if self.config.quiet || self.config.json {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .expect("Valid template"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

/// Byte count as plain digits or, with `human`, binary units
pub fn format_size(bytes: u64, human: bool) -> String {
    if human {
        humansize::format_size(bytes, humansize::BINARY)
    } else {
        bytes.to_string()
    }
}

/// Listing-style timestamp, `-` when unknown
pub fn format_timestamp(ts: Option<Timestamp>) -> String {
    match ts {
        Some(ts) => ts.strftime("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
