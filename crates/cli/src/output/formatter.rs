//! Output formatter for human-readable and JSON-lines output
//!
//! The formatter is also the engine's [`Reporter`]: every listed entry and
//! every (simulated) mutation is printed as it happens.

use std::io::Write;

use console::Style;
use humansize::{BINARY, format_size};
use jiff::Timestamp;
use jiff::tz::TimeZone;
use s3tree_core::{BucketUsage, Event, Reporter};
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
    /// Dry-run markers - yellow
    pub dry_run: Style,
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
            dry_run: Style::new().yellow(),
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
            dry_run: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warning: Style::new(),
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled, every event is one compact JSON object per
/// line, without colors or progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
    time_zone: TimeZone,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self {
            config,
            theme,
            time_zone: TimeZone::system(),
        }
    }

    /// Render timestamps in `time_zone` instead of the system zone
    #[cfg(test)]
    fn with_time_zone(mut self, time_zone: TimeZone) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    fn style(&self, style: &Style, text: &str) -> String {
        style.apply_to(text).to_string()
    }

    fn date(&self, ts: Option<Timestamp>) -> String {
        match ts {
            Some(ts) => ts
                .to_zoned(self.time_zone.clone())
                .strftime("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => format!("{:<19}", "-"),
        }
    }

    fn dry_run_marker(&self, dry_run: bool) -> String {
        if dry_run {
            format!("{} ", self.style(&self.theme.dry_run, "[dry-run]"))
        } else {
            String::new()
        }
    }

    /// Human-readable line for an event, `None` when nothing is printed
    pub fn render_human(&self, event: &Event) -> Option<String> {
        match event {
            Event::ListedPrefix { prefix } => Some(format!(
                "{:>28}  {}",
                "PREFIX",
                self.style(&self.theme.dir, prefix)
            )),
            Event::ListedObject {
                display_key,
                object,
            } => Some(format!(
                "{} {}  {}",
                self.style(&self.theme.date, &self.date(object.last_modified)),
                self.style(
                    &self.theme.size,
                    &format!("{:>8}", format_size(object.size_bytes(), BINARY))
                ),
                self.style(&self.theme.file, display_key),
            )),
            Event::Deleting {
                key,
                version_id,
                dry_run,
                ..
            } => {
                let version = version_id
                    .as_deref()
                    .map(|v| format!(" (version {v})"))
                    .unwrap_or_default();
                Some(format!(
                    "{}delete {key}{version}",
                    self.dry_run_marker(*dry_run)
                ))
            }
            // real downloads are reported by their progress line
            Event::Downloaded {
                key,
                target,
                dry_run: true,
                ..
            } => Some(format!(
                "{}get {key} -> {}",
                self.dry_run_marker(true),
                target.display()
            )),
            Event::Downloaded { .. } => None,
            Event::AbortingUpload {
                key,
                upload_id,
                dry_run,
            } => Some(format!(
                "{}abort upload {upload_id} of {key}",
                self.dry_run_marker(*dry_run)
            )),
            Event::Usage(usage) => Some(usage_line(usage)),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        let checkmark = self.theme.success.apply_to("✓");
        println!("{checkmark} {message}");
    }

    /// Print an error message. Errors are printed even in quiet mode.
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

    /// Print one compact JSON line
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
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

impl Reporter for Formatter {
    fn report(&self, event: &Event) {
        if self.config.quiet {
            return;
        }
        if self.config.json {
            self.json_line(event);
            return;
        }
        if let Some(line) = self.render_human(event) {
            println!("{line}");
        }
    }

    fn progress_output(&self) -> Box<dyn Write + Send> {
        if self.config.json || self.config.quiet {
            Box::new(std::io::sink())
        } else {
            Box::new(std::io::stdout())
        }
    }
}

fn usage_line(usage: &BucketUsage) -> String {
    let part = |bytes: u64, count: u64| format!("{} ({count})", format_size(bytes, BINARY));
    format!(
        "current: {} | versions: {} | multiparts: {} | total: {}",
        part(usage.current_bytes, usage.current_count),
        part(usage.versioned_bytes, usage.versioned_count),
        part(usage.multipart_bytes, usage.multipart_count),
        part(usage.total_bytes(), usage.total_count()),
    )
}
