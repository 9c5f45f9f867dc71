//! Output formatting module for forticfg
//!
//! Provides colored terminal output and a JSON mode for scripting.

use colored::Colorize;
use forticfg::command::{Command, Verb};
use forticfg::diff::DiffStats;
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        Self {
            use_color: use_color && std::env::var("NO_COLOR").is_err(),
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    /// True when results are printed as JSON
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// True when output is colored
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print a value as pretty JSON (JSON mode only)
    pub fn json<T: Serialize>(&self, value: &T) {
        if !self.json_mode {
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("Failed to serialize output: {}", e)),
        }
    }

    /// Print plain text exactly as given (human mode only)
    pub fn text(&self, text: &str) {
        if self.json_mode {
            return;
        }
        print!("{}", text);
        if !text.is_empty() && !text.ends_with('\n') {
            println!();
        }
    }

    /// Print a command script, coloring each verb
    pub fn script(&self, commands: &[Command], indent: usize) {
        if self.json_mode {
            return;
        }

        let mut depth = 0usize;
        for command in commands {
            let verb = command.verb();
            if verb == Verb::LeaveBlock {
                depth = depth.saturating_sub(1);
            }
            let line = format!("{}{}", " ".repeat(depth * indent), command.to_line());
            if self.use_color {
                let colored = match verb {
                    Verb::SetAttr => line.green().to_string(),
                    Verb::UnsetAttr | Verb::DeleteEntry => line.red().to_string(),
                    Verb::MoveEntry => line.yellow().to_string(),
                    _ => line.bright_black().to_string(),
                };
                println!("{}", colored);
            } else {
                println!("{}", line);
            }
            if command.entered_path().is_some() {
                depth += 1;
            }
        }
    }

    /// Print diff statistics
    pub fn stats(&self, stats: &DiffStats) {
        if self.json_mode {
            return;
        }
        println!("{}", stats.detailed_summary(self.use_color));
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("{}", message.green().bold());
        } else {
            println!("{}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "INFO:".blue(), message);
        } else {
            eprintln!("INFO: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.json_mode {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "DEBUG:".magenta(), message);
        } else {
            eprintln!("DEBUG: {}", message);
        }
    }

    /// Print how long the command took
    pub fn elapsed(&self) {
        if self.json_mode {
            return;
        }
        let duration = format_duration(self.start_time.elapsed());
        if self.use_color {
            println!("\n{} {}", "Finished in".bright_black(), duration.bright_white());
        } else {
            println!("\nFinished in {}", duration);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    if total_secs < 60 {
        return format!("{:.3}s", duration.as_secs_f64());
    }
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn test_json_mode_flag() {
        assert!(OutputFormatter::new(false, true, 0).is_json());
        assert!(!OutputFormatter::new(false, false, 0).is_json());
    }
}
