//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Mioo CLI.

use crate::types::{DisplayPayload, FlowStep, TurnState};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Mioo banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "mioo".bright_magenta().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   mioo v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("  {}: {}", key.dimmed(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    /// Print the agents that took part in a turn, in call order
    pub fn flow(&self, flow: &[FlowStep], state: TurnState) {
        let roles: Vec<&str> = flow.iter().map(|step| step.role.as_str()).collect();
        let trace = roles.join(" → ");
        let state = format!("{:?}", state).to_lowercase();
        if self.colored {
            println!("  {} {} {}", "flow".dimmed(), trace.bright_cyan(), format!("[{}]", state).dimmed());
        } else {
            println!("  flow {} [{}]", trace, state);
        }
    }

    /// Print what the end user would see
    pub fn payload(&self, payload: &DisplayPayload) {
        let body = render_payload(payload);
        println!();
        for line in body.lines() {
            println!("  {}", line);
        }
        println!();
    }
}

/// Text form of a payload: markdown as is, structured replies pretty-printed.
pub fn render_payload(payload: &DisplayPayload) -> String {
    match payload {
        DisplayPayload::Text(text) => text.clone(),
        DisplayPayload::Structured(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}
