//! Styled terminal output and the interactive prompter.

use std::io::{self, BufRead, Write};

use dbguard_core::diff::SimpleDiff;
use dbguard_core::{Outcome, Prompter, RiskLevel};
use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Print guard suggestions
pub fn suggestions(items: &[String]) {
    if items.is_empty() {
        return;
    }
    newline();
    section("Suggestions");
    for item in items {
        list_item(item);
    }
}

/// Print a line-set diff, local against remote
pub fn diff(diff: &SimpleDiff) {
    if diff.is_empty() {
        dim("  (bodies differ only in whitespace or line order)");
        return;
    }
    for line in &diff.additions {
        println!("  {} {}", "+".green().bold(), line.green());
    }
    for line in &diff.removals {
        println!("  {} {}", "-".red().bold(), line.red());
    }
}

/// Style a risk level by severity
pub fn style_risk(risk: RiskLevel) -> String {
    let text = risk.to_string();
    match risk {
        RiskLevel::Low => text.green().to_string(),
        RiskLevel::Medium => text.yellow().to_string(),
        RiskLevel::High => text.red().to_string(),
        RiskLevel::Critical => text.red().bold().to_string(),
    }
}

/// Style text as success (green)
pub fn style_success(text: &str) -> String {
    text.green().to_string()
}

/// Style text as pending (yellow)
pub fn style_pending(text: &str) -> String {
    text.yellow().to_string()
}

/// Style text as error (red)
pub fn style_error(text: &str) -> String {
    text.red().to_string()
}

/// Prompter reading from a line-oriented input.
///
/// End of input (Ctrl-D) or a read error cancels the prompt.
pub struct TerminalPrompter<R> {
    input: R,
}

impl TerminalPrompter<io::StdinLock<'static>> {
    /// Prompter over stdin
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    /// Prompter over any reader
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_line(&mut self) -> Outcome<String> {
        io::stdout().flush().ok();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => Outcome::Cancelled,
            Ok(_) => Outcome::Value(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn confirm(&mut self, message: &str) -> Outcome<bool> {
        print!("{} {} ", message, "[y/N]".dimmed());
        self.read_line()
            .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn text(&mut self, message: &str) -> Outcome<String> {
        print!("{}: ", message);
        self.read_line()
    }

    fn select(&mut self, message: &str, options: &[&str]) -> Outcome<usize> {
        println!("{}", message);
        for (i, option) in options.iter().enumerate() {
            println!("  {} {}", format!("{})", i + 1).dimmed(), option);
        }

        loop {
            print!("{}: ", "Select".dimmed());
            let answer = match self.read_line() {
                Outcome::Value(answer) => answer,
                Outcome::Cancelled => return Outcome::Cancelled,
            };
            if let Some(index) = answer
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0 && n <= options.len())
            {
                return Outcome::Value(index - 1);
            }
            println!("{}", style_error(&format!("Enter a number from 1 to {}", options.len())));
        }
    }
}
