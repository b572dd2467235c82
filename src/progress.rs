//! Terminal progress for convergence runs
//!
//! A single bar advances once per resource; its message shows the resource
//! being worked on, and finished resources are printed above it with their
//! status symbol.

use colored::Colorize;
use declarative::{Outcome, ProgressCallback, ResourceKey, ResourceState};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Status symbol for a finished resource
pub fn symbol(outcome: &Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Unchanged => "○".dimmed(),
        Outcome::Applied { .. } => "✓".green(),
        Outcome::Failed { .. } => "✗".red(),
        Outcome::Blocked { .. } => "⊘".yellow(),
    }
}

/// Renders engine progress on stderr
pub struct ConvergeProgress {
    bar: ProgressBar,
    visible: bool,
    /// Also print resources that needed no change
    show_unchanged: bool,
}

impl ConvergeProgress {
    pub fn new(show_unchanged: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            visible: true,
            show_unchanged,
        }
    }

    /// No bar, no lines; for `--quiet` and `--json`
    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::new(false)
        }
    }

    fn start_bar(total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{pos}/{len}] {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

impl ProgressCallback for ConvergeProgress {
    fn on_run_start(&mut self, total: usize) {
        if self.visible {
            self.bar = Self::start_bar(total as u64);
        }
    }

    fn on_probed(&mut self, key: &ResourceKey, current: &ResourceState) {
        self.bar.set_message(format!("{key} ({current})"));
    }

    fn on_apply_start(&mut self, _key: &ResourceKey, description: &str) {
        self.bar.set_message(description.to_string());
    }

    fn on_resource_complete(&mut self, key: &ResourceKey, outcome: &Outcome) {
        self.bar.inc(1);
        if !self.visible || (matches!(outcome, Outcome::Unchanged) && !self.show_unchanged) {
            return;
        }
        let line = match outcome.error_line() {
            Some(err) => format!("  {} {} {}", symbol(outcome), key, err.dimmed()),
            None => format!("  {} {} {}", symbol(outcome), key, outcome.label().dimmed()),
        };
        self.bar.suspend(|| eprintln!("{line}"));
    }

    fn on_run_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}
