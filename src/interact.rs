//! Prompting and progress reporting.
//!
//! Conversion code only sees the [`Prompter`] and [`Reporter`] traits, so it runs the same
//! with a terminal attached, in a pipe, or under test.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use sysinfo::System;

/// Asks the user for run options. Every method returns `None` when no answer is available.
pub trait Prompter {
    /// Pick one of `options`, returning its index.
    fn choose(&mut self, question: &str, options: &[&str]) -> Option<usize>;
    fn confirm(&mut self, question: &str) -> Option<bool>;
    /// Free-form answer; empty input counts as no answer.
    fn ask(&mut self, question: &str) -> Option<String>;
}

/// Prompter for non-interactive runs: every question goes unanswered.
#[derive(Debug, Default)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn choose(&mut self, _question: &str, _options: &[&str]) -> Option<usize> {
        None
    }

    fn confirm(&mut self, _question: &str) -> Option<bool> {
        None
    }

    fn ask(&mut self, _question: &str) -> Option<String> {
        None
    }
}

/// Reads answers from stdin, writing questions to stderr so stdout stays clean.
pub struct TerminalPrompter<R> {
    input: R,
}

impl TerminalPrompter<io::StdinLock<'static>> {
    /// A prompter on stdin, or `None` when stdin is not a terminal.
    pub fn stdin() -> Option<Self> {
        let stdin = io::stdin();
        stdin.is_terminal().then(|| Self {
            input: stdin.lock(),
        })
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_answer(&mut self, question: &str) -> Option<String> {
        eprint!("{question} ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()).filter(|s| !s.is_empty()),
        }
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn choose(&mut self, question: &str, options: &[&str]) -> Option<usize> {
        eprintln!("{question}");
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}) {option}", i + 1);
        }
        let answer = self.read_answer(&format!("Select [1-{}]:", options.len()))?;
        if let Ok(n) = answer.parse::<usize>() {
            return (1..=options.len()).contains(&n).then(|| n - 1);
        }
        options
            .iter()
            .position(|o| o.eq_ignore_ascii_case(&answer))
    }

    fn confirm(&mut self, question: &str) -> Option<bool> {
        let answer = self.read_answer(&format!("{question} [y/n]:"))?;
        match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(true),
            "n" | "no" => Some(false),
            _ => None,
        }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        self.read_answer(question)
    }
}

/// Snapshot of conversion progress
#[derive(Debug, Clone)]
pub struct Progress<'a> {
    pub processed: usize,
    pub total: usize,
    /// Label of the chapter just finished.
    pub label: &'a str,
}

pub trait Reporter {
    fn report(&mut self, progress: &Progress<'_>);
    /// Called once after the last chapter.
    fn finish(&mut self) {}
}

#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&mut self, _progress: &Progress<'_>) {}
}

/// Progress line layout: percent, a 30-cell bar, counters, then label and memory.
const PROGRESS_TEMPLATE: &str = "{percent:>3}% [{bar:30}] {pos}/{len} {msg}";

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>.")
}

/// Draws an indicatif progress bar on stderr with resident memory of this process.
pub struct TerminalReporter {
    bar: ProgressBar,
    system: System,
    pid: Option<sysinfo::Pid>,
}

impl TerminalReporter {
    /// A reporter on stderr, or `None` when stderr is not a terminal.
    pub fn stderr() -> Option<Self> {
        io::stderr()
            .is_terminal()
            .then(|| Self::with_target(ProgressDrawTarget::stderr()))
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        bar.set_style(progress_style());
        Self {
            bar,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    fn memory_mb(&mut self) -> Option<f64> {
        let pid = self.pid?;
        self.system.refresh_process(pid);
        self.system
            .process(pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
    }
}

impl Reporter for TerminalReporter {
    fn report(&mut self, progress: &Progress<'_>) {
        let memory = self
            .memory_mb()
            .map(|mb| format!(" ({mb:.1} MB)"))
            .unwrap_or_default();
        let label: String = progress.label.chars().take(30).collect();
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.processed as u64);
        self.bar.set_message(format!("{label}{memory}"));
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}
