use std::io::{self, IsTerminal, Write};

pub struct OutputConfig {
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
    /// Stdout carries the converted document, so messages must go to stderr.
    pub document_on_stdout: bool,
}

impl OutputConfig {
    pub fn from_global(json: bool, verbose: bool, quiet: bool, no_color: bool) -> Self {
        let no_color = no_color || std::env::var("NO_COLOR").is_ok() || !io::stdout().is_terminal();
        Self {
            json,
            verbose,
            quiet,
            no_color,
            document_on_stdout: false,
        }
    }

    pub fn is_tty(&self) -> bool {
        io::stdout().is_terminal()
    }

    fn message(&self, msg: &str) {
        if self.document_on_stdout {
            eprintln!("{msg}");
        } else {
            println!("{msg}");
        }
    }

    /// Print a status/confirmation message (suppressed in quiet mode).
    pub fn status(&self, msg: &str) {
        if !self.quiet {
            self.message(msg);
        }
    }

    /// Print extra detail (only shown in verbose mode, suppressed in quiet mode).
    pub fn detail(&self, msg: &str) {
        if self.verbose && !self.quiet {
            self.message(msg);
        }
    }

    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    /// Print rows aligned under `headers`; tab-separated when piped or colorless.
    pub fn print_table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if rows.is_empty() {
            return;
        }

        let aligned = self.is_tty() && !self.no_color;
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let render = |cells: &[&str]| -> String {
            if aligned {
                cells
                    .iter()
                    .zip(&widths)
                    .map(|(c, &w)| format!("{c:<w$}"))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            } else {
                cells.join("\t")
            }
        };

        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", render(headers));
        if aligned {
            let sep = widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  ");
            let _ = writeln!(stdout, "{sep}");
        }
        for row in rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            let _ = writeln!(stdout, "{}", render(&cells));
        }
    }
}
