mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use cli::output::OutputConfig;
use epubmark::convert::assets::AssetCollector;
use epubmark::convert::output::{join_single, split_folder, write_single, write_split};
use epubmark::convert::segment::Segmentation;
use epubmark::convert::{self, ChoiceFlags, Choices, OutputMode};
use epubmark::epub::Package;
use epubmark::epub::archive::PackageSource;
use epubmark::epub::reader::read_package;
use epubmark::interact::{
    NoPrompt, Prompter, Reporter, SilentReporter, TerminalPrompter, TerminalReporter,
};
use serde_json::json;
use std::path::{Path, PathBuf};

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Remove the unpacked archive if the run is interrupted.
fn install_interrupt_cleanup(temp: &Path) -> Result<()> {
    let temp = temp.to_path_buf();
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_dir_all(&temp);
        std::process::exit(130);
    })
    .context("failed to install interrupt handler")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut output = OutputConfig::from_global(cli.json, cli.verbose, cli.quiet, cli.no_color);

    let mut cleanup = Ok(());
    let source = PackageSource::open_with(&cli.input, |temp| {
        cleanup = install_interrupt_cleanup(temp);
    })
    .with_context(|| format!("failed to open {}", cli.input.display()))?;
    cleanup?;

    let package = read_package(source.root())
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let segmentation = convert::plan(&package)
        .with_context(|| format!("failed to find chapters in {}", cli.input.display()))?;

    if cli.list {
        return print_plan(&output, &package, &segmentation);
    }

    let flags = ChoiceFlags {
        mode: cli.mode.map(Into::into),
        images: cli.images.then_some(true),
        needs_folder: cli.output.is_none() && cli.folder.is_none() && package.title().is_none(),
    };
    let mut prompter: Box<dyn Prompter> = match TerminalPrompter::stdin() {
        Some(prompter) => Box::new(prompter),
        None => Box::new(NoPrompt),
    };
    let choices = convert::resolve_choices(&flags, prompter.as_mut());
    output.document_on_stdout = choices.mode == OutputMode::Single && cli.output.is_none();
    output.detail(&format!(
        "{} chapters ({:?} order)",
        segmentation.chapters.len(),
        segmentation.mode
    ));

    let mut reporter: Box<dyn Reporter> = match TerminalReporter::stderr() {
        Some(reporter) if !cli.quiet => Box::new(reporter),
        _ => Box::new(SilentReporter),
    };

    match choices.mode {
        OutputMode::Single => {
            let chapters = convert::render(&segmentation, None, reporter.as_mut());
            let text = join_single(&chapters, cli.headings);
            write_single(cli.output.as_deref(), &text).context("failed to write output")?;

            if cli.json && cli.output.is_some() {
                output.print_json(&json!({
                    "mode": OutputMode::Single,
                    "chapters": chapters.len(),
                    "output": cli.output,
                }))?;
            } else if let Some(path) = &cli.output {
                output.status(&format!(
                    "Wrote {} chapters to {}",
                    chapters.len(),
                    path.display()
                ));
            }
        }
        OutputMode::Split => {
            run_split(&cli, &output, &package, &segmentation, &choices, reporter.as_mut())?;
        }
    }

    for warning in package.warnings.iter().chain(&segmentation.warnings) {
        output.detail(&format!("warning: {warning}"));
    }
    Ok(())
}

fn run_split(
    cli: &Cli,
    output: &OutputConfig,
    package: &Package,
    segmentation: &Segmentation,
    choices: &Choices,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    let explicit = cli
        .output
        .clone()
        .or_else(|| cli.folder.as_ref().map(|name| sibling_of_input(cli, name)));
    let dir = split_folder(
        explicit.as_deref(),
        package.title(),
        choices.folder.as_deref(),
        &cli.input,
    );

    let mut collector = choices
        .images
        .then(|| AssetCollector::new(&package.root, package.opf_dir()));
    let chapters = convert::render(segmentation, collector.as_mut(), reporter);
    let written = write_split(&dir, &chapters)
        .with_context(|| format!("failed to write chapters to {}", dir.display()))?;

    let copy = collector.map(|c| c.copy_all(&dir)).unwrap_or_default();

    if cli.json {
        output.print_json(&json!({
            "mode": OutputMode::Split,
            "chapters": written.len(),
            "images": copy.copied,
            "output": dir,
            "files": written,
            "warnings": copy.warnings,
        }))?;
    } else {
        output.status(&format!(
            "Wrote {} chapters to {}",
            written.len(),
            dir.display()
        ));
        if choices.images {
            output.status(&format!("Copied {} images", copy.copied));
        }
        for path in &written {
            output.detail(&format!("  {}", path.display()));
        }
    }
    Ok(())
}

fn sibling_of_input(cli: &Cli, name: &str) -> PathBuf {
    cli.input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from(name), |parent| parent.join(name))
}

fn print_plan(output: &OutputConfig, package: &Package, segmentation: &Segmentation) -> Result<()> {
    let summary = convert::summarize_plan(package, segmentation);
    if output.json {
        return output.print_json(&summary);
    }

    let rows: Vec<Vec<String>> = summary
        .chapters
        .iter()
        .map(|entry| {
            vec![
                entry.index.to_string(),
                entry.label.clone(),
                entry.source.clone(),
                format!("{}..{}", entry.start, entry.end),
            ]
        })
        .collect();
    output.print_table(&["#", "Label", "Source", "Range"], &rows);
    Ok(())
}
