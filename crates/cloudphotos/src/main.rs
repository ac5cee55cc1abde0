//! `cloudphotos` - copy new iCloud photos into an import folder

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use cloudphotos::cli::Cli;
use cloudphotos::importer::ensure_directory;
use cloudphotos::{init_logging, CommandConverter, Config, ImportSummary, Importer, Storage};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.clone()).context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_logging(cli.verbosity(), config.log_file().as_deref())
        .context("setting up logging")?;

    ensure_directory(&cli.source, "source")?;
    ensure_directory(&cli.destination, "destination")?;

    let storage = Storage::open(config.database_path()).context("opening ledger")?;

    let converter = if config.import.convert_heic {
        CommandConverter::locate(&config.import.converter).unwrap_or_else(|e| {
            warn!("{e}; HEIC files will fail to import");
            CommandConverter::new(&config.import.converter)
        })
    } else {
        CommandConverter::new(&config.import.converter)
    };

    let importer = Importer::new(
        &storage,
        &converter,
        &cli.destination,
        config.import_options(cli.dry_run),
    );
    let summary = importer.run(&cli.source)?;

    if cli.json {
        println!("{}", summary.to_json()?);
    } else if !cli.quiet {
        print_summary(&summary, storage.count()?);
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &ImportSummary, ledger_total: i64) {
    let label = if summary.dry_run {
        "Would copy:"
    } else {
        "Copied:"
    };
    println!("Scanned:         {}", summary.scanned);
    println!(
        "{label:<17}{} ({} new names, {} new versions)",
        summary.total_copied(),
        summary.first_pass_copied,
        summary.second_pass_copied,
    );
    println!("Already copied:  {}", summary.already_copied);
    println!("Failed:          {}", summary.failed);
    println!("Ledger entries:  {ledger_total}");
}
