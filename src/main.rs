use anyhow::{Context, Result};
use clap::Parser;
use mediasort::mediasort_core::error::{EXIT_FAILURE, EXIT_SUCCESS};
use mediasort::mediasort_core::process::check_dependencies;
use mediasort::mediasort_core::{
    Cli, ExifToolProvider, HeifConverter, MediaDecoder, MediaPipeline, MediaSortError,
};
use simplelog::{
    CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger, WriteLogger,
};
use std::fs::OpenOptions;
use std::process::ExitCode;

fn init_logging(cli: &Cli) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];

    if !cli.no_log_file {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        // Entries stay in UTC where the local offset cannot be determined.
        let _ = builder.set_time_offset_to_local();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cli.log_file)
            .with_context(|| format!("Cannot open log file {}", cli.log_file.display()))?;
        loggers.push(WriteLogger::new(cli.log_level, builder.build(), file));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    if !cli.input_dir.exists() {
        return Err(MediaSortError::PathNotFound(cli.input_dir.clone()).into());
    }
    if !cli.input_dir.is_dir() {
        return Err(MediaSortError::NotADirectory(cli.input_dir.clone()).into());
    }

    check_dependencies(&cli.converter, &cli.ffmpeg)?;

    let timeout = cli.tool_timeout();
    let mut pipeline = MediaPipeline::new(
        cli.pipeline_config(),
        Box::new(ExifToolProvider::new(timeout)),
        Box::new(HeifConverter::new(&cli.converter, timeout)),
        Box::new(MediaDecoder::new(&cli.ffmpeg, timeout)),
    );

    log::info!(
        "Sorting {} into {}",
        cli.input_dir.display(),
        cli.output.display()
    );

    let stats = pipeline
        .run(&cli.input_dir)
        .with_context(|| format!("Failed to sort {}", cli.input_dir.display()))?;

    if cli.dry_run {
        println!("\n[DRY RUN] Nothing was moved.");
    } else {
        println!("\nSort complete!");
    }
    println!("  {} files archived", stats.archived);
    if stats.duplicates > 0 {
        println!("  {} duplicates tagged", stats.duplicates);
    }
    if stats.collisions > 0 {
        println!("  {} renamed to avoid overwriting", stats.collisions);
    }
    if stats.unsupported > 0 {
        println!("  {} unsupported files skipped", stats.unsupported);
    }
    if stats.failed > 0 {
        println!("  {} files failed (see log)", stats.failed);
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(&cli) {
        Ok(()) => {
            log::info!("Done");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            log::error!("{:#}", e);
            let code = e
                .downcast_ref::<MediaSortError>()
                .map(MediaSortError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            ExitCode::from(code)
        }
    }
}
