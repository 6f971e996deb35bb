use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use metadata_packager::builder::{FixedSourceRoot, PackageBuilder, SourceRootResolver};
use metadata_packager::config::{discover_source_root, Cli, Config};
use metadata_packager::error::PackageError;
use metadata_packager::registry::Registry;
use metadata_packager::writer::write_package;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn source_root_resolver(config: &Config) -> Box<dyn SourceRootResolver> {
    match &config.source_root {
        Some(root) => Box::new(FixedSourceRoot(root.clone())),
        None => Box::new(|| -> Result<PathBuf, PackageError> {
            let cwd = env::current_dir().map_err(|e| PackageError::io(".", e))?;
            discover_source_root(&cwd)
        }),
    }
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<PackageError>(), Some(PackageError::Cancelled))
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;
    init_tracing(config.verbose);

    // Setup Ctrl+C handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let registry = Registry::standard().context("Failed to build the type registry")?;
    let mut builder = PackageBuilder::new(&registry)
        .with_api_version(config.api_version.clone())
        .with_shutdown(shutdown.clone());

    let start = Instant::now();
    match collect(&mut builder, &config) {
        Ok(()) => {}
        Err(e) if is_cancelled(&e) || shutdown.load(Ordering::Relaxed) => {
            eprintln!("\nPackaging cancelled");
            return Ok(ExitCode::from(130));
        }
        Err(e) => return Err(e),
    }

    let package = builder.finalize().context("Failed to build package")?;
    if package.is_empty() {
        println!("No deployable metadata found");
        return Ok(ExitCode::SUCCESS);
    }

    if config.dry_run {
        for path in package.files().keys() {
            println!("{path}");
        }
        println!(
            "{} entities, {} files ({} bytes)",
            builder.size(),
            package.len(),
            package.total_bytes()
        );
        return Ok(ExitCode::SUCCESS);
    }

    // Progress bar only when not logging every file
    let progress = if config.verbose {
        None
    } else {
        let pb = ProgressBar::new(package.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let written = write_package(&package, &config.output, &shutdown, |path, _| {
        if let Some(ref pb) = progress {
            pb.set_message(path.to_string());
            pb.inc(1);
        }
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let (files, bytes) = match written {
        Ok(totals) => totals,
        Err(PackageError::Cancelled) => {
            eprintln!("\nPackaging cancelled");
            return Ok(ExitCode::from(130));
        }
        Err(e) => {
            let context = format!("Failed to write package to {}", config.output.display());
            return Err(anyhow::Error::new(e).context(context));
        }
    };

    let duration = start.elapsed();
    println!(
        "Packaged {} entities into {} files ({} bytes) at {} in {:.2}s",
        builder.size(),
        files,
        bytes,
        config.output.display(),
        duration.as_secs_f64()
    );
    if let Some(manifest) = package.manifest() {
        for type_name in manifest.types() {
            let count = manifest.members(type_name).map(|m| m.len()).unwrap_or(0);
            println!("  {type_name}: {count}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Add everything the configuration asks for
fn collect(builder: &mut PackageBuilder<'_>, config: &Config) -> Result<()> {
    for path in &config.paths {
        builder
            .add(path)
            .with_context(|| format!("Could not add {}", path.display()))?;
    }

    if config.needs_source_root() {
        let resolver = source_root_resolver(config);
        if config.names.is_empty() {
            for type_name in &config.types {
                builder
                    .add_metadata_type(type_name, resolver.as_ref())
                    .with_context(|| format!("Could not add metadata type {type_name}"))?;
            }
        } else if let Some(type_name) = config.types.first() {
            for name in &config.names {
                builder
                    .add_metadata_item(type_name, name, resolver.as_ref())
                    .with_context(|| format!("Could not find {name} of type {type_name}"))?;
            }
        }
    }

    Ok(())
}
