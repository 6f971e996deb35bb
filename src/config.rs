//! CLI configuration and runtime settings for metadata packaging.

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::PackageError;
use crate::manifest::{ApiVersion, DEFAULT_API_VERSION};

/// Directory names searched for when no source root is given
const SOURCE_DIRS: &[&str] = &["src", "metadata"];

/// Build a deployable metadata package from a source tree
#[derive(Parser, Debug)]
#[command(name = "metadata-packager")]
#[command(version)]
#[command(about = "Build a deployable metadata package from a source tree")]
pub struct Cli {
    /// Files or directories to package
    pub paths: Vec<PathBuf>,

    /// Add every component of these metadata types (comma-separated)
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    pub metadata_type: Vec<String>,

    /// Add only the named components of the given type (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub name: Vec<String>,

    /// Output directory
    #[arg(short, long, default_value = "package")]
    pub output: PathBuf,

    /// Source root used to resolve --type and --name
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// API version written to package.xml
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// List the package contents instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runtime configuration parsed from CLI
#[derive(Debug, Clone)]
pub struct Config {
    /// Files or directories added as-is
    pub paths: Vec<PathBuf>,
    /// Types added in full
    pub types: Vec<String>,
    /// Named components of the single type in `types`
    pub names: Vec<String>,
    pub output: PathBuf,
    /// Explicit source root (None = discover from the working directory)
    pub source_root: Option<PathBuf>,
    pub api_version: ApiVersion,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Config {
    /// Create Config from CLI arguments
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let api_version = match ApiVersion::validated(&cli.api_version) {
            Ok(version) => version,
            Err(msg) => anyhow::bail!(msg),
        };

        let types: Vec<String> = cli
            .metadata_type
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let names: Vec<String> = cli
            .name
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        if !names.is_empty() && types.len() != 1 {
            anyhow::bail!("--name requires exactly one --type");
        }
        if cli.paths.is_empty() && types.is_empty() {
            anyhow::bail!("nothing to package: pass paths or --type");
        }

        Ok(Config {
            paths: cli.paths,
            types,
            names,
            output: cli.output,
            source_root: cli.source_root,
            api_version,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
        })
    }

    /// Whether --type/--name need a source root
    #[inline]
    pub fn needs_source_root(&self) -> bool {
        !self.types.is_empty()
    }
}

/// Find the source root for `start`: the first `src` or `metadata`
/// directory in `start` or any of its ancestors.
pub fn discover_source_root(start: &Path) -> Result<PathBuf, PackageError> {
    for dir in start.ancestors() {
        for name in SOURCE_DIRS {
            let candidate = dir.join(name);
            if candidate.is_dir() {
                return Ok(candidate);
            }
        }
    }
    Err(PackageError::SourceRoot {
        reason: format!(
            "no {} directory in {} or its parents",
            SOURCE_DIRS.join(" or "),
            start.display()
        ),
    })
}
