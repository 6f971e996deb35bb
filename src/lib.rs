//! # Metadata Packager
//!
//! Builds deployable metadata packages from a source tree.
//!
//! Files are classified by the root element of their XML descriptor, grouped
//! into logical components, and emitted as a relative path to content map
//! together with a generated `package.xml` manifest.
//!
//! ## Features
//!
//! - Classification by XML root element with companion and bundle lookup
//! - Content pairs, bundles, foldered types and folder descriptors
//! - Object components merged into their parent object document
//! - Deterministic manifest generation
//! - Cancellation between directory entries
//!
//! ## Usage
//!
//! ```ignore
//! use metadata_packager::builder::PackageBuilder;
//! use metadata_packager::registry::Registry;
//!
//! let registry = Registry::standard()?;
//! let mut builder = PackageBuilder::new(&registry);
//! builder.add(Path::new("src"))?;
//! let package = builder.finalize()?;
//! ```

/// Package builder and source root resolution
pub mod builder;

/// Path classification and root element sniffing
pub mod classifier;

/// CLI configuration and argument parsing
pub mod config;

/// Minimal XML element tree
pub mod document;

/// Error types for packaging operations
pub mod error;

/// Skip rules and output path strategies
pub mod files;

/// Manifest model and API version
pub mod manifest;

/// Merging of object components into parent documents
pub mod merger;

/// Deployable entities and their kinds
pub mod metadata;

/// Pure path naming helpers
pub mod paths;

/// Metadata type registry
pub mod registry;

/// Writing a package to disk
pub mod writer;
