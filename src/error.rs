use std::path::PathBuf;
use thiserror::Error;

/// Packaging error types
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Could not parse as XML: {path}")]
    NotXml {
        path: PathBuf,
        #[source]
        source: SniffError,
    },

    #[error("Unrecognized metadata type <{element}> in {path}")]
    UnrecognizedType { path: PathBuf, element: String },

    #[error("Could not identify metadata type: {path}")]
    MetadataFileNotFound { path: PathBuf },

    #[error("Could not read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not merge {child} into {parent}: {reason}")]
    Merge {
        parent: String,
        child: String,
        reason: String,
    },

    #[error("Invalid metadata document: {path}")]
    Document {
        path: PathBuf,
        #[source]
        source: crate::document::DocumentError,
    },

    #[error("Unknown metadata type: {type_name}")]
    UnknownType { type_name: String },

    #[error("Could not identify source directory: {reason}")]
    SourceRoot { reason: String },

    #[error("Failed to find {name} in {dir}")]
    NameNotFound { name: String, dir: PathBuf },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Packaging cancelled")]
    Cancelled,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PackageError {
    /// Wrap an I/O error with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reasons a file is rejected as a metadata descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SniffError {
    #[error("No XML declaration found")]
    NoDeclaration,

    #[error("No XML elements found")]
    NoElements,

    #[error("Error while parsing XML: {0}")]
    Malformed(String),
}

/// Type registration errors, raised while the registry is being built
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Metadata type registered twice: {type_name}")]
    Duplicate { type_name: String },
}
