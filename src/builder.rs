//! Package builder.
//!
//! Collects entities from files and directories, deduplicated by their
//! unique identity, and finalizes them into the output file set plus the
//! `package.xml` manifest. Building is single-threaded; a builder is owned
//! by one build for its whole lifetime.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::classifier::Classifier;
use crate::error::PackageError;
use crate::files::{is_test_file, should_skip};
use crate::manifest::{ApiVersion, Manifest, MANIFEST_FILE};
use crate::merger::merge_all;
use crate::metadata::Entity;
use crate::paths::{file_name, strip_meta_suffix};
use crate::registry::Registry;

/// Supplies the source root used to resolve bare type names to directories
pub trait SourceRootResolver {
    fn resolve_source_root(&self) -> Result<PathBuf, PackageError>;
}

impl<F> SourceRootResolver for F
where
    F: Fn() -> Result<PathBuf, PackageError>,
{
    fn resolve_source_root(&self) -> Result<PathBuf, PackageError> {
        self()
    }
}

/// Resolver returning a path chosen up front
#[derive(Debug, Clone)]
pub struct FixedSourceRoot(pub PathBuf);

impl SourceRootResolver for FixedSourceRoot {
    fn resolve_source_root(&self) -> Result<PathBuf, PackageError> {
        if self.0.is_dir() {
            Ok(self.0.clone())
        } else {
            Err(PackageError::SourceRoot {
                reason: format!("{} is not a directory", self.0.display()),
            })
        }
    }
}

/// Finalized output of a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    files: BTreeMap<String, Vec<u8>>,
    manifest: Option<Manifest>,
}

impl Package {
    /// Relative `/`-separated output path to file content, manifest included
    #[inline]
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Generated manifest; `None` for an empty build
    #[inline]
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all file contents in bytes
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|c| c.len() as u64).sum()
    }

    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }
}

/// Accumulates entities and produces a [`Package`]
#[derive(Debug)]
pub struct PackageBuilder<'r> {
    classifier: Classifier<'r>,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    api_version: ApiVersion,
    shutdown: Option<Arc<AtomicBool>>,
}

impl<'r> PackageBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            classifier: Classifier::new(registry),
            entities: Vec::new(),
            index: HashMap::new(),
            api_version: ApiVersion::default(),
            shutdown: None,
        }
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    /// Check `shutdown` between directory entries and abort when it is set
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Add a file or a directory tree
    pub fn add(&mut self, path: &Path) -> Result<(), PackageError> {
        let meta = fs::metadata(path).map_err(|e| PackageError::io(path, e))?;
        let path = canonical_path(path)?;
        if meta.is_dir() {
            self.add_directory(&path)
        } else {
            self.add_file(&path)
        }
    }

    /// Add every file below `dir`, in file name order.
    ///
    /// Dotfiles, `__tests__` directories and `*.test.js` files are skipped.
    /// The first file that cannot be classified aborts the walk.
    pub fn add_directory(&mut self, dir: &Path) -> Result<(), PackageError> {
        let root = fs::canonicalize(dir).map_err(|e| PackageError::io(dir, e))?;
        let dir = root.as_path();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let skip = should_skip(e.path(), e.file_type().is_dir());
                if skip {
                    tracing::debug!(path = %e.path().display(), "skipping");
                }
                !skip
            });

        for entry in walker {
            if self.cancelled() {
                return Err(PackageError::Cancelled);
            }
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                PackageError::io(path, e.into())
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            self.add_file(entry.path())?;
        }
        Ok(())
    }

    /// Classify and store a single file. Test files are ignored.
    pub fn add_file(&mut self, path: &Path) -> Result<(), PackageError> {
        if is_test_file(&file_name(path)) {
            tracing::debug!(path = %path.display(), "ignoring test file");
            return Ok(());
        }

        let path = canonical_path(path)?;
        let entity = self.classifier.classify(&path)?;
        let id = entity.unique_id();
        tracing::debug!(path = %path.display(), id = %id, "adding");
        match self.index.get(&id) {
            Some(&idx) => self.entities[idx] = entity,
            None => {
                self.index.insert(id, self.entities.len());
                self.entities.push(entity);
            }
        }
        Ok(())
    }

    /// Number of distinct entities added so far
    #[inline]
    pub fn size(&self) -> usize {
        self.entities.len()
    }

    /// Entities in the order they were first added
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Read every source file, merge object components, and generate the
    /// manifest. An empty build yields an empty package without a manifest.
    ///
    /// Sources are re-read on every call.
    pub fn finalize(&self) -> Result<Package, PackageError> {
        if self.entities.is_empty() {
            return Ok(Package::default());
        }

        let mut files = BTreeMap::new();
        let mut manifest = Manifest::new(self.api_version.clone());

        for entity in self.entities.iter().filter(|e| !e.is_mergeable()) {
            files.extend(entity.files()?);
            if entity.in_manifest() {
                manifest.add(entity.deployed_type(), entity.name());
            }
        }

        let merged = merge_all(self.entities.iter().filter(|e| e.is_mergeable()))?;
        for parent in merged {
            tracing::debug!(path = %parent.path, "writing merged parent");
            manifest.add(parent.type_name, parent.name);
            files.insert(parent.path, parent.contents);
        }

        let xml = manifest.to_xml().map_err(|source| PackageError::Document {
            path: PathBuf::from(MANIFEST_FILE),
            source,
        })?;
        if files.insert(MANIFEST_FILE.to_string(), xml).is_some() {
            tracing::warn!("a source {MANIFEST_FILE} was replaced by the generated manifest");
        }

        tracing::info!(
            entities = self.entities.len(),
            files = files.len(),
            types = manifest.types().count(),
            "package finalized"
        );
        Ok(Package {
            files,
            manifest: Some(manifest),
        })
    }

    /// Directory holding components of `type_name` under the source root.
    ///
    /// Types without a directory of their own (`Package`) are rejected.
    pub fn metadata_dir(
        &self,
        type_name: &str,
        resolver: &dyn SourceRootResolver,
    ) -> Result<PathBuf, PackageError> {
        let dir = self
            .classifier
            .registry()
            .lookup_directory(type_name)
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| PackageError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        let root = resolver.resolve_source_root()?;
        let root = fs::canonicalize(&root).map_err(|e| PackageError::io(&root, e))?;
        Ok(root.join(dir))
    }

    /// Add every component of a type
    pub fn add_metadata_type(
        &mut self,
        type_name: &str,
        resolver: &dyn SourceRootResolver,
    ) -> Result<(), PackageError> {
        let dir = self.metadata_dir(type_name, resolver)?;
        tracing::info!(type_name, dir = %dir.display(), "adding metadata type");
        self.add_directory(&dir)
    }

    /// Add one named component of a type
    pub fn add_metadata_item(
        &mut self,
        type_name: &str,
        name: &str,
        resolver: &dyn SourceRootResolver,
    ) -> Result<(), PackageError> {
        let dir = self.metadata_dir(type_name, resolver)?;
        let path = find_metadata_path(&dir, name)?;
        tracing::info!(type_name, name, path = %path.display(), "adding metadata item");
        self.add(&path)
    }
}

/// Absolute form of `path` with `.`, `..` and directory links resolved.
///
/// The final segment is kept as given, so a linked file stays under the
/// directory it was listed in. Every spelling of one file maps to the same
/// result, which makes it usable as an entity identity.
fn canonical_path(path: &Path) -> Result<PathBuf, PackageError> {
    let Some(name) = path.file_name() else {
        return fs::canonicalize(path).map_err(|e| PackageError::io(path, e));
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = fs::canonicalize(parent).map_err(|e| PackageError::io(path, e))?;
    Ok(dir.join(name))
}

/// Strip `-meta.xml` and the extension of the last segment
fn without_extension(relative: &str) -> &str {
    let relative = strip_meta_suffix(relative);
    let start = relative.rfind('/').map(|i| i + 1).unwrap_or(0);
    match relative[start..].rfind('.') {
        Some(0) | None => relative,
        Some(dot) => &relative[..start + dot],
    }
}

/// Find the first entry below `root` whose name matches `name`,
/// ignoring case, extension and `-meta.xml`.
///
/// Both the path relative to `root` (`MyFolder/MyReport`) and the bare
/// name are compared. With several matches the first in walk order wins.
pub fn find_metadata_path(root: &Path, name: &str) -> Result<PathBuf, PackageError> {
    let meta = fs::metadata(root).map_err(|e| PackageError::io(root, e))?;
    if !meta.is_dir() {
        return Err(PackageError::SourceRoot {
            reason: format!("{} is not a directory", root.display()),
        });
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !should_skip(e.path(), e.file_type().is_dir()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "error while looking for metadata");
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let base = file_name(entry.path());
        if without_extension(&relative).eq_ignore_ascii_case(name)
            || without_extension(&base).eq_ignore_ascii_case(name)
        {
            return Ok(entry.into_path());
        }
    }

    Err(PackageError::NameNotFound {
        name: name.to_string(),
        dir: root.to_path_buf(),
    })
}
