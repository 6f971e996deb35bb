//! Deployable entities and their kinds.
//!
//! An [`Entity`] is one deployable logical unit found in a source tree. Its
//! [`EntityKind`] decides how the deployed name and the output paths are
//! computed from the canonical defining path (the metadata descriptor).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PackageError;
use crate::files::{all_files_in_folder, metadata_and_content_files, read_files};
use crate::paths::{
    component_name, file_name, flat_output_path, folder_descriptor_path, foldered_component_name,
    root_relative_path, strip_meta_suffix, META_SUFFIX,
};
use crate::registry::TypeInfo;

/// How the content file of a content-pair type is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentLookup {
    /// Content is the descriptor path without `-meta.xml`
    Exact,
    /// Content extension is unknown; match `<base>.*` next to the descriptor
    Glob,
}

/// Role of a file in a foldered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderRole {
    /// Single-file item inside a folder (Report, Dashboard)
    Item,
    /// Item with a separate content file (EmailTemplate, Document)
    ItemWithContent,
    /// Descriptor of the folder itself (ReportFolder)
    Descriptor,
}

/// Parent document an object component folds into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentSpec {
    /// Root element and manifest type of the parent
    pub type_name: &'static str,
    /// Root directory segment of the parent type
    pub dir: &'static str,
    /// File extension of the merged parent document
    pub extension: &'static str,
    /// Parent element that collects components of this kind
    pub collection: &'static str,
    /// How many directories above the component the parent folder sits
    pub depth: usize,
}

/// Kind of a deployable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// One file, flattened under the type root
    Simple,
    /// Descriptor plus separately stored content
    ContentPair(ContentLookup),
    /// Every file in the descriptor's directory
    Bundled,
    /// Nested under named folders that are part of the deployed name
    Foldered(FolderRole),
    /// Child of a parent document; never deployed standalone
    ObjectComponent(ParentSpec),
    /// Deployed verbatim under its file name, never listed in the manifest
    Passthrough,
}

/// One deployable logical unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    info: TypeInfo,
    path: PathBuf,
}

impl Entity {
    /// Create an entity of the given type for its canonical defining path
    pub fn new(info: TypeInfo, path: impl Into<PathBuf>) -> Self {
        Self {
            info,
            path: path.into(),
        }
    }

    /// Canonical defining path
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.info.kind
    }

    /// Registered type name (the descriptor's root element)
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.info.name
    }

    /// Type name used in the manifest
    #[inline]
    pub fn deployed_type(&self) -> &'static str {
        self.info.deployed_type
    }

    /// Root directory segment of the type (`classes`)
    #[inline]
    pub fn dir(&self) -> &'static str {
        self.info.dir
    }

    /// Stable identity used to deduplicate additions of the same unit
    pub fn unique_id(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    #[inline]
    pub fn is_mergeable(&self) -> bool {
        matches!(self.info.kind, EntityKind::ObjectComponent(_))
    }

    /// Whether this entity is listed in the manifest under its own type
    #[inline]
    pub fn in_manifest(&self) -> bool {
        !matches!(
            self.info.kind,
            EntityKind::ObjectComponent(_) | EntityKind::Passthrough
        )
    }

    /// Deployed member name
    pub fn name(&self) -> String {
        match self.info.kind {
            EntityKind::Simple | EntityKind::ContentPair(_) => component_name(&self.path),
            EntityKind::Bundled => self
                .path
                .parent()
                .map(|dir| file_name(dir).into_owned())
                .unwrap_or_else(|| component_name(&self.path)),
            EntityKind::Foldered(_) => foldered_component_name(&self.path, self.info.dir)
                .unwrap_or_else(|| component_name(&self.path)),
            EntityKind::ObjectComponent(_) => match self.parent_name() {
                Some(parent) => format!("{}.{}", parent, component_name(&self.path)),
                None => component_name(&self.path),
            },
            EntityKind::Passthrough => file_name(&self.path).into_owned(),
        }
    }

    /// Parent document of an object component
    #[inline]
    pub fn parent(&self) -> Option<ParentSpec> {
        match self.info.kind {
            EntityKind::ObjectComponent(parent) => Some(parent),
            _ => None,
        }
    }

    /// Directory holding the parent's source files
    /// (`objects/Account` for `objects/Account/fields/F.field-meta.xml`)
    fn parent_folder(&self) -> Option<&Path> {
        let parent = self.parent()?;
        let mut folder = self.path.as_path();
        for _ in 0..parent.depth {
            folder = folder.parent()?;
        }
        Some(folder)
    }

    /// Name of the parent document (`Account`); `None` when the path has
    /// no named folder at the parent's depth
    pub fn parent_name(&self) -> Option<String> {
        self.parent_folder()
            .map(|folder| file_name(folder).into_owned())
            .filter(|name| !name.is_empty())
    }

    /// Output path of the merged parent document (`objects/Account.object`)
    pub fn parent_path(&self) -> Option<String> {
        let parent = self.parent()?;
        let name = self.parent_name()?;
        Some(format!("{}/{}.{}", parent.dir, name, parent.extension))
    }

    /// On-disk parent descriptor used to seed a merge, whether or not it exists
    /// (`objects/Account/Account.object-meta.xml`)
    pub fn parent_seed_path(&self) -> Option<PathBuf> {
        let parent = self.parent()?;
        let folder = self.parent_folder()?;
        let name = file_name(folder);
        Some(folder.join(format!("{}.{}{}", name, parent.extension, META_SUFFIX)))
    }

    /// Output path (relative, `/`-separated) to source path mapping.
    ///
    /// Object components map to nothing: they only reach the output through
    /// their merged parent.
    pub fn output_paths(&self) -> Result<BTreeMap<String, PathBuf>, PackageError> {
        let dir = self.info.dir;
        match self.info.kind {
            EntityKind::Simple => {
                let key = flat_output_path(&self.path, dir);
                let key = strip_meta_suffix(&key).to_string();
                Ok(BTreeMap::from([(key, self.path.clone())]))
            }
            EntityKind::ContentPair(lookup) => {
                metadata_and_content_files(&self.path, lookup, |p| flat_output_path(p, dir))
            }
            EntityKind::Bundled => all_files_in_folder(&self.path, dir),
            EntityKind::Foldered(FolderRole::Item) => {
                let key = foldered_output_path(&self.path, dir);
                let key = strip_meta_suffix(&key).to_string();
                Ok(BTreeMap::from([(key, self.path.clone())]))
            }
            EntityKind::Foldered(FolderRole::ItemWithContent) => {
                metadata_and_content_files(&self.path, ContentLookup::Exact, |p| {
                    foldered_output_path(p, dir)
                })
            }
            EntityKind::Foldered(FolderRole::Descriptor) => Ok(BTreeMap::from([(
                folder_descriptor_path(&self.path, dir),
                self.path.clone(),
            )])),
            EntityKind::ObjectComponent(_) => Ok(BTreeMap::new()),
            EntityKind::Passthrough => Ok(BTreeMap::from([(
                file_name(&self.path).into_owned(),
                self.path.clone(),
            )])),
        }
    }

    /// Output path to file content, read from disk
    pub fn files(&self) -> Result<BTreeMap<String, Vec<u8>>, PackageError> {
        read_files(&self.output_paths()?)
    }
}

fn foldered_output_path(path: &Path, dir: &str) -> String {
    root_relative_path(path, dir).unwrap_or_else(|| flat_output_path(path, dir))
}
