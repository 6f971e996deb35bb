//! Metadata type registry.
//!
//! Maps a registered type name (the root element of its descriptor) to the
//! information needed to construct an [`Entity`]. The registry is an explicit
//! value built once from an ordered table and passed by reference to the
//! classifier and builder.

use std::collections::HashMap;
use std::path::Path;

use crate::error::RegistryError;
use crate::metadata::{ContentLookup, Entity, EntityKind, FolderRole, ParentSpec};

/// Registration entry for one metadata type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// Registered name, matched against descriptor root elements
    pub name: &'static str,
    /// Type name listed in the manifest
    pub deployed_type: &'static str,
    /// Canonical root directory segment
    pub dir: &'static str,
    pub kind: EntityKind,
}

impl TypeInfo {
    pub const fn new(name: &'static str, dir: &'static str, kind: EntityKind) -> Self {
        Self {
            name,
            deployed_type: name,
            dir,
            kind,
        }
    }

    /// Register under `name` but deploy as another type (folder descriptors)
    pub const fn deployed_as(self, deployed_type: &'static str) -> Self {
        Self {
            deployed_type,
            ..self
        }
    }

    /// Construct an entity of this type for its canonical defining path
    pub fn create(&self, path: &Path) -> Entity {
        Entity::new(*self, path)
    }
}

const fn object_component(collection: &'static str) -> EntityKind {
    EntityKind::ObjectComponent(ParentSpec {
        type_name: "CustomObject",
        dir: "objects",
        extension: "object",
        collection,
        depth: 2,
    })
}

const SIMPLE: EntityKind = EntityKind::Simple;
const CONTENT: EntityKind = EntityKind::ContentPair(ContentLookup::Exact);
const FOLDER: EntityKind = EntityKind::Foldered(FolderRole::Descriptor);

/// Standard registration table, in registration order
pub const STANDARD_TYPES: &[TypeInfo] = &[
    // Code with separate content
    TypeInfo::new("ApexClass", "classes", CONTENT),
    TypeInfo::new("ApexTrigger", "triggers", CONTENT),
    TypeInfo::new("ApexPage", "pages", CONTENT),
    TypeInfo::new("ApexComponent", "components", CONTENT),
    TypeInfo::new("ContentAsset", "contentassets", CONTENT),
    TypeInfo::new(
        "StaticResource",
        "staticresources",
        EntityKind::ContentPair(ContentLookup::Glob),
    ),
    // Bundles
    TypeInfo::new("LightningComponentBundle", "lwc", EntityKind::Bundled),
    TypeInfo::new("AuraDefinitionBundle", "aura", EntityKind::Bundled),
    // Foldered
    TypeInfo::new("Report", "reports", EntityKind::Foldered(FolderRole::Item)),
    TypeInfo::new("Dashboard", "dashboards", EntityKind::Foldered(FolderRole::Item)),
    TypeInfo::new(
        "EmailTemplate",
        "email",
        EntityKind::Foldered(FolderRole::ItemWithContent),
    ),
    TypeInfo::new(
        "Document",
        "documents",
        EntityKind::Foldered(FolderRole::ItemWithContent),
    ),
    TypeInfo::new("ReportFolder", "reports", FOLDER).deployed_as("Report"),
    TypeInfo::new("DashboardFolder", "dashboards", FOLDER).deployed_as("Dashboard"),
    TypeInfo::new("EmailFolder", "email", FOLDER).deployed_as("EmailTemplate"),
    TypeInfo::new("EmailTemplateFolder", "email", FOLDER).deployed_as("EmailTemplate"),
    TypeInfo::new("DocumentFolder", "documents", FOLDER).deployed_as("Document"),
    // Objects and their components
    TypeInfo::new("CustomObject", "objects", SIMPLE),
    TypeInfo::new("CustomField", "objects", object_component("fields")),
    TypeInfo::new("ValidationRule", "objects", object_component("validationRules")),
    TypeInfo::new("ListView", "objects", object_component("listViews")),
    TypeInfo::new("RecordType", "objects", object_component("recordTypes")),
    TypeInfo::new("WebLink", "objects", object_component("webLinks")),
    TypeInfo::new("CompactLayout", "objects", object_component("compactLayouts")),
    TypeInfo::new("FieldSet", "objects", object_component("fieldSets")),
    TypeInfo::new("BusinessProcess", "objects", object_component("businessProcesses")),
    TypeInfo::new("CustomObjectTranslation", "objectTranslations", SIMPLE),
    TypeInfo::new(
        "CustomFieldTranslation",
        "objectTranslations",
        EntityKind::ObjectComponent(ParentSpec {
            type_name: "CustomObjectTranslation",
            dir: "objectTranslations",
            extension: "objectTranslation",
            collection: "fields",
            depth: 1,
        }),
    ),
    // Single-file types
    TypeInfo::new("CustomTab", "tabs", SIMPLE),
    TypeInfo::new("CustomApplication", "applications", SIMPLE),
    TypeInfo::new("CustomLabels", "labels", SIMPLE),
    TypeInfo::new("CustomMetadata", "customMetadata", SIMPLE),
    TypeInfo::new("CustomPermission", "customPermissions", SIMPLE),
    TypeInfo::new("FlexiPage", "flexipages", SIMPLE),
    TypeInfo::new("Flow", "flows", SIMPLE),
    TypeInfo::new("GlobalValueSet", "globalValueSets", SIMPLE),
    TypeInfo::new("StandardValueSet", "standardValueSets", SIMPLE),
    TypeInfo::new("Layout", "layouts", SIMPLE),
    TypeInfo::new("LightningMessageChannel", "messageChannels", SIMPLE),
    TypeInfo::new("NamedCredential", "namedCredentials", SIMPLE),
    TypeInfo::new("PermissionSet", "permissionsets", SIMPLE),
    TypeInfo::new("PermissionSetGroup", "permissionsetgroups", SIMPLE),
    TypeInfo::new("Profile", "profiles", SIMPLE),
    TypeInfo::new("QuickAction", "quickActions", SIMPLE),
    TypeInfo::new("RemoteSiteSetting", "remoteSiteSettings", SIMPLE),
    TypeInfo::new("SharingRules", "sharingRules", SIMPLE),
    TypeInfo::new("Translations", "translations", SIMPLE),
    TypeInfo::new("Workflow", "workflows", SIMPLE),
    // Destructive change descriptors
    TypeInfo::new("Package", "", EntityKind::Passthrough),
];

/// Registered metadata types, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: Vec<TypeInfo>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an ordered table, failing on the first duplicate
    pub fn from_table(table: &[TypeInfo]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for info in table {
            registry.register(*info)?;
        }
        Ok(registry)
    }

    /// Registry of every standard metadata type
    pub fn standard() -> Result<Self, RegistryError> {
        Self::from_table(STANDARD_TYPES)
    }

    /// Register a type. Registering the same name twice is a configuration
    /// error and leaves the registry unchanged.
    pub fn register(&mut self, info: TypeInfo) -> Result<(), RegistryError> {
        if self.index.contains_key(info.name) {
            return Err(RegistryError::Duplicate {
                type_name: info.name.to_string(),
            });
        }
        self.index.insert(info.name, self.types.len());
        self.types.push(info);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeInfo> {
        self.index.get(name).map(|&idx| &self.types[idx])
    }

    /// Canonical root directory segment of a type (`classes` for `ApexClass`)
    pub fn lookup_directory(&self, name: &str) -> Option<&'static str> {
        self.lookup(name).map(|info| info.dir)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered types in registration order
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
