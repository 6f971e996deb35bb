//! `package.xml` manifest model and serialization.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::document::{Document, DocumentError, Element};

/// Namespace of every metadata document
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Fixed top-level output path of the manifest
pub const MANIFEST_FILE: &str = "package.xml";

/// API version written when none is configured
pub const DEFAULT_API_VERSION: &str = "62.0";

/// Metadata API version (`62.0`), stored without a leading `v`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiVersion(Arc<str>);

impl ApiVersion {
    /// Create a validated ApiVersion. A leading `v` is accepted and dropped;
    /// the rest must be `digits.digits`.
    pub fn validated(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        let version = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if Self::validate_format(version) {
            Ok(Self(Arc::from(version)))
        } else {
            Err(format!(
                "invalid API version '{}': expected digits.digits (e.g., 62.0)",
                s
            ))
        }
    }

    #[inline]
    fn validate_format(s: &str) -> bool {
        match s.split_once('.') {
            Some((major, minor)) => {
                !major.is_empty()
                    && !minor.is_empty()
                    && major.bytes().all(|b| b.is_ascii_digit())
                    && minor.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self(Arc::from(DEFAULT_API_VERSION))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deployed types and their member names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    types: BTreeMap<String, BTreeSet<String>>,
    version: ApiVersion,
}

impl Manifest {
    pub fn new(version: ApiVersion) -> Self {
        Self {
            types: BTreeMap::new(),
            version,
        }
    }

    /// Record a member. Adding the same pair twice has no effect.
    pub fn add(&mut self, type_name: &str, member: impl Into<String>) {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .insert(member.into());
    }

    #[inline]
    pub fn version(&self) -> &ApiVersion {
        &self.version
    }

    /// Type names in sorted order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn members(&self, type_name: &str) -> Option<&BTreeSet<String>> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str, member: &str) -> bool {
        self.types
            .get(type_name)
            .map(|members| members.contains(member))
            .unwrap_or(false)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Total number of members across all types
    pub fn member_count(&self) -> usize {
        self.types.values().map(BTreeSet::len).sum()
    }

    /// Manifest as a `Package` document
    pub fn to_document(&self) -> Document {
        let mut root = Element::new("Package").with_attribute("xmlns", METADATA_NAMESPACE);
        for (type_name, members) in &self.types {
            let mut types = Element::new("types");
            for member in members {
                types.push(Element::with_text("members", member.as_str()));
            }
            types.push(Element::with_text("name", type_name.as_str()));
            root.push(types);
        }
        root.push(Element::with_text("version", self.version.as_str()));
        Document::new(root)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, DocumentError> {
        self.to_document().to_bytes()
    }
}
