//! Folds object components into their parent documents.
//!
//! Components are grouped by the output path of their parent. Each group
//! is seeded from the parent descriptor on disk, or from an empty parent
//! document when there is none, and every component is appended to its
//! designated collection in the order it was added.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use crate::document::{Document, Element, Node};
use crate::error::PackageError;
use crate::manifest::METADATA_NAMESPACE;
use crate::metadata::Entity;

/// One parent document produced by the merge pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedParent {
    /// Output path (`objects/Account.object`)
    pub path: String,
    /// Manifest type of the parent (`CustomObject`)
    pub type_name: &'static str,
    /// Manifest member name of the parent (`Account`)
    pub name: String,
    pub contents: Vec<u8>,
}

/// Group mergeable entities by parent output path, keeping addition order
/// within each group. Entities that are not object components are ignored.
///
/// A component whose parent cannot be derived from its path is a merge error.
pub fn group_by_parent<'a, I>(
    entities: I,
) -> Result<BTreeMap<String, Vec<&'a Entity>>, PackageError>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut groups: BTreeMap<String, Vec<&'a Entity>> = BTreeMap::new();
    for entity in entities {
        if entity.parent().is_none() {
            continue;
        }
        let parent_path = entity.parent_path().ok_or_else(|| {
            merge_error(
                "",
                entity,
                format!("cannot derive the parent object from {}", entity.path().display()),
            )
        })?;
        groups.entry(parent_path).or_default().push(entity);
    }
    Ok(groups)
}

/// Merge every group, failing on the first broken parent or component
pub fn merge_all<'a, I>(entities: I) -> Result<Vec<MergedParent>, PackageError>
where
    I: IntoIterator<Item = &'a Entity>,
{
    group_by_parent(entities)?
        .iter()
        .map(|(path, children)| merge_group(path, children))
        .collect()
}

/// Merge one group of components sharing the parent at `parent_path`
pub fn merge_group(parent_path: &str, children: &[&Entity]) -> Result<MergedParent, PackageError> {
    let Some(first) = children.first() else {
        return Err(PackageError::Merge {
            parent: parent_path.to_string(),
            child: String::new(),
            reason: "no components to merge".to_string(),
        });
    };
    let Some(spec) = first.parent() else {
        return Err(merge_error(
            parent_path,
            first,
            "not an object component".to_string(),
        ));
    };
    let name = first.parent_name().unwrap_or_default();

    let mut parent = match first.parent_seed_path() {
        Some(seed) if seed.is_file() => {
            tracing::debug!(parent = parent_path, seed = %seed.display(), "seeding parent document");
            let doc = Document::read(&seed).map_err(|e| {
                let reason = format!("could not load {}: {}", seed.display(), chain(&e));
                merge_error(parent_path, first, reason)
            })?;
            if doc.root.local_name() != spec.type_name {
                return Err(merge_error(
                    parent_path,
                    first,
                    format!(
                        "expected <{}> in {}, found <{}>",
                        spec.type_name,
                        seed.display(),
                        doc.root.name
                    ),
                ));
            }
            doc.root
        }
        _ => Element::new(spec.type_name).with_attribute("xmlns", METADATA_NAMESPACE),
    };

    for child in children {
        let Some(child_spec) = child.parent() else {
            return Err(merge_error(
                parent_path,
                child,
                "not an object component".to_string(),
            ));
        };
        let doc = Document::read(child.path())
            .map_err(|e| merge_error(parent_path, child, chain(&e)))?;
        fold_child(&mut parent, doc.root, child_spec.collection);
    }

    let contents = Document::new(parent)
        .to_bytes()
        .map_err(|e| merge_error(parent_path, first, e.to_string()))?;

    tracing::debug!(parent = parent_path, components = children.len(), "merged parent document");
    Ok(MergedParent {
        path: parent_path.to_string(),
        type_name: spec.type_name,
        name,
        contents,
    })
}

fn merge_error(parent: &str, child: &Entity, reason: String) -> PackageError {
    PackageError::Merge {
        parent: parent.to_string(),
        child: child.name(),
        reason,
    }
}

/// Append a component's root element to the parent's `collection`.
///
/// The component root is renamed to the collection element and placed
/// after the last existing element of that collection, or at the end.
/// Namespace prefixes it declares move to the parent root.
pub fn fold_child(parent: &mut Element, mut child: Element, collection: &str) {
    child.name = match parent.name.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{collection}"),
        None => collection.to_string(),
    };

    let mut kept = Vec::with_capacity(child.attributes.len());
    for (key, value) in child.attributes.drain(..) {
        if key == "xmlns" {
            continue;
        }
        if key.starts_with("xmlns:") {
            if parent.attribute(&key).is_none() {
                parent.set_attribute(key, value);
            }
            continue;
        }
        kept.push((key, value));
    }
    child.attributes = kept;

    let last_sibling = parent
        .children
        .iter()
        .rposition(|n| matches!(n, Node::Element(e) if e.local_name() == collection));
    match last_sibling {
        Some(idx) => parent.children.insert(idx + 1, Node::Element(child)),
        None => parent.push(child),
    }
}

/// Error message including every source in the chain
fn chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
