use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PackageError;
use crate::metadata::ContentLookup;
use crate::paths::{component_name, file_name, is_meta_file, strip_meta_suffix};

/// Directories that never hold deployable content (component test suites)
const TEST_DIRECTORIES: &[&str] = &["__tests__"];

/// File name suffixes of component unit tests
const TEST_FILE_SUFFIXES: &[&str] = &[".test.js"];

/// Dotfiles are never deployed
#[inline]
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[inline]
pub fn is_test_file(name: &str) -> bool {
    TEST_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[inline]
pub fn is_test_dir(name: &str) -> bool {
    TEST_DIRECTORIES.contains(&name)
}

/// Check if a directory entry is skipped silently while walking a tree.
/// Skipped entries are not errors and never reach the classifier.
pub fn should_skip(path: &Path, is_dir: bool) -> bool {
    let name = file_name(path);
    if is_hidden(&name) {
        return true;
    }
    if is_dir {
        is_test_dir(&name)
    } else {
        is_test_file(&name)
    }
}

/// Read a whole file, keeping the path in the error
pub fn read_file(path: &Path) -> Result<Vec<u8>, PackageError> {
    fs::read(path).map_err(|e| PackageError::io(path, e))
}

/// Read every source file of an output path map
pub fn read_files(
    paths: &BTreeMap<String, PathBuf>,
) -> Result<BTreeMap<String, Vec<u8>>, PackageError> {
    let mut files = BTreeMap::new();
    for (relative, source) in paths {
        files.insert(relative.clone(), read_file(source)?);
    }
    Ok(files)
}

/// Output paths for a descriptor and its separately stored content.
///
/// `key_for` maps a source path to its root-relative output key. The
/// content is keyed by the descriptor's key with `-meta.xml` removed.
pub fn metadata_and_content_files(
    descriptor: &Path,
    lookup: ContentLookup,
    key_for: impl Fn(&Path) -> String,
) -> Result<BTreeMap<String, PathBuf>, PackageError> {
    let mut paths = BTreeMap::new();
    let descriptor_key = key_for(descriptor);

    if !is_meta_file(&file_name(descriptor)) {
        paths.insert(descriptor_key, descriptor.to_path_buf());
        return Ok(paths);
    }

    let content_key = strip_meta_suffix(&descriptor_key).to_string();
    let content = match lookup {
        ContentLookup::Exact => {
            let name = file_name(descriptor);
            Some(descriptor.with_file_name(strip_meta_suffix(&name)))
        }
        ContentLookup::Glob => glob_content(descriptor)?,
    };

    paths.insert(descriptor_key, descriptor.to_path_buf());
    if let Some(content) = content {
        paths.insert(content_key, content);
    }
    Ok(paths)
}

/// Find the content file of a descriptor whose content extension is not
/// known up front (`Foo.resource-meta.xml` next to `Foo.zip`).
///
/// Matches `<base>.*` in the descriptor's directory. The content is only
/// accepted when exactly one file besides the descriptor matches.
pub fn glob_content(descriptor: &Path) -> Result<Option<PathBuf>, PackageError> {
    let Some(dir) = descriptor.parent() else {
        return Ok(None);
    };
    let prefix = format!("{}.", component_name(descriptor));

    let mut matches = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::io(dir, e.into()))?;
        if !entry.file_type().is_file() || entry.path() == descriptor {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            matches.push(entry.into_path());
        }
    }

    if matches.len() == 1 {
        Ok(matches.pop())
    } else {
        tracing::warn!(
            descriptor = %descriptor.display(),
            candidates = matches.len(),
            "content file is missing or ambiguous, deploying descriptor only"
        );
        Ok(None)
    }
}

/// Output paths for every deployable file in the descriptor's directory.
///
/// Hidden files, test files and subdirectories are left out.
pub fn all_files_in_folder(
    descriptor: &Path,
    root: &str,
) -> Result<BTreeMap<String, PathBuf>, PackageError> {
    let mut paths = BTreeMap::new();
    let Some(folder) = descriptor.parent() else {
        return Ok(paths);
    };
    let bundle = file_name(folder);

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| PackageError::io(folder, e.into()))?;
        if entry.file_type().is_dir() || should_skip(entry.path(), false) {
            continue;
        }
        let key = format!("{}/{}/{}", root, bundle, entry.file_name().to_string_lossy());
        paths.insert(key, entry.into_path());
    }

    Ok(paths)
}
