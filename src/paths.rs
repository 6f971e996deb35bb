//! Pure naming helpers for metadata paths.
//!
//! Nothing in here touches the filesystem. Output keys are always built
//! with `/` separators regardless of platform.

use std::borrow::Cow;
use std::path::{Component, Path};

/// Suffix carried by every metadata descriptor in source format
pub const META_SUFFIX: &str = "-meta.xml";

/// Strip one trailing `-meta.xml` suffix, if present
#[inline]
pub fn strip_meta_suffix(name: &str) -> &str {
    name.strip_suffix(META_SUFFIX).unwrap_or(name)
}

/// Check if a file name is a metadata descriptor (`*-meta.xml`)
#[inline]
pub fn is_meta_file(name: &str) -> bool {
    name.ends_with(META_SUFFIX)
}

/// File name of `path` as a string, empty if there is none
pub fn file_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or(Cow::Borrowed(""))
}

/// Strip the extension from a single path segment.
///
/// A leading dot is not an extension separator, so `.hidden` stays intact
/// while `.hidden.ext` becomes `.hidden`.
fn strip_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(0) | None => segment,
        Some(idx) => &segment[..idx],
    }
}

/// Component name: file name without `-meta.xml` and without extension
pub fn component_name(path: &Path) -> String {
    let name = file_name(path);
    strip_extension(strip_meta_suffix(&name)).to_string()
}

fn normal_segments(path: &Path) -> Vec<Cow<'_, str>> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect()
}

/// Path of `path` relative to the nearest enclosing directory named `root`,
/// with `root` itself as the first segment (`classes/Foo.cls`).
///
/// Returns `None` when no ancestor is named `root`.
pub fn root_relative_path(path: &Path, root: &str) -> Option<String> {
    let segments = normal_segments(path);
    if segments.len() < 2 {
        return None;
    }
    let idx = segments[..segments.len() - 1]
        .iter()
        .rposition(|s| s.as_ref() == root)?;
    Some(segments[idx..].join("/"))
}

/// Root-relative output path that flattens any intermediate directories
pub fn flat_output_path(path: &Path, root: &str) -> String {
    format!("{}/{}", root, file_name(path))
}

/// Deployed name of a foldered component: the folder path below `root`
/// joined with `/`, without `-meta.xml` and without extension.
///
/// `reports/MyFolder/Sub/MyReport.report` yields `MyFolder/Sub/MyReport`.
pub fn foldered_component_name(path: &Path, root: &str) -> Option<String> {
    let relative = root_relative_path(path, root)?;
    let below_root = relative.strip_prefix(root)?.strip_prefix('/')?;
    let below_root = strip_meta_suffix(below_root);
    let (folders, last) = match below_root.rsplit_once('/') {
        Some((folders, last)) => (Some(folders), last),
        None => (None, below_root),
    };
    let last = strip_extension(last);
    Some(match folders {
        Some(folders) => format!("{folders}/{last}"),
        None => last.to_string(),
    })
}

/// Output path of a folder descriptor.
///
/// The folder-specific descriptor suffix (`.reportFolder-meta.xml`) is
/// replaced by the plain `-meta.xml` suffix the contained type expects.
pub fn folder_descriptor_path(path: &Path, root: &str) -> String {
    let relative = root_relative_path(path, root).unwrap_or_else(|| flat_output_path(path, root));
    let stripped = strip_meta_suffix(&relative);
    let (dir, last) = match stripped.rsplit_once('/') {
        Some((dir, last)) => (Some(dir), last),
        None => (None, stripped),
    };
    let last = match last.rfind('.') {
        Some(idx) if idx > 0 && last[idx + 1..].ends_with("Folder") => &last[..idx],
        _ => last,
    };
    match dir {
        Some(dir) => format!("{dir}/{last}{META_SUFFIX}"),
        None => format!("{last}{META_SUFFIX}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // ==================== component_name tests ====================

    #[test]
    fn test_component_name() {
        let cases = [
            ("/path/to/special/file/myfile.cls", "myfile"),
            ("/path/to/special/file/myfile.cls-meta.xml", "myfile"),
            ("/path/to/file.txt", "file"),
            ("/path/.hiddenfile", ".hiddenfile"),
            ("/path/to/.hiddenfile.ext", ".hiddenfile"),
            ("/noextensionfile", "noextensionfile"),
            ("/src/reports/MyFolder-meta.xml", "MyFolder"),
            ("/src/customMetadata/My_Type.My_Object.md", "My_Type.My_Object"),
        ];
        for (path, want) in cases {
            assert_eq!(component_name(Path::new(path)), want, "path: {path}");
        }
    }

    #[test]
    fn test_strip_meta_suffix() {
        assert_eq!(strip_meta_suffix("Foo.cls-meta.xml"), "Foo.cls");
        assert_eq!(strip_meta_suffix("Foo.cls"), "Foo.cls");
        assert_eq!(strip_meta_suffix("-meta.xml"), "");
    }

    #[test]
    fn test_is_meta_file() {
        assert!(is_meta_file("Foo.cls-meta.xml"));
        assert!(!is_meta_file("Foo.cls"));
        assert!(!is_meta_file("meta.xml"));
    }

    // ==================== root_relative_path tests ====================

    #[test]
    fn test_root_relative_path() {
        let cases = [
            ("/path/to/special/file/myfile.cls", "special", Some("special/file/myfile.cls")),
            ("/path/to/special/dir/myfile.cls", "nonexistent", None),
            ("/path/to/special/dir/myfile.cls", "dir", Some("dir/myfile.cls")),
            ("/path/to/special/dir/myfile.cls", "path", Some("path/to/special/dir/myfile.cls")),
            ("/special", "special", None),
        ];
        for (path, root, want) in cases {
            assert_eq!(
                root_relative_path(Path::new(path), root).as_deref(),
                want,
                "path: {path}, root: {root}"
            );
        }
    }

    #[test]
    fn test_root_relative_path_uses_nearest_root() {
        let path = Path::new("/home/me/classes/project/src/classes/Foo.cls");
        assert_eq!(
            root_relative_path(path, "classes").as_deref(),
            Some("classes/Foo.cls")
        );
    }

    #[test]
    fn test_root_relative_path_ignores_file_named_like_root() {
        let path = PathBuf::from("/src/lwc/widget/lwc");
        assert_eq!(
            root_relative_path(&path, "lwc").as_deref(),
            Some("lwc/widget/lwc")
        );
    }

    #[test]
    fn test_flat_output_path() {
        let path = Path::new("/src/classes/util/Helper.cls");
        assert_eq!(flat_output_path(path, "classes"), "classes/Helper.cls");
    }

    // ==================== foldered_component_name tests ====================

    #[test]
    fn test_foldered_component_name() {
        let cases = [
            ("/path/to/reports/MyFolder-meta.xml", "MyFolder"),
            ("/path/to/reports/MyFolder/MyReport.report", "MyFolder/MyReport"),
            ("/path/to/reports/MyFolder/SubFolder-meta.xml", "MyFolder/SubFolder"),
            (
                "/path/to/reports/MyFolder/SubFolder/MyReport.report",
                "MyFolder/SubFolder/MyReport",
            ),
            (
                "/path/to/reports/A/B/C/MyReport.report-meta.xml",
                "A/B/C/MyReport",
            ),
            ("/path/to/reports/MyFolder.reportFolder-meta.xml", "MyFolder"),
        ];
        for (path, want) in cases {
            assert_eq!(
                foldered_component_name(Path::new(path), "reports").as_deref(),
                Some(want),
                "path: {path}"
            );
        }
    }

    #[test]
    fn test_foldered_component_name_outside_root() {
        let path = Path::new("/path/to/dashboards/MyFolder/Dash.dashboard");
        assert!(foldered_component_name(path, "reports").is_none());
    }

    // ==================== folder_descriptor_path tests ====================

    #[test]
    fn test_folder_descriptor_path_source_format() {
        let path = Path::new("/src/reports/MyFolder.reportFolder-meta.xml");
        assert_eq!(folder_descriptor_path(path, "reports"), "reports/MyFolder-meta.xml");
    }

    #[test]
    fn test_folder_descriptor_path_metadata_format() {
        let path = Path::new("/src/reports/MyFolder/MySubfolder-meta.xml");
        assert_eq!(
            folder_descriptor_path(path, "reports"),
            "reports/MyFolder/MySubfolder-meta.xml"
        );
    }

    #[test]
    fn test_folder_descriptor_path_email() {
        let path = Path::new("/src/email/Templates/Sub.emailFolder-meta.xml");
        assert_eq!(
            folder_descriptor_path(path, "email"),
            "email/Templates/Sub-meta.xml"
        );
    }
}
