//! Path classification.
//!
//! Decides whether a filesystem path is deployable and, if so, which
//! registered type and canonical descriptor it belongs to. Detection reads
//! the root element of XML descriptors; a root element only counts when an
//! XML declaration precedes it.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{PackageError, SniffError};
use crate::metadata::Entity;
use crate::paths::{component_name, is_meta_file, META_SUFFIX};
use crate::registry::{Registry, TypeInfo};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Local name of the first element, provided an XML declaration came first.
///
/// Stricter than accepting any declaration seen before the first element:
/// non-whitespace text before the declaration is rejected too, as are a
/// missing declaration and any token error. Only the prefix up to the first
/// element is read.
pub fn root_element_name<R: BufRead>(mut input: R) -> Result<String, SniffError> {
    let has_bom = input
        .fill_buf()
        .map_err(|e| SniffError::Malformed(e.to_string()))?
        .starts_with(UTF8_BOM);
    if has_bom {
        input.consume(UTF8_BOM.len());
    }

    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut declared = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Decl(_)) => declared = true,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if !declared {
                    return Err(SniffError::NoDeclaration);
                }
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(e)) if !declared && e.iter().any(|b| !b.is_ascii_whitespace()) => {
                return Err(SniffError::NoDeclaration);
            }
            Ok(Event::Eof) => return Err(SniffError::NoElements),
            Err(e) => return Err(SniffError::Malformed(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Read the root element name of a file
pub fn read_root_element(path: &Path) -> Result<String, PackageError> {
    let file = File::open(path).map_err(|e| PackageError::io(path, e))?;
    root_element_name(BufReader::new(file)).map_err(|source| PackageError::NotXml {
        path: path.to_path_buf(),
        source,
    })
}

/// Companion descriptor path (`Foo.cls` -> `Foo.cls-meta.xml`)
fn companion_path(path: &Path) -> PathBuf {
    let mut companion = OsString::from(path.as_os_str());
    companion.push(META_SUFFIX);
    PathBuf::from(companion)
}

/// Descriptor files (`*-meta.xml`) directly inside `dir`, sorted by name
fn sibling_descriptors(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut descriptors: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| is_meta_file(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    descriptors.sort();
    descriptors
}

/// Maps paths to metadata types using a registry
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'r> {
    registry: &'r Registry,
}

impl<'r> Classifier<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Registered type of a descriptor file, from its root element
    pub fn recognize(&self, path: &Path) -> Result<&'r TypeInfo, PackageError> {
        let element = read_root_element(path)?;
        self.registry
            .lookup(&element)
            .ok_or_else(|| PackageError::UnrecognizedType {
                path: path.to_path_buf(),
                element,
            })
    }

    /// Check if `path` is itself a recognized metadata descriptor.
    /// Never fails; directories, binary and garbage input yield `false`.
    pub fn is_deployable(&self, path: &Path) -> bool {
        path.is_file() && self.recognize(path).is_ok()
    }

    fn recognized(&self, path: &Path) -> Option<&'r TypeInfo> {
        if !path.is_file() {
            return None;
        }
        match self.recognize(path) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "not a metadata descriptor");
                None
            }
        }
    }

    /// Find the canonical descriptor for `path` and its registered type.
    ///
    /// Tried in order: the path itself, its `-meta.xml` companion, the only
    /// descriptor in the same directory, and the only descriptor in the same
    /// directory sharing the path's base name.
    pub fn descriptor_for(&self, path: &Path) -> Result<(PathBuf, &'r TypeInfo), PackageError> {
        if let Some(info) = self.recognized(path) {
            return Ok((path.to_path_buf(), info));
        }

        let companion = companion_path(path);
        if let Some(info) = self.recognized(&companion) {
            return Ok((companion, info));
        }

        if path.is_file() {
            if let Some(dir) = path.parent() {
                let descriptors = sibling_descriptors(dir);
                if let [only] = descriptors.as_slice() {
                    if let Some(info) = self.recognized(only) {
                        return Ok((only.clone(), info));
                    }
                }

                let prefix = format!("{}.", component_name(path));
                let same_base: Vec<&PathBuf> = descriptors
                    .iter()
                    .filter(|d| {
                        d.file_name()
                            .map(|n| n.to_string_lossy().starts_with(&prefix))
                            .unwrap_or(false)
                    })
                    .collect();
                if let [only] = same_base.as_slice() {
                    if let Some(info) = self.recognized(only) {
                        return Ok(((*only).clone(), info));
                    }
                }
            }
        }

        Err(PackageError::MetadataFileNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Classify a path into the entity it belongs to
    pub fn classify(&self, path: &Path) -> Result<Entity, PackageError> {
        let (descriptor, info) = self.descriptor_for(path)?;
        tracing::debug!(
            path = %path.display(),
            descriptor = %descriptor.display(),
            type_name = info.name,
            "classified"
        );
        Ok(info.create(&descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntityKind;
    use tempfile::TempDir;

    const APEX_CLASS_META: &str = r#"
<?xml version="1.0" encoding="UTF-8"?>
<ApexClass xmlns="http://soap.sforce.com/2006/04/metadata">
	 <apiVersion>59.0</apiVersion>
	 <status>Active</status>
</ApexClass>
"#;

    const LWC_META: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LightningComponentBundle xmlns="http://soap.sforce.com/2006/04/metadata">
</LightningComponentBundle>
"#;

    fn write(path: &Path, contents: impl AsRef<[u8]>) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    // ==================== root_element_name tests ====================

    #[test]
    fn test_root_element_with_declaration() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><CustomTab><label>x</label></CustomTab>"#;
        assert_eq!(root_element_name(&xml[..]).unwrap(), "CustomTab");
    }

    #[test]
    fn test_root_element_leading_whitespace() {
        assert_eq!(
            root_element_name(APEX_CLASS_META.as_bytes()).unwrap(),
            "ApexClass"
        );
    }

    #[test]
    fn test_root_element_self_closing() {
        let xml = b"<?xml version=\"1.0\"?><Package/>";
        assert_eq!(root_element_name(&xml[..]).unwrap(), "Package");
    }

    #[test]
    fn test_root_element_local_name_of_prefixed_element() {
        let xml = b"<?xml version=\"1.0\"?><md:CustomTab xmlns:md=\"urn:x\"/>";
        assert_eq!(root_element_name(&xml[..]).unwrap(), "CustomTab");
    }

    #[test]
    fn test_root_element_multi_root_takes_first() {
        let xml = b"<?xml version=\"1.0\"?><First/><Second/>";
        assert_eq!(root_element_name(&xml[..]).unwrap(), "First");
    }

    #[test]
    fn test_root_element_comment_before_root() {
        let xml = b"<?xml version=\"1.0\"?>\n<!-- generated -->\n<Flow></Flow>";
        assert_eq!(root_element_name(&xml[..]).unwrap(), "Flow");
    }

    #[test]
    fn test_root_element_utf8_bom() {
        let xml = b"\xEF\xBB\xBF<?xml version=\"1.0\"?><Layout/>";
        assert_eq!(root_element_name(&xml[..]).unwrap(), "Layout");
    }

    #[test]
    fn test_root_element_without_declaration() {
        let xml = b"<aura:component><div/></aura:component>";
        assert_eq!(
            root_element_name(&xml[..]).unwrap_err(),
            SniffError::NoDeclaration
        );
    }

    #[test]
    fn test_root_element_stylesheet_pi_is_not_a_declaration() {
        let xml = b"<?xml-stylesheet href=\"a.xsl\"?><ApexClass/>";
        assert_eq!(
            root_element_name(&xml[..]).unwrap_err(),
            SniffError::NoDeclaration
        );
    }

    #[test]
    fn test_root_element_code_embedding_xml() {
        let code = br#"public class Gen {
    String body = '<?xml version="1.0"?><ApexClass></ApexClass>';
}"#;
        assert_eq!(
            root_element_name(&code[..]).unwrap_err(),
            SniffError::NoDeclaration
        );
    }

    #[test]
    fn test_root_element_plain_text() {
        assert_eq!(
            root_element_name(&b"junk"[..]).unwrap_err(),
            SniffError::NoDeclaration
        );
    }

    #[test]
    fn test_root_element_declaration_only() {
        let xml = b"<?xml version=\"1.0\"?>\n";
        assert_eq!(root_element_name(&xml[..]).unwrap_err(), SniffError::NoElements);
    }

    #[test]
    fn test_root_element_empty_input() {
        assert_eq!(root_element_name(&b""[..]).unwrap_err(), SniffError::NoElements);
    }

    #[test]
    fn test_root_element_malformed() {
        let xml = b"<?xml version=\"1.0\"?><!-- unterminated";
        assert!(matches!(
            root_element_name(&xml[..]),
            Err(SniffError::Malformed(_))
        ));
    }

    #[test]
    fn test_root_element_binary_input() {
        let binary: Vec<u8> = (0u8..=255).rev().cycle().take(4096).collect();
        assert!(root_element_name(&binary[..]).is_err());
    }

    // ==================== is_deployable tests ====================

    #[test]
    fn test_is_deployable() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let classifier = Classifier::new(&registry);

        let meta = temp.path().join("classes/A.cls-meta.xml");
        let class = temp.path().join("classes/A.cls");
        let unknown = temp.path().join("tabs/Unknown.tab");
        let binary = temp.path().join("staticresources/blob.bin");
        write(&meta, APEX_CLASS_META);
        write(&class, "public class A {}");
        write(
            &unknown,
            "<?xml version=\"1.0\"?>\n<Unknown xmlns=\"http://soap.sforce.com/2006/04/metadata\"/>",
        );
        write(&binary, [0u8, 159, 146, 150, b'<', 0xFF]);

        assert!(classifier.is_deployable(&meta));
        assert!(!classifier.is_deployable(&class));
        assert!(!classifier.is_deployable(&unknown));
        assert!(!classifier.is_deployable(&binary));
        assert!(!classifier.is_deployable(temp.path()));
        assert!(!classifier.is_deployable(&temp.path().join("missing.xml")));
    }

    #[test]
    fn test_recognize_reports_unrecognized_type() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let path = temp.path().join("Unknown.tab");
        write(&path, "<?xml version=\"1.0\"?><Unknown/>");

        match Classifier::new(&registry).recognize(&path) {
            Err(PackageError::UnrecognizedType { element, .. }) => assert_eq!(element, "Unknown"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    // ==================== classify tests ====================

    #[test]
    fn test_classify_descriptor_itself() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let tab = temp.path().join("src/tabs/MyTab.tab");
        write(
            &tab,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<CustomTab><label>Palo</label></CustomTab>",
        );

        let entity = Classifier::new(&registry).classify(&tab).unwrap();
        assert_eq!(entity.deployed_type(), "CustomTab");
        assert_eq!(entity.name(), "MyTab");
        assert_eq!(entity.path(), tab);
    }

    #[test]
    fn test_classify_content_and_companion_agree() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let classifier = Classifier::new(&registry);
        let class = temp.path().join("src/classes/MyClass.cls");
        let meta = temp.path().join("src/classes/MyClass.cls-meta.xml");
        write(&class, "public class MyClass {}");
        write(&meta, APEX_CLASS_META);

        let from_content = classifier.classify(&class).unwrap();
        let from_meta = classifier.classify(&meta).unwrap();

        assert_eq!(from_content, from_meta);
        assert_eq!(from_content.unique_id(), from_meta.unique_id());
        assert_eq!(from_content.name(), "MyClass");
        assert_eq!(from_content.deployed_type(), "ApexClass");
        let paths = from_content.output_paths().unwrap();
        assert_eq!(paths["classes/MyClass.cls"], class);
        assert_eq!(paths["classes/MyClass.cls-meta.xml"], meta);
    }

    #[test]
    fn test_classify_folder_through_companion() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let folder = temp.path().join("src/reports/Test");
        fs::create_dir_all(&folder).unwrap();
        write(
            &temp.path().join("src/reports/Test-meta.xml"),
            "<?xml version=\"1.0\"?>\n<ReportFolder><name>Test</name></ReportFolder>",
        );

        let entity = Classifier::new(&registry).classify(&folder).unwrap();
        assert_eq!(entity.deployed_type(), "Report");
        assert_eq!(entity.name(), "Test");
        assert!(entity
            .output_paths()
            .unwrap()
            .contains_key("reports/Test-meta.xml"));
    }

    #[test]
    fn test_classify_bundle_member() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let classifier = Classifier::new(&registry);
        let dir = temp.path().join("src/lwc/MyComponent");
        write(&dir.join("MyComponent.js"), "export {}");
        write(&dir.join("MyComponent.html"), "<template><div/></template>");
        write(&dir.join("MyComponent.js-meta.xml"), LWC_META);

        let from_js = classifier.classify(&dir.join("MyComponent.js")).unwrap();
        let from_html = classifier.classify(&dir.join("MyComponent.html")).unwrap();

        assert_eq!(from_js, from_html);
        assert_eq!(from_js.kind(), EntityKind::Bundled);
        assert_eq!(from_js.name(), "MyComponent");
        assert_eq!(from_js.deployed_type(), "LightningComponentBundle");
        assert!(!classifier.is_deployable(&dir.join("MyComponent.html")));
    }

    #[test]
    fn test_classify_content_sharing_base_name() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let dir = temp.path().join("src/staticresources");
        write(&dir.join("Logo.png"), [0x89u8, b'P', b'N', b'G']);
        write(
            &dir.join("Logo.resource-meta.xml"),
            "<?xml version=\"1.0\"?><StaticResource/>",
        );
        write(&dir.join("Other.zip"), b"PK");
        write(
            &dir.join("Other.resource-meta.xml"),
            "<?xml version=\"1.0\"?><StaticResource/>",
        );

        let entity = Classifier::new(&registry)
            .classify(&dir.join("Logo.png"))
            .unwrap();
        assert_eq!(entity.path(), dir.join("Logo.resource-meta.xml"));
        assert_eq!(entity.name(), "Logo");
        let paths = entity.output_paths().unwrap();
        assert_eq!(paths["staticresources/Logo.resource"], dir.join("Logo.png"));
    }

    #[test]
    fn test_classify_non_xml_is_not_found() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let path = temp.path().join("src/tabs/Unknown.tab");
        write(&path, "junk");
        write(
            &temp.path().join("src/tabs/A.tab-meta.xml"),
            "<?xml version=\"1.0\"?><CustomTab/>",
        );
        write(
            &temp.path().join("src/tabs/B.tab-meta.xml"),
            "<?xml version=\"1.0\"?><CustomTab/>",
        );

        assert!(matches!(
            Classifier::new(&registry).classify(&path),
            Err(PackageError::MetadataFileNotFound { .. })
        ));
    }

    #[test]
    fn test_classify_unknown_root_is_not_found() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let path = temp.path().join("src/tabs/Unknown.tab");
        write(&path, "<?xml version=\"1.0\"?>\n<Unknown/>");

        assert!(matches!(
            Classifier::new(&registry).classify(&path),
            Err(PackageError::MetadataFileNotFound { .. })
        ));
    }

    #[test]
    fn test_classify_xml_fragment_in_code_is_not_found() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();
        let path = temp.path().join("src/misc/Gen.cls");
        write(&path, "class Gen { String s = '<ApexClass></ApexClass>'; }");

        assert!(matches!(
            Classifier::new(&registry).classify(&path),
            Err(PackageError::MetadataFileNotFound { .. })
        ));
    }

    #[test]
    fn test_classify_missing_path_is_not_found() {
        let temp = TempDir::new().unwrap();
        let registry = Registry::standard().unwrap();

        assert!(matches!(
            Classifier::new(&registry).classify(&temp.path().join("nope.cls")),
            Err(PackageError::MetadataFileNotFound { .. })
        ));
    }

    #[test]
    fn test_companion_path() {
        assert_eq!(
            companion_path(Path::new("/src/classes/A.cls")),
            PathBuf::from("/src/classes/A.cls-meta.xml")
        );
    }
}
