//! IDML package handling
//!
//! An IDML file is a ZIP archive: `designmap.xml` lists the spreads,
//! stories and resources; styles live in `Resources/Styles.xml` and each
//! story in `Stories/Story_<id>.xml`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::read::ZipArchive;

use crate::context::SourceDocument;
use crate::diagnostic::Diagnostics;
use crate::error::{IcmlError, Result};
use crate::styles::StyleRegistry;
use crate::tree::{Content, Element, IcmlDocument};

const DESIGNMAP: &str = "designmap.xml";
const STYLES: &str = "Resources/Styles.xml";

/// An unpacked IDML package
#[derive(Debug)]
pub struct IdmlArchive {
    /// All files in the archive, keyed by path
    files: HashMap<String, Vec<u8>>,
}

impl IdmlArchive {
    /// Open and unpack an `.idml` file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if name.ends_with('/') {
                continue;
            }
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            files.insert(name, contents);
        }

        tracing::debug!(files = files.len(), "unpacked IDML package");
        Ok(Self { files })
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn parse(&self, path: &str) -> Result<IcmlDocument> {
        let bytes = self
            .get(path)
            .ok_or_else(|| IcmlError::MissingFile(path.to_string()))?;
        IcmlDocument::parse(&String::from_utf8_lossy(bytes))
    }

    /// The package's `designmap.xml` root
    pub fn designmap(&self) -> Result<Element> {
        Ok(self.parse(DESIGNMAP)?.root)
    }

    /// The `Resources/Styles.xml` root, if the package has one
    pub fn styles_xml(&self) -> Result<Option<Element>> {
        if !self.contains(STYLES) {
            return Ok(None);
        }
        Ok(Some(self.parse(STYLES)?.root))
    }

    /// Story paths in designmap order
    pub fn story_paths(&self) -> Result<Vec<String>> {
        let designmap = self.designmap()?;
        let mut paths: Vec<String> = designmap
            .elements()
            .filter(|e| local_name(&e.name) == "Story")
            .filter_map(|e| e.attr("src").map(str::to_string))
            .collect();
        if paths.is_empty() {
            paths = self
                .files
                .keys()
                .filter(|k| k.starts_with("Stories/") && k.ends_with(".xml"))
                .cloned()
                .collect();
            paths.sort();
        }
        Ok(paths)
    }

    /// Every `Story` element, in designmap order
    pub fn stories(&self) -> Result<Vec<Element>> {
        let mut stories = Vec::new();
        for path in self.story_paths()? {
            if !self.contains(&path) {
                tracing::warn!(path = %path, "story listed in designmap is missing");
                continue;
            }
            let root = self.parse(&path)?.root;
            if root.name == "Story" {
                stories.push(root);
            } else {
                stories.extend(root.elements().filter(|e| e.name == "Story").cloned());
            }
        }
        Ok(stories)
    }

    /// Styles defined in the package
    pub fn style_registry(&self, diags: &mut Diagnostics) -> Result<StyleRegistry> {
        match self.styles_xml()? {
            Some(root) => Ok(StyleRegistry::from_root(&root, diags)),
            None => Ok(StyleRegistry::new()),
        }
    }

    /// Flatten the package into one `Document` tree
    ///
    /// The designmap's own elements (hyperlinks, destinations, bookmarks)
    /// are kept; package references are replaced by the style groups and
    /// the stories they point at.
    pub fn to_document(&self) -> Result<Element> {
        let designmap = self.designmap()?;
        let mut root = Element {
            children: Vec::new(),
            ..designmap.clone()
        };
        if root.name != "Document" {
            root.name = "Document".to_string();
        }

        if let Some(styles) = self.styles_xml()? {
            root.children
                .extend(styles.elements().cloned().map(Content::Element));
        }
        for child in designmap.children {
            match &child {
                Content::Element(e) if e.name.starts_with("idPkg:") => {}
                Content::Element(_) => root.children.push(child),
                _ => {}
            }
        }
        root.children
            .extend(self.stories()?.into_iter().map(Content::Element));
        Ok(root)
    }

    /// The flattened package as an auxiliary document named `name`
    pub fn to_source_document(&self, name: &str) -> Result<SourceDocument> {
        Ok(SourceDocument::new(name, self.to_document()?))
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
