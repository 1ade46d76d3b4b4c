//! Read-only bundle of the runtime shim skeleton.
//!
//! Two resources live in the bundle:
//!
//! - `nodego/…`: the Go shim sources compiled together with the generated
//!   `impl.go`.
//! - `function.zip`: the Node.js wrapper that the deployable archive is built
//!   on, packed by the build script from `templates/function/`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{BuildError, Result};

pub const SHIM_PREFIX: &str = "nodego";
pub const FUNCTION_ARCHIVE: &str = "function.zip";

const DEFAULT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub relative_path: String,
    pub content: Vec<u8>,
    pub mode: u32,
}

/// Directory-listing-plus-blob-lookup access to template assets.
pub trait TemplateAssets {
    /// Names of files under `prefix`, relative to it.
    fn list(&self, prefix: &str) -> Vec<String>;

    fn read(&self, path: &str) -> Result<Cow<'_, [u8]>>;

    fn mode(&self, _path: &str) -> u32 {
        DEFAULT_MODE
    }

    /// Every file under `prefix`, ready to be written out.
    fn entries(&self, prefix: &str) -> Result<Vec<TemplateEntry>> {
        self.list(prefix)
            .into_iter()
            .map(|name| {
                let path = join(prefix, &name);
                Ok(TemplateEntry {
                    content: self.read(&path)?.into_owned(),
                    mode: self.mode(&path),
                    relative_path: name,
                })
            })
            .collect()
    }
}

struct EmbeddedFile {
    path: &'static str,
    content: &'static [u8],
}

static EMBEDDED: &[EmbeddedFile] = &[
    EmbeddedFile {
        path: "nodego/http.go",
        content: include_bytes!("../templates/nodego/http.go"),
    },
    EmbeddedFile {
        path: "nodego/pubsub.go",
        content: include_bytes!("../templates/nodego/pubsub.go"),
    },
    EmbeddedFile {
        path: "nodego/storage.go",
        content: include_bytes!("../templates/nodego/storage.go"),
    },
    EmbeddedFile {
        path: "nodego/types.go",
        content: include_bytes!("../templates/nodego/types.go"),
    },
    EmbeddedFile {
        path: "nodego/node.go",
        content: include_bytes!("../templates/nodego/node.go"),
    },
    EmbeddedFile {
        path: "nodego/standalone.go",
        content: include_bytes!("../templates/nodego/standalone.go"),
    },
    EmbeddedFile {
        path: FUNCTION_ARCHIVE,
        content: include_bytes!(concat!(env!("OUT_DIR"), "/function.zip")),
    },
];

#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedTemplates;

impl TemplateAssets for EmbeddedTemplates {
    fn list(&self, prefix: &str) -> Vec<String> {
        list_children(EMBEDDED.iter().map(|file| file.path), prefix)
    }

    fn read(&self, path: &str) -> Result<Cow<'_, [u8]>> {
        EMBEDDED
            .iter()
            .find(|file| file.path == path)
            .map(|file| Cow::Borrowed(file.content))
            .ok_or_else(|| BuildError::Template(path.to_string()))
    }
}

/// Owned asset map, for alternative skeletons and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTemplates {
    files: BTreeMap<String, (Vec<u8>, u32)>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content, DEFAULT_MODE);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>, mode: u32) {
        self.files.insert(path.into(), (content.into(), mode));
    }
}

impl TemplateAssets for InMemoryTemplates {
    fn list(&self, prefix: &str) -> Vec<String> {
        list_children(self.files.keys().map(String::as_str), prefix)
    }

    fn read(&self, path: &str) -> Result<Cow<'_, [u8]>> {
        self.files
            .get(path)
            .map(|(content, _)| Cow::Borrowed(content.as_slice()))
            .ok_or_else(|| BuildError::Template(path.to_string()))
    }

    fn mode(&self, path: &str) -> u32 {
        self.files
            .get(path)
            .map(|(_, mode)| *mode)
            .unwrap_or(DEFAULT_MODE)
    }
}

fn list_children<'a>(paths: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<String> {
    let prefix = prefix.trim_matches('/');
    let mut names: Vec<String> = paths
        .filter_map(|path| {
            if prefix.is_empty() {
                Some(path)
            } else {
                path.strip_prefix(prefix)?.strip_prefix('/')
            }
        })
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

fn join(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
