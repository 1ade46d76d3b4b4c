//! Resolution of a user-supplied path into the package and handler symbol
//! that the generated entry point imports.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::toolchain::Toolchain;

/// The user code wrapped by a trigger: an import path and, optionally, the
/// exported handler inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub package: String,
    pub entry_symbol: Option<String>,
}

impl Target {
    pub fn new(package: impl Into<String>, entry_symbol: Option<String>) -> Self {
        Self {
            package: package.into(),
            entry_symbol: entry_symbol.filter(|symbol| !symbol.is_empty()),
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        self.entry_symbol.as_deref()
    }
}

/// Parse `reference` into a [`Target`].
///
/// Filesystem paths (leading `.` or `/`) are first rewritten to import paths
/// against `source_roots`, relative ones resolved from `cwd`. Anything else is
/// taken as an import path verbatim. A trailing `.Symbol` on the last path
/// segment becomes the entry symbol.
pub fn parse_target(reference: &str, cwd: &Path, source_roots: &[PathBuf]) -> Result<Target> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(BuildError::config("package not specified"));
    }

    let package = to_import_path(reference, cwd, source_roots)?;
    let (base_start, base) = match package.rfind('/') {
        Some(idx) => (idx + 1, &package[idx + 1..]),
        None => (0, package.as_str()),
    };

    match base.rfind('.') {
        Some(dot) => {
            let symbol = base[dot + 1..].to_string();
            let package = package[..base_start + dot].to_string();
            if package.is_empty() {
                return Err(BuildError::config(format!(
                    "target '{reference}' has no package path"
                )));
            }
            Ok(Target::new(package, Some(symbol)))
        }
        None => Ok(Target::new(package, None)),
    }
}

/// Parse `reference` from the current directory, asking `toolchain` for its
/// source roots only when the reference is a filesystem path.
pub fn resolve_target(reference: &str, toolchain: &impl Toolchain) -> Result<Target> {
    if !is_filesystem_path(reference.trim()) {
        return parse_target(reference, Path::new("/"), &[]);
    }
    let cwd = std::env::current_dir()?;
    parse_target(reference, &cwd, &toolchain.source_roots()?)
}

fn to_import_path(reference: &str, cwd: &Path, source_roots: &[PathBuf]) -> Result<String> {
    if !is_filesystem_path(reference) {
        return Ok(reference.to_string());
    }

    let absolute = clean_path(&cwd.join(reference));
    for root in source_roots {
        let src = clean_path(&root.join("src"));
        if let Ok(rest) = absolute.strip_prefix(&src) {
            let package = rest
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if package.is_empty() {
                break;
            }
            return Ok(package);
        }
    }

    Err(BuildError::config(format!(
        "'{}' is not inside any source root ({})",
        absolute.display(),
        source_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

fn is_filesystem_path(reference: &str) -> bool {
    reference.starts_with('.') || reference.starts_with('/')
}

/// Lexically normalize `path`, dropping `.` and folding `..`.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
