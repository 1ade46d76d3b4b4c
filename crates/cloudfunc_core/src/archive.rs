//! Repacking of the template archive into the deployable ZIP.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Seek, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;

pub const EXECUTABLE_MODE: u32 = 0o755;
pub const REGULAR_MODE: u32 = 0o644;

/// A file appended at the archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFile {
    pub name: String,
    pub content: Vec<u8>,
    pub mode: u32,
}

impl ExtraFile {
    pub fn executable(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            mode: EXECUTABLE_MODE,
        }
    }

    pub fn regular(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            mode: REGULAR_MODE,
        }
    }
}

/// Re-emit every entry of `template` into `out`, then append `extras`.
///
/// A template entry whose name collides with an extra is replaced by the
/// extra. Unix modes are carried over so executables stay executable.
pub fn repack_with<W: Write + Seek>(template: &[u8], extras: &[ExtraFile], out: W) -> Result<W> {
    let mut source = ZipArchive::new(Cursor::new(template))?;
    let replaced: BTreeSet<&str> = extras.iter().map(|extra| extra.name.as_str()).collect();
    let mut zip = ZipWriter::new(out);

    for index in 0..source.len() {
        let mut entry = source.by_index(index)?;
        let name = entry.name().to_string();
        if replaced.contains(name.as_str()) {
            continue;
        }
        let mode = entry.unix_mode().unwrap_or(REGULAR_MODE);
        if entry.is_dir() {
            zip.add_directory(name, file_options(mode))?;
            continue;
        }
        let mut body = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut body)?;
        zip.start_file(name, file_options(mode))?;
        zip.write_all(&body)?;
    }

    for extra in extras {
        zip.start_file(extra.name.clone(), file_options(extra.mode))?;
        zip.write_all(&extra.content)?;
    }

    Ok(zip.finish()?)
}

fn file_options(mode: u32) -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode & 0o777)
}
