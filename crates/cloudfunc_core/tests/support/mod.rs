use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cloudfunc_core::template::{InMemoryTemplates, FUNCTION_ARCHIVE};
use cloudfunc_core::toolchain::{ProbeOutput, TargetPlatform, Toolchain};
use cloudfunc_core::Result;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const FAKE_BINARY: &[u8] = b"\x7fELF fake function binary";

#[derive(Debug, Clone)]
pub struct CompileCall {
    pub source_dir: PathBuf,
    pub tags: Vec<String>,
    pub platform: TargetPlatform,
    pub entry_source: String,
    pub files: Vec<String>,
    /// Permission bits of every file under `source_dir`, by relative path.
    pub modes: BTreeMap<String, u32>,
}

/// Writes a canned binary instead of compiling, and records what it saw.
pub struct FakeToolchain {
    probe: ProbeOutput,
    calls: Mutex<Vec<CompileCall>>,
}

impl FakeToolchain {
    pub fn healthy() -> Self {
        Self::with_probe(Some(2), "Usage of main:\n  -socket string\n")
    }

    pub fn crashing() -> Self {
        Self::with_probe(
            Some(2),
            "panic: assignment to entry in nil map\n\ngoroutine 1 [running]:\n",
        )
    }

    pub fn with_probe(exit_code: Option<i32>, output: &str) -> Self {
        Self {
            probe: ProbeOutput {
                exit_code,
                output: output.to_string(),
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls.lock().expect("poisoned mutex").clone()
    }
}

impl Toolchain for FakeToolchain {
    fn source_roots(&self) -> Result<Vec<PathBuf>> {
        Ok(vec![PathBuf::from("/home/dev/go")])
    }

    fn compile(
        &self,
        source_dir: &Path,
        tags: &[String],
        platform: TargetPlatform,
    ) -> Result<PathBuf> {
        let entry_source = fs::read_to_string(source_dir.join("impl.go"))?;
        let mut files: Vec<String> = fs::read_dir(source_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        let mut modes = BTreeMap::new();
        collect_modes(source_dir, source_dir, &mut modes)?;

        let out = source_dir.join("main");
        fs::write(&out, FAKE_BINARY)?;

        self.calls.lock().expect("poisoned mutex").push(CompileCall {
            source_dir: source_dir.to_path_buf(),
            tags: tags.to_vec(),
            platform,
            entry_source,
            files,
            modes,
        });
        Ok(out)
    }

    fn probe(&self, _binary: &Path) -> Result<ProbeOutput> {
        Ok(self.probe.clone())
    }
}

fn collect_modes(root: &Path, dir: &Path, modes: &mut BTreeMap<String, u32>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_modes(root, &path, modes)?;
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        modes.insert(relative, permission_bits(&entry.metadata()?));
    }
    Ok(())
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &fs::Metadata) -> u32 {
    0
}

pub fn function_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        zip.start_file(*name, FileOptions::default().unix_permissions(0o644))
            .expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish archive").into_inner()
}

pub fn skeleton() -> InMemoryTemplates {
    InMemoryTemplates::new()
        .with_file("nodego/http.go", "package main\n\nfunc HandleHTTP() {}\n")
        .with_file("nodego/node.go", "package main\n\nfunc main() {}\n")
        .with_file(
            FUNCTION_ARCHIVE,
            function_archive(&[
                ("index.js", "exports.helloWorld = () => {};\n"),
                ("package.json", "{\"name\":\"cloudfunc\"}\n"),
            ]),
        )
}
