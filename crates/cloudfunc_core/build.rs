//! Packs `templates/function/` into a single ZIP resource that the crate
//! embeds with `include_bytes!`.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let source = manifest_dir.join("templates").join("function");

    println!("cargo:rerun-if-changed={}", source.display());

    let mut files = Vec::new();
    collect_files(&source, &source, &mut files);
    files.sort();

    let archive = fs::File::create(out_dir.join("function.zip")).expect("failed to create function.zip");
    let mut zip = ZipWriter::new(archive);
    for relative in files {
        let path = source.join(&relative);
        println!("cargo:rerun-if-changed={}", path.display());
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)
            .expect("failed to start template entry");
        let body = fs::read(&path).expect("failed to read template file");
        zip.write_all(&body).expect("failed to write template entry");
    }
    zip.finish().expect("failed to finish function.zip");
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("failed to read template directory") {
        let path = entry.expect("failed to read template entry").path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else if let Ok(relative) = path.strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
}
