//! Build pipeline: trigger + user package → deployable ZIP.
//!
//! Every call works in its own scoped temporary directory, removed when the
//! call returns or unwinds. Nothing is shared between calls, so concurrent
//! builds of different targets do not interfere.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use std::time::Instant;

use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::archive::{repack_with, ExtraFile};
use crate::bootstrap::{render_env_script, BOOTSTRAP_FILE};
use crate::error::{BuildError, Result};
use crate::template::{
    EmbeddedTemplates, TemplateAssets, TemplateEntry, FUNCTION_ARCHIVE, SHIM_PREFIX,
};
use crate::toolchain::{GoToolchain, ProbeOutput, Toolchain, BINARY_NAME, LINUX_AMD64};
use crate::trigger::Trigger;

/// The generated entry point that binds user code into the skeleton.
pub const ENTRY_SOURCE_FILE: &str = "impl.go";

/// Selects the shim's HTTP-bridge `main` over the standalone one.
pub const NODE_BUILD_TAG: &str = "node";

/// Markers a Go binary prints when it dies during start-up.
const CRASH_MARKERS: &[&str] = &["panic:", "fatal error:", "SIGSEGV", "runtime error:"];

/// Exit codes a healthy binary may return for `-h`: success, or the flag
/// package's usage exit.
const ACCEPTED_PROBE_EXITS: &[i32] = &[0, 2];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Environment injected at runtime. `None` adds no bootstrap file.
    pub env: Option<BTreeMap<String, String>>,
}

impl BuildOptions {
    pub fn with_env(env: BTreeMap<String, String>) -> Self {
        Self { env: Some(env) }
    }
}

pub fn build_archive_into<W: Write + Seek>(
    trigger: &Trigger,
    options: &BuildOptions,
    toolchain: &impl Toolchain,
    templates: &impl TemplateAssets,
    out: W,
) -> Result<W> {
    trigger.validate()?;
    let started_at = Instant::now();

    let workdir = tempfile::Builder::new().prefix("cloudfunc-").tempdir()?;
    let binary = compile_in(&workdir, trigger, toolchain, templates)?;

    let mut extras = vec![ExtraFile::executable(BINARY_NAME, binary)];
    if let Some(env) = &options.env {
        extras.push(ExtraFile::regular(
            BOOTSTRAP_FILE,
            render_env_script(env).into_bytes(),
        ));
    }

    let template = templates.read(FUNCTION_ARCHIVE)?;
    let out = repack_with(&template, &extras, out)?;
    info!(
        trigger = trigger.kind(),
        package = %trigger.target().package,
        entries_added = extras.len(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "archive_written"
    );
    Ok(out)
}

pub fn build_archive(
    trigger: &Trigger,
    options: &BuildOptions,
    toolchain: &impl Toolchain,
    templates: &impl TemplateAssets,
) -> Result<Vec<u8>> {
    build_archive_into(trigger, options, toolchain, templates, Cursor::new(Vec::new()))
        .map(Cursor::into_inner)
}

/// Build with the Go toolchain from `PATH` and the embedded skeleton.
pub fn build_with_go(trigger: &Trigger, options: &BuildOptions) -> Result<Vec<u8>> {
    build_archive(trigger, options, &GoToolchain::new(), &EmbeddedTemplates)
}

pub fn build_to_file(trigger: &Trigger, options: &BuildOptions, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    build_archive_into(trigger, options, &GoToolchain::new(), &EmbeddedTemplates, file)?
        .sync_all()?;
    Ok(())
}

/// Build with the Go toolchain into a `.zip` temporary file that is deleted
/// when the returned handle drops.
pub fn build_to_temp_file(trigger: &Trigger, options: &BuildOptions) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("cloudfunc-")
        .suffix(".zip")
        .tempfile()?;
    build_archive_into(
        trigger,
        options,
        &GoToolchain::new(),
        &EmbeddedTemplates,
        file.as_file_mut(),
    )?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn compile_in(
    workdir: &TempDir,
    trigger: &Trigger,
    toolchain: &impl Toolchain,
    templates: &impl TemplateAssets,
) -> Result<Vec<u8>> {
    let dir = workdir.path();

    let entries = templates.entries(SHIM_PREFIX)?;
    for entry in &entries {
        materialize(dir, entry)?;
    }
    debug!(files = entries.len(), dir = %dir.display(), "template_materialized");

    fs::write(dir.join(ENTRY_SOURCE_FILE), trigger.generate_entry_source())?;

    let mut tags = trigger.build_tags();
    tags.push(NODE_BUILD_TAG.to_string());
    info!(
        trigger = trigger.kind(),
        tags = %tags.join(","),
        platform = %LINUX_AMD64,
        "compile_started"
    );
    let binary = toolchain.compile(dir, &tags, LINUX_AMD64)?;

    let probe = toolchain.probe(&binary)?;
    check_probe(&probe)?;
    debug!(exit_code = ?probe.exit_code, "smoke_test_passed");

    Ok(fs::read(&binary)?)
}

fn materialize(dir: &Path, entry: &TemplateEntry) -> Result<()> {
    let path = dir.join(&entry.relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &entry.content)?;
    set_mode(&path, entry.mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Fail closed: anything other than a clean usage exit is a broken binary.
fn check_probe(probe: &ProbeOutput) -> Result<()> {
    if let Some(marker) = CRASH_MARKERS
        .iter()
        .find(|marker| probe.output.contains(**marker))
    {
        return Err(BuildError::SmokeTest {
            message: format!("binary crashed on start-up ({marker})"),
            output: probe.output.clone(),
        });
    }
    match probe.exit_code {
        Some(code) if ACCEPTED_PROBE_EXITS.contains(&code) => Ok(()),
        Some(code) => Err(BuildError::SmokeTest {
            message: format!("unexpected exit code {code}"),
            output: probe.output.clone(),
        }),
        None => Err(BuildError::SmokeTest {
            message: "binary was terminated by a signal".to_string(),
            output: probe.output.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(exit_code: Option<i32>, output: &str) -> ProbeOutput {
        ProbeOutput {
            exit_code,
            output: output.to_string(),
        }
    }

    #[test]
    fn usage_exit_passes() {
        assert!(check_probe(&probe(Some(2), "Usage of main:\n  -socket string")).is_ok());
        assert!(check_probe(&probe(Some(0), "")).is_ok());
    }

    #[test]
    fn crash_marker_fails_even_with_clean_exit() {
        let error = check_probe(&probe(Some(0), "panic: runtime error: nil map"))
            .expect_err("panic output should fail");
        assert!(matches!(error, BuildError::SmokeTest { .. }));
    }

    #[test]
    fn unexpected_exit_or_signal_fails() {
        assert!(check_probe(&probe(Some(1), "boom")).is_err());
        assert!(check_probe(&probe(None, "")).is_err());
    }
}
