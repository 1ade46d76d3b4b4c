//! The compiler collaborator: the one place tied to the Go toolchain.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{BuildError, Result};

pub const BINARY_NAME: &str = "main";

/// How long the smoke test may run before the binary is killed.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const PROBE_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPlatform {
    pub os: &'static str,
    pub arch: &'static str,
}

/// The hosting platform runs 64-bit Linux.
pub const LINUX_AMD64: TargetPlatform = TargetPlatform {
    os: "linux",
    arch: "amd64",
};

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Exit status and combined stdout/stderr of a smoke-test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutput {
    pub exit_code: Option<i32>,
    pub output: String,
}

pub trait Toolchain {
    /// Roots that filesystem targets are resolved against.
    fn source_roots(&self) -> Result<Vec<PathBuf>>;

    /// Compile `source_dir` as one statically linked program and return the
    /// path of the produced binary.
    fn compile(&self, source_dir: &Path, tags: &[String], platform: TargetPlatform)
        -> Result<PathBuf>;

    /// Run `binary` with a harmless usage flag.
    fn probe(&self, binary: &Path) -> Result<ProbeOutput>;
}

/// Shells out to `go`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: PathBuf,
    probe_timeout: Duration,
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self {
            program: PathBuf::from("go"),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl GoToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn gopath(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["env", "GOPATH"])
            .output()?;
        if !output.status.success() {
            return Err(BuildError::Toolchain {
                message: "go env GOPATH failed".to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Toolchain for GoToolchain {
    fn source_roots(&self) -> Result<Vec<PathBuf>> {
        let gopath = self.gopath()?;
        Ok(std::env::split_paths(&gopath)
            .filter(|p| !p.as_os_str().is_empty())
            .collect())
    }

    fn compile(
        &self,
        source_dir: &Path,
        tags: &[String],
        platform: TargetPlatform,
    ) -> Result<PathBuf> {
        let gopath = self.gopath()?;
        let out = source_dir.join(BINARY_NAME);
        let tags = tags.join(" ");
        debug!(dir = %source_dir.display(), tags = %tags, %platform, "go build");

        let output = Command::new(&self.program)
            .arg("build")
            .arg("-tags")
            .arg(&tags)
            .arg("-o")
            .arg(&out)
            .arg(".")
            .current_dir(source_dir)
            .env("GOOS", platform.os)
            .env("GOARCH", platform.arch)
            .env("CGO_ENABLED", "0")
            .env("GO111MODULE", "off")
            .env("GOPATH", gopath)
            .output()?;

        if !output.status.success() {
            return Err(BuildError::Toolchain {
                message: format!("go build exited with {}", output.status),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(out)
    }

    /// Runs `binary -h`, killing it once `probe_timeout` has passed. A binary
    /// that outlives the deadline fails the smoke test.
    fn probe(&self, binary: &Path) -> Result<ProbeOutput> {
        let mut child = Command::new(binary)
            .arg("-h")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.probe_timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                child.kill()?;
                child.wait()?;
                break None;
            }
            thread::sleep(PROBE_POLL);
        };

        let mut output = stdout.join().unwrap_or_default();
        output.push_str(&stderr.join().unwrap_or_default());
        match status {
            Some(status) => Ok(ProbeOutput {
                exit_code: status.code(),
                output,
            }),
            None => Err(BuildError::SmokeTest {
                message: format!(
                    "binary did not exit within {}ms",
                    self.probe_timeout.as_millis()
                ),
                output,
            }),
        }
    }
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
