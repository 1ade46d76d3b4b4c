//! Deploy by shelling out to `gsutil` and `gcloud`, for hosts that have the
//! platform tooling but no direct API access.

use std::io;
use std::path::Path;
use std::process::Command;

use cloudfunc_core::{build_to_temp_file, BuildOptions, Trigger};
use tracing::{debug, info, warn};

use super::{staging_key, staging_url, ENTRY_POINT, RUNTIME};
use crate::error::{DeployError, Result};

pub trait CommandRunner {
    /// Exit code of `program args..`, `None` when it was killed by a signal.
    fn run(&self, program: &str, args: &[String]) -> io::Result<Option<i32>>;
}

/// Spawns real processes, inheriting stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<Option<i32>> {
        Command::new(program).args(args).status().map(|status| status.code())
    }
}

#[derive(Debug, Clone)]
pub struct GcloudDeployer<R = ProcessRunner> {
    runner: R,
    staging_bucket: String,
    project: Option<String>,
    region: Option<String>,
}

impl GcloudDeployer<ProcessRunner> {
    pub fn new(staging_bucket: impl Into<String>) -> Self {
        Self::with_runner(ProcessRunner, staging_bucket)
    }
}

impl<R: CommandRunner> GcloudDeployer<R> {
    pub fn with_runner(runner: R, staging_bucket: impl Into<String>) -> Self {
        Self {
            runner,
            staging_bucket: staging_bucket.into(),
            project: None,
            region: None,
        }
    }

    /// Pass `--project`; otherwise gcloud's active configuration decides.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build `trigger` with the local Go toolchain and deploy the result.
    pub fn deploy(&self, name: &str, trigger: &Trigger, options: &BuildOptions) -> Result<String> {
        trigger.validate()?;
        let archive = build_to_temp_file(trigger, options)?;
        self.deploy_file(name, &trigger.cli_deploy_flags(), archive.path())
    }

    pub fn deploy_zip(&self, name: &str, archive: &Path) -> Result<String> {
        self.deploy_file(name, &["--trigger-http".to_string()], archive)
    }

    /// Copy `archive` to the staging bucket, deploy it with `trigger_flags`
    /// and remove the staged copy. Returns the staged object's URL.
    pub fn deploy_file(
        &self,
        name: &str,
        trigger_flags: &[String],
        archive: &Path,
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(DeployError::config("function name not specified"));
        }
        if self.staging_bucket.trim().is_empty() {
            return Err(DeployError::config("staging bucket not specified"));
        }

        let source = staging_url(&self.staging_bucket, &staging_key(name));
        self.exec(
            "gsutil",
            vec![
                "cp".to_string(),
                archive.display().to_string(),
                source.clone(),
            ],
        )?;
        info!(source = %source, "artifact_uploaded");

        let deployed = self.exec("gcloud", self.deploy_args(name, &source, trigger_flags));

        if let Err(error) = self.exec("gsutil", vec!["rm".to_string(), source.clone()]) {
            warn!(source = %source, error = %error, "staging_cleanup_failed");
        }
        deployed?;
        info!(function = name, "operation_completed");
        Ok(source)
    }

    fn deploy_args(&self, name: &str, source: &str, trigger_flags: &[String]) -> Vec<String> {
        let mut args: Vec<String> = [
            "functions",
            "deploy",
            name,
            "--entry-point",
            ENTRY_POINT,
            "--runtime",
            RUNTIME,
            "--source",
            source,
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        args.extend(trigger_flags.iter().cloned());
        if let Some(project) = &self.project {
            args.extend(["--project".to_string(), project.clone()]);
        }
        if let Some(region) = &self.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        args
    }

    fn exec(&self, program: &str, args: Vec<String>) -> Result<()> {
        let command = format!("{program} {}", args.join(" "));
        debug!(command = %command, "running");
        match self.runner.run(program, &args) {
            Ok(Some(0)) => Ok(()),
            Ok(Some(code)) => Err(DeployError::Command {
                command,
                status: format!("exit code {code}"),
            }),
            Ok(None) => Err(DeployError::Command {
                command,
                status: "terminated by signal".to_string(),
            }),
            Err(error) => Err(DeployError::Command {
                command,
                status: error.to_string(),
            }),
        }
    }
}
