mod support;

use std::path::Path;

use cloudfunc_gcp::{DeployError, GcloudDeployer};

use support::{topic_trigger, RecordingRunner};

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

#[test]
fn copies_deploys_then_removes_staged_archive() {
    let deployer = GcloudDeployer::with_runner(RecordingRunner::default(), "acme-staging")
        .with_project("acme")
        .with_region("europe-west1");
    let flags = topic_trigger("orders").cli_deploy_flags();

    let source = deployer
        .deploy_file("orders", &flags, Path::new("/tmp/orders.zip"))
        .expect("deploy should succeed");

    assert!(source.starts_with("gs://acme-staging/orders-"));
    let commands = deployer.runner().commands();
    assert_eq!(
        commands,
        vec![
            strings(&["gsutil", "cp", "/tmp/orders.zip", source.as_str()]),
            strings(&[
                "gcloud",
                "functions",
                "deploy",
                "orders",
                "--entry-point",
                "helloWorld",
                "--runtime",
                "nodejs20",
                "--source",
                source.as_str(),
                "--trigger-topic",
                "orders",
                "--project",
                "acme",
                "--region",
                "europe-west1",
            ]),
            strings(&["gsutil", "rm", source.as_str()]),
        ]
    );
}

#[test]
fn staged_archive_is_removed_after_failed_deploy() {
    let deployer =
        GcloudDeployer::with_runner(RecordingRunner::failing_on("gcloud", "functions"), "stage");

    let error = deployer
        .deploy_zip("hello", Path::new("hello.zip"))
        .expect_err("failed gcloud should fail the deploy");

    assert!(matches!(error, DeployError::Command { ref status, .. } if status == "exit code 1"));
    let commands = deployer.runner().commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[2][0], "gsutil");
    assert_eq!(commands[2][1], "rm");
}

#[test]
fn failed_copy_stops_before_deploy() {
    let deployer = GcloudDeployer::with_runner(RecordingRunner::failing_on("gsutil", "cp"), "stage");

    deployer
        .deploy_zip("hello", Path::new("hello.zip"))
        .expect_err("failed copy should fail the deploy");

    assert_eq!(deployer.runner().commands().len(), 1);
}

#[test]
fn prebuilt_zip_uses_http_trigger_without_project_flags() {
    let deployer = GcloudDeployer::with_runner(RecordingRunner::default(), "stage");

    deployer
        .deploy_zip("hello", Path::new("hello.zip"))
        .expect("deploy should succeed");

    let deploy = &deployer.runner().commands()[1];
    assert_eq!(deploy.last().map(String::as_str), Some("--trigger-http"));
    assert!(!deploy.iter().any(|arg| arg == "--project"));
}

#[test]
fn missing_staging_bucket_runs_nothing() {
    let deployer = GcloudDeployer::with_runner(RecordingRunner::default(), " ");

    let error = deployer
        .deploy_zip("hello", Path::new("hello.zip"))
        .expect_err("empty bucket should fail");

    assert!(matches!(error, DeployError::Config(_)));
    assert!(deployer.runner().commands().is_empty());
}
