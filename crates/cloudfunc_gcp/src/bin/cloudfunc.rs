use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use cloudfunc_core::toolchain::GoToolchain;
use cloudfunc_core::trigger::StorageTrigger;
use cloudfunc_core::{build_to_file, resolve_target, BuildOptions, StorageEvent, Trigger};
use cloudfunc_gcp::adapters::rest::GcpRestClient;
use cloudfunc_gcp::adapters::token::default_provider;
use cloudfunc_gcp::config::DEFAULT_REGION;
use cloudfunc_gcp::list::summary_line;
use cloudfunc_gcp::{
    build_and_deploy, deploy_zip, list_functions, load_app_config, DeployClient, DeployConfig,
    DeployError, DeployMode, GcloudDeployer, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cloudfunc",
    about = "Package Go handlers as cloud functions and deploy them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a function archive without deploying it
    Build {
        /// Function name, used for the default output file
        name: String,
        /// Import path or directory of the handler, optionally `.Symbol`
        package: String,
        /// Output archive
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Application config whose `env_variables` are baked into the archive
        #[arg(short = 'c', long)]
        app_config: Option<PathBuf>,
        /// Build a pub/sub handler for this topic
        #[arg(short, long, conflicts_with = "bucket")]
        topic: Option<String>,
        /// Build a storage handler for this bucket
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// Build (unless given a zip) and deploy a function
    Deploy {
        #[command(subcommand)]
        kind: DeployKind,
    },
    /// List deployed functions across all regions
    List {
        #[arg(short, long, env = "CLOUDFUNC_PROJECT")]
        project: String,
    },
}

#[derive(Subcommand)]
enum DeployKind {
    /// Deploy a prebuilt archive with an HTTP trigger
    Zip {
        name: String,
        path: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Deploy an HTTP handler
    Http {
        name: String,
        package: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Deploy a topic message handler
    Pubsub {
        name: String,
        package: String,
        #[arg(short, long)]
        topic: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Deploy a storage change handler
    Storage {
        name: String,
        package: String,
        #[arg(short, long)]
        bucket: String,
        /// Narrow the trigger to one object event (finalize, delete, ...)
        #[arg(short, long)]
        event: Option<StorageEvent>,
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args)]
struct SessionArgs {
    #[arg(short, long, env = "CLOUDFUNC_PROJECT")]
    project: String,
    #[arg(long, env = "CLOUDFUNC_REGION", default_value = DEFAULT_REGION)]
    region: String,
    /// Application config whose `env_variables` are baked into the archive
    #[arg(short = 'c', long)]
    app_config: Option<PathBuf>,
    /// Staging bucket (default: <project>-staging)
    #[arg(short, long)]
    staging: Option<String>,
    /// Deploy with gsutil and gcloud instead of the REST APIs
    #[arg(long, requires = "staging")]
    via_gcloud: bool,
}

enum Artifact {
    Prebuilt(PathBuf),
    Build(Trigger),
}

impl DeployKind {
    fn into_request(self) -> Result<(String, SessionArgs, Artifact)> {
        let go = GoToolchain::new();
        Ok(match self {
            Self::Zip {
                name,
                path,
                session,
            } => (name, session, Artifact::Prebuilt(path)),
            Self::Http {
                name,
                package,
                session,
            } => {
                let trigger = Trigger::http(resolve_target(&package, &go)?);
                (name, session, Artifact::Build(trigger))
            }
            Self::Pubsub {
                name,
                package,
                topic,
                session,
            } => {
                let trigger = Trigger::topic(resolve_target(&package, &go)?, topic);
                (name, session, Artifact::Build(trigger))
            }
            Self::Storage {
                name,
                package,
                bucket,
                event,
                session,
            } => {
                let trigger = Trigger::Storage(StorageTrigger {
                    target: resolve_target(&package, &go)?,
                    bucket_name: bucket,
                    event,
                });
                (name, session, Artifact::Build(trigger))
            }
        })
    }
}

// ── Entry point ────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(cli.command, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Build {
            name,
            package,
            output,
            app_config,
            topic,
            bucket,
        } => {
            let target = resolve_target(&package, &GoToolchain::new())?;
            let trigger = match (topic, bucket) {
                (Some(topic), _) => Trigger::topic(target, topic),
                (None, Some(bucket)) => Trigger::storage(target, bucket),
                (None, None) => Trigger::http(target),
            };
            let options = build_options(app_config.as_deref())?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{name}.zip")));
            let written = tokio::task::spawn_blocking(move || {
                build_to_file(&trigger, &options, &output).map(|()| output)
            })
            .await
            .map_err(io::Error::other)??;
            println!("{}", written.display());
            Ok(())
        }
        Commands::Deploy { kind } => run_deploy(kind, cancel).await,
        Commands::List { project } => {
            let rest = GcpRestClient::new(default_provider()).map_err(|source| {
                DeployError::Rpc {
                    context: "create HTTP client".to_string(),
                    source,
                }
            })?;
            for function in list_functions(&rest, &project, cancel).await? {
                println!("{}", summary_line(&function));
            }
            Ok(())
        }
    }
}

async fn run_deploy(kind: DeployKind, cancel: &CancellationToken) -> Result<()> {
    let (name, session, artifact) = kind.into_request()?;
    let options = build_options(session.app_config.as_deref())?;

    if session.via_gcloud {
        let staging = session
            .staging
            .ok_or_else(|| DeployError::config("--via-gcloud needs --staging"))?;
        let deployer = GcloudDeployer::new(staging)
            .with_project(session.project)
            .with_region(session.region);
        let function = name.clone();
        let source = tokio::task::spawn_blocking(move || match artifact {
            Artifact::Prebuilt(path) => deployer.deploy_zip(&function, &path),
            Artifact::Build(trigger) => deployer.deploy(&function, &trigger, &options),
        })
        .await
        .map_err(io::Error::other)??;
        println!("deployed {name} from {source}");
        return Ok(());
    }

    let mut config = DeployConfig::new(session.project).with_region(session.region);
    if let Some(bucket) = session.staging {
        config = config.with_staging_bucket(bucket);
    }
    let client = DeployClient::connect(config, default_provider())?;
    let report = match artifact {
        Artifact::Prebuilt(path) => deploy_zip(&client, &name, &path, cancel).await?,
        Artifact::Build(trigger) => {
            build_and_deploy(&client, &name, &trigger, &options, cancel).await?
        }
    };
    let verb = match report.mode {
        DeployMode::Created => "created",
        DeployMode::Updated => "updated",
    };
    println!("{verb} {}", report.function);
    Ok(())
}

fn build_options(app_config: Option<&Path>) -> Result<BuildOptions> {
    match app_config {
        Some(path) => Ok(BuildOptions::with_env(load_app_config(path)?)),
        None => Ok(BuildOptions::default()),
    }
}
