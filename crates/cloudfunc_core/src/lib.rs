//! Build side of cloud function packaging.
//!
//! This crate owns trigger semantics, target resolution, the embedded shim
//! skeleton and the build pipeline that turns them into a deployable ZIP. It
//! intentionally excludes network and deploy-tool concerns; those live in
//! `cloudfunc_gcp`.

pub mod archive;
pub mod bootstrap;
pub mod error;
pub mod pipeline;
pub mod target;
pub mod template;
pub mod toolchain;
pub mod trigger;

pub use error::{BuildError, Result};
pub use pipeline::{
    build_archive, build_archive_into, build_to_file, build_to_temp_file, build_with_go,
    BuildOptions,
};
pub use target::{parse_target, resolve_target, Target};
pub use trigger::{StorageEvent, Trigger, TriggerDescriptor};
