//! The two deploy transports. `api` drives the REST APIs directly, `cli`
//! hands the same archive to `gsutil` and `gcloud`.

pub mod api;
pub mod cli;

/// Export of the Node.js wrapper that forwards to the compiled binary.
pub const ENTRY_POINT: &str = "helloWorld";

pub const RUNTIME: &str = "nodejs20";

/// Object key for one upload of `name`'s archive.
pub fn staging_key(name: &str) -> String {
    format!("{name}-{}.zip", rand::random::<u64>())
}

pub fn staging_url(bucket: &str, key: &str) -> String {
    format!("gs://{bucket}/{key}")
}
