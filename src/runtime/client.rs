use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Options applied when an instance is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceOptions {
    /// `KEY=VALUE` pairs injected into the instance environment; `None` keeps
    /// the image defaults untouched.
    pub env: Option<Vec<String>>,
    /// Start from an empty environment instead of inheriting the caller's.
    pub clean_env: bool,
}

/// Options applied to a single `execute` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    pub env: Option<Vec<String>>,
    pub clean_env: bool,
}

/// Captured result of a process run inside an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A container runtime client able to materialise instances from images.
pub trait Runtime {
    type Instance: Instance;

    /// Returns the name of the runtime for identification purposes
    fn name(&self) -> &str;

    /// Creates a new instance from `image`. The instance is not started.
    fn new_instance(
        &self,
        image: &str,
        name: &str,
        options: &InstanceOptions,
    ) -> Result<Self::Instance>;

    /// Stops every instance this client has ever created.
    fn stop_all_instances(&self) -> Result<()>;
}

/// A single container instance handle.
///
/// `start` and `stop` are idempotent: starting a running instance or
/// stopping a stopped one succeeds without touching the runtime.
pub trait Instance {
    fn name(&self) -> &str;

    fn image(&self) -> &str;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn execute(&self, command: &[String], options: &ExecOptions) -> Result<ExecOutput>;

    /// Writes a tarball of `path` into `dest_dir` and returns the artifact path.
    ///
    /// The archive must be rooted at the parent of `path`: its top-level entry
    /// is named after the base name of `path` (for `/etc/app.conf` the first
    /// entry is `app.conf`, for `/usr/bin` it is `bin/` followed by `bin/...`).
    /// Snapshot queries match entries against that base name.
    ///
    /// Anything written into `dest_dir` is removed by the caller, including
    /// partial output left behind when this returns an error.
    fn copy_tarball(&self, path: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Environment recorded for the instance when it was created.
    fn env(&self) -> &HashMap<String, String>;

    /// Labels of the image the instance was created from.
    fn labels(&self) -> &HashMap<String, String>;
}
