use crate::error::Result;
use crate::metadata::{EnvVar, ImageConfig};
use crate::runtime::ExecOutput;
use crate::snapshot::FileInfo;

/// Arguments every driver is constructed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub image: String,
    /// Keep the resulting image after the run. Singularity images are
    /// immutable, so this driver accepts and ignores it.
    pub save: bool,
    /// Runtime binary, `singularity` or `apptainer`.
    pub runtime: String,
    /// Prefix of the instance names this driver creates.
    pub instance_prefix: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            save: false,
            runtime: "singularity".to_string(),
            instance_prefix: "structure-test".to_string(),
        }
    }
}

/// Capability set the structure-test harness drives.
pub trait Driver {
    /// Runs setup commands before the tests; may be a no-op.
    fn setup(&mut self, env_vars: &[EnvVar], full_commands: &[Vec<String>]) -> Result<()>;

    /// Runs teardown commands after the tests; may be a no-op.
    fn teardown(&mut self, full_commands: &[Vec<String>]) -> Result<()>;

    /// Applies `env_vars` to every later command and query.
    fn set_env(&mut self, env_vars: &[EnvVar]) -> Result<()>;

    fn process_command(&mut self, env_vars: &[EnvVar], full_command: &[String]) -> Result<ExecOutput>;

    fn stat_file(&mut self, path: &str) -> Result<FileInfo>;

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>>;

    fn read_dir(&mut self, path: &str) -> Result<Vec<FileInfo>>;

    fn get_config(&self) -> Result<ImageConfig>;

    /// Tears down everything the driver created. Never fails.
    fn destroy(&mut self);
}
