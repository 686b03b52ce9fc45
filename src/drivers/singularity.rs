use log::{debug, info};

use super::{Driver, DriverConfig};
use crate::env;
use crate::error::{DriverError, Result};
use crate::executor;
use crate::lifecycle::InstanceManager;
use crate::metadata::{self, EnvVar, ImageConfig};
use crate::runtime::{ExecOutput, Instance, Runtime, SingularityClient};
use crate::snapshot::{self, FileInfo};

/// Structure-test driver backed by Singularity instances.
///
/// Every command runs in a short-lived start/stop window on the current
/// instance, and every filesystem query reads a fresh tarball snapshot.
/// `set_env` is the only operation that changes which instance is current.
pub struct SingularityDriver<R: Runtime = SingularityClient> {
    manager: InstanceManager<R>,
    // Overrides accumulated by `set_env`, replayed into each new instance.
    env_overrides: Vec<String>,
    config: DriverConfig,
}

impl SingularityDriver<SingularityClient> {
    pub fn new(config: DriverConfig) -> Result<Self> {
        let client =
            SingularityClient::new(&config.runtime).map_err(|source| DriverError::Instantiation {
                image: config.image.clone(),
                source,
            })?;
        Self::with_runtime(client, config)
    }
}

impl<R: Runtime> SingularityDriver<R> {
    pub fn with_runtime(runtime: R, config: DriverConfig) -> Result<Self> {
        info!(
            "Creating {} driver for image {}",
            runtime.name(),
            config.image
        );
        let manager = InstanceManager::new(runtime, &config.image, &config.instance_prefix)?;
        Ok(Self {
            manager,
            env_overrides: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn original_image(&self) -> &str {
        self.manager.original_image()
    }

    pub fn current_image(&self) -> &str {
        self.manager.current_image()
    }

    pub fn current_instance(&self) -> &R::Instance {
        self.manager.current()
    }
}

impl<R: Runtime> Driver for SingularityDriver<R> {
    // Instances come from an immutable image and each run gets a fresh one,
    // so there is nothing to prepare or undo.
    fn setup(&mut self, _env_vars: &[EnvVar], _full_commands: &[Vec<String>]) -> Result<()> {
        Ok(())
    }

    fn teardown(&mut self, _full_commands: &[Vec<String>]) -> Result<()> {
        Ok(())
    }

    fn set_env(&mut self, env_vars: &[EnvVar]) -> Result<()> {
        let Some(expanded) = env::expand_env_vars(env_vars, self.manager.current().env()) else {
            return Ok(());
        };

        let merged = env::overlay(&self.env_overrides, expanded);
        self.manager.replace(Some(merged.clone()))?;
        self.env_overrides = merged;
        debug!(
            "Environment now applied through instance {}",
            self.manager.current().name()
        );
        Ok(())
    }

    fn process_command(&mut self, env_vars: &[EnvVar], full_command: &[String]) -> Result<ExecOutput> {
        executor::execute(&self.manager, env_vars, full_command)
    }

    fn stat_file(&mut self, path: &str) -> Result<FileInfo> {
        snapshot::stat(&self.manager, path)
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        snapshot::read_file(&self.manager, path)
    }

    fn read_dir(&mut self, path: &str) -> Result<Vec<FileInfo>> {
        snapshot::read_dir(&self.manager, path)
    }

    fn get_config(&self) -> Result<ImageConfig> {
        Ok(metadata::from_instance(self.manager.current()))
    }

    fn destroy(&mut self) {
        debug!("Stopping every instance created for {}", self.original_image());
        self.manager.stop_all();
    }
}
