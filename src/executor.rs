use crate::env;
use crate::error::{DriverError, Result};
use crate::lifecycle::InstanceManager;
use crate::metadata::EnvVar;
use crate::runtime::{ExecOptions, ExecOutput, Instance, Runtime};
use log::{debug, info};

/// Exit code reported in place of a real one when a command could not run at all.
pub const EXEC_FAILURE_EXIT_CODE: i32 = -1;

/// Runs `command` in the current instance, bracketed by start and stop.
///
/// A non-zero exit code from the command itself is returned as a normal
/// result; only failures to start the instance or to run the process at all
/// become [`DriverError::Execution`].
pub fn execute<R: Runtime>(
    manager: &InstanceManager<R>,
    env_vars: &[EnvVar],
    command: &[String],
) -> Result<ExecOutput> {
    if command.is_empty() {
        return Err(DriverError::execution(
            command,
            anyhow::anyhow!("no command given"),
        ));
    }

    let options = ExecOptions {
        env: env::expand_env_vars(env_vars, manager.current().env()),
        clean_env: true,
    };

    let output = {
        let started = manager
            .start()
            .map_err(|e| DriverError::execution(command, e))?;
        debug!("Executing {:?} in {}", command, started.name());
        started
            .execute(command, &options)
            .map_err(|e| DriverError::execution(command, e))?
    };

    if !output.stdout.is_empty() {
        info!("stdout: {}", output.stdout);
    }
    if !output.stderr.is_empty() {
        info!("stderr: {}", output.stderr);
    }

    Ok(output)
}
