use anyhow::{anyhow, Context, Result};
use log::{debug, trace, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::rc::Rc;

use super::{ExecOptions, ExecOutput, Instance, InstanceOptions, Runtime};

const SNAPSHOT_FILE_NAME: &str = "snapshot.tar";

/// Runtime client driving the `singularity` (or `apptainer`) command line.
pub struct SingularityClient {
    binary: String,
    // Every instance this client created, with its shared running flag.
    created: RefCell<Vec<(String, Rc<Cell<bool>>)>>,
}

impl SingularityClient {
    pub fn new(binary: &str) -> Result<Self> {
        let output = Command::new(binary)
            .arg("--version")
            .output()
            .context(format!(
                "Failed to execute {} command. Is it installed?",
                binary
            ))?;

        if !output.status.success() {
            return Err(anyhow!("{} is not available", binary));
        }

        debug!(
            "Using runtime: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(Self {
            binary: binary.to_string(),
            created: RefCell::new(Vec::new()),
        })
    }

    fn inspect_labels(&self, image: &str) -> Result<HashMap<String, String>> {
        let output = run(
            Command::new(&self.binary).args(["inspect", "--labels", "--json", image]),
        )?;
        parse_labels(&output)
    }

    fn inspect_env(&self, image: &str, options: &InstanceOptions) -> Result<HashMap<String, String>> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("exec");
        if options.clean_env {
            cmd.arg("--cleanenv");
        }
        apply_env(&mut cmd, &self.binary, options.env.iter().flatten());
        cmd.args([image, "env"]);
        Ok(parse_env_output(&run(&mut cmd)?))
    }
}

impl Runtime for SingularityClient {
    type Instance = SingularityInstance;

    fn name(&self) -> &str {
        &self.binary
    }

    fn new_instance(
        &self,
        image: &str,
        name: &str,
        options: &InstanceOptions,
    ) -> Result<SingularityInstance> {
        if self.created.borrow().iter().any(|(n, _)| n == name) {
            return Err(anyhow!("instance name '{}' is already in use", name));
        }

        let labels = self
            .inspect_labels(image)
            .with_context(|| format!("Failed to inspect labels of {}", image))?;
        let env = self
            .inspect_env(image, options)
            .with_context(|| format!("Failed to read environment of {}", image))?;

        let running = Rc::new(Cell::new(false));
        self.created
            .borrow_mut()
            .push((name.to_string(), Rc::clone(&running)));

        debug!("Created instance {} from {}", name, image);
        Ok(SingularityInstance {
            binary: self.binary.clone(),
            image: image.to_string(),
            name: name.to_string(),
            options: options.clone(),
            env,
            labels,
            running,
        })
    }

    fn stop_all_instances(&self) -> Result<()> {
        let mut failed = Vec::new();
        for (name, running) in self.created.borrow().iter() {
            if !running.get() {
                continue;
            }
            match stop_instance(&self.binary, name) {
                Ok(()) => running.set(false),
                Err(e) => {
                    warn!("Failed to stop instance {}: {:#}", name, e);
                    failed.push(name.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("failed to stop instances: {}", failed.join(", ")))
        }
    }
}

pub struct SingularityInstance {
    binary: String,
    image: String,
    name: String,
    options: InstanceOptions,
    env: HashMap<String, String>,
    labels: HashMap<String, String>,
    running: Rc<Cell<bool>>,
}

impl SingularityInstance {
    fn uri(&self) -> String {
        format!("instance://{}", self.name)
    }

    fn exec_command(&self, clean_env: bool, extra_env: Option<&Vec<String>>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("exec");
        if clean_env || self.options.clean_env {
            cmd.arg("--cleanenv");
        }
        // Processes joined to an instance do not inherit its start environment,
        // so the creation options are replayed before the per-call ones.
        apply_env(
            &mut cmd,
            &self.binary,
            self.options.env.iter().flatten().chain(extra_env.into_iter().flatten()),
        );
        cmd.arg(self.uri());
        cmd
    }
}

impl Instance for SingularityInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn start(&self) -> Result<()> {
        if self.running.get() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(["instance", "start"]);
        if self.options.clean_env {
            cmd.arg("--cleanenv");
        }
        apply_env(&mut cmd, &self.binary, self.options.env.iter().flatten());
        cmd.args([self.image.as_str(), self.name.as_str()]);

        run(&mut cmd).with_context(|| format!("Failed to start instance {}", self.name))?;
        self.running.set(true);
        trace!("Started instance {}", self.name);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if !self.running.get() {
            return Ok(());
        }

        stop_instance(&self.binary, &self.name)?;
        self.running.set(false);
        trace!("Stopped instance {}", self.name);
        Ok(())
    }

    fn execute(&self, command: &[String], options: &ExecOptions) -> Result<ExecOutput> {
        let mut cmd = self.exec_command(options.clean_env, options.env.as_ref());
        cmd.args(command);

        let output = cmd
            .output()
            .context(format!("Failed to execute {} {:?}", self.binary, command))?;

        let exit_code = output
            .status
            .code()
            .ok_or_else(|| anyhow!("{:?} was terminated by a signal", command))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
        })
    }

    fn copy_tarball(&self, path: &str, dest_dir: &Path) -> Result<PathBuf> {
        let artifact = dest_dir.join(SNAPSHOT_FILE_NAME);
        let file = File::create(&artifact)
            .with_context(|| format!("Failed to create {}", artifact.display()))?;

        let (parent, base) = tar_root(path);
        let mut cmd = self.exec_command(false, None);
        cmd.args(["tar", "-C", parent.as_str(), "-cf", "-", base.as_str()])
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped());

        run(&mut cmd).with_context(|| format!("Failed to archive {} in {}", path, self.name))?;
        Ok(artifact)
    }

    fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}

fn stop_instance(binary: &str, name: &str) -> Result<()> {
    run(Command::new(binary).args(["instance", "stop", name]))
        .with_context(|| format!("Failed to stop instance {}", name))?;
    Ok(())
}

fn run(cmd: &mut Command) -> Result<Output> {
    trace!("Running {:?}", cmd);
    let output = cmd
        .output()
        .context(format!("Failed to execute command: {:?}", cmd))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Command failed: {}", error.trim()));
    }

    Ok(output)
}

/// Passes `KEY=VALUE` pairs through the runtime's `<RUNTIME>ENV_` variables,
/// which survive `--cleanenv` and need no quoting of commas or spaces.
fn apply_env<'a>(cmd: &mut Command, binary: &str, vars: impl Iterator<Item = &'a String>) {
    let prefix = if binary.contains("apptainer") {
        "APPTAINERENV_"
    } else {
        "SINGULARITYENV_"
    };

    for var in vars {
        if let Some((key, value)) = var.split_once('=') {
            cmd.env(format!("{}{}", prefix, key), value);
        }
    }
}

/// Splits a query path into the directory `tar` runs in and the entry it archives.
fn tar_root(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return ("/".to_string(), ".".to_string());
    }

    match trimmed.rsplit_once('/') {
        Some(("", base)) => ("/".to_string(), base.to_string()),
        Some((parent, base)) => (parent.to_string(), base.to_string()),
        None => (".".to_string(), trimmed.to_string()),
    }
}

fn parse_labels(output: &Output) -> Result<HashMap<String, String>> {
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("Failed to parse inspect output")?;

    let labels = json["data"]["attributes"]["labels"]
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = v
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| v.to_string());
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(labels)
}

fn parse_env_output(output: &Output) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let mut last_key: Option<String> = None;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        match line.split_once('=') {
            Some((key, value)) if is_env_key(key) => {
                env.insert(key.to_string(), value.to_string());
                last_key = Some(key.to_string());
            }
            // Continuation of a multi-line value.
            _ => {
                if let Some(value) = last_key.as_ref().and_then(|k| env.get_mut(k)) {
                    value.push('\n');
                    value.push_str(line);
                }
            }
        }
    }

    env
}

fn is_env_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
