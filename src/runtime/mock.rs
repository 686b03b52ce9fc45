//! In-memory runtime used by unit tests (and by dependants via `test-utils`).
//!
//! Snapshots are real tarballs written with the `tar` crate, so the
//! filesystem queries exercise the same stream parsing as production.

use anyhow::{anyhow, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tar_rs as tar;

use super::{ExecOptions, ExecOutput, Instance, InstanceOptions, Runtime};

/// One entry of a fake snapshot tarball.
#[derive(Debug, Clone)]
pub enum MockEntry {
    Dir(String),
    File(String, Vec<u8>),
    Symlink(String, String),
    HardLink(String, String),
    Fifo(String),
}

impl MockEntry {
    pub fn file(name: &str, content: &str) -> Self {
        MockEntry::File(name.to_string(), content.as_bytes().to_vec())
    }

    pub fn dir(name: &str) -> Self {
        MockEntry::Dir(name.to_string())
    }

    pub fn symlink(name: &str, target: &str) -> Self {
        MockEntry::Symlink(name.to_string(), target.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { name: String, image: String, env: Option<Vec<String>> },
    Start(String),
    Stop(String),
    Execute { name: String, command: Vec<String>, env: Option<Vec<String>> },
    CopyTarball { name: String, path: String },
    StopAll,
}

enum Snapshot {
    Entries { entries: Vec<MockEntry>, gzip: bool },
    Raw(Vec<u8>),
}

#[derive(Default)]
struct MockState {
    calls: RefCell<Vec<Call>>,
    snapshots: RefCell<HashMap<String, Snapshot>>,
    artifacts: RefCell<Vec<PathBuf>>,
    running: RefCell<HashSet<String>>,
    image_env: RefCell<HashMap<String, String>>,
    labels: RefCell<HashMap<String, String>>,
    fail_create: Cell<bool>,
    fail_start: Cell<bool>,
    fail_stop: Cell<bool>,
    fail_exec: Cell<bool>,
}

/// Cloning shares state, so a test can keep a handle after moving one into a driver.
#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Rc<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_env(self, key: &str, value: &str) -> Self {
        self.state
            .image_env
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_label(self, key: &str, value: &str) -> Self {
        self.state
            .labels
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Registers the tarball `copy_tarball(path)` produces.
    pub fn with_snapshot(self, path: &str, entries: Vec<MockEntry>) -> Self {
        self.insert_snapshot(path, Snapshot::Entries { entries, gzip: false })
    }

    pub fn with_gzip_snapshot(self, path: &str, entries: Vec<MockEntry>) -> Self {
        self.insert_snapshot(path, Snapshot::Entries { entries, gzip: true })
    }

    /// Registers raw artifact bytes, e.g. a corrupt archive.
    pub fn with_raw_snapshot(self, path: &str, bytes: Vec<u8>) -> Self {
        self.insert_snapshot(path, Snapshot::Raw(bytes))
    }

    fn insert_snapshot(self, path: &str, snapshot: Snapshot) -> Self {
        self.state
            .snapshots
            .borrow_mut()
            .insert(path.to_string(), snapshot);
        self
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.fail_create.set(fail);
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.fail_start.set(fail);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.state.fail_stop.set(fail);
    }

    pub fn fail_exec(&self, fail: bool) {
        self.state.fail_exec.set(fail);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.borrow().clone()
    }

    pub fn starts(&self) -> usize {
        self.count(|c| matches!(c, Call::Start(_)))
    }

    pub fn stops(&self) -> usize {
        self.count(|c| matches!(c, Call::Stop(_)))
    }

    pub fn stops_of(&self, name: &str) -> usize {
        self.count(|c| matches!(c, Call::Stop(n) if n == name))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.calls.borrow().iter().filter(|c| pred(*c)).count()
    }

    /// Every artifact path handed out by `copy_tarball`, including failed copies.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.state.artifacts.borrow().clone()
    }

    pub fn running(&self) -> Vec<String> {
        self.state.running.borrow().iter().cloned().collect()
    }

    fn record(&self, call: Call) {
        self.state.calls.borrow_mut().push(call);
    }
}

impl Runtime for MockRuntime {
    type Instance = MockInstance;

    fn name(&self) -> &str {
        "mock"
    }

    fn new_instance(&self, image: &str, name: &str, options: &InstanceOptions) -> Result<MockInstance> {
        if self.state.fail_create.get() {
            return Err(anyhow!("image {} could not be loaded", image));
        }
        let taken = self
            .state
            .calls
            .borrow()
            .iter()
            .any(|c| matches!(c, Call::Create { name: n, .. } if n == name));
        if taken {
            return Err(anyhow!("instance name '{}' is already in use", name));
        }

        self.record(Call::Create {
            name: name.to_string(),
            image: image.to_string(),
            env: options.env.clone(),
        });

        let mut env = self.state.image_env.borrow().clone();
        env.extend(parse_pairs(options.env.as_ref()));

        Ok(MockInstance {
            runtime: self.clone(),
            name: name.to_string(),
            image: image.to_string(),
            options_env: options.env.clone(),
            env,
            labels: self.state.labels.borrow().clone(),
        })
    }

    fn stop_all_instances(&self) -> Result<()> {
        self.record(Call::StopAll);
        self.state.running.borrow_mut().clear();
        Ok(())
    }
}

pub struct MockInstance {
    runtime: MockRuntime,
    name: String,
    image: String,
    options_env: Option<Vec<String>>,
    env: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl MockInstance {
    fn ensure_running(&self) -> Result<()> {
        if self.runtime.state.running.borrow().contains(&self.name) {
            Ok(())
        } else {
            Err(anyhow!("instance {} is not running", self.name))
        }
    }

    fn write_snapshot(&self, path: &str, artifact: &Path) -> Result<()> {
        let snapshots = self.runtime.state.snapshots.borrow();
        match snapshots.get(path) {
            Some(Snapshot::Entries { entries, gzip: false }) => {
                build_tarball(File::create(artifact)?, entries)?;
            }
            Some(Snapshot::Entries { entries, gzip: true }) => {
                let encoder = GzEncoder::new(File::create(artifact)?, Compression::default());
                build_tarball(encoder, entries)?.finish()?;
            }
            Some(Snapshot::Raw(bytes)) => fs::write(artifact, bytes)?,
            None => {
                // Leave a partial artifact behind, like an interrupted `tar`.
                fs::write(artifact, b"partial")?;
                return Err(anyhow!("tar: {}: No such file or directory", path));
            }
        }
        Ok(())
    }
}

impl Instance for MockInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn start(&self) -> Result<()> {
        if self.runtime.state.fail_start.get() {
            return Err(anyhow!("failed to start instance {}", self.name));
        }
        self.runtime.record(Call::Start(self.name.clone()));
        self.runtime
            .state
            .running
            .borrow_mut()
            .insert(self.name.clone());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.runtime.record(Call::Stop(self.name.clone()));
        self.runtime.state.running.borrow_mut().remove(&self.name);
        if self.runtime.state.fail_stop.get() {
            return Err(anyhow!("failed to stop instance {}", self.name));
        }
        Ok(())
    }

    /// Understands a handful of commands: `env`, `echo`, `false` and `sh -c 'exit N'`.
    fn execute(&self, command: &[String], options: &ExecOptions) -> Result<ExecOutput> {
        self.runtime.record(Call::Execute {
            name: self.name.clone(),
            command: command.to_vec(),
            env: options.env.clone(),
        });
        self.ensure_running()?;
        if self.runtime.state.fail_exec.get() {
            return Err(anyhow!("lost connection to instance {}", self.name));
        }

        let args: Vec<&str> = command.iter().map(|s| s.as_str()).collect();
        let output = match args.as_slice() {
            ["env"] => {
                let mut env = self.env.clone();
                env.extend(parse_pairs(self.options_env.as_ref()));
                env.extend(parse_pairs(options.env.as_ref()));
                let mut lines: Vec<String> =
                    env.iter().map(|(k, v)| format!("{}={}\n", k, v)).collect();
                lines.sort();
                ExecOutput {
                    stdout: lines.concat(),
                    ..ExecOutput::default()
                }
            }
            ["echo", rest @ ..] => ExecOutput {
                stdout: format!("{}\n", rest.join(" ")),
                ..ExecOutput::default()
            },
            ["false"] => ExecOutput {
                stderr: "false: exited with 1\n".to_string(),
                exit_code: 1,
                ..ExecOutput::default()
            },
            ["sh", "-c", script] if script.starts_with("exit ") => ExecOutput {
                exit_code: script[5..].trim().parse().context("bad exit code")?,
                ..ExecOutput::default()
            },
            [program, ..] => ExecOutput {
                stderr: format!("{}: command not found\n", program),
                exit_code: 127,
                ..ExecOutput::default()
            },
            [] => return Err(anyhow!("no command given")),
        };
        Ok(output)
    }

    fn copy_tarball(&self, path: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.runtime.record(Call::CopyTarball {
            name: self.name.clone(),
            path: path.to_string(),
        });
        self.ensure_running()?;

        let artifact = dest_dir.join("snapshot.tar");
        self.runtime
            .state
            .artifacts
            .borrow_mut()
            .push(artifact.clone());
        self.write_snapshot(path, &artifact)?;
        Ok(artifact)
    }

    fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}

fn parse_pairs(vars: Option<&Vec<String>>) -> Vec<(String, String)> {
    vars.into_iter()
        .flatten()
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn build_tarball<W: Write>(writer: W, entries: &[MockEntry]) -> io::Result<W> {
    let mut builder = tar::Builder::new(writer);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(1_700_000_000);
        header.set_uid(0);
        header.set_gid(0);

        match entry {
            MockEntry::Dir(name) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, name, io::empty())?;
            }
            MockEntry::File(name, content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, name, content.as_slice())?;
            }
            MockEntry::Symlink(name, target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                header.set_link_name(target)?;
                builder.append_data(&mut header, name, io::empty())?;
            }
            MockEntry::HardLink(name, target) => {
                header.set_entry_type(tar::EntryType::Link);
                header.set_mode(0o644);
                header.set_size(0);
                header.set_link_name(target)?;
                builder.append_data(&mut header, name, io::empty())?;
            }
            MockEntry::Fifo(name) => {
                header.set_entry_type(tar::EntryType::Fifo);
                header.set_mode(0o644);
                header.set_size(0);
                builder.append_data(&mut header, name, io::empty())?;
            }
        }
    }

    builder.into_inner()
}
