//! Filesystem queries answered from tarball snapshots of the running image.
//!
//! Nothing is mounted. Each query asks the runtime for a tarball of the
//! requested subtree ([`Instance::copy_tarball`]), then walks the archive
//! once, front to back, looking for the entry it needs:
//!
//! - [`stat`]: first directory/regular/hard-link/symlink entry whose cleaned
//!   name equals the base name of the query path.
//! - [`read_file`]: same matching; directories are rejected, symlinks are
//!   followed by querying the link target from the image root, file content
//!   is buffered.
//! - [`read_dir`]: directory entries exactly one level below the snapshot
//!   root.
//!
//! Matching on the base name relies on the runtime rooting the archive at
//! the parent of the query path, so the top-level entry of a snapshot of
//! `/etc/app.conf` is `app.conf`.
//!
//! The instance runs only while the tarball is produced. The artifact lives
//! in a private temporary directory owned by [`Snapshot`] and is removed when
//! the query returns, whatever the outcome.

use crate::error::{DriverError, Result};
use crate::lifecycle::InstanceManager;
use crate::runtime::{Instance, Runtime};
use anyhow::Context;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use log::{debug, trace, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tar_rs as tar;
use tempfile::TempDir;

/// Longest symlink chain [`read_file`] follows before giving up.
pub const MAX_SYMLINK_DEPTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    HardLink,
    Other,
}

impl From<tar::EntryType> for FileType {
    fn from(entry_type: tar::EntryType) -> Self {
        match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => FileType::Regular,
            tar::EntryType::Directory => FileType::Directory,
            tar::EntryType::Symlink => FileType::Symlink,
            tar::EntryType::Link => FileType::HardLink,
            _ => FileType::Other,
        }
    }
}

/// What a snapshot knows about one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Last path segment of the entry.
    pub name: String,
    /// Cleaned entry path relative to the snapshot root.
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub file_type: FileType,
    pub modified: DateTime<Utc>,
    pub link_target: Option<String>,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    fn from_entry<R: Read>(entry: &tar::Entry<'_, R>, raw_name: &str) -> anyhow::Result<Self> {
        let header = entry.header();
        let path = clean_name(raw_name);
        let link_target = entry
            .link_name()
            .context("Failed to read link target")?
            .map(|p| p.to_string_lossy().to_string());

        Ok(FileInfo {
            name: base_name(&path),
            path,
            size: header.size().context("Failed to read entry size")?,
            mode: header.mode().context("Failed to read entry mode")?,
            file_type: header.entry_type().into(),
            modified: modified_time(header)?,
            link_target,
        })
    }
}

fn modified_time(header: &tar::Header) -> anyhow::Result<DateTime<Utc>> {
    let mtime = header.mtime().context("Failed to read entry mtime")?;
    let secs = i64::try_from(mtime).context("Entry mtime out of range")?;
    DateTime::from_timestamp(secs, 0).context("Entry mtime out of range")
}

/// A fetched tarball, deleted on [`Snapshot::cleanup`] or drop.
pub struct Snapshot {
    path: String,
    artifact: PathBuf,
    temp_dir: Option<TempDir>,
}

impl Snapshot {
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Opens the artifact as a forward-only tar stream (plain or gzip).
    pub fn entries(&self) -> Result<tar::Archive<Box<dyn Read>>> {
        open_archive(&self.artifact).map_err(|e| DriverError::snapshot(&self.path, e))
    }

    /// Removes the backing temporary directory. Safe to call more than once.
    pub fn cleanup(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            let dir = temp_dir.path().to_path_buf();
            if let Err(e) = temp_dir.close() {
                warn!("Failed to remove snapshot {}: {}", dir.display(), e);
            } else {
                trace!("Removed snapshot {}", dir.display());
            }
        }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Fetches a tarball of `path` from the current instance.
///
/// The instance is started for the copy and stopped before this returns;
/// scanning happens against the local artifact only.
pub fn retrieve_snapshot<R: Runtime>(manager: &InstanceManager<R>, path: &str) -> Result<Snapshot> {
    let temp_dir = tempfile::Builder::new()
        .prefix("snapshot-")
        .tempdir()
        .context("Failed to create temporary directory")
        .map_err(|e| DriverError::snapshot(path, e))?;

    // Owned from here on, so a failed copy still deletes whatever it wrote.
    let mut snapshot = Snapshot {
        path: path.to_string(),
        artifact: temp_dir.path().to_path_buf(),
        temp_dir: Some(temp_dir),
    };
    let dest_dir = snapshot.artifact.clone();

    snapshot.artifact = {
        let started = manager
            .start()
            .map_err(|e| DriverError::snapshot(path, e))?;
        debug!("Copying tarball of {} from {}", path, started.name());
        started
            .copy_tarball(path, &dest_dir)
            .map_err(|e| DriverError::snapshot(path, e))?
    };

    Ok(snapshot)
}

pub fn stat<R: Runtime>(manager: &InstanceManager<R>, path: &str) -> Result<FileInfo> {
    let snapshot = retrieve_snapshot(manager, path)?;
    let target = base_name(path);
    let mut archive = snapshot.entries()?;

    for entry in archive.entries().map_err(|e| DriverError::snapshot(path, e))? {
        let entry = entry.map_err(|e| DriverError::snapshot(path, e))?;
        let raw_name = entry_name(&entry);
        let file_type = FileType::from(entry.header().entry_type());

        if file_type != FileType::Other && clean_name(&raw_name) == target {
            return FileInfo::from_entry(&entry, &raw_name)
                .map_err(|e| DriverError::snapshot(path, e));
        }
    }

    Err(DriverError::NotFound(path.to_string()))
}

pub fn read_file<R: Runtime>(manager: &InstanceManager<R>, path: &str) -> Result<Vec<u8>> {
    read_file_following(manager, path, 0)
}

fn read_file_following<R: Runtime>(
    manager: &InstanceManager<R>,
    path: &str,
    depth: usize,
) -> Result<Vec<u8>> {
    if depth > MAX_SYMLINK_DEPTH {
        return Err(DriverError::SymlinkLoop(path.to_string()));
    }

    let link_target = {
        let snapshot = retrieve_snapshot(manager, path)?;
        let target = base_name(path);
        let mut archive = snapshot.entries()?;
        let mut link_target = None;

        for entry in archive.entries().map_err(|e| DriverError::snapshot(path, e))? {
            let mut entry = entry.map_err(|e| DriverError::snapshot(path, e))?;
            if clean_name(&entry_name(&entry)) != target {
                continue;
            }

            match FileType::from(entry.header().entry_type()) {
                FileType::Directory => return Err(DriverError::IsADirectory(path.to_string())),
                FileType::Symlink => {
                    let link = entry
                        .link_name()
                        .map_err(|e| DriverError::snapshot(path, e))?
                        .ok_or_else(|| {
                            DriverError::snapshot(path, anyhow::anyhow!("symlink without target"))
                        })?;
                    link_target = Some(link.to_string_lossy().to_string());
                    break;
                }
                FileType::Regular | FileType::HardLink => {
                    // The header size is untrusted; the buffer grows with the data actually read.
                    let mut content = Vec::new();
                    entry
                        .read_to_end(&mut content)
                        .map_err(|e| DriverError::snapshot(path, e))?;
                    if content.len() as u64 != entry.size() {
                        return Err(DriverError::snapshot(
                            path,
                            anyhow::anyhow!(
                                "entry truncated: read {} of {} bytes",
                                content.len(),
                                entry.size()
                            ),
                        ));
                    }
                    return Ok(content);
                }
                FileType::Other => {}
            }
        }

        link_target
        // The snapshot is dropped here, before any symlink is followed.
    };

    match link_target {
        // Link targets are re-queried as paths from the image root, even relative ones.
        Some(link) => {
            debug!("Following symlink {} -> {}", path, link);
            read_file_following(manager, &link, depth + 1)
        }
        None => Err(DriverError::NotFound(path.to_string())),
    }
}

pub fn read_dir<R: Runtime>(manager: &InstanceManager<R>, path: &str) -> Result<Vec<FileInfo>> {
    let snapshot = retrieve_snapshot(manager, path)?;
    let mut archive = snapshot.entries()?;
    let mut infos = Vec::new();

    for entry in archive.entries().map_err(|e| DriverError::snapshot(path, e))? {
        let entry = entry.map_err(|e| DriverError::snapshot(path, e))?;
        if entry.header().entry_type() != tar::EntryType::Directory {
            continue;
        }

        let raw_name = entry_name(&entry);
        let trimmed = raw_name.strip_suffix('/').unwrap_or(&raw_name);
        if trimmed.split('/').count() == 2 {
            let info = FileInfo::from_entry(&entry, &raw_name)
                .map_err(|e| DriverError::snapshot(path, e))?;
            infos.push(info);
        }
    }

    Ok(infos)
}

fn open_archive(artifact: &Path) -> anyhow::Result<tar::Archive<Box<dyn Read>>> {
    let mut file = File::open(artifact)
        .with_context(|| format!("Failed to open tarball: {}", artifact.display()))?;

    let mut magic_bytes = [0u8; 2];
    let is_gzip = match file.read_exact(&mut magic_bytes) {
        Ok(()) => magic_bytes == [0x1f, 0x8b],
        // Shorter than two bytes: not gzip, let the tar reader report it.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e).context("Failed to read magic bytes from tarball"),
    };
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(tar::Archive::new(reader))
}

/// Raw entry name, honouring GNU long names and PAX paths.
fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).to_string()
}

/// Lexically cleans a tar entry name: drops `.` and empty segments, resolves
/// `..` without escaping the root. Names that clean to nothing become `.`.
pub fn clean_name(name: &str) -> String {
    let mut out = PathBuf::new();

    for comp in Path::new(name).components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if out.as_os_str().is_empty() {
        ".".to_string()
    } else {
        out.to_string_lossy().to_string()
    }
}

/// Last segment of a query path; the root and empty paths map to `.`,
/// matching the `./` top-level entry of a snapshot of `/`.
pub fn base_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(".")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::{Call, MockEntry, MockRuntime};

    fn manager(runtime: &MockRuntime) -> InstanceManager<MockRuntime> {
        InstanceManager::new(runtime.clone(), "/images/app.sif", "cst").unwrap()
    }

    fn assert_cleaned_up(runtime: &MockRuntime) {
        let artifacts = runtime.artifacts();
        assert!(!artifacts.is_empty(), "no snapshot was taken");
        for artifact in artifacts {
            assert!(!artifact.exists(), "{} was left behind", artifact.display());
            assert!(!artifact.parent().unwrap().exists());
        }
        assert_eq!(runtime.starts(), runtime.stops());
        assert!(runtime.running().is_empty());
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("root/"), "root");
        assert_eq!(clean_name("./app.conf"), "app.conf");
        assert_eq!(clean_name("a//b/./c"), "a/b/c");
        assert_eq!(clean_name("a/../b"), "b");
        assert_eq!(clean_name("./"), ".");
        assert_eq!(clean_name("/etc/passwd"), "etc/passwd");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/etc/app.conf"), "app.conf");
        assert_eq!(base_name("/usr/bin/"), "bin");
        assert_eq!(base_name("relative"), "relative");
        assert_eq!(base_name("/"), ".");
        assert_eq!(base_name(""), ".");
    }

    #[test]
    fn test_stat_regular_file() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/app.conf", vec![MockEntry::file("app.conf", "port=80\n")]);
        let manager = manager(&runtime);

        let info = stat(&manager, "/etc/app.conf").unwrap();
        assert_eq!(info.name, "app.conf");
        assert_eq!(info.file_type, FileType::Regular);
        assert_eq!(info.size, 8);
        assert_eq!(info.mode, 0o644);
        assert_eq!(info.modified.timestamp(), 1_700_000_000);
        assert!(!info.is_dir());
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_stat_first_match_wins() {
        let runtime = MockRuntime::new().with_snapshot(
            "/opt/tool",
            vec![
                MockEntry::Fifo("tool".to_string()),
                MockEntry::dir("tool/"),
                MockEntry::file("tool/tool", "nested"),
            ],
        );
        let manager = manager(&runtime);

        let info = stat(&manager, "/opt/tool").unwrap();
        assert_eq!(info.file_type, FileType::Directory);
        assert_eq!(info.path, "tool");
    }

    #[test]
    fn test_stat_symlink_reports_target() {
        let runtime = MockRuntime::new().with_snapshot(
            "/bin/sh",
            vec![MockEntry::symlink("sh", "/bin/busybox")],
        );
        let manager = manager(&runtime);

        let info = stat(&manager, "/bin/sh").unwrap();
        assert_eq!(info.file_type, FileType::Symlink);
        assert_eq!(info.link_target.as_deref(), Some("/bin/busybox"));
    }

    #[test]
    fn test_stat_not_found_mentions_path() {
        let runtime = MockRuntime::new().with_snapshot(
            "/etc/missing.conf",
            vec![MockEntry::file("other.conf", "")],
        );
        let manager = manager(&runtime);

        let err = stat(&manager, "/etc/missing.conf").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/etc/missing.conf"));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_failed_copy_removes_partial_artifact() {
        let runtime = MockRuntime::new();
        let manager = manager(&runtime);

        let err = stat(&manager, "/nope").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_corrupt_archive_is_snapshot_error() {
        let mut bytes = vec![b'x'; 512];
        bytes.extend(vec![0u8; 1024]);
        let runtime = MockRuntime::new().with_raw_snapshot("/etc/app.conf", bytes);
        let manager = manager(&runtime);

        let err = stat(&manager, "/etc/app.conf").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert_cleaned_up(&runtime);
    }

    // A single header block, with no data or end-of-archive marker after it.
    fn raw_header(name: &str, entry_type: tar::EntryType, size: u64) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_entry_type(entry_type);
        header.set_mode(0o644);
        header.set_size(size);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        header
    }

    #[test]
    fn test_oversized_entry_is_snapshot_error() {
        let mut bytes = raw_header("app.conf", tar::EntryType::Regular, 1 << 50)
            .as_bytes()
            .to_vec();
        bytes.extend_from_slice(b"port");
        let runtime = MockRuntime::new().with_raw_snapshot("/etc/app.conf", bytes);
        let manager = manager(&runtime);

        let err = read_file(&manager, "/etc/app.conf").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_truncated_file_body_is_snapshot_error() {
        let mut bytes = raw_header("app.conf", tar::EntryType::Regular, 100)
            .as_bytes()
            .to_vec();
        bytes.extend_from_slice(b"port=80\n");
        let runtime = MockRuntime::new().with_raw_snapshot("/etc/app.conf", bytes);
        let manager = manager(&runtime);

        let err = read_file(&manager, "/etc/app.conf").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert!(err.to_string().contains("/etc/app.conf"));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_dir_corrupt_second_header_is_snapshot_error() {
        let mut bytes = raw_header("root/", tar::EntryType::Directory, 0)
            .as_bytes()
            .to_vec();
        bytes.extend(vec![b'x'; 512]);
        bytes.extend(vec![0u8; 1024]);
        let runtime = MockRuntime::new().with_raw_snapshot("/root", bytes);
        let manager = manager(&runtime);

        let err = read_dir(&manager, "/root").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_malformed_mtime_is_snapshot_error() {
        let mut header = raw_header("app.conf", tar::EntryType::Regular, 0);
        header.as_old_mut().mtime = *b"not-octal!!\0";
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend(vec![0u8; 1024]);
        let runtime = MockRuntime::new().with_raw_snapshot("/etc/app.conf", bytes);
        let manager = manager(&runtime);

        let err = stat(&manager, "/etc/app.conf").unwrap_err();
        assert!(matches!(err, DriverError::Snapshot { .. }));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_instance_stopped_before_scan() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/app.conf", vec![MockEntry::file("app.conf", "x")]);
        let manager = manager(&runtime);

        let snapshot = retrieve_snapshot(&manager, "/etc/app.conf").unwrap();
        assert!(runtime.running().is_empty());
        assert!(snapshot.artifact().exists());
        let calls = runtime.calls();
        assert_eq!(calls[calls.len() - 1], Call::Stop("cst-app-0".to_string()));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/app.conf", vec![MockEntry::file("app.conf", "x")]);
        let manager = manager(&runtime);

        let mut snapshot = retrieve_snapshot(&manager, "/etc/app.conf").unwrap();
        let artifact = snapshot.artifact().to_path_buf();
        snapshot.cleanup();
        assert!(!artifact.exists());
        snapshot.cleanup();
        drop(snapshot);
        assert!(!artifact.exists());
    }

    #[test]
    fn test_read_file_returns_content() {
        let runtime = MockRuntime::new().with_snapshot(
            "/etc/os-release",
            vec![MockEntry::file("os-release", "ID=alpine\n")],
        );
        let manager = manager(&runtime);

        assert_eq!(read_file(&manager, "/etc/os-release").unwrap(), b"ID=alpine\n");
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_gzip_snapshot() {
        let runtime = MockRuntime::new().with_gzip_snapshot(
            "/etc/hostname",
            vec![MockEntry::file("hostname", "box\n")],
        );
        let manager = manager(&runtime);

        assert_eq!(read_file(&manager, "/etc/hostname").unwrap(), b"box\n");
    }

    #[test]
    fn test_read_directory_is_rejected() {
        let runtime = MockRuntime::new()
            .with_snapshot("/bin", vec![MockEntry::dir("bin/"), MockEntry::file("bin/sh", "")]);
        let manager = manager(&runtime);

        let err = read_file(&manager, "/bin").unwrap_err();
        assert!(matches!(err, DriverError::IsADirectory(ref p) if p == "/bin"));
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_follows_symlink_from_root() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/app.conf", vec![MockEntry::symlink("app.conf", "/etc/real.conf")])
            .with_snapshot("/etc/real.conf", vec![MockEntry::file("real.conf", "real\n")]);
        let manager = manager(&runtime);

        assert_eq!(read_file(&manager, "/etc/app.conf").unwrap(), b"real\n");

        let copies: Vec<String> = runtime
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CopyTarball { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(copies, vec!["/etc/app.conf", "/etc/real.conf"]);
        assert_eq!(runtime.artifacts().len(), 2);
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_relative_symlink_is_queried_verbatim() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/app.conf", vec![MockEntry::symlink("app.conf", "real.conf")])
            .with_snapshot("real.conf", vec![MockEntry::file("real.conf", "from cwd")]);
        let manager = manager(&runtime);

        assert_eq!(read_file(&manager, "/etc/app.conf").unwrap(), b"from cwd");
    }

    #[test]
    fn test_symlink_loop_is_bounded() {
        let runtime = MockRuntime::new()
            .with_snapshot("/a", vec![MockEntry::symlink("a", "/b")])
            .with_snapshot("/b", vec![MockEntry::symlink("b", "/a")]);
        let manager = manager(&runtime);

        let err = read_file(&manager, "/a").unwrap_err();
        assert!(matches!(err, DriverError::SymlinkLoop(_)));
        assert_eq!(runtime.artifacts().len(), MAX_SYMLINK_DEPTH + 1);
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_hard_link_returns_entry_content() {
        let runtime = MockRuntime::new().with_snapshot(
            "/usr/bin/python3",
            vec![MockEntry::HardLink("python3".to_string(), "usr/bin/python3.12".to_string())],
        );
        let manager = manager(&runtime);

        assert!(read_file(&manager, "/usr/bin/python3").unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let runtime = MockRuntime::new()
            .with_snapshot("/etc/shadow", vec![MockEntry::Fifo("shadow".to_string())]);
        let manager = manager(&runtime);

        assert!(read_file(&manager, "/etc/shadow").unwrap_err().is_not_found());
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_dir_keeps_direct_children_only() {
        let runtime = MockRuntime::new().with_snapshot(
            "/root",
            vec![
                MockEntry::dir("root/"),
                MockEntry::dir("root/bin/"),
                MockEntry::file("root/bin/sh", "#!"),
                MockEntry::dir("root/bin/deep/"),
                MockEntry::file("root/notes.txt", "hi"),
            ],
        );
        let manager = manager(&runtime);

        let infos = read_dir(&manager, "/root").unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "bin");
        assert_eq!(infos[0].path, "root/bin");
        assert!(infos[0].is_dir());
        assert_cleaned_up(&runtime);
    }

    #[test]
    fn test_read_dir_of_empty_directory() {
        let runtime = MockRuntime::new().with_snapshot("/srv", vec![MockEntry::dir("srv/")]);
        let manager = manager(&runtime);

        assert!(read_dir(&manager, "/srv").unwrap().is_empty());
        assert_cleaned_up(&runtime);
    }
}
