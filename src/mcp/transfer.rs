//! File transfer between the local work tree and the remote host.
//!
//! Each operation opens its own connection, uses the SFTP sub-channel for
//! content and the one-shot command channel for `mkdir -p`, and closes the
//! connection on every path. Uploads overwrite, so repeating a sync with an
//! unchanged tree leaves the remote side in the same state.

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use super::error::RemoteError;
use super::transport::{Connection, FileTransfer, RemoteTarget, Transport, shell_quote};

const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[".v", ".sv", ".tcl", ".sdc", ".txt", ".md"];
const DEFAULT_EXCLUDE_NAMES: &[&str] = &["config.py", ".env", ".gitkeep"];
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", "__pycache__", "results", ".claude", "target"];

/// Which local files a sync transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFilter {
    /// Lowercase, with a leading dot.
    pub include_extensions: Vec<String>,
    pub exclude_names: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl Default for SyncFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_INCLUDE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_EXCLUDE_NAMES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl SyncFilter {
    pub fn new(
        include_extensions: Vec<String>,
        exclude_names: Vec<String>,
        exclude_dirs: Vec<String>,
    ) -> Self {
        let include_extensions = include_extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
        Self {
            include_extensions,
            exclude_names,
            exclude_dirs,
        }
    }

    /// Whether a file with this name is transferred.
    pub fn accepts(&self, file_name: &str) -> bool {
        if self.exclude_names.iter().any(|name| name == file_name) {
            return false;
        }
        match Path::new(file_name).extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.include_extensions.contains(&ext)
            }
            None => false,
        }
    }

    /// Whether a directory with this name is pruned without descending.
    pub fn prunes(&self, dir_name: &str) -> bool {
        self.exclude_dirs.iter().any(|dir| dir == dir_name)
    }
}

/// A file selected for sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub local: PathBuf,
    /// `/`-separated path relative to the local root.
    pub relative: String,
}

/// Local side of a sync, computed before connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub files: Vec<SyncEntry>,
    /// Names of every rejected file, one per file.
    pub skipped: Vec<String>,
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub remote_root: String,
    /// Relative paths, in walk order.
    pub uploaded: Vec<String>,
    pub skipped_count: usize,
    /// Sorted, de-duplicated skipped file names.
    pub skipped_names: Vec<String>,
}

/// Deadlines for transfer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTimeouts {
    pub connect: Duration,
    pub exec: Duration,
}

/// Resolve a remote path against the remote work directory.
pub fn resolve_remote(root: &str, path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') || root.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), path.trim_start_matches("./"))
    }
}

/// Resolve a local path against the local work directory.
pub fn resolve_local(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Parent directory of a remote path, if it has one worth creating.
pub(crate) fn remote_parent(path: &str) -> Option<&str> {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

fn relative_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `local_root` in file-name order and split files into transfers and
/// skips. Excluded directories are pruned, so their files are not counted.
pub fn plan_sync(local_root: &Path, filter: &SyncFilter) -> Result<SyncPlan, RemoteError> {
    let pruned = filter.clone();
    let mut builder = WalkBuilder::new(local_root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && entry.depth() > 0 && pruned.prunes(&entry.file_name().to_string_lossy()))
        });

    let mut plan = SyncPlan::default();
    for entry in builder.build() {
        let entry = entry.map_err(|e| RemoteError::Io(io::Error::other(e)))?;
        let is_file = entry.file_type().is_some_and(|t| t.is_file())
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if !filter.accepts(&name) {
            plan.skipped.push(name);
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(local_root)
            .map(relative_slash_path)
            .unwrap_or_else(|_| name.clone());
        plan.files.push(SyncEntry {
            local: entry.path().to_path_buf(),
            relative,
        });
    }

    debug!(
        "Sync plan for {}: {} files, {} skipped",
        local_root.display(),
        plan.files.len(),
        plan.skipped.len()
    );
    Ok(plan)
}

/// Create `dir` and its parents on the remote host.
pub async fn ensure_remote_dir<C: Connection>(
    connection: &mut C,
    dir: &str,
    timeout: Duration,
) -> Result<(), RemoteError> {
    let command = format!("mkdir -p {}", shell_quote(dir)?);
    let output = connection.exec(&command, timeout).await?;
    match output.exit_code {
        Some(0) | None => Ok(()),
        Some(code) => Err(RemoteError::Transfer(format!(
            "mkdir -p {} failed with exit code {}: {}",
            dir,
            code,
            output.stderr.trim()
        ))),
    }
}

/// Upload one file, creating the remote parent directory first.
///
/// A missing local file is reported before any connection is made.
pub async fn upload_file<T: Transport>(
    transport: &T,
    target: &RemoteTarget,
    local: &Path,
    remote: &str,
    timeouts: TransferTimeouts,
) -> Result<u64, RemoteError> {
    if !local.is_file() {
        return Err(RemoteError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("local file '{}' not found", local.display()),
        )));
    }

    info!("Uploading {} to {}", local.display(), remote);
    let mut connection = transport.connect(target, timeouts.connect).await?;
    let outcome = upload_on(&mut connection, local, remote, timeouts.exec).await;
    connection.close().await;
    outcome
}

async fn upload_on<C: Connection>(
    connection: &mut C,
    local: &Path,
    remote: &str,
    exec_timeout: Duration,
) -> Result<u64, RemoteError> {
    if let Some(parent) = remote_parent(remote) {
        ensure_remote_dir(connection, parent, exec_timeout).await?;
    }
    let mut sftp = connection.open_file_transfer().await?;
    let outcome = sftp.upload(local, remote).await;
    sftp.close().await;
    outcome
}

/// Download one file, creating local parent directories first.
pub async fn download_file<T: Transport>(
    transport: &T,
    target: &RemoteTarget,
    remote: &str,
    local: &Path,
    timeouts: TransferTimeouts,
) -> Result<u64, RemoteError> {
    if let Some(parent) = local.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Downloading {} to {}", remote, local.display());
    let mut connection = transport.connect(target, timeouts.connect).await?;
    let outcome = match connection.open_file_transfer().await {
        Ok(mut sftp) => {
            let result = sftp.download(remote, local).await;
            sftp.close().await;
            result
        }
        Err(e) => Err(e),
    };
    connection.close().await;
    outcome
}

/// Upload every accepted file under `local_root` to the same relative path
/// under `remote_root`. Every accepted file is transferred on every run.
pub async fn sync_tree<T: Transport>(
    transport: &T,
    target: &RemoteTarget,
    local_root: &Path,
    remote_root: &str,
    filter: &SyncFilter,
    timeouts: TransferTimeouts,
) -> Result<SyncReport, RemoteError> {
    let plan = plan_sync(local_root, filter)?;

    info!(
        "Syncing {} files from {} to {}",
        plan.files.len(),
        local_root.display(),
        remote_root
    );
    let mut connection = transport.connect(target, timeouts.connect).await?;
    let outcome = sync_on(&mut connection, &plan, remote_root, timeouts.exec).await;
    connection.close().await;

    let uploaded = outcome?;
    let skipped_names: BTreeSet<String> = plan.skipped.iter().cloned().collect();
    Ok(SyncReport {
        remote_root: remote_root.to_string(),
        uploaded,
        skipped_count: plan.skipped.len(),
        skipped_names: skipped_names.into_iter().collect(),
    })
}

async fn sync_on<C: Connection>(
    connection: &mut C,
    plan: &SyncPlan,
    remote_root: &str,
    exec_timeout: Duration,
) -> Result<Vec<String>, RemoteError> {
    ensure_remote_dir(connection, remote_root, exec_timeout).await?;
    let mut created: BTreeSet<String> = BTreeSet::new();
    created.insert(remote_root.trim_end_matches('/').to_string());

    let mut sftp = connection.open_file_transfer().await?;
    let mut uploaded = Vec::with_capacity(plan.files.len());
    let mut failure = None;

    for entry in &plan.files {
        let remote = resolve_remote(remote_root, &entry.relative);
        if let Some(parent) = remote_parent(&remote)
            && !created.contains(parent)
        {
            if let Err(e) = ensure_remote_dir(connection, parent, exec_timeout).await {
                failure = Some(e);
                break;
            }
            created.insert(parent.to_string());
        }
        match sftp.upload(&entry.local, &remote).await {
            Ok(bytes) => {
                debug!("Synced {} ({} bytes)", entry.relative, bytes);
                uploaded.push(entry.relative.clone());
            }
            Err(e) => {
                warn!("Sync stopped at {}: {}", entry.relative, e);
                failure = Some(e);
                break;
            }
        }
    }

    sftp.close().await;
    match failure {
        Some(e) => Err(e),
        None => Ok(uploaded),
    }
}
