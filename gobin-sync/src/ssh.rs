//! OpenSSH transport.
//!
//! One control master is started per run; every later command multiplexes
//! over its socket, so authentication happens once.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use gobin_core::{Config, FileChange, FileType};

use crate::error::{io_err, SyncError};
use crate::plan::{self, shell_quote, Upload};
use crate::remote::{ApplySummary, RemoteSync};

pub const DEFAULT_SSH: &str = "ssh";

/// Where and as whom to apply changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub hostname: String,
    pub identity_file: PathBuf,
    /// Remote directory changes are mirrored into.
    pub directory: String,
}

impl SshTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.hostname)
    }
}

impl From<&Config> for SshTarget {
    fn from(config: &Config) -> Self {
        Self {
            user: config.user.clone(),
            hostname: config.hostname.clone(),
            identity_file: config.identity_file.clone(),
            directory: config.target.clone(),
        }
    }
}

/// `<tmp>/gobin-<pid>.ssh`, short enough for the Unix socket path limit.
pub fn default_control_path() -> PathBuf {
    std::env::temp_dir().join(format!("gobin-{}.ssh", std::process::id()))
}

#[derive(Debug)]
pub struct SshRemote {
    target: SshTarget,
    program: PathBuf,
    control_path: PathBuf,
    open: bool,
}

impl SshRemote {
    /// Start the control master and make sure the target directory exists.
    pub async fn connect(target: SshTarget) -> Result<Self, SyncError> {
        Self::connect_with(target, DEFAULT_SSH, default_control_path()).await
    }

    pub async fn connect_with(
        target: SshTarget,
        program: impl Into<PathBuf>,
        control_path: impl Into<PathBuf>,
    ) -> Result<Self, SyncError> {
        let mut remote = Self {
            target,
            program: program.into(),
            control_path: control_path.into(),
            open: false,
        };
        let destination = remote.target.destination();
        let connect_err = |err: SyncError| SyncError::Connect {
            destination: destination.clone(),
            reason: err.to_string(),
        };

        remote
            .run_checked(remote.master_args(), None)
            .await
            .map_err(connect_err)?;
        if let Err(err) = remote.prepare_target().await {
            remote.stop_master().await;
            return Err(connect_err(err));
        }
        remote.open = true;

        tracing::info!(
            destination = %remote.target.destination(),
            directory = %remote.target.directory,
            "remote session established",
        );
        Ok(remote)
    }

    async fn prepare_target(&self) -> Result<(), SyncError> {
        self.run_checked(self.control_args("check"), None).await?;
        if !self.target.directory.is_empty() {
            let script = format!("mkdir -p {}", shell_quote(&self.target.directory));
            self.run_checked(self.exec_args(&script), None).await?;
        }
        Ok(())
    }

    /// Best-effort `-O exit` for a master that must not outlive a failed connect.
    async fn stop_master(&self) {
        if let Err(err) = self.run_checked(self.control_args("exit"), None).await {
            tracing::warn!(error = %err, "failed to stop ssh control master");
        }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn common_args(&self) -> Vec<OsString> {
        let mut control = OsString::from("ControlPath=");
        control.push(&self.control_path);
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            control,
            "-i".into(),
            self.target.identity_file.clone().into_os_string(),
        ]
    }

    pub(crate) fn master_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-M".into(), "-N".into(), "-f".into()];
        args.push("-o".into());
        args.push("ControlPersist=yes".into());
        args.extend(self.common_args());
        args.push(self.target.destination().into());
        args
    }

    pub(crate) fn control_args(&self, command: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-O".into(), command.into()];
        args.extend(self.common_args());
        args.push(self.target.destination().into());
        args
    }

    pub(crate) fn exec_args(&self, script: &str) -> Vec<OsString> {
        let mut args = self.common_args();
        args.push(self.target.destination().into());
        args.push("--".into());
        args.push(script.into());
        args
    }

    async fn run(
        &self,
        args: Vec<OsString>,
        stdin: Option<std::fs::File>,
    ) -> Result<Output, SyncError> {
        let stdin = match stdin {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        };
        Command::new(&self.program)
            .args(&args)
            .stdin(stdin)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SyncError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    async fn run_checked(
        &self,
        args: Vec<OsString>,
        stdin: Option<std::fs::File>,
    ) -> Result<(), SyncError> {
        let command = render_command(&self.program, &args);
        let output = self.run(args, stdin).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(SyncError::Command {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Stream one local file into place. `Ok(false)` when it vanished locally
    /// before it could be read.
    async fn upload(&self, upload: &Upload) -> Result<bool, SyncError> {
        let file = match tokio::fs::File::open(&upload.local).await {
            Ok(file) => file.into_std().await,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_err(&upload.local, err)),
        };

        let remote = shell_quote(&upload.remote);
        let mut script = format!("cat > {remote}");
        if let Some(mode) = upload.mode {
            script.push_str(&format!(" && chmod {:o} {remote}", mode & 0o7777));
        }
        self.run_checked(self.exec_args(&script), Some(file)).await?;
        Ok(true)
    }
}

#[async_trait]
impl RemoteSync for SshRemote {
    async fn apply(&mut self, root: &Path, files: &[FileChange]) -> Result<ApplySummary, SyncError> {
        if !self.open {
            return Err(SyncError::Closed);
        }

        let (files, dangling) = resolve_links(root, files).await?;
        let plan = plan::plan(root, &self.target.directory, &files);
        let mut summary = ApplySummary {
            skipped: plan.skipped.len() + dangling,
            ..ApplySummary::default()
        };
        for (name, reason) in &plan.skipped {
            tracing::debug!(file = %name, reason, "skipping");
        }

        if let Some(script) = plan.prepare_script() {
            self.run_checked(self.exec_args(&script), None).await?;
            summary.removed = plan.removals.len();
            summary.directories = plan.directories.len();
        }

        for upload in &plan.uploads {
            if self.upload(upload).await? {
                tracing::debug!(file = %upload.remote, "uploaded");
                summary.uploaded += 1;
            } else {
                tracing::debug!(file = %upload.local.display(), "vanished before upload");
                summary.skipped += 1;
            }
        }

        Ok(summary)
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.run_checked(self.control_args("exit"), None).await
    }
}

/// Replace each existing symlink with what it points at. A regular file
/// carries the target's permission bits. Dangling links are dropped and
/// counted.
async fn resolve_links(
    root: &Path,
    files: &[FileChange],
) -> Result<(Vec<FileChange>, usize), SyncError> {
    let mut resolved = Vec::with_capacity(files.len());
    let mut dangling = 0usize;

    for file in files {
        if !(file.exists && file.file_type == FileType::Symlink) {
            resolved.push(file.clone());
            continue;
        }
        let path = root.join(&file.name);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(file = %file.name, "dangling symlink");
                dangling += 1;
                continue;
            }
            Err(err) => return Err(io_err(&path, err)),
        };

        let mut target = file.clone();
        if metadata.is_dir() {
            target.file_type = FileType::Directory;
            target.mode = None;
        } else if metadata.is_file() {
            target.file_type = FileType::File;
            target.mode = Some(metadata.permissions().mode());
        } else {
            target.file_type = FileType::Other;
        }
        resolved.push(target);
    }

    Ok((resolved, dangling))
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}
