//! Turn a change event's file list into remote operations.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use gobin_core::{FileChange, FileType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    pub mode: Option<u32>,
}

/// Remote work for one change event, in execution order: removals, then
/// directories, then uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPlan {
    pub removals: Vec<String>,
    pub directories: Vec<String>,
    pub uploads: Vec<Upload>,
    /// Names that will not be touched, with the reason.
    pub skipped: Vec<(String, &'static str)>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.directories.is_empty() && self.uploads.is_empty()
    }

    /// Single shell command for the removals and directories, if any.
    pub fn prepare_script(&self) -> Option<String> {
        let mut steps = Vec::new();
        if !self.removals.is_empty() {
            steps.push(format!("rm -rf {}", quote_all(&self.removals)));
        }
        if !self.directories.is_empty() {
            steps.push(format!("mkdir -p {}", quote_all(&self.directories)));
        }
        if steps.is_empty() {
            None
        } else {
            Some(steps.join(" && "))
        }
    }
}

pub fn plan(root: &Path, target: &str, files: &[FileChange]) -> TransferPlan {
    let mut plan = TransferPlan::default();
    let mut directories = BTreeSet::new();

    for file in files {
        if !is_safe_name(&file.name) {
            plan.skipped.push((file.name.clone(), "unsafe path"));
            continue;
        }
        let remote = remote_path(target, &file.name);

        if !file.exists {
            plan.removals.push(remote);
            continue;
        }
        match file.file_type {
            FileType::Directory => {
                directories.insert(remote);
            }
            FileType::File | FileType::Symlink => {
                if let Some((parent, _)) = remote.rsplit_once('/') {
                    if !parent.is_empty() {
                        directories.insert(parent.to_string());
                    }
                }
                // A link's own mode is always 0o777; never copy it.
                let mode = match file.file_type {
                    FileType::File => file.mode,
                    _ => None,
                };
                plan.uploads.push(Upload {
                    local: root.join(&file.name),
                    remote,
                    mode,
                });
            }
            FileType::Other => plan.skipped.push((file.name.clone(), "unsupported file type")),
        }
    }

    plan.directories = directories.into_iter().collect();
    plan
}

/// `<target>/<name>`, or just `name` when no target directory is set.
pub fn remote_path(target: &str, name: &str) -> String {
    let target = target.trim_end_matches('/');
    if target.is_empty() {
        name.to_string()
    } else {
        format!("{target}/{name}")
    }
}

/// Relative, no `.` or `..`, not empty.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Quote for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_all(values: &[String]) -> String {
    values
        .iter()
        .map(|value| shell_quote(value))
        .collect::<Vec<_>>()
        .join(" ")
}
