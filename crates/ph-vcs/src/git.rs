use crate::backend::{
    CHECKED_OUT_MESSAGE, CommitInfo, RepoDetails, SourceControl, UP_TO_DATE_MESSAGE,
    UPDATED_MESSAGE, VcsError,
};
use chrono::{TimeZone, Utc};
use gix::bstr::ByteSlice;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git client backed by gix for reads and the `git` CLI for anything that
/// talks to a remote or writes history.
#[derive(Debug, Clone, Default)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }
}

impl SourceControl for GitClient {
    fn clone_repo(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<(), VcsError> {
        let dest_str = dest.to_str().ok_or_else(|| VcsError::BackendError {
            reason: "non-utf8 path".to_string(),
        })?;
        let output = Command::new("git")
            .args(clone_args(url, dest_str, branch))
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| VcsError::CloneFailed {
                reason: format!("failed to run git clone: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_permission_error(&stderr) {
                return Err(VcsError::PermissionDenied {
                    reason: stderr.trim().to_string(),
                });
            }
            if let Some(branch) = branch {
                if stderr.contains("Remote branch") && stderr.contains("not found") {
                    return Err(VcsError::BranchNotFound {
                        name: branch.to_string(),
                    });
                }
            }
            return Err(VcsError::CloneFailed {
                reason: stderr.trim().to_string(),
            });
        }
        tracing::debug!(url, dest = %dest.display(), "cloned repository");
        Ok(())
    }

    fn update(&self, dest: &Path, branch: Option<&str>) -> Result<String, VcsError> {
        let before = head_commit_id(dest)?;
        let current = current_branch(dest)?;

        let mut message = None;
        if let Some(branch) = branch {
            if branch != current {
                run_git(dest, &["fetch", "--quiet", "origin"])?;
                let output = git_output(dest, &["checkout", "--quiet", branch])?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if stderr.contains("did not match any") || stderr.contains("pathspec") {
                        return Err(VcsError::BranchNotFound {
                            name: branch.to_string(),
                        });
                    }
                    return Err(VcsError::BackendError {
                        reason: format!("git checkout failed: {}", stderr.trim()),
                    });
                }
                message = Some(format!("{CHECKED_OUT_MESSAGE}: {branch}"));
            }
        }

        let output = git_output(dest, &["pull", "--quiet", "--ff-only"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_permission_error(&stderr) {
                return Err(VcsError::PermissionDenied {
                    reason: stderr.trim().to_string(),
                });
            }
            return Err(VcsError::BackendError {
                reason: format!("git pull failed: {}", stderr.trim()),
            });
        }

        if let Some(message) = message {
            return Ok(message);
        }
        let after = head_commit_id(dest)?;
        if before == after {
            Ok(UP_TO_DATE_MESSAGE.to_string())
        } else {
            Ok(format!("{UPDATED_MESSAGE} {}", short_id(&after)))
        }
    }

    fn branches(&self, dest: &Path) -> Result<Vec<String>, VcsError> {
        let repo = open_repo(dest)?;
        let references = repo
            .references()
            .map_err(|e| VcsError::BackendError {
                reason: e.to_string(),
            })?;

        let mut branches = Vec::new();
        for reference in references.all().map_err(|e| VcsError::BackendError {
            reason: e.to_string(),
        })? {
            let reference = reference.map_err(|e| VcsError::BackendError {
                reason: e.to_string(),
            })?;
            let name = reference.name().as_bstr().to_str_lossy();
            if let Some(branch) = branch_name_from_ref(&name) {
                branches.push(branch);
            }
        }

        branches.sort();
        branches.dedup();
        Ok(branches)
    }

    fn status(&self, dest: &Path) -> Result<String, VcsError> {
        let stdout = run_git(dest, &["status", "--porcelain=v1", "--branch"])?;
        Ok(stdout
            .lines()
            .next()
            .map(|line| line.trim_start_matches("## ").to_string())
            .unwrap_or_default())
    }

    fn details(&self, dest: &Path) -> Result<RepoDetails, VcsError> {
        let url = run_git(dest, &["config", "--get", "remote.origin.url"])
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        Ok(RepoDetails {
            url,
            branch: current_branch(dest)?,
            branches: self.branches(dest)?,
            commit: head_commit_info(dest).ok(),
        })
    }

    fn commit(&self, dest: &Path, message: &str, path: &Path) -> Result<String, VcsError> {
        let rel = path.strip_prefix(dest).unwrap_or(path);
        let rel_str = rel.to_str().ok_or_else(|| VcsError::BackendError {
            reason: "non-utf8 path".to_string(),
        })?;

        let status = run_git(dest, &["status", "--porcelain", "--", rel_str])?;
        if status.trim().is_empty() {
            return Err(VcsError::NothingToCommit);
        }

        run_git(dest, &["add", "-A", "--", rel_str])?;
        run_git(
            dest,
            &["commit", "--quiet", "--no-gpg-sign", "-m", message, "--", rel_str],
        )?;
        let full_id = run_git(dest, &["rev-parse", "HEAD"])?;
        Ok(short_id(full_id.trim()))
    }

    fn push(&self, dest: &Path, credential: Option<&Path>) -> Result<String, VcsError> {
        let mut command = Command::new("git");
        command
            .args(["push", "--porcelain", "origin", "HEAD"])
            .current_dir(dest)
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(key) = credential {
            command.env("GIT_SSH_COMMAND", ssh_command(key));
        }
        let output = command.output().map_err(|e| VcsError::PushFailed {
            reason: format!("failed to run git push: {e}"),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_permission_error(&stderr) {
                return Err(VcsError::PermissionDenied {
                    reason: stderr.trim().to_string(),
                });
            }
            return Err(VcsError::PushFailed {
                reason: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn generate_key(&self, key_path: &Path, comment: &str) -> Result<String, VcsError> {
        let public_path = public_key_path(key_path);
        if key_path.is_file() && public_path.is_file() {
            return read_public_key(&public_path);
        }
        if let Some(parent) = key_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VcsError::BackendError {
                reason: format!("create {}: {e}", parent.display()),
            })?;
        }

        let output = Command::new("ssh-keygen")
            .args(["-q", "-t", "ed25519", "-N", "", "-C", comment, "-f"])
            .arg(key_path)
            .output()
            .map_err(|e| VcsError::BackendError {
                reason: format!("failed to run ssh-keygen: {e}"),
            })?;
        if !output.status.success() {
            return Err(VcsError::BackendError {
                reason: format!(
                    "ssh-keygen failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        tracing::debug!(key = %key_path.display(), "generated deploy key");
        read_public_key(&public_path)
    }
}

/// Options come before `--`, so an operator-supplied url is never read as
/// one.
fn clone_args<'a>(url: &'a str, dest: &'a str, branch: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec!["clone", "--quiet"];
    if let Some(branch) = branch {
        args.push("--branch");
        args.push(branch);
    }
    args.extend(["--", url.trim(), dest]);
    args
}

/// `<key>.pub`, where ssh-keygen writes the public half.
pub fn public_key_path(key_path: &Path) -> PathBuf {
    let mut name = key_path.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

fn read_public_key(path: &Path) -> Result<String, VcsError> {
    std::fs::read_to_string(path)
        .map(|key| key.trim().to_string())
        .map_err(|e| VcsError::BackendError {
            reason: format!("read {}: {e}", path.display()),
        })
}

/// The `GIT_SSH_COMMAND` that pins pushes to one deploy key. Git hands the
/// value to a shell, so the key path is single-quoted.
fn ssh_command(key: &Path) -> String {
    format!(
        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
        shell_quote(&key.display().to_string())
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn open_repo(path: &Path) -> Result<gix::Repository, VcsError> {
    gix::open(path).map_err(|e| VcsError::BackendError {
        reason: format!("open repo: {e}"),
    })
}

fn head_commit_id(path: &Path) -> Result<String, VcsError> {
    let repo = open_repo(path)?;
    let commit = repo.head_commit().map_err(|e| VcsError::BackendError {
        reason: format!("get head commit: {e}"),
    })?;
    Ok(commit.id().to_string())
}

fn head_commit_info(path: &Path) -> Result<CommitInfo, VcsError> {
    let repo = open_repo(path)?;
    let commit = repo.head_commit().map_err(|e| VcsError::BackendError {
        reason: format!("get head commit: {e}"),
    })?;
    let id = commit.id().to_string();
    let decoded = commit.decode().map_err(|e| VcsError::BackendError {
        reason: format!("decode commit: {e}"),
    })?;
    let summary = decoded
        .message
        .to_str_lossy()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    // author() returns Result in gix 0.77+
    let (author, timestamp) = match decoded.author() {
        Ok(author_ref) => {
            let name = author_ref.name.to_str_lossy().to_string();
            let ts = author_ref
                .time()
                .ok()
                .and_then(|t| Utc.timestamp_opt(t.seconds, 0).single())
                .unwrap_or_else(Utc::now);
            (name, ts)
        }
        Err(_) => ("Unknown".to_string(), Utc::now()),
    };

    Ok(CommitInfo {
        id,
        summary,
        author,
        timestamp,
    })
}

fn current_branch(path: &Path) -> Result<String, VcsError> {
    let repo = open_repo(path)?;
    let head = repo.head_name().map_err(|e| VcsError::BackendError {
        reason: format!("get head: {e}"),
    })?;
    Ok(head
        .map(|name| name.shorten().to_str_lossy().to_string())
        .unwrap_or_else(|| "HEAD".to_string()))
}

fn git_output(dir: &Path, args: &[&str]) -> Result<std::process::Output, VcsError> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| VcsError::BackendError {
            reason: format!("failed to run git {}: {e}", args.first().unwrap_or(&"")),
        })
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String, VcsError> {
    let output = git_output(dir, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VcsError::BackendError {
            reason: format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn is_permission_error(stderr: &str) -> bool {
    stderr.contains("Permission denied") || stderr.contains("Host key verification failed")
}

fn short_id(id: &str) -> String {
    id[..12.min(id.len())].to_string()
}

/// Maps a full reference name to the branch it names, ignoring symbolic
/// `HEAD` pointers and tags.
pub fn branch_name_from_ref(full_name: &str) -> Option<String> {
    let name = full_name
        .strip_prefix("refs/heads/")
        .or_else(|| {
            full_name
                .strip_prefix("refs/remotes/")
                .and_then(|rest| rest.split_once('/').map(|(_, branch)| branch))
        })?;
    if name.is_empty() || name == "HEAD" {
        return None;
    }
    Some(name.to_string())
}
