//! Git Operations
//!
//! Async git backend wrapper over shell commands. Every call runs with a
//! bounded timeout so a hung backend never blocks its caller indefinitely.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Default bound on a single git subprocess call
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Git command failed: {0}")]
    CommandFailed(String),

    #[error("Git command timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Git Status Types
// ============================================================================

/// Status of a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// New file (staged add)
    New,
    /// Modified
    Modified,
    /// Deleted
    Deleted,
    /// Renamed
    Renamed,
    /// Untracked
    Untracked,
    /// Ignored
    Ignored,
}

/// Overall git repository status
#[derive(Debug, Clone, Default)]
pub struct GitStatus {
    /// Current branch name
    pub branch: Option<String>,

    /// Files with their status
    pub files: Vec<(PathBuf, FileStatus)>,

    /// Whether there are staged changes
    pub has_staged: bool,

    /// Whether there are unstaged changes
    pub has_unstaged: bool,

    /// Whether there are untracked files
    pub has_untracked: bool,
}

impl GitStatus {
    /// Check if working tree is clean
    pub fn is_clean(&self) -> bool {
        !self.has_staged && !self.has_unstaged && !self.has_untracked
    }

    /// Check if anything could be committed (modified, staged or untracked)
    pub fn has_pending_changes(&self) -> bool {
        self.has_staged || self.has_unstaged || self.has_untracked
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Options for a log query
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Fixed-string grep over the full commit message
    pub grep: Option<String>,
    /// Oldest-first ordering
    pub reverse: bool,
    /// Maximum number of entries
    pub max_count: Option<usize>,
}

/// A git log entry with its full message body
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub hash: String,
    pub short_hash: String,
    pub timestamp: DateTime<Utc>,
    /// Full commit message (subject + body)
    pub message: String,
}

impl LogEntry {
    /// First line of the commit message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

// Field/record separators for log parsing (never appear in commit text)
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

// ============================================================================
// Git Operations
// ============================================================================

/// Git operations handler
#[derive(Debug, Clone)]
pub struct GitOps {
    /// Repository root directory
    root: PathBuf,

    /// Bound on each subprocess call
    timeout: Duration,
}

impl GitOps {
    /// Create new GitOps for a directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let root = Self::find_git_root(path)?;

        Ok(Self {
            root,
            timeout: DEFAULT_GIT_TIMEOUT,
        })
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-call timeout currently in effect
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Find the git repository root
    fn find_git_root(path: &Path) -> Result<PathBuf, GitError> {
        let mut current = if path.is_file() {
            path.parent().unwrap_or(path).to_path_buf()
        } else {
            path.to_path_buf()
        };

        loop {
            if current.join(".git").exists() {
                return Ok(current);
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                return Err(GitError::NotARepository(path.to_path_buf()));
            }
        }
    }

    /// Get repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if directory is inside a git repository
    pub fn is_repo(path: impl AsRef<Path>) -> bool {
        Self::find_git_root(path.as_ref()).is_ok()
    }

    /// Run a git command with the configured timeout
    async fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        debug!("git {}", args.join(" "));

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("git")
                .args(args)
                .current_dir(&self.root)
                .output(),
        )
        .await
        .map_err(|_| GitError::Timeout(self.timeout))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(GitError::CommandFailed(stderr.trim().to_string()))
        }
    }

    /// Get current branch name
    pub async fn current_branch(&self) -> Result<String, GitError> {
        self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Get repository status
    pub async fn status(&self) -> Result<GitStatus, GitError> {
        let branch = self.current_branch().await.ok();
        let output = self.run_git(&["status", "--porcelain=v1"]).await?;
        Ok(parse_porcelain_status(branch, &output))
    }

    /// Stage specific files
    pub async fn add(&self, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(paths);
        self.run_git(&args).await?;
        Ok(())
    }

    /// Stage all changes
    pub async fn add_all(&self) -> Result<(), GitError> {
        self.run_git(&["add", "-A"]).await?;
        Ok(())
    }

    /// Commit staged changes with an explicit author identity
    ///
    /// Returns the full commit hash.
    pub async fn commit(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<String, GitError> {
        let name_cfg = format!("user.name={}", author_name);
        let email_cfg = format!("user.email={}", author_email);
        let author = format!("{} <{}>", author_name, author_email);

        self.run_git(&[
            "-c",
            &name_cfg,
            "-c",
            &email_cfg,
            "commit",
            "-m",
            message,
            "--author",
            &author,
        ])
        .await?;

        let hash = self.head().await?;
        info!("Created commit: {}", &hash[..hash.len().min(7)]);
        Ok(hash)
    }

    /// Get current commit hash
    pub async fn head(&self) -> Result<String, GitError> {
        self.run_git(&["rev-parse", "HEAD"]).await
    }

    /// Get short commit hash
    pub async fn head_short(&self) -> Result<String, GitError> {
        self.run_git(&["rev-parse", "--short", "HEAD"]).await
    }

    /// Whether the repository has any commit at all
    pub async fn has_commits(&self) -> bool {
        self.run_git(&["rev-parse", "--verify", "HEAD"]).await.is_ok()
    }

    /// Query the commit log
    ///
    /// An empty repository yields an empty list, not an error.
    pub async fn log(&self, opts: &LogOptions) -> Result<Vec<LogEntry>, GitError> {
        if !self.has_commits().await {
            return Ok(Vec::new());
        }

        let format = format!(
            "--format=%H{sep}%h{sep}%aI{sep}%B{rec}",
            sep = FIELD_SEP,
            rec = RECORD_SEP
        );

        let mut args = vec!["log".to_string(), format];
        if let Some(grep) = &opts.grep {
            args.push("--fixed-strings".to_string());
            args.push(format!("--grep={}", grep));
        }
        if opts.reverse {
            args.push("--reverse".to_string());
        }
        if let Some(n) = opts.max_count {
            args.push("-n".to_string());
            args.push(n.to_string());
        }

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let output = self.run_git(&arg_refs).await?;
        Ok(parse_log_output(&output))
    }

    /// Hard reset the working tree to a commit
    pub async fn reset_hard(&self, commit: &str) -> Result<(), GitError> {
        self.run_git(&["reset", "--hard", commit]).await?;
        info!("Reset working tree to {}", commit);
        Ok(())
    }

    /// Files touched between two commits
    pub async fn diff_files(&self, from: &str, to: &str) -> Result<Vec<String>, GitError> {
        let output = self.run_git(&["diff", "--name-only", from, to]).await?;
        Ok(output
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Check if there are uncommitted changes
    pub async fn is_dirty(&self) -> Result<bool, GitError> {
        let status = self.status().await?;
        Ok(!status.is_clean())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse `git status --porcelain=v1` output
fn parse_porcelain_status(branch: Option<String>, output: &str) -> GitStatus {
    let mut status = GitStatus {
        branch,
        ..Default::default()
    };

    for line in output.lines() {
        if line.len() < 3 {
            continue;
        }

        let index_status = line.chars().next().unwrap_or(' ');
        let worktree_status = line.chars().nth(1).unwrap_or(' ');
        let file_path = PathBuf::from(line[3..].trim());

        let file_status = match (index_status, worktree_status) {
            ('?', '?') => {
                status.has_untracked = true;
                FileStatus::Untracked
            }
            ('!', '!') => FileStatus::Ignored,
            ('A', _) | (_, 'A') => {
                if index_status == 'A' {
                    status.has_staged = true;
                }
                if worktree_status == 'A' {
                    status.has_unstaged = true;
                }
                FileStatus::New
            }
            ('D', _) | (_, 'D') => {
                if index_status == 'D' {
                    status.has_staged = true;
                }
                if worktree_status == 'D' {
                    status.has_unstaged = true;
                }
                FileStatus::Deleted
            }
            ('R', _) => {
                status.has_staged = true;
                FileStatus::Renamed
            }
            _ => {
                if index_status != ' ' {
                    status.has_staged = true;
                }
                if worktree_status != ' ' {
                    status.has_unstaged = true;
                }
                FileStatus::Modified
            }
        };

        status.files.push((file_path, file_status));
    }

    status
}

/// Parse separator-delimited log output into entries
fn parse_log_output(output: &str) -> Vec<LogEntry> {
    let mut entries = Vec::new();

    for record in output.split(RECORD_SEP) {
        let record = record.trim_matches(['\n', '\r']);
        if record.is_empty() {
            continue;
        }

        let parts: Vec<&str> = record.splitn(4, FIELD_SEP).collect();
        if parts.len() != 4 {
            continue;
        }

        let timestamp = DateTime::parse_from_rfc3339(parts[2].trim())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        entries.push(LogEntry {
            hash: parts[0].trim().to_string(),
            short_hash: parts[1].trim().to_string(),
            timestamp,
            message: parts[3].trim_end().to_string(),
        });
    }

    entries
}

// ============================================================================
// Tests
// ============================================================================
