//! File operations performed by the pipeline itself
//!
//! Patterns follow the configuration's glob dialect: `!` marks exclusions,
//! `{a,b}` picks alternatives and `*` never crosses a path separator. Each
//! include is walked from its literal base directory with symlinks left
//! unfollowed.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use assetline_core::config::Globs;

use crate::task::TaskError;

fn invalid_pattern(task: &str, pattern: &str, err: impl ToString) -> TaskError {
    TaskError::InvalidPattern {
        task: task.to_string(),
        pattern: pattern.to_string(),
        reason: err.to_string(),
    }
}

fn walk_error(task: &str, err: walkdir::Error) -> TaskError {
    TaskError::Io {
        task: task.to_string(),
        path: err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        reason: err.to_string(),
    }
}

fn has_meta(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}

fn build_glob(task: &str, pattern: &str) -> Result<Glob, TaskError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| invalid_pattern(task, pattern, e))
}

/// Compile `patterns` into one set
pub fn glob_set<'a>(
    task: &str,
    patterns: impl IntoIterator<Item = &'a str>,
) -> Result<GlobSet, TaskError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(task, pattern)?);
    }
    builder.build().map_err(|e| invalid_pattern(task, "<set>", e))
}

/// Leading part of `pattern` that contains no glob metacharacters.
///
/// A pattern without metacharacters names a single file, whose parent is the
/// base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut literal = true;

    for component in path.components() {
        if let Component::Normal(part) = component {
            if has_meta(&part.to_string_lossy()) {
                literal = false;
                break;
            }
        }
        base.push(component);
    }

    if literal {
        base.pop();
    }
    base
}

/// How deep below its base a pattern can reach; `None` when it has `**`
fn walk_depth(pattern: &str, base: &Path) -> Option<usize> {
    if pattern.contains("**") {
        return None;
    }
    let total = Path::new(pattern).components().count();
    Some(total.saturating_sub(base.components().count()))
}

/// Files matching `pattern`, sorted
pub fn matching_files(task: &str, pattern: &str) -> Result<Vec<PathBuf>, TaskError> {
    if !has_meta(pattern) {
        let path = PathBuf::from(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }

    let matcher = build_glob(task, pattern)?.compile_matcher();
    let base = glob_base(pattern);
    let relative = base.as_os_str().is_empty();
    let root = if relative { Path::new(".") } else { base.as_path() };
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    if let Some(depth) = walk_depth(pattern, &base) {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(task, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let candidate = if relative {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if matcher.is_match(candidate) {
            files.push(candidate.to_path_buf());
        }
    }
    Ok(files)
}

/// Run filesystem work for `task` on the blocking pool
pub async fn blocking<T, F>(task: &str, work: F) -> Result<T, TaskError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TaskError::Panicked {
            task: task.to_string(),
            reason: e.to_string(),
        })?
}

/// Delete every file matching any of `patterns`. Returns how many went.
pub fn clean_files(task: &str, patterns: &[String]) -> Result<usize, TaskError> {
    let mut removed = 0;
    for pattern in patterns {
        for file in matching_files(task, pattern)? {
            match fs::remove_file(&file) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(TaskError::io(task, file.display(), e)),
            }
        }
    }
    debug!(task, removed, "cleaned files");
    Ok(removed)
}

/// Remove `dir` and everything below it; a missing directory is fine.
pub fn remove_dir(task: &str, dir: &Path) -> Result<bool, TaskError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(TaskError::io(task, dir.display(), e)),
    }
}

/// Copy files selected by `globs` into `dest`, keeping their layout relative
/// to each include pattern's base. Returns how many were copied.
pub fn copy_matching(task: &str, globs: &Globs, dest: &Path) -> Result<usize, TaskError> {
    let excludes = glob_set(task, globs.excludes())?;

    let mut copied = 0;
    for include in globs.includes() {
        let base = glob_base(include);
        for file in matching_files(task, include)? {
            if excludes.is_match(&file) {
                continue;
            }

            let relative = file.strip_prefix(&base).unwrap_or(&file);
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| TaskError::io(task, parent.display(), e))?;
            }
            fs::copy(&file, &target).map_err(|e| TaskError::io(task, file.display(), e))?;
            copied += 1;
        }
    }

    debug!(task, copied, dest = %dest.display(), "copied files");
    Ok(copied)
}
