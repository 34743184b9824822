//! Packaging the build directory

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;
use walkdir::WalkDir;

use assetline_core::config::BuildConfig;

use crate::files;
use crate::reporter::{FileAction, TaskEvent};
use crate::task::{RunContext, Task, TaskError, TaskOutcome};

/// Writes `build` into a gzip-compressed tarball at `package.file`
pub struct ArchiveTask {
    name: String,
    config: Arc<BuildConfig>,
}

impl ArchiveTask {
    pub fn new(name: impl Into<String>, config: Arc<BuildConfig>) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Task for ArchiveTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        let task = self.name.clone();
        let source = PathBuf::from(&self.config.build);
        let target = PathBuf::from(&self.config.package.file);

        let count =
            files::blocking(&self.name, move || write_archive(&task, &source, &target)).await?;

        info!(
            task = %self.name,
            file = %self.config.package.file,
            entries = count,
            "build archived"
        );
        ctx.report(TaskEvent::Files {
            name: self.name.clone(),
            action: FileAction::Archived,
            count,
        });
        Ok(TaskOutcome::Success)
    }
}

/// Archive every file under `source` into `target`, paths relative to
/// `source`. Returns the number of files written.
pub fn write_archive(task: &str, source: &Path, target: &Path) -> Result<usize, TaskError> {
    let package_err = |reason: String| TaskError::Package {
        task: task.to_string(),
        reason,
    };

    if !source.is_dir() {
        return Err(package_err(format!(
            "build directory {} does not exist",
            source.display()
        )));
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(task, parent.display(), e))?;
    }

    let file = File::create(target).map_err(|e| TaskError::io(task, target.display(), e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut count = 0;
    let walker = WalkDir::new(source).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| package_err(e.to_string()))?;
        let path = entry.path();
        // the archive may live inside the build directory
        if !entry.file_type().is_file() || path == target {
            continue;
        }
        let relative = path.strip_prefix(source).unwrap_or(path);
        builder
            .append_path_with_name(path, relative)
            .map_err(|e| package_err(format!("{}: {}", path.display(), e)))?;
        count += 1;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| package_err(e.to_string()))?;
    Ok(count)
}
