//! Catalog steps backed by an external command

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use assetline_core::config::{is_exclusion, BuildConfig};

use crate::files;
use crate::reporter::{FileAction, TaskEvent};
use crate::task::{RunContext, Task, TaskError, TaskOutcome};

/// Prefix of every variable exported to plugin commands
pub const ENV_PREFIX: &str = "ASSETLINE_";

/// Reason reported when a step has no command configured
pub const NOT_CONFIGURED: &str = "no plugin configured";

/// A build step whose work is done by `plugins.<name>.command`.
///
/// Files matching `clean` are deleted before the command runs, whether or not
/// a command is configured.
pub struct PluginTask {
    name: String,
    config: Arc<BuildConfig>,
    clean: Vec<String>,
}

impl PluginTask {
    pub fn new(name: impl Into<String>, config: Arc<BuildConfig>, clean: Vec<String>) -> Self {
        Self {
            name: name.into(),
            config,
            clean,
        }
    }

    /// Resolved patterns removed before each run
    pub fn clean_patterns(&self) -> &[String] {
        &self.clean
    }
}

#[async_trait]
impl Task for PluginTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        if !self.clean.is_empty() {
            let (task, clean) = (self.name.clone(), self.clean.clone());
            let count =
                files::blocking(&self.name, move || files::clean_files(&task, &clean)).await?;
            ctx.report(TaskEvent::Files {
                name: self.name.clone(),
                action: FileAction::Cleaned,
                count,
            });
        }

        let Some(plugin) = self.config.plugin(&self.name) else {
            debug!(task = %self.name, "no plugin configured");
            return Ok(TaskOutcome::Skipped(NOT_CONFIGURED.to_string()));
        };

        let mut env = plugin_env(&self.name, &self.config).map_err(|e| TaskError::Spawn {
            task: self.name.clone(),
            reason: format!("could not encode plugin environment: {}", e),
        })?;
        env.extend(plugin.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        info!(task = %self.name, command = %plugin.command, "running plugin");
        run_command(&self.name, &plugin.command, &self.config.root, env, ctx).await?;
        Ok(TaskOutcome::Success)
    }
}

/// Environment describing the resolved configuration to a plugin command
pub fn plugin_env(task: &str, config: &BuildConfig) -> serde_json::Result<Vec<(String, String)>> {
    let template_sources: Vec<String> = config
        .src
        .html
        .iter()
        .map(str::to_string)
        .chain(std::iter::once(exclude(&config.src.index)))
        .collect();

    let vars = vec![
        ("TASK", task.to_string()),
        ("ROOT", config.root.clone()),
        ("SRC_ROOT", config.src.root.clone()),
        ("SRC_INDEX", config.src.index.clone()),
        ("SRC_JS", serde_json::to_string(&config.src.js)?),
        ("SRC_HTML", serde_json::to_string(&config.src.html)?),
        ("SRC_STYLES", serde_json::to_string(&config.src.styles)?),
        ("TEMP", config.temp.clone()),
        ("BUILD", config.build.clone()),
        ("ASSETS_ROOT", config.assets.root.clone()),
        ("FONTS", serde_json::to_string(&config.assets.fonts)?),
        ("IMAGES", serde_json::to_string(&config.assets.images)?),
        ("BOWER_DIRECTORY", config.bower.directory.clone()),
        ("BOWER_IGNORE_PATH", config.bower.ignore_path.clone()),
        ("TEMPLATE_FILE", config.template_bundle()),
        (
            "TEMPLATE_OPTIONS",
            serde_json::to_string(&config.template_cache.options)?,
        ),
        ("TEMPLATE_SOURCES", serde_json::to_string(&template_sources)?),
        ("OPTIMIZE", serde_json::to_string(&config.optimize)?),
        ("MANIFEST", config.manifest.clone()),
    ];

    Ok(vars
        .into_iter()
        .map(|(key, value)| (format!("{}{}", ENV_PREFIX, key), value))
        .collect())
}

fn exclude(path: &str) -> String {
    if is_exclusion(path) {
        path.to_string()
    } else {
        format!("!{}", path)
    }
}

/// Run `cmd` through `sh -c` in `root`, streaming its output to the reporter.
async fn run_command(
    task: &str,
    cmd: &str,
    root: &str,
    env: Vec<(String, String)>,
    ctx: &RunContext,
) -> Result<(), TaskError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(root)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| TaskError::Spawn {
            task: task.to_string(),
            reason: e.to_string(),
        })?;

    let (_, stderr_lines) = tokio::join!(
        stream_lines(child.stdout.take(), task, false, ctx),
        stream_lines(child.stderr.take(), task, true, ctx),
    );

    let status = child.wait().await.map_err(|e| TaskError::Spawn {
        task: task.to_string(),
        reason: format!("failed to wait: {}", e),
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(TaskError::PluginFailed {
            task: task.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: stderr_lines.join("\n"),
        })
    }
}

async fn stream_lines<R>(
    handle: Option<R>,
    task: &str,
    is_stderr: bool,
    ctx: &RunContext,
) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let Some(handle) = handle else {
        return collected;
    };

    let mut lines = BufReader::new(handle).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        ctx.report(TaskEvent::Output {
            name: task.to_string(),
            line: line.clone(),
            is_stderr,
        });
        collected.push(line);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use assetline_core::config::{BuildOptions, PluginCommand};
    use tempfile::TempDir;

    use crate::reporter::CollectingReporter;

    fn config_in(root: &TempDir, plugins: &[(&str, PluginCommand)]) -> Arc<BuildConfig> {
        let mut options = BuildOptions {
            root: root.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        for (name, plugin) in plugins {
            options.plugins.insert(name.to_string(), plugin.clone());
        }
        Arc::new(BuildConfig::resolve(options).unwrap())
    }

    #[test]
    fn test_plugin_env_exports_resolved_paths() {
        let config = BuildConfig::resolve(BuildOptions::default()).unwrap();
        let env: std::collections::HashMap<_, _> =
            plugin_env("templates", &config).unwrap().into_iter().collect();

        assert_eq!(env["ASSETLINE_TASK"], "templates");
        assert_eq!(env["ASSETLINE_SRC_INDEX"], "src/app/index.html");
        assert_eq!(env["ASSETLINE_TEMPLATE_FILE"], ".tmp/app.templates.js");
        assert_eq!(env["ASSETLINE_MANIFEST"], "dist/rev-manifest.json");
        assert_eq!(
            env["ASSETLINE_TEMPLATE_SOURCES"],
            r#"["src/app/**/*.html","!src/app/index.html"]"#
        );

        let optimize: serde_json::Value = serde_json::from_str(&env["ASSETLINE_OPTIMIZE"]).unwrap();
        assert_eq!(optimize["uglify"], false);
        assert_eq!(optimize["app"], "app.min.js");
    }

    #[tokio::test]
    async fn test_unconfigured_plugin_is_skipped_after_cleaning() {
        let root = TempDir::new().unwrap();
        let stale = root.path().join("dist/css/old.css");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "a{}").unwrap();

        let config = config_in(&root, &[]);
        let clean = vec![format!("{}/**/*.css", config.build)];
        let task = PluginTask::new("styles", config, clean);

        let reporter = Arc::new(CollectingReporter::default());
        let outcome = task.run(&RunContext::new(reporter.clone())).await.unwrap();

        assert_eq!(outcome, TaskOutcome::Skipped(NOT_CONFIGURED.to_string()));
        assert!(!stale.exists());
        assert!(reporter.events().iter().any(|e| matches!(
            e,
            TaskEvent::Files { action: FileAction::Cleaned, count: 1, .. }
        )));
    }

    #[tokio::test]
    async fn test_plugin_runs_in_root_with_env() {
        let root = TempDir::new().unwrap();
        let mut plugin =
            PluginCommand::new(r#"printf '%s %s' "$ASSETLINE_TASK" "$EXTRA" > out.txt"#);
        plugin.env.insert("EXTRA".to_string(), "yes".to_string());
        let config = config_in(&root, &[("fonts", plugin)]);

        let task = PluginTask::new("fonts", config, Vec::new());
        let outcome = task.run(&RunContext::default()).await.unwrap();

        assert_eq!(outcome, TaskOutcome::Success);
        let written = fs::read_to_string(root.path().join("out.txt")).unwrap();
        assert_eq!(written, "fonts yes");
    }

    #[tokio::test]
    async fn test_plugin_output_is_streamed() {
        let root = TempDir::new().unwrap();
        let config = config_in(
            &root,
            &[("wiredep", PluginCommand::new("echo injected; echo careful >&2"))],
        );
        let reporter = Arc::new(CollectingReporter::default());

        PluginTask::new("wiredep", config, Vec::new())
            .run(&RunContext::new(reporter.clone()))
            .await
            .unwrap();

        let output: Vec<(String, bool)> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Output { line, is_stderr, .. } => Some((line, is_stderr)),
                _ => None,
            })
            .collect();
        assert!(output.contains(&("injected".to_string(), false)));
        assert!(output.contains(&("careful".to_string(), true)));
    }

    #[tokio::test]
    async fn test_plugin_failure_carries_code_and_stderr() {
        let root = TempDir::new().unwrap();
        let config = config_in(
            &root,
            &[("images", PluginCommand::new("echo 'bad image' >&2; exit 3"))],
        );

        let err = PluginTask::new("images", config, Vec::new())
            .run(&RunContext::default())
            .await
            .unwrap_err();

        match err {
            TaskError::PluginFailed { task, code, stderr } => {
                assert_eq!(task, "images");
                assert_eq!(code, 3);
                assert_eq!(stderr, "bad image");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
