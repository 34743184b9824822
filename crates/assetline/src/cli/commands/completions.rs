//! Completions command

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, CommandFactory};
use clap_complete::Shell;
use tracing::info;

use crate::cli::{output, Cli};

/// Print a completion script for assetline's commands and flags
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Completion script for `shell`, named after the binary
fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, bin, &mut buf);
    buf
}

impl CompletionsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(shell = %self.shell, "executing completions command");
        let script = script(self.shell);

        let Some(path) = &self.output else {
            print!("{}", String::from_utf8_lossy(&script));
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, &script)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        if !cli.quiet {
            output::success(&format!(
                "{} completions written to {}",
                self.shell,
                output::path_style().apply_to(path.display())
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_bash_script_covers_subcommands() {
        let script = String::from_utf8(script(Shell::Bash)).unwrap();

        assert!(script.contains("_assetline"));
        for sub in ["run", "plan", "list", "init", "validate"] {
            assert!(script.contains(sub), "{sub} missing from completions");
        }
        assert!(script.contains("--dry-run"));
    }

    #[test]
    fn test_output_written_to_nested_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("completions/assetline.fish");
        let cli = Cli::try_parse_from([
            "assetline",
            "--quiet",
            "completions",
            "fish",
            "--output",
            path.to_str().unwrap(),
        ])
        .unwrap();

        match &cli.command {
            crate::cli::Commands::Completions(cmd) => cmd.execute(&cli).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        }

        let script = fs::read_to_string(&path).unwrap();
        assert!(script.contains("complete -c assetline"));
    }
}
