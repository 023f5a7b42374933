//! Process execution seam.

use std::process::Command;

/// Exit status and combined stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub output: String,
}

impl CommandOutput {
    /// Combined output with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }

    pub(crate) fn code_display(&self) -> String {
        self.code
            .map_or_else(|| "signal".to_string(), |c| c.to_string())
    }
}

/// Runs external programs synchronously.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        tracing::debug!("exec: {program} {}", args.join(" "));
        let output = Command::new(program).args(args).output()?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            output: combined,
        })
    }
}
