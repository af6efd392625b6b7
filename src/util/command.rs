use std::fmt;
use std::process::{Child, Command, Stdio};

use crate::error::{Result, VaultError};
use crate::types::RunMode;

/// An external command line, tagged with whether it changes system state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub mutating: bool,
}

impl CommandSpec {
    pub fn query<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            mutating: false,
        }
    }

    pub fn action<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mutating: true,
            ..Self::query(program, args)
        }
    }

    /// Program plus first argument, e.g. `zpool create`.
    pub fn short_name(&self) -> String {
        match self.args.first() {
            Some(sub) if !sub.starts_with('-') => format!("{} {}", self.program, sub),
            _ => self.program.clone(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// A command started with [`Runner::spawn`] that has not been reaped yet.
pub trait Pending {
    /// Returns `Some` once the command has exited.
    fn poll(&mut self) -> Result<Option<CommandOutput>>;
    /// Stops the command and waits for it to exit.
    fn cancel(&mut self) -> Result<()>;
}

pub trait Runner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn Pending>>;

    /// Mutating commands are reported successful without running.
    fn dry_run(&self) -> bool {
        false
    }
}

/// Runs `spec` and turns a non-zero exit into [`VaultError::Command`].
pub fn run_checked(runner: &dyn Runner, spec: &CommandSpec) -> Result<CommandOutput> {
    let output = runner.run(spec)?;
    if !output.success() {
        return Err(VaultError::Command {
            command: spec.short_name(),
            code: output.code,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

pub fn maybe_print_command(spec: &CommandSpec, run_mode: RunMode) {
    if !run_mode.dry_run && !run_mode.verbose {
        return;
    }
    if run_mode.dry_run && spec.mutating {
        println!("dry-run: {}", spec);
    } else {
        println!("{}", spec);
    }
}

pub struct SystemRunner {
    run_mode: RunMode,
}

impl SystemRunner {
    pub fn new(run_mode: RunMode) -> Self {
        Self { run_mode }
    }

    fn skip(&self, spec: &CommandSpec) -> bool {
        self.run_mode.dry_run && spec.mutating
    }
}

impl Runner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        maybe_print_command(spec, self.run_mode);
        if self.skip(spec) {
            return Ok(CommandOutput::default());
        }
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VaultError::message(format!("{}: {}", spec.program, e)))?;
        Ok(CommandOutput {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn Pending>> {
        maybe_print_command(spec, self.run_mode);
        if self.skip(spec) {
            return Ok(Box::new(Finished(Some(CommandOutput::default()))));
        }
        // Progress output goes straight to the operator's terminal.
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| VaultError::message(format!("{}: {}", spec.program, e)))?;
        Ok(Box::new(ChildTask { child }))
    }

    fn dry_run(&self) -> bool {
        self.run_mode.dry_run
    }
}

struct ChildTask {
    child: Child,
}

impl Pending for ChildTask {
    fn poll(&mut self) -> Result<Option<CommandOutput>> {
        let status = self.child.try_wait()?;
        Ok(status.map(|status| CommandOutput {
            code: status.code().unwrap_or(1),
            ..CommandOutput::default()
        }))
    }

    fn cancel(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill()?;
        }
        self.child.wait()?;
        Ok(())
    }
}

struct Finished(Option<CommandOutput>);

impl Pending for Finished {
    fn poll(&mut self) -> Result<Option<CommandOutput>> {
        Ok(self.0.take().or_else(|| Some(CommandOutput::default())))
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}
