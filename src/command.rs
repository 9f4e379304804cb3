//! Running commands in the installer or in the target system
//!
//! [`Runner::run_installer`] executes a command as-is. [`Runner::run`] prefixes
//! it with `$ROOTCMD` first, which is how commands reach the target system.
//! Both check the exit status and capture stdout as text unless told
//! otherwise through [`RunOptions`].
//!
//! ```no_run
//! use fai::{FaiEnv, Runner};
//!
//! let env = FaiEnv::from_process_env()?;
//! let runner = Runner::new(&env);
//! let group = runner.run(["getent", "group", "audio"])?;
//! let members: Vec<&str> = group
//!     .stdout
//!     .trim()
//!     .split(':')
//!     .nth(3)
//!     .unwrap_or("")
//!     .split(',')
//!     .collect();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::RefCell;
use std::path::PathBuf;

use crate::env::FaiEnv;
use crate::error::CommandError;
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Turn a non-zero exit into [`CommandError::Failed`]
    pub check: bool,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
    pub stdin: Option<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: true,
            capture_stdout: true,
            capture_stderr: false,
            stdin: None,
            current_dir: None,
            env: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    pub fn inherit_stdout(mut self) -> Self {
        self.capture_stdout = false;
        self
    }

    pub fn capture_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub args: Vec<String>,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can execute an argument vector
pub trait Executor {
    fn execute(&self, args: &[String], options: &RunOptions) -> Result<CommandOutput, CommandError>;

    /// Whether commands and filesystem changes are only reported
    fn is_dry_run(&self) -> bool {
        false
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(
        &self,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError> {
        (**self).execute(args, options)
    }

    fn is_dry_run(&self) -> bool {
        (**self).is_dry_run()
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(
        &self,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError> {
        (**self).execute(args, options)
    }

    fn is_dry_run(&self) -> bool {
        (**self).is_dry_run()
    }
}

pub fn command_line(args: &[String]) -> String {
    shell_words::join(args)
}

/// Spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(
        &self,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError> {
        let (program, rest) = args.split_first().ok_or(CommandError::Empty)?;

        let mut expr = duct::cmd(program.as_str(), rest).unchecked();
        if options.capture_stdout {
            expr = expr.stdout_capture();
        }
        if options.capture_stderr {
            expr = expr.stderr_capture();
        }
        if let Some(input) = &options.stdin {
            expr = expr.stdin_bytes(input.clone());
        }
        if let Some(dir) = &options.current_dir {
            expr = expr.dir(dir.clone());
        }
        for (key, value) in &options.env {
            expr = expr.env(key, value);
        }

        let output = expr.run().map_err(|source| CommandError::Spawn {
            command: command_line(args),
            source,
        })?;

        Ok(CommandOutput {
            args: args.to_vec(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Prints commands instead of running them and reports success
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    pub fn describe(args: &[String], options: &RunOptions) -> String {
        let cmd_str = command_line(args);
        match &options.stdin {
            Some(input) if input.contains('\n') => format!(
                "[DRY RUN] --- BEGIN COMMAND ---\n> {}\n{}\n[DRY RUN] --- END COMMAND ---",
                cmd_str,
                input.trim()
            ),
            Some(input) => format!("[DRY RUN] echo '{}' | {}", input, cmd_str),
            None => format!("[DRY RUN] {}", cmd_str),
        }
    }
}

impl Executor for DryRunExecutor {
    fn execute(
        &self,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError> {
        if args.is_empty() {
            return Err(CommandError::Empty);
        }
        println!("{}", Self::describe(args, options));
        Ok(CommandOutput {
            args: args.to_vec(),
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// One call seen by a [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub options: RunOptions,
}

/// Records invocations instead of running them, for tests of code built on
/// [`Runner`]. Every call returns the configured exit code and stdout.
#[derive(Debug)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Invocation>>,
    code: Option<i32>,
    stdout: String,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            code: Some(0),
            stdout: String::new(),
        }
    }

    /// Every command exits with `code`
    pub fn failing(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::new()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(|c| c.args.clone()).collect()
    }
}

impl Executor for RecordingExecutor {
    fn execute(
        &self,
        args: &[String],
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError> {
        if args.is_empty() {
            return Err(CommandError::Empty);
        }
        self.calls.borrow_mut().push(Invocation {
            args: args.to_vec(),
            options: options.clone(),
        });
        Ok(CommandOutput {
            args: args.to_vec(),
            code: self.code,
            stdout: if options.capture_stdout {
                self.stdout.clone()
            } else {
                String::new()
            },
            stderr: String::new(),
        })
    }
}

/// Runs commands for a given FAI environment
pub struct Runner<'env, E = SystemExecutor> {
    env: &'env FaiEnv,
    executor: E,
}

impl<'env> Runner<'env, SystemExecutor> {
    pub fn new(env: &'env FaiEnv) -> Self {
        Self::with_executor(env, SystemExecutor)
    }
}

impl<'env, E: Executor> Runner<'env, E> {
    pub fn with_executor(env: &'env FaiEnv, executor: E) -> Self {
        Self { env, executor }
    }

    pub fn env(&self) -> &'env FaiEnv {
        self.env
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn is_dry_run(&self) -> bool {
        self.executor.is_dry_run()
    }

    /// Run a command in the installer system with default options
    pub fn run_installer<I, S>(&self, args: I) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_installer_with(args, &RunOptions::default())
    }

    /// Run a command in the installer system
    pub fn run_installer_with<I, S>(
        &self,
        args: I,
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(CommandError::Empty);
        }

        ui::debug("command.run", &format!("Running: {}", command_line(&args)));
        let output = self.executor.execute(&args, options)?;

        if options.check && !output.success() {
            return Err(CommandError::Failed {
                command: command_line(&args),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Run a command in the target system with default options
    pub fn run<I, S>(&self, args: I) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with(args, &RunOptions::default())
    }

    /// Run a command in the target system, prefixed with `$ROOTCMD`
    pub fn run_with<I, S>(
        &self,
        args: I,
        options: &RunOptions,
    ) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_installer_with(self.target_command(args), options)
    }

    /// The argument vector [`Runner::run`] would execute
    pub fn target_command<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env
            .rootcmd
            .iter()
            .cloned()
            .chain(args.into_iter().map(Into::into))
            .collect()
    }
}
