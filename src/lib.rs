//! FAI helpers
//!
//! Typed access to the environment of the Fully Automatic Installation system
//! (`$classes`, `$FAI`, `$target`, `$ROOTCMD`, `$FAI_ACTION`, `$LOGDIR`),
//! conversion between paths in the target system and paths in the running
//! installer, and wrappers for running commands in either of them.
//!
//! ```no_run
//! use fai::{FaiEnv, FcopyOptions, Runner, TargetPath};
//!
//! let env = FaiEnv::load(false)?;
//! let runner = Runner::new(&env);
//! fai::fcopy(&runner, &[TargetPath::from("/etc/fai/fai.conf")], &FcopyOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod command;
pub mod env;
pub mod error;
pub mod files;
pub mod paths;
pub mod ui;

pub use command::{
    CommandOutput, DryRunExecutor, Executor, Invocation, RecordingExecutor, RunOptions, Runner,
    SystemExecutor,
};
pub use env::{Action, FaiAction, FaiEnv};
pub use error::{CommandError, EnvError, FaiError, PathError, Result};
pub use files::{FcopyOptions, Ownership, chmod, fcopy, mkdir};
pub use paths::{InstallerPath, TargetPath};

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
