use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Cannot split $ROOTCMD {value:?}: {source}")]
    InvalidRootCmd {
        value: String,
        #[source]
        source: shell_words::ParseError,
    },

    #[error("FAI environment variables not defined: {}", missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("Target root is not set ($target is undefined)")]
    TargetUnset,

    #[error("{} is not within target {}", path.display(), target.display())]
    OutsideTarget { path: PathBuf, target: PathBuf },

    #[error("Target path {} escapes the target root", .0.display())]
    EscapesTarget(PathBuf),

    #[error("Target path {} names the target root itself", .0.display())]
    TargetRoot(PathBuf),
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Cannot run an empty command")]
    Empty,

    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed ({}): {command}", describe_exit(*code))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl CommandError {
    /// Exit code of a failed command, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum FaiError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid user or group name {0:?}")]
    InvalidOwner(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = FaiError> = std::result::Result<T, E>;
