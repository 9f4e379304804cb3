//! FAI environment variables
//!
//! [`FaiEnv`] holds the most important FAI variables as typed values. Outside
//! of FAI most of them are unset. Build it once at startup and pass it to
//! whatever needs it; nothing here is global.
//!
//! See <https://wiki.fai-project.org/index.php/Variables>.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{EnvError, PathError};
use crate::paths::{self, InstallerPath, TargetPath};
use crate::ui::{self, Level};

pub const VAR_CLASSES: &str = "classes";
pub const VAR_CONFIG_SPACE: &str = "FAI";
pub const VAR_TARGET: &str = "target";
pub const VAR_ROOTCMD: &str = "ROOTCMD";
pub const VAR_ACTION: &str = "FAI_ACTION";
pub const VAR_LOGDIR: &str = "LOGDIR";

const INCOMPLETE_CODE: &str = "env.incomplete";
const INCOMPLETE_MESSAGE: &str = "Warning: FAI environment variables not defined: \
    Are you running in FAI? \
    For testing, set $FAI, $target, $ROOTCMD, $FAI_ACTION, and $LOGDIR.";

const ALL_VARS: [&str; 6] = [
    VAR_CLASSES,
    VAR_CONFIG_SPACE,
    VAR_TARGET,
    VAR_ROOTCMD,
    VAR_ACTION,
    VAR_LOGDIR,
];

/// Well-known FAI actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SysInfo,
    Inventory,
    Install,
    DirInstall,
    SoftUpdate,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::SysInfo,
        Action::Inventory,
        Action::Install,
        Action::DirInstall,
        Action::SoftUpdate,
    ];

    /// Name as used in `$FAI_ACTION`
    pub fn as_str(self) -> &'static str {
        match self {
            Action::SysInfo => "sysinfo",
            Action::Inventory => "inventory",
            Action::Install => "install",
            Action::DirInstall => "dirinstall",
            Action::SoftUpdate => "softupdate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown FAI action: {s}"))
    }
}

/// Value of `$FAI_ACTION`: a well-known action or a custom one kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaiAction {
    Known(Action),
    Other(String),
}

impl FaiAction {
    pub fn parse(value: &str) -> Self {
        match value.parse::<Action>() {
            Ok(action) => FaiAction::Known(action),
            Err(_) => FaiAction::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FaiAction::Known(action) => action.as_str(),
            FaiAction::Other(name) => name,
        }
    }

    pub fn known(&self) -> Option<Action> {
        match self {
            FaiAction::Known(action) => Some(*action),
            FaiAction::Other(_) => None,
        }
    }
}

impl PartialEq<Action> for FaiAction {
    fn eq(&self, other: &Action) -> bool {
        self.known() == Some(*other)
    }
}

impl From<Action> for FaiAction {
    fn from(action: Action) -> Self {
        FaiAction::Known(action)
    }
}

impl fmt::Display for FaiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FaiAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Snapshot of the FAI environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaiEnv {
    /// FAI classes (`$classes`)
    pub classes: Vec<String>,
    /// FAI config space (`$FAI`)
    pub config_space: Option<PathBuf>,
    /// Installation target (`$target`)
    pub target: Option<PathBuf>,
    /// Chroot command (`$ROOTCMD`), split like a shell would
    pub rootcmd: Vec<String>,
    /// FAI action (`$FAI_ACTION`)
    pub action: Option<FaiAction>,
    /// FAI log directory (`$LOGDIR`)
    pub logdir: Option<PathBuf>,
}

impl FaiEnv {
    /// Read the variables from an arbitrary key/value source
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, EnvError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| ALL_VARS.contains(&k.as_str()))
            .collect();
        let get = |name: &str| vars.get(name).map(String::as_str).filter(|v| !v.is_empty());

        let classes = get(VAR_CLASSES)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let rootcmd = match get(VAR_ROOTCMD) {
            Some(raw) => shell_words::split(raw).map_err(|source| EnvError::InvalidRootCmd {
                value: raw.to_string(),
                source,
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            classes,
            config_space: get(VAR_CONFIG_SPACE).map(PathBuf::from),
            target: get(VAR_TARGET).map(PathBuf::from),
            rootcmd,
            action: get(VAR_ACTION).map(FaiAction::parse),
            logdir: get(VAR_LOGDIR).map(PathBuf::from),
        })
    }

    /// Read the variables from the live process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are treated as unset.
    pub fn from_process_env() -> Result<Self, EnvError> {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Load the process environment, then either fail on missing variables
    /// (`strict`) or just warn about them.
    pub fn load(strict: bool) -> Result<Self, EnvError> {
        let env = Self::from_process_env()?;
        if strict {
            env.validate()?;
        } else {
            env.warn_if_incomplete();
        }
        Ok(env)
    }

    /// Replace every field with values read from `vars`. On error `self` is
    /// left untouched.
    pub fn reload_from<I, K, V>(&mut self, vars: I) -> Result<(), EnvError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        *self = Self::from_vars(vars)?;
        Ok(())
    }

    /// Names of required variables that are unset. `$ROOTCMD` may be empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.config_space.is_none() {
            missing.push(VAR_CONFIG_SPACE);
        }
        if self.target.is_none() {
            missing.push(VAR_TARGET);
        }
        if self.action.is_none() {
            missing.push(VAR_ACTION);
        }
        if self.logdir.is_none() {
            missing.push(VAR_LOGDIR);
        }
        missing
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EnvError::Incomplete { missing })
        }
    }

    /// Data of the `env.incomplete` warning, `None` when nothing is missing
    fn incomplete_warning(&self) -> Option<serde_json::Value> {
        let missing = self.missing();
        if missing.is_empty() {
            return None;
        }
        Some(serde_json::json!({ "missing": missing }))
    }

    /// Emit a warning when required variables are unset. Returns whether the
    /// environment was incomplete.
    pub fn warn_if_incomplete(&self) -> bool {
        let Some(data) = self.incomplete_warning() else {
            return false;
        };
        ui::emit(Level::Warn, INCOMPLETE_CODE, INCOMPLETE_MESSAGE, Some(data));
        true
    }

    /// Check if the system installed/updated by FAI is online
    ///
    /// Some tasks such as starting a service are only possible when FAI runs
    /// within the target system, i.e. when `$target` is `/`.
    pub fn is_online(&self) -> bool {
        self.target.as_deref() == Some(Path::new("/"))
    }

    /// Whether `$FAI_ACTION` is `softupdate`
    pub fn is_softupdate(&self) -> bool {
        self.action
            .as_ref()
            .is_some_and(|action| *action == Action::SoftUpdate)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn target_root(&self) -> Result<&Path, PathError> {
        self.target.as_deref().ok_or(PathError::TargetUnset)
    }

    /// Resolve a target path against `$target`
    pub fn resolve(&self, target_path: &TargetPath) -> Result<InstallerPath, PathError> {
        paths::resolve(self.target_root()?, target_path)
    }

    /// Map a path below `$target` back into the target system
    pub fn unresolve(&self, installer_path: &InstallerPath) -> Result<TargetPath, PathError> {
        paths::unresolve(self.target_root()?, installer_path)
    }
}
