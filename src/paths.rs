//! Target and installer paths
//!
//! A [`TargetPath`] is a virtual path inside the system being installed. It is
//! always rooted at `/` of that system and never handed to filesystem calls,
//! since during an install the target is only reachable below `$target`.
//! An [`InstallerPath`] is a physical path in the currently running system and
//! can be used with `std::fs` directly.
//!
//! During softupdate `$target` is `/`, so both kinds of path to the same file
//! have the same value while still being distinct types.
//!
//! Use [`resolve`] and [`unresolve`] (or the [`FaiEnv`](crate::FaiEnv)
//! methods of the same name) to convert between them.

use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Virtual path in the target system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetPath(PathBuf);

impl TargetPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// `/` of the target system
    pub fn root() -> Self {
        Self(PathBuf::from("/"))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn join(&self, path: impl AsRef<Path>) -> Self {
        Self(self.0.join(path))
    }

    pub fn is_absolute(&self) -> bool {
        self.0.is_absolute()
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    /// The path with any leading `/` removed
    ///
    /// `..` is kept as long as it stays inside the target; climbing above `/`
    /// is an error, and so is a path that ends at the root itself.
    pub fn relative(&self) -> Result<PathBuf, PathError> {
        let mut relative = PathBuf::new();
        let mut depth = 0usize;
        for component in self.0.components() {
            match component {
                Component::Normal(part) => {
                    relative.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| PathError::EscapesTarget(self.0.clone()))?;
                    relative.push(component);
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        if depth == 0 {
            return Err(PathError::TargetRoot(self.0.clone()));
        }
        Ok(relative)
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for TargetPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for TargetPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for TargetPath {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Physical path in the installer system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstallerPath(PathBuf);

impl InstallerPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn join(&self, path: impl AsRef<Path>) -> Self {
        Self(self.0.join(path))
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.0.display()
    }
}

impl AsRef<Path> for InstallerPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for InstallerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for InstallerPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for InstallerPath {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Resolve a path in the target system against `target_root`
///
/// The result is `target_root` joined with `target_path` minus its leading
/// `/`, so it is absolute (given an absolute root) and strictly below the
/// target root.
pub fn resolve(target_root: &Path, target_path: &TargetPath) -> Result<InstallerPath, PathError> {
    let relative = target_path.relative()?;
    Ok(InstallerPath(target_root.join(relative)))
}

/// Find the target path for a path below `target_root`
pub fn unresolve(
    target_root: &Path,
    installer_path: &InstallerPath,
) -> Result<TargetPath, PathError> {
    let relative = installer_path
        .as_path()
        .strip_prefix(target_root)
        .map_err(|_| PathError::OutsideTarget {
            path: installer_path.as_path().to_path_buf(),
            target: target_root.to_path_buf(),
        })?;
    Ok(TargetPath::root().join(relative))
}
