//! File handling in the target system
//!
//! All functions here take [`TargetPath`]s. Mode changes and directory
//! creation happen on the resolved installer path, while ownership is set by
//! running `chown` inside the target so user and group names are looked up in
//! the target's own databases.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

use crate::command::{CommandOutput, Executor, Runner};
use crate::error::{FaiError, Result};
use crate::paths::TargetPath;
use crate::ui;

/// Desired mode and owner of a file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub mode: u32,
    pub user: String,
    pub group: String,
}

impl Ownership {
    /// `0644 root:root`
    pub fn file() -> Self {
        Self {
            mode: 0o644,
            user: "root".to_string(),
            group: "root".to_string(),
        }
    }

    /// `0755 root:root`
    pub fn directory() -> Self {
        Self {
            mode: 0o755,
            ..Self::file()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Reject names that `chown` could take for an option
    pub fn validate(&self) -> Result<()> {
        for name in [&self.user, &self.group] {
            if name.is_empty() || name.starts_with('-') {
                return Err(FaiError::InvalidOwner(name.clone()));
            }
        }
        Ok(())
    }

    fn chown_arg(&self) -> String {
        format!("{}:{}", self.user, self.group)
    }
}

/// Change mode and owner/group of a file
///
/// Fails with an IO error if `path` does not exist. Idempotent.
pub fn chmod<E: Executor>(
    runner: &Runner<'_, E>,
    path: &TargetPath,
    ownership: &Ownership,
) -> Result<()> {
    ownership.validate()?;
    let resolved = runner.env().resolve(path)?;

    if runner.is_dry_run() {
        println!("[DRY RUN] chmod {:o} {}", ownership.mode, resolved);
    } else {
        ui::debug("files.chmod", &format!("chmod {:o} {}", ownership.mode, resolved));
        fs::set_permissions(&resolved, fs::Permissions::from_mode(ownership.mode)).map_err(
            |source| FaiError::Io {
                path: resolved.clone().into_path_buf(),
                source,
            },
        )?;
    }

    // we need to run this in the target to resolve user names correctly
    runner.run(["chown".to_string(), ownership.chown_arg(), path.to_string()])?;
    Ok(())
}

/// Create a directory in the target, including missing parents
///
/// Parents are created with default mode and owner. Fails if `path` exists
/// but is not a directory. Idempotent.
pub fn mkdir<E: Executor>(
    runner: &Runner<'_, E>,
    path: &TargetPath,
    ownership: &Ownership,
) -> Result<()> {
    ownership.validate()?;
    let resolved = runner.env().resolve(path)?;

    if runner.is_dry_run() {
        println!("[DRY RUN] mkdir -p -m {:o} {}", ownership.mode, resolved);
    } else {
        ui::debug("files.mkdir", &format!("mkdir -p {}", resolved));
        let io_error = |source| FaiError::Io {
            path: resolved.clone().into_path_buf(),
            source,
        };
        if let Some(parent) = resolved.as_path().parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        match fs::DirBuilder::new().mode(ownership.mode).create(&resolved) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && resolved.as_path().is_dir() => {}
            Err(e) => return Err(io_error(e)),
        }
    }

    chmod(runner, path, ownership)
}

/// Options for `fcopy(8)`
///
/// See <https://fai-project.org/doc/man/fcopy.html>.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcopyOptions {
    /// `-r`
    pub recursively: bool,
    /// Owner, group and mode, passed together as `-m`
    pub ownership: Ownership,
    /// Remove `*.pre_fcopy` backup files (`-B`)
    pub remove_backup: bool,
    /// Delete target files when no class applies (`-d`)
    pub delete_orphan: bool,
    /// Ignore warnings when no class applies (`-i`)
    pub ignore_warnings: bool,
}

impl Default for FcopyOptions {
    fn default() -> Self {
        Self {
            recursively: false,
            ownership: Ownership::file(),
            remove_backup: true,
            delete_orphan: true,
            ignore_warnings: true,
        }
    }
}

impl FcopyOptions {
    /// The full `fcopy` argument vector for `paths`
    pub fn command(&self, paths: &[TargetPath]) -> Vec<String> {
        let o = &self.ownership;
        let mut args = vec![
            "fcopy".to_string(),
            "-v".to_string(),
            "-m".to_string(),
            format!("{},{},{:o}", o.user, o.group, o.mode),
        ];

        let flags = [
            ("-B", self.remove_backup),
            ("-d", self.delete_orphan),
            ("-i", self.ignore_warnings),
            ("-r", self.recursively),
        ];
        args.extend(
            flags
                .into_iter()
                .filter(|(_, enabled)| *enabled)
                .map(|(flag, _)| flag.to_string()),
        );

        args.extend(paths.iter().map(ToString::to_string));
        args
    }
}

/// Run `fcopy(8)` in the installer for the given target paths
pub fn fcopy<E: Executor>(
    runner: &Runner<'_, E>,
    paths: &[TargetPath],
    options: &FcopyOptions,
) -> Result<CommandOutput> {
    options.ownership.validate()?;
    Ok(runner.run_installer(options.command(paths))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RecordingExecutor;
    use crate::error::PathError;
    use crate::env::FaiEnv;
    use std::path::Path;
    use tempfile::TempDir;

    fn target_env(root: &Path) -> FaiEnv {
        FaiEnv::from_vars([
            ("target", root.to_str().unwrap().to_string()),
            ("ROOTCMD", format!("chroot {}", root.display())),
        ])
        .unwrap()
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    fn fai_files() -> Vec<TargetPath> {
        vec![
            TargetPath::from("/etc/network/interfaces"),
            TargetPath::from("/etc/fai/fai.conf"),
        ]
    }

    #[test]
    fn test_fcopy_defaults() {
        let env = FaiEnv::from_vars([("target", "/target")]).unwrap();
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        fcopy(&runner, &fai_files(), &FcopyOptions::default()).unwrap();
        assert_eq!(
            runner.executor().commands(),
            vec![vec![
                "fcopy",
                "-v",
                "-m",
                "root,root,644",
                "-B",
                "-d",
                "-i",
                "/etc/network/interfaces",
                "/etc/fai/fai.conf",
            ]]
        );
    }

    #[test]
    fn test_fcopy_all_flags_toggled() {
        let options = FcopyOptions {
            recursively: true,
            ownership: Ownership::file()
                .with_user("www-data")
                .with_group("adm")
                .with_mode(0o640),
            remove_backup: false,
            delete_orphan: false,
            ignore_warnings: false,
        };
        assert_eq!(
            options.command(&[TargetPath::from("/etc/nginx")]),
            vec!["fcopy", "-v", "-m", "www-data,adm,640", "-r", "/etc/nginx"]
        );
    }

    #[test]
    fn test_fcopy_runs_in_installer() {
        let env =
            FaiEnv::from_vars([("target", "/target"), ("ROOTCMD", "chroot /target")]).unwrap();
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        fcopy(&runner, &fai_files(), &FcopyOptions::default()).unwrap();
        assert_eq!(runner.executor().commands()[0][0], "fcopy");
    }

    #[test]
    fn test_fcopy_propagates_failure() {
        let env = FaiEnv::from_vars([("target", "/target")]).unwrap();
        let runner = Runner::with_executor(&env, RecordingExecutor::failing(1));
        let err = fcopy(&runner, &fai_files(), &FcopyOptions::default()).unwrap_err();
        assert!(matches!(err, FaiError::Command(_)));
    }

    #[test]
    fn test_chmod_sets_mode_and_runs_chown_in_target() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(root.path().join("etc/shadow"), "").unwrap();

        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let ownership = Ownership::file().with_mode(0o640).with_group("shadow");
        chmod(&runner, &TargetPath::from("/etc/shadow"), &ownership).unwrap();

        assert_eq!(mode_of(&root.path().join("etc/shadow")), 0o640);
        assert_eq!(
            runner.executor().commands(),
            vec![vec![
                "chroot".to_string(),
                root.path().display().to_string(),
                "chown".to_string(),
                "root:shadow".to_string(),
                "/etc/shadow".to_string(),
            ]]
        );
    }

    #[test]
    fn test_chmod_is_idempotent() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("motd"), "hi").unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let path = TargetPath::from("/motd");

        chmod(&runner, &path, &Ownership::file()).unwrap();
        chmod(&runner, &path, &Ownership::file()).unwrap();

        assert_eq!(mode_of(&root.path().join("motd")), 0o644);
        let commands = runner.executor().commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], commands[1]);
    }

    #[test]
    fn test_chmod_missing_file() {
        let root = TempDir::new().unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let err = chmod(&runner, &TargetPath::from("/nope"), &Ownership::file()).unwrap_err();
        match err {
            FaiError::Io { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
        assert!(runner.executor().calls().is_empty());
    }

    #[test]
    fn test_chmod_rejects_option_like_owner() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("file"), "").unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());

        for ownership in [
            Ownership::file().with_user("--reference=/etc/shadow"),
            Ownership::file().with_group("-R"),
            Ownership::file().with_user(""),
        ] {
            let err = chmod(&runner, &TargetPath::from("/file"), &ownership).unwrap_err();
            assert!(matches!(err, FaiError::InvalidOwner(_)));
        }
        assert!(runner.executor().calls().is_empty());
    }

    #[test]
    fn test_chmod_without_target() {
        let env = FaiEnv::default();
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let err = chmod(&runner, &TargetPath::from("/etc/hosts"), &Ownership::file()).unwrap_err();
        assert!(matches!(err, FaiError::Path(PathError::TargetUnset)));
    }

    #[test]
    fn test_mkdir_creates_parents() {
        let root = TempDir::new().unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let ownership = Ownership::directory().with_mode(0o750).with_user("fai");

        mkdir(&runner, &TargetPath::from("/srv/fai/config"), &ownership).unwrap();

        let created = root.path().join("srv/fai/config");
        assert!(created.is_dir());
        assert_eq!(mode_of(&created), 0o750);
        assert_eq!(runner.executor().commands()[0][2..], ["chown", "fai:root", "/srv/fai/config"]);
    }

    #[test]
    fn test_mkdir_leaves_parent_mode_alone() {
        let root = TempDir::new().unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let ownership = Ownership::directory().with_mode(0o700);

        mkdir(&runner, &TargetPath::from("/srv/secret"), &ownership).unwrap();

        assert_eq!(mode_of(&root.path().join("srv/secret")), 0o700);
        fs::create_dir(root.path().join("reference")).unwrap();
        assert!(root.path().join("srv").is_dir());
        assert_eq!(
            mode_of(&root.path().join("srv")),
            mode_of(&root.path().join("reference"))
        );
        assert_eq!(runner.executor().calls().len(), 1);
    }

    #[test]
    fn test_mkdir_is_idempotent() {
        let root = TempDir::new().unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let path = TargetPath::from("var/lib/app");

        mkdir(&runner, &path, &Ownership::directory()).unwrap();
        mkdir(&runner, &path, &Ownership::directory()).unwrap();

        assert_eq!(mode_of(&root.path().join("var/lib/app")), 0o755);
        assert_eq!(runner.executor().calls().len(), 2);
    }

    #[test]
    fn test_mkdir_over_file_fails() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("blocker"), "").unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, RecordingExecutor::new());
        let err =
            mkdir(&runner, &TargetPath::from("/blocker"), &Ownership::directory()).unwrap_err();
        assert!(matches!(err, FaiError::Io { .. }));
    }

    #[test]
    fn test_dry_run_leaves_filesystem_alone() {
        let root = TempDir::new().unwrap();
        let env = target_env(root.path());
        let runner = Runner::with_executor(&env, crate::command::DryRunExecutor);

        mkdir(&runner, &TargetPath::from("/opt/tool"), &Ownership::directory()).unwrap();

        assert!(!root.path().join("opt").exists());
    }
}
