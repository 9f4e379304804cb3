#![allow(dead_code)]

use anyhow::Result;
use fai::FaiEnv;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway target root with a matching FAI environment
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        for dir in ["etc", "var/log/fai", "srv/fai/config"] {
            std::fs::create_dir_all(temp_dir.path().join(dir))?;
        }
        Ok(Self { temp_dir })
    }

    /// The target root (`$target`)
    pub fn target(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path below the target root
    pub fn installer_path(&self, relative: &str) -> PathBuf {
        self.target().join(relative.trim_start_matches('/'))
    }

    pub fn vars(&self) -> Vec<(String, String)> {
        let target = self.target().display().to_string();
        vec![
            ("classes".to_string(), "DEFAULT LINUX\nDEBIAN demohost LAST".to_string()),
            ("FAI".to_string(), format!("{target}/srv/fai/config")),
            ("target".to_string(), target.clone()),
            ("ROOTCMD".to_string(), format!("chroot {target}")),
            ("FAI_ACTION".to_string(), "install".to_string()),
            ("LOGDIR".to_string(), format!("{target}/var/log/fai")),
        ]
    }

    pub fn fai_env(&self) -> Result<FaiEnv> {
        Ok(FaiEnv::from_vars(self.vars())?)
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.installer_path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
