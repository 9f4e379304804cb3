use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use fai::ui::prelude::*;
use fai::ui;
use fai::{
    DryRunExecutor, Executor, FaiEnv, FcopyOptions, InstallerPath, Ownership, RunOptions, Runner,
    SystemExecutor, TargetPath,
};

/// faictl - FAI environment and target helpers
#[derive(Parser, Debug)]
#[command(name = "faictl", author, version, about, long_about = None)]
pub struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Print JSON events instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print commands and filesystem changes instead of performing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Fail instead of warning when FAI variables are missing
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the FAI environment
    Env,
    /// Fail if required FAI variables are missing
    Validate,
    /// Check whether FAI runs inside the live target (softupdate)
    Online,
    /// Translate target paths to installer paths
    Resolve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Translate installer paths below $target to target paths
    Unresolve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Run a command in the target (prefixed with $ROOTCMD)
    Run {
        /// Run in the installer instead of the target
        #[arg(long)]
        installer: bool,
        /// Exit with the command's status instead of failing
        #[arg(long)]
        no_check: bool,
        /// Command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Change mode and owner of a file in the target
    Chmod {
        path: PathBuf,
        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// Create a directory in the target
    Mkdir {
        path: PathBuf,
        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// Install files from the config space with fcopy(8)
    Fcopy {
        /// Copy recursively (-r)
        #[arg(short, long)]
        recursive: bool,
        #[command(flatten)]
        owner: OwnerArgs,
        /// Keep *.pre_fcopy backup files (no -B)
        #[arg(long)]
        keep_backup: bool,
        /// Keep target files when no class applies (no -d)
        #[arg(long)]
        keep_orphan: bool,
        /// Do not ignore warnings when no class applies (no -i)
        #[arg(long)]
        no_ignore_warnings: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct OwnerArgs {
    /// Mode in octal
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<u32>,
    /// Owner
    #[arg(short, long, default_value = "root")]
    pub user: String,
    /// Group
    #[arg(short, long, default_value = "root")]
    pub group: String,
}

impl OwnerArgs {
    fn ownership(&self, defaults: Ownership) -> Ownership {
        let mode = self.mode.unwrap_or(defaults.mode);
        defaults
            .with_mode(mode)
            .with_user(self.user.clone())
            .with_group(self.group.clone())
    }
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {s}"))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: {s}"));
    }
    Ok(mode)
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_env(env: &FaiEnv) -> Result<()> {
    if get_output_format() == OutputFormat::Json {
        let mut value = serde_json::to_value(env)?;
        value["online"] = serde_json::Value::Bool(env.is_online());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let rows = [
        ("classes", env.classes.join(" ")),
        ("FAI", display_path(&env.config_space)),
        ("target", display_path(&env.target)),
        ("ROOTCMD", shell_words::join(&env.rootcmd)),
        (
            "FAI_ACTION",
            env.action
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("LOGDIR", display_path(&env.logdir)),
        ("online", if env.is_online() { "yes" } else { "no" }.to_string()),
    ];
    for (name, value) in rows {
        println!("{}{}", format!("{:<12}", format!("{name}:")).bold(), value);
    }
    Ok(())
}

fn emit_mapping(code: &str, from: &str, to: &str) {
    emit(
        Level::Info,
        code,
        to,
        Some(serde_json::json!({ "from": from, "to": to })),
    );
}

/// Execute the parsed command line. Returns the process exit code.
pub fn handle(cli: Cli) -> Result<i32> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    ui::init(format, !cli.no_color);
    ui::set_debug_mode(cli.debug);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let strict = cli.strict || matches!(cli.command, Commands::Validate);
    let env = FaiEnv::load(strict).context("Failed to load FAI environment")?;

    let executor: Box<dyn Executor> = if cli.dry_run {
        Box::new(DryRunExecutor)
    } else {
        Box::new(SystemExecutor)
    };
    let runner = Runner::with_executor(&env, executor);

    match cli.command {
        Commands::Env => {
            print_env(&env)?;
            Ok(0)
        }
        Commands::Validate => {
            emit(
                Level::Success,
                "env.valid",
                "FAI environment is complete",
                None,
            );
            Ok(0)
        }
        Commands::Online => {
            let online = env.is_online();
            emit(
                Level::Info,
                "env.online",
                if online { "online" } else { "offline" },
                Some(serde_json::json!({ "online": online })),
            );
            Ok(if online { 0 } else { 1 })
        }
        Commands::Resolve { paths } => {
            for path in paths {
                let target_path = TargetPath::from(path);
                let resolved = env
                    .resolve(&target_path)
                    .with_context(|| format!("Cannot resolve {}", target_path))?;
                emit_mapping("path.resolve", &target_path.to_string(), &resolved.to_string());
            }
            Ok(0)
        }
        Commands::Unresolve { paths } => {
            for path in paths {
                let installer_path = InstallerPath::from(path);
                let unresolved = env
                    .unresolve(&installer_path)
                    .with_context(|| format!("Cannot unresolve {}", installer_path))?;
                emit_mapping(
                    "path.unresolve",
                    &installer_path.to_string(),
                    &unresolved.to_string(),
                );
            }
            Ok(0)
        }
        Commands::Run {
            installer,
            no_check,
            args,
        } => {
            let mut options = RunOptions::new().inherit_stdout();
            if no_check {
                options = options.unchecked();
            }
            let output = if installer {
                runner.run_installer_with(args, &options)?
            } else {
                runner.run_with(args, &options)?
            };
            Ok(output.code.unwrap_or(1))
        }
        Commands::Chmod { path, owner } => {
            let ownership = owner.ownership(Ownership::file());
            chmod_or_mkdir(&runner, &path, &ownership, false)?;
            Ok(0)
        }
        Commands::Mkdir { path, owner } => {
            let ownership = owner.ownership(Ownership::directory());
            chmod_or_mkdir(&runner, &path, &ownership, true)?;
            Ok(0)
        }
        Commands::Fcopy {
            recursive,
            owner,
            keep_backup,
            keep_orphan,
            no_ignore_warnings,
            paths,
        } => {
            let options = FcopyOptions {
                recursively: recursive,
                ownership: owner.ownership(Ownership::file()),
                remove_backup: !keep_backup,
                delete_orphan: !keep_orphan,
                ignore_warnings: !no_ignore_warnings,
            };
            let paths: Vec<TargetPath> = paths.into_iter().map(TargetPath::from).collect();
            let output = fai::fcopy(&runner, &paths, &options).context("fcopy failed")?;
            print!("{}", output.stdout);
            Ok(0)
        }
    }
}

fn chmod_or_mkdir<E: Executor>(
    runner: &Runner<'_, E>,
    path: &Path,
    ownership: &Ownership,
    create: bool,
) -> Result<()> {
    let target_path = TargetPath::from(path.to_path_buf());
    if create {
        fai::mkdir(runner, &target_path, ownership)
            .with_context(|| format!("Failed to create {}", target_path))?;
    } else {
        fai::chmod(runner, &target_path, ownership)
            .with_context(|| format!("Failed to chmod {}", target_path))?;
    }
    emit(
        Level::Success,
        if create { "files.mkdir" } else { "files.chmod" },
        &format!(
            "{} {:o} {}:{}",
            target_path, ownership.mode, ownership.user, ownership.group
        ),
        None,
    );
    Ok(())
}
