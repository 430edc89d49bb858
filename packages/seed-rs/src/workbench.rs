use crate::error::{Result, SeedError};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Connectome Workbench command-line binary
pub const BINARY_NAME: &str = "wb_command";

/// Environment variable holding the full binary path
pub const BINARY_ENV_VAR: &str = "WB_COMMAND";

/// Environment variable holding the Workbench install root
pub const BINARY_HOME_ENV_VAR: &str = "WORKBENCH_HOME";

/// Platform binary directories below a Workbench install root
pub const PLATFORM_BIN_DIRS: &[&str] = &["bin_rh_linux64", "bin_linux64", "bin_macosx64"];

/// Default install locations searched after the environment
pub const DEFAULT_BINARY_PATHS: &[&str] = &[
    "/opt/workbench/bin_rh_linux64",
    "/opt/workbench/bin_linux64",
    "/usr/local/workbench/bin_linux64",
    "/Applications/workbench/bin_macosx64",
    "~/workbench/bin_linux64",
];

/// Orientation token passed to `-cifti-parcellate` (parcellate along columns)
pub const PARCELLATE_DIRECTION: &str = "COLUMN";

fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Find the `wb_command` binary.
///
/// Search order:
/// 1. Explicit path (returned only if it exists)
/// 2. `$WB_COMMAND`
/// 3. `$WORKBENCH_HOME/<platform dir>/wb_command`
/// 4. `wb_command` on `$PATH`
/// 5. [`DEFAULT_BINARY_PATHS`]
pub fn find_binary(explicit_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        let p = expand_path(path);
        return if p.is_file() { Some(p) } else { None };
    }

    if let Ok(env_path) = std::env::var(BINARY_ENV_VAR) {
        let p = expand_path(&env_path);
        if p.is_file() {
            return Some(p);
        }
    }

    if let Ok(home_path) = std::env::var(BINARY_HOME_ENV_VAR) {
        let home = expand_path(&home_path);
        for dir in PLATFORM_BIN_DIRS {
            let p = home.join(dir).join(BINARY_NAME);
            if p.is_file() {
                return Some(p);
            }
        }
    }

    if let Ok(p) = which::which(BINARY_NAME) {
        return Some(p);
    }

    DEFAULT_BINARY_PATHS
        .iter()
        .map(|dir| expand_path(dir).join(BINARY_NAME))
        .find(|p| p.is_file())
}

/// Like [`find_binary`] but with a descriptive error
pub fn require_binary(explicit_path: Option<&str>) -> Result<PathBuf> {
    find_binary(explicit_path).ok_or_else(|| match explicit_path {
        Some(path) => SeedError::BinaryNotFound(path.to_string()),
        None => SeedError::BinaryNotFound(format!(
            "{} not found. Set ${}, ${}, add it to $PATH, or install it in one of {:?}",
            BINARY_NAME, BINARY_ENV_VAR, BINARY_HOME_ENV_VAR, DEFAULT_BINARY_PATHS
        )),
    })
}

/// Runs Connectome Workbench commands
#[derive(Debug, Clone)]
pub struct WorkbenchRunner {
    binary_path: PathBuf,
}

impl WorkbenchRunner {
    /// Create a runner for the binary at `binary_path`
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_path = binary_path.as_ref().to_path_buf();

        if !binary_path.is_file() {
            return Err(SeedError::BinaryNotFound(binary_path.display().to_string()));
        }

        Ok(Self { binary_path })
    }

    /// Create a runner using [`find_binary`] discovery
    pub fn discover() -> Result<Self> {
        Self::new(require_binary(None)?)
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// `wb_command -cifti-parcellate <input> <parcellation> COLUMN <output>`
    ///
    /// Fails when the process cannot be spawned, exits non-zero, or leaves no
    /// output file behind.
    pub async fn parcellate(&self, input: &Path, parcellation: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("-cifti-parcellate")
            .arg(input)
            .arg(parcellation)
            .arg(PARCELLATE_DIRECTION)
            .arg(output);

        log::info!("Executing workbench command: {:?}", command);

        let start_time = std::time::Instant::now();
        let result = command.output().await.map_err(|e| {
            SeedError::ExecutionFailed(format!(
                "Failed to execute {}: {}",
                self.binary_path.display(),
                e
            ))
        })?;

        log::info!(
            "wb_command finished in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        if !result.status.success() {
            let stdout_str = String::from_utf8_lossy(&result.stdout);
            let stderr_str = String::from_utf8_lossy(&result.stderr);

            log::error!("wb_command failed with status: {}", result.status);
            log::error!("stdout: {}", stdout_str);
            log::error!("stderr: {}", stderr_str);

            return Err(SeedError::ExecutionFailed(format!(
                "-cifti-parcellate failed with status: {}. stderr: {}",
                result.status,
                stderr_str.trim()
            )));
        }

        if !output.is_file() {
            return Err(SeedError::ExecutionFailed(format!(
                "-cifti-parcellate exited successfully but did not create {}",
                output.display()
            )));
        }

        Ok(())
    }
}
