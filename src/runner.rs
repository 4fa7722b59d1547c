use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::BuildError;
use crate::pipeline::Invocation;

/// How an external program finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn failed(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait CommandRunner {
    fn ensure_available(&self, program: &str) -> Result<(), BuildError>;
    fn execute(&self, invocation: &Invocation) -> Result<ExitOutcome, BuildError>;
}

/// Runs programs found on `PATH`, letting them write straight to the terminal.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, program: &str) -> Result<PathBuf, BuildError> {
        find_in_path(program).ok_or_else(|| BuildError::MissingTool(program.to_string()))
    }
}

impl CommandRunner for SystemCommandRunner {
    fn ensure_available(&self, program: &str) -> Result<(), BuildError> {
        let path = self.resolve(program)?;
        debug!("found {} at {}", program, path.display());
        Ok(())
    }

    fn execute(&self, invocation: &Invocation) -> Result<ExitOutcome, BuildError> {
        let program = self.resolve(&invocation.program)?;
        let status = Command::new(&program)
            .args(&invocation.args)
            .status()
            .map_err(|err| BuildError::Spawn {
                program: program.display().to_string(),
                message: err.to_string(),
            })?;
        Ok(ExitOutcome {
            code: status.code(),
        })
    }
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let direct = Path::new(name);
        return direct.exists().then(|| direct.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
