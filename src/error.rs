use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("required tool not found on PATH: {0}")]
    #[diagnostic(help("install the Nextstrain CLI / augur and make sure it is on PATH"))]
    MissingTool(String),

    #[error("failed to launch {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("step `{step}` failed ({status}): {command}")]
    StepFailed {
        step: String,
        status: String,
        command: String,
    },

    #[error("step `{step}` needs {artifact}, which no earlier step produced")]
    MissingArtifact { step: String, artifact: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("input file does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("input file is empty: {0}")]
    EmptyInput(PathBuf),

    #[error("malformed metadata: {0}")]
    Metadata(String),

    #[error("invalid species pattern: {0}")]
    InvalidPattern(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("invalid accession `{0}`: must not contain path separators or `..`")]
    InvalidAccession(String),

    #[error("NCBI returned no FASTA record for {0}")]
    EmptyRecord(String),
}
