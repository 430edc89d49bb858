use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("wb_command binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Not a valid CIFTI file: {0}")]
    InvalidCifti(String),

    #[error("wb_command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Seed region '{0}' is not a label of the parcellation")]
    UnknownSeed(String),

    #[error("Parcel count mismatch: {0}")]
    LabelMismatch(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Cannot derive participant id: {0}")]
    Naming(String),

    #[error("Failed to lock {0}")]
    LockFailed(String),

    #[error("Existing table header does not match: {0}")]
    HeaderMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, SeedError>;
