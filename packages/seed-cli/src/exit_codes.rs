use seed_rs::SeedError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
pub const BINARY_NOT_FOUND: i32 = 3;
pub const LOCK_ERROR: i32 = 4;

/// Exit code for a library error
pub fn for_error(err: &SeedError) -> i32 {
    match err {
        SeedError::BinaryNotFound(_) => BINARY_NOT_FOUND,
        SeedError::LockFailed(_) => LOCK_ERROR,
        SeedError::FileNotFound(_)
        | SeedError::InvalidCifti(_)
        | SeedError::UnknownSeed(_)
        | SeedError::LabelMismatch(_)
        | SeedError::InvalidParameter(_)
        | SeedError::Naming(_)
        | SeedError::HeaderMismatch(_)
        | SeedError::Config(_) => INPUT_ERROR,
        SeedError::ExecutionFailed(_) | SeedError::IoError(_) | SeedError::CsvError(_) => {
            EXECUTION_ERROR
        }
    }
}
