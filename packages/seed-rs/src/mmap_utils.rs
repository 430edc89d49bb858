use crate::error::{Result, SeedError};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Open a file and map it into memory (read-only)
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(SeedError::IoError)?;
    let len = file.metadata().map_err(SeedError::IoError)?.len();
    if len == 0 {
        return Err(SeedError::InvalidCifti(format!(
            "{} is empty",
            path.display()
        )));
    }
    let mmap = unsafe { Mmap::map(&file).map_err(SeedError::IoError)? };
    Ok(mmap)
}
