use crate::cifti;
use crate::error::{Result, SeedError};
use crate::naming;
use crate::types::{SeedConfig, SeedSelection};
use std::path::{Path, PathBuf};

/// Analysis context of one seed run.
///
/// Construction creates the output directory and reads the parcellation
/// labels once; the label order is then reused for every column selection
/// and as the header of aggregated tables.
#[derive(Debug, Clone)]
pub struct SeedContext {
    config: SeedConfig,
    fmri_name: String,
    parcel_labels: Vec<String>,
    regressor_file: String,
}

impl SeedContext {
    pub fn new(config: SeedConfig) -> Result<Self> {
        config.validate()?;

        if !config.output_dir.is_dir() {
            std::fs::create_dir_all(&config.output_dir)?;
            log::debug!("Created output directory {:?}", config.output_dir);
        }

        let fmri_name = naming::fmri_name(&config.cifti_file)?;
        let parcel_labels = cifti::read_label_names(&config.parcel_file)?;

        if parcel_labels.is_empty() {
            return Err(SeedError::InvalidCifti(format!(
                "{}: label table has no labelled parcels",
                config.parcel_file.display()
            )));
        }

        for seed in config.seeds.names() {
            if !parcel_labels.iter().any(|l| l == seed) {
                return Err(SeedError::UnknownSeed(seed.to_string()));
            }
        }

        let regressor_file = config.seeds.regressor_file_name();

        log::debug!(
            "Context for {}: {} parcels from {:?}, regressor {}",
            fmri_name,
            parcel_labels.len(),
            config.parcel_file,
            regressor_file
        );

        Ok(Self {
            config,
            fmri_name,
            parcel_labels,
            regressor_file,
        })
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn cifti_file(&self) -> &Path {
        &self.config.cifti_file
    }

    pub fn parcel_file(&self) -> &Path {
        &self.config.parcel_file
    }

    pub fn parcel_name(&self) -> &str {
        &self.config.parcel_name
    }

    pub fn seeds(&self) -> &SeedSelection {
        &self.config.seeds
    }

    /// Input basename up to its first `.`
    pub fn fmri_name(&self) -> &str {
        &self.fmri_name
    }

    /// Labelled parcels in parcellation file order
    pub fn parcel_labels(&self) -> &[String] {
        &self.parcel_labels
    }

    /// Regressor file name (not path)
    pub fn regressor_file(&self) -> &str {
        &self.regressor_file
    }

    pub fn regressor_path(&self) -> PathBuf {
        self.config.output_dir.join(&self.regressor_file)
    }

    /// Where `-cifti-parcellate` writes the parcellated time series
    pub fn parcellated_path(&self) -> Result<PathBuf> {
        let dir = match self.config.parcellated_dir {
            Some(ref dir) => dir.clone(),
            None => self
                .config
                .cifti_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        naming::parcellated_path(&dir, &self.config.cifti_file, &self.config.parcel_name)
    }
}
