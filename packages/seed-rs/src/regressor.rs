use crate::cifti::{self, CiftiImage};
use crate::context::SeedContext;
use crate::error::{Result, SeedError};
use crate::types::SeedSelection;
use crate::workbench::WorkbenchRunner;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Shortest text that reads back to the same `f64`, in the form pandas writes:
/// `2.0`, `0.1`, `1e-07`, `1e+20`, `inf`; NaN becomes an empty field.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let text = format!("{:?}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

/// Regressor time series of `seeds` from a time × parcel matrix.
///
/// Columns of `image` are named by `labels`. One seed yields its column
/// unchanged; several yield the row-wise arithmetic mean.
pub fn seed_timeseries(
    image: &CiftiImage,
    labels: &[String],
    seeds: &SeedSelection,
) -> Result<Vec<f64>> {
    if image.cols() != labels.len() {
        return Err(SeedError::LabelMismatch(format!(
            "parcellated data has {} columns but the parcellation has {} labels",
            image.cols(),
            labels.len()
        )));
    }

    let columns = seeds
        .names()
        .into_iter()
        .map(|seed| {
            labels
                .iter()
                .position(|l| l == seed)
                .ok_or_else(|| SeedError::UnknownSeed(seed.to_string()))
        })
        .collect::<Result<Vec<usize>>>()?;

    if let [col] = columns.as_slice() {
        return Ok(image.column(*col));
    }

    if columns.is_empty() {
        return Err(SeedError::InvalidParameter(
            "At least one seed region must be specified".to_string(),
        ));
    }

    let n = columns.len() as f64;
    Ok((0..image.rows())
        .map(|row| columns.iter().map(|&c| image.value(row, c)).sum::<f64>() / n)
        .collect())
}

/// One value per line, no header
pub fn write_regressor_file(path: &Path, values: &[f64]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &v in values {
        writeln!(writer, "{}", format_value(v))?;
    }
    writer.flush()?;
    Ok(())
}

fn warn_on_parcel_name_drift(image: &CiftiImage, labels: &[String], path: &Path) {
    let parcels = &image.xml.parcels;
    if parcels.is_empty() || parcels.as_slice() == labels {
        return;
    }
    log::warn!(
        "Parcel names in {:?} differ from the parcellation labels; columns are assigned by label order",
        path
    );
    if let Some((i, (p, l))) = parcels
        .iter()
        .zip(labels)
        .enumerate()
        .find(|(_, (p, l))| p != l)
    {
        log::warn!("First difference at column {}: '{}' vs '{}'", i, p, l);
    }
}

impl SeedContext {
    /// Parcellate the input time series and write the seed regressor.
    ///
    /// Leaves the parcellated time series next to the input (or in the
    /// configured `parcellated_dir`) and returns the regressor file path.
    pub async fn write_regressor(&self, runner: &WorkbenchRunner) -> Result<PathBuf> {
        log::info!("Create regressor file");
        log::info!("  Output folder: {:?}", self.output_dir());
        log::info!("  CIFTI file: {:?}", self.cifti_file());
        log::info!("  Parcel file: {:?}", self.parcel_file());
        log::info!("  Seed ROI name: {}", self.seeds());

        cifti::validate(self.cifti_file())?;

        let parcellated = self.parcellated_path()?;
        if let Some(dir) = parcellated.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        runner
            .parcellate(self.cifti_file(), self.parcel_file(), &parcellated)
            .await?;

        cifti::validate(&parcellated)?;
        let image = cifti::read_cifti(&parcellated)?;
        warn_on_parcel_name_drift(&image, self.parcel_labels(), &parcellated);

        let values = seed_timeseries(&image, self.parcel_labels(), self.seeds())?;

        let regressor_path = self.regressor_path();
        write_regressor_file(&regressor_path, &values)?;

        log::info!(
            "  Regressor file: {:?} ({} timepoints)",
            regressor_path,
            values.len()
        );

        Ok(regressor_path)
    }
}
