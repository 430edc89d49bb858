//! File and directory naming conventions shared by the regressor and
//! aggregation steps.

use crate::error::{Result, SeedError};
use crate::types::{check_label, ParticipantId, REGRESSOR_SUFFIX};
use std::path::{Component, Path, PathBuf};

pub const DTSERIES_SUFFIX: &str = ".dtseries.nii";
pub const PTSERIES_SUFFIX: &str = ".ptseries.nii";
pub const FEAT_SUFFIX: &str = ".feat";
pub const ZSTAT_DIR: &str = "ParcellatedStats";
pub const ZSTAT_FILE: &str = "zstat1.ptseries.nii";

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SeedError::InvalidParameter(format!("{} has no file name", path.display())))
}

/// Input basename up to its first `.` (`sub-01_rest.dtseries.nii` -> `sub-01_rest`)
pub fn fmri_name(cifti_file: &Path) -> Result<String> {
    let name = file_name(cifti_file)?;
    let stem = name.split('.').next().unwrap_or(name);
    if stem.is_empty() {
        return Err(SeedError::InvalidParameter(format!(
            "Cannot derive an fMRI name from {}",
            cifti_file.display()
        )));
    }
    Ok(stem.to_string())
}

/// Input basename without the `.dtseries.nii` suffix (falls back to the first `.`)
pub fn cifti_prefix(cifti_file: &Path) -> Result<String> {
    let name = file_name(cifti_file)?;
    match name.strip_suffix(DTSERIES_SUFFIX) {
        Some(prefix) if !prefix.is_empty() => Ok(prefix.to_string()),
        _ => fmri_name(cifti_file),
    }
}

/// `<dir>/<prefix>_<parcel_name>.ptseries.nii`
pub fn parcellated_path(dir: &Path, cifti_file: &Path, parcel_name: &str) -> Result<PathBuf> {
    Ok(dir.join(format!(
        "{}_{}{}",
        cifti_prefix(cifti_file)?,
        parcel_name,
        PTSERIES_SUFFIX
    )))
}

/// Seed label encoded in a regressor file name
pub fn seed_label_from_regressor(regressor_file: &str) -> &str {
    regressor_file
        .strip_suffix(REGRESSOR_SUFFIX)
        .unwrap_or(regressor_file)
}

/// `<parcel_name><ica>_level<level>_seed<seed>`, the part shared by FEAT dirs and tables
pub fn analysis_tag(parcel_name: &str, ica_string: &str, level: u32, seed: &str) -> String {
    format!("{}{}_level{}_seed{}", parcel_name, ica_string, level, seed)
}

/// First-level FEAT directory of one run
pub fn feat_dir(
    output_dir: &Path,
    fmri_name: &str,
    parcel_name: &str,
    ica_string: &str,
    level: u32,
    seed: &str,
) -> PathBuf {
    output_dir.join(format!(
        "{}_{}{}",
        fmri_name,
        analysis_tag(parcel_name, ica_string, level, seed),
        FEAT_SUFFIX
    ))
}

/// Parcellated z-statistic map inside a FEAT directory
pub fn zstat_file(feat_dir: &Path) -> PathBuf {
    feat_dir.join(ZSTAT_DIR).join(ZSTAT_FILE)
}

/// fMRI name with its leading `sub-`/`ses-` entities removed, so all
/// participants of a study share one table name.
pub fn shared_run_name(fmri_name: &str) -> String {
    let rest: Vec<&str> = fmri_name
        .split('_')
        .skip_while(|field| field.starts_with("sub-") || field.starts_with("ses-"))
        .collect();
    if rest.is_empty() {
        fmri_name.to_string()
    } else {
        rest.join("_")
    }
}

/// Shared results table of one analysis
pub fn text_output_file(
    text_output_dir: &Path,
    fmri_name: &str,
    parcel_name: &str,
    ica_string: &str,
    level: u32,
    seed: &str,
    extension: &str,
) -> PathBuf {
    text_output_dir.join(format!(
        "{}_{}.{}",
        shared_run_name(fmri_name),
        analysis_tag(parcel_name, ica_string, level, seed),
        extension
    ))
}

/// Label of the single `<entity>-<label>` component among `parts`, if any.
///
/// The label runs up to the next `-`; differing labels in several components
/// are rejected.
fn entity_label(path: &Path, parts: &[&str], entity: &str) -> Result<Option<String>> {
    let prefix = format!("{}-", entity);
    let mut found: Option<String> = None;

    for part in parts {
        let Some(rest) = part.strip_prefix(&prefix) else {
            continue;
        };

        let label = rest.split('-').next().unwrap_or("");
        check_label(entity, label).map_err(|_| {
            SeedError::Naming(format!(
                "path component '{}' of {} does not carry a valid {} label",
                part,
                path.display(),
                entity
            ))
        })?;

        match found {
            Some(ref existing) if existing != label => {
                return Err(SeedError::Naming(format!(
                    "{} contains conflicting {} labels '{}' and '{}'",
                    path.display(),
                    entity,
                    existing,
                    label
                )));
            }
            Some(_) => {}
            None => found = Some(label.to_string()),
        }
    }

    Ok(found)
}

/// Subject and session encoded as `sub-<id>` / `ses-<id>` path components.
///
/// Only components at or below the first `sub-` directory are searched for
/// the session, so `/study/ses-x/sub-01` has no session.
pub fn participant_from_path(output_dir: &Path) -> Result<ParticipantId> {
    let parts: Vec<&str> = output_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let subject = entity_label(output_dir, &parts, "sub")?.ok_or_else(|| {
        SeedError::Naming(format!(
            "{} has no 'sub-<label>' component",
            output_dir.display()
        ))
    })?;

    let below_subject = parts
        .iter()
        .position(|p| p.starts_with("sub-"))
        .map_or(&parts[..0], |i| &parts[i..]);
    let session = entity_label(output_dir, below_subject, "ses")?;

    Ok(ParticipantId { subject, session })
}
