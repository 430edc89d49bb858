//! Shared results table of first-level z-statistics.
//!
//! Many independent invocations (one per subject/session) append to the same
//! table. Every write happens under an exclusive advisory lock held across
//! the whole check-then-write sequence, so the first writer creates the
//! header exactly once and later writers only append.

use crate::cifti;
use crate::context::SeedContext;
use crate::error::{Result, SeedError};
use crate::naming;
use crate::regressor::format_value;
use crate::types::{
    AppendOutcome, LockMode, ParticipantId, TextOutputReport, TextOutputRequest,
};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const SUBJECT_COLUMN: &str = "Subject ID";
pub const SESSION_COLUMN: &str = "Session ID";

/// `Subject ID[, Session ID], <labels...>`
pub fn table_header(labels: &[String], with_session: bool) -> Vec<String> {
    let mut header = Vec::with_capacity(labels.len() + 2);
    header.push(SUBJECT_COLUMN.to_string());
    if with_session {
        header.push(SESSION_COLUMN.to_string());
    }
    header.extend(labels.iter().cloned());
    header
}

/// Identifying columns followed by one value per parcel
pub fn table_row(participant: &ParticipantId, values: &[f64]) -> Vec<String> {
    let mut row = Vec::with_capacity(values.len() + 2);
    row.push(participant.subject.clone());
    if let Some(ref session) = participant.session {
        row.push(session.clone());
    }
    row.extend(values.iter().map(|&v| format_value(v)));
    row
}

fn lock(file: &File, path: &Path, mode: LockMode) -> Result<()> {
    let locked = match mode {
        LockMode::Blocking => file.lock_exclusive(),
        LockMode::NonBlocking => file.try_lock_exclusive(),
    };
    locked.map_err(|e| SeedError::LockFailed(format!("{}: {}", path.display(), e)))
}

/// Append `row` to the table at `path`, writing `header` first when the
/// table is new or empty.
///
/// The first `key_columns` fields identify a participant; a row whose key is
/// already present is not written again. An existing header that differs
/// from `header` is an error and is never rewritten.
pub fn append_row(
    path: &Path,
    header: &[String],
    row: &[String],
    key_columns: usize,
    lock_mode: LockMode,
) -> Result<AppendOutcome> {
    if header.len() != row.len() {
        return Err(SeedError::InvalidParameter(format!(
            "row has {} fields but the header has {}",
            row.len(),
            header.len()
        )));
    }

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;

    lock(&file, path, lock_mode)?;
    log::debug!("Locked {:?}", path);

    let written = append_locked(&mut file, path, header, row, key_columns);
    let unlocked = FileExt::unlock(&file);

    let outcome = written?;
    unlocked.map_err(|e| SeedError::LockFailed(format!("unlock {}: {}", path.display(), e)))?;
    Ok(outcome)
}

fn append_locked(
    file: &mut File,
    path: &Path,
    header: &[String],
    row: &[String],
    key_columns: usize,
) -> Result<AppendOutcome> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let outcome = if contents.trim().is_empty() {
        if !contents.is_empty() {
            file.set_len(0)?;
        }
        AppendOutcome::Created
    } else {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(contents.as_bytes());

        let existing = reader.headers()?.clone();
        if !existing.iter().eq(header.iter().map(String::as_str)) {
            return Err(SeedError::HeaderMismatch(format!(
                "{} has {} columns starting with {:?}, expected {} starting with {:?}",
                path.display(),
                existing.len(),
                existing.iter().take(3).collect::<Vec<_>>(),
                header.len(),
                header.iter().take(3).collect::<Vec<_>>()
            )));
        }

        let key = &row[..key_columns.min(row.len())];
        for record in reader.records() {
            let record = record?;
            if record.iter().take(key.len()).eq(key.iter().map(String::as_str)) {
                log::warn!(
                    "{:?} already has a row for {:?}; not appending",
                    path,
                    key
                );
                return Ok(AppendOutcome::AlreadyPresent);
            }
        }

        if !contents.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        AppendOutcome::Appended
    };

    {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut *file);
        if outcome == AppendOutcome::Created {
            writer.write_record(header)?;
        }
        writer.write_record(row)?;
        writer.flush()?;
    }
    file.sync_all()?;

    Ok(outcome)
}

impl SeedContext {
    /// Append this run's parcellated z-statistics to the shared table.
    ///
    /// Reads `<feat dir>/ParcellatedStats/zstat1.ptseries.nii` and appends
    /// one row keyed by subject (and session, when present).
    pub fn create_text_output(&self, request: &TextOutputRequest) -> Result<TextOutputReport> {
        let seed = naming::seed_label_from_regressor(self.regressor_file());

        log::info!("Create text output");
        log::info!("  Text output folder: {:?}", request.text_output_dir);
        log::info!("  Text output format: {:?}", request.format);
        log::info!("  CIFTI file: {:?}", self.cifti_file());
        log::info!("  Parcel file: {:?}", self.parcel_file());
        log::info!("  Parcel name: {}", self.parcel_name());
        log::info!("  Seed ROI name/s: {}", self.seeds());
        log::info!("  fMRI name: {}", self.fmri_name());
        log::info!("  ICA string: '{}'", request.ica_string);
        log::info!("  Analysis level: {}", request.level);

        let participant = match request.participant {
            Some(ref id) => ParticipantId::new(id.subject.clone(), id.session.clone())?,
            None => naming::participant_from_path(self.output_dir())?,
        };

        let feat_dir = naming::feat_dir(
            self.output_dir(),
            self.fmri_name(),
            self.parcel_name(),
            &request.ica_string,
            request.level,
            seed,
        );
        let zstat_file = naming::zstat_file(&feat_dir);

        let image = cifti::read_cifti(&zstat_file)?;
        let values = image.squeeze().ok_or_else(|| {
            SeedError::LabelMismatch(format!(
                "{} has {} rows, expected a single z-statistic map",
                zstat_file.display(),
                image.rows()
            ))
        })?;
        if values.len() != self.parcel_labels().len() {
            return Err(SeedError::LabelMismatch(format!(
                "{} has {} parcels but the parcellation has {} labels",
                zstat_file.display(),
                values.len(),
                self.parcel_labels().len()
            )));
        }

        if !request.text_output_dir.is_dir() {
            std::fs::create_dir_all(&request.text_output_dir)?;
        }

        let table_path = naming::text_output_file(
            &request.text_output_dir,
            self.fmri_name(),
            self.parcel_name(),
            &request.ica_string,
            request.level,
            seed,
            request.format.extension(),
        );

        let with_session = participant.session.is_some();
        let header = table_header(self.parcel_labels(), with_session);
        let row = table_row(&participant, values);
        let key_columns = if with_session { 2 } else { 1 };

        let outcome = append_row(&table_path, &header, &row, key_columns, request.lock_mode)?;

        log::info!("  Table: {:?} ({:?})", table_path, outcome);

        Ok(TextOutputReport {
            table_path,
            zstat_file,
            participant,
            outcome,
        })
    }
}
