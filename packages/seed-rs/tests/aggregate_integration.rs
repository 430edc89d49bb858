mod common;

use seed_rs::{
    AppendOutcome, LockMode, ParticipantId, SeedConfig, SeedContext, SeedError, SeedSelection,
    TextOutputRequest,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LABELS: [&str; 3] = ["A", "B", "C"];
const RUN: &str = "task-rest_bold";

fn seeds() -> SeedSelection {
    SeedSelection::Multiple(vec!["A".to_string(), "C".to_string()])
}

/// Lay out `<root>/derivatives/<participant dirs>` with a FEAT result and
/// return the context for it.
fn participant(root: &Path, dirs: &[&str], fmri_name: &str, zstats: &[f64]) -> SeedContext {
    let mut output_dir = root.join("derivatives");
    for d in dirs {
        output_dir = output_dir.join(d);
    }

    let parcel_file = root.join("atlas.dlabel.nii");
    if !parcel_file.exists() {
        common::write_dlabel(&parcel_file, &LABELS);
    }

    let feat = output_dir
        .join(format!("{}_toy_level1_seedA-C.feat", fmri_name))
        .join("ParcellatedStats");
    std::fs::create_dir_all(&feat).unwrap();
    common::write_parcel_map(&feat.join("zstat1.ptseries.nii"), &LABELS, zstats);

    SeedContext::new(SeedConfig {
        output_dir,
        cifti_file: root.join("input").join(format!("{}.dtseries.nii", fmri_name)),
        parcel_file,
        parcel_name: "toy".to_string(),
        seeds: seeds(),
        parcellated_dir: None,
    })
    .unwrap()
}

fn tables(root: &Path) -> PathBuf {
    root.join("tables")
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_subject_and_session_row() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(
        dir.path(),
        &["sub-01", "ses-02"],
        &format!("sub-01_ses-02_{}", RUN),
        &[1.5, -0.25, 3.0],
    );

    let report = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
        .unwrap();

    assert_eq!(report.outcome, AppendOutcome::Created);
    assert_eq!(
        report.table_path,
        tables(dir.path()).join("task-rest_bold_toy_level1_seedA-C.csv")
    );
    assert_eq!(report.participant.subject, "01");
    assert_eq!(report.participant.session.as_deref(), Some("02"));

    let lines = lines(&report.table_path);
    assert_eq!(lines[0], "Subject ID,Session ID,A,B,C");
    assert_eq!(lines[1], "01,02,1.5,-0.25,3.0");
}

#[test]
fn test_subject_only_row() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(
        dir.path(),
        &["sub-01"],
        &format!("sub-01_{}", RUN),
        &[1.0, 2.0, 3.0],
    );

    let report = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
        .unwrap();

    let lines = lines(&report.table_path);
    assert_eq!(lines[0], "Subject ID,A,B,C");
    assert!(lines[1].starts_with("01,"));
    assert_eq!(lines[1], "01,1.0,2.0,3.0");
}

#[test]
fn test_sequential_subjects_share_one_table() {
    let dir = TempDir::new().unwrap();
    let subjects = ["01", "02", "03", "04", "05"];
    let mut table = None;

    for (i, sub) in subjects.iter().enumerate() {
        let ctx = participant(
            dir.path(),
            &[format!("sub-{}", sub).as_str(), "ses-1"],
            &format!("sub-{}_ses-1_{}", sub, RUN),
            &[i as f64, 0.0, 1.0],
        );
        let report = ctx
            .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
            .unwrap();
        table = Some(report.table_path);
    }

    let lines = lines(&table.unwrap());
    assert_eq!(lines.len(), subjects.len() + 1);
    assert_eq!(lines[0], "Subject ID,Session ID,A,B,C");
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("Subject ID")).count(),
        1
    );
    for (i, sub) in subjects.iter().enumerate() {
        assert!(lines[i + 1].starts_with(&format!("{},1,", sub)));
    }
}

#[test]
fn test_rerun_does_not_duplicate_row() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["sub-07"], &format!("sub-07_{}", RUN), &[1.0, 2.0, 3.0]);
    let request = TextOutputRequest::new(tables(dir.path()), 1);

    ctx.create_text_output(&request).unwrap();
    let report = ctx.create_text_output(&request).unwrap();

    assert_eq!(report.outcome, AppendOutcome::AlreadyPresent);
    assert_eq!(lines(&report.table_path).len(), 2);
}

#[test]
fn test_explicit_participant_overrides_path() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["scratch", "run1"], RUN, &[1.0, 2.0, 3.0]);

    let mut request = TextOutputRequest::new(tables(dir.path()), 1);
    request.participant = Some(ParticipantId::new("A01", Some("pre".to_string())).unwrap());
    request.lock_mode = LockMode::NonBlocking;
    let report = ctx.create_text_output(&request).unwrap();

    let lines = lines(&report.table_path);
    assert_eq!(lines[1], "A01,pre,1.0,2.0,3.0");
}

#[test]
fn test_missing_subject_segment_aborts() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["scratch"], RUN, &[1.0, 2.0, 3.0]);

    let err = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
        .unwrap_err();
    assert!(matches!(err, SeedError::Naming(_)));
    assert!(!tables(dir.path()).exists());
}

#[test]
fn test_missing_zstat_aborts() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["sub-01"], &format!("sub-01_{}", RUN), &[1.0, 2.0, 3.0]);

    let err = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 2))
        .unwrap_err();
    assert!(matches!(err, SeedError::FileNotFound(_)));
}

#[test]
fn test_ica_string_in_names() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["sub-01"], &format!("sub-01_{}", RUN), &[1.0, 2.0, 3.0]);

    let feat = ctx
        .output_dir()
        .join(format!("sub-01_{}_toy_FIX_level1_seedA-C.feat", RUN))
        .join("ParcellatedStats");
    std::fs::create_dir_all(&feat).unwrap();
    common::write_parcel_map(&feat.join("zstat1.ptseries.nii"), &LABELS, &[4.0, 5.0, 6.0]);

    let mut request = TextOutputRequest::new(tables(dir.path()), 1);
    request.ica_string = "_FIX".to_string();
    let report = ctx.create_text_output(&request).unwrap();

    assert_eq!(
        report.table_path,
        tables(dir.path()).join("task-rest_bold_toy_FIX_level1_seedA-C.csv")
    );
    assert_eq!(lines(&report.table_path)[1], "01,4.0,5.0,6.0");
}

#[test]
fn test_zstat_parcel_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(dir.path(), &["sub-01"], &format!("sub-01_{}", RUN), &[1.0, 2.0, 3.0]);

    let zstat = seed_rs::naming::zstat_file(&seed_rs::naming::feat_dir(
        ctx.output_dir(),
        ctx.fmri_name(),
        ctx.parcel_name(),
        "",
        1,
        "A-C",
    ));
    common::write_parcel_map(&zstat, &["A", "B"], &[1.0, 2.0]);

    let err = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
        .unwrap_err();
    assert!(matches!(err, SeedError::LabelMismatch(_)));
}

#[test]
fn test_session_directory_above_subject_is_not_a_session() {
    let dir = TempDir::new().unwrap();
    let ctx = participant(
        dir.path(),
        &["ses-pilot", "sub-04"],
        &format!("sub-04_{}", RUN),
        &[1.0, 2.0, 3.0],
    );

    let report = ctx
        .create_text_output(&TextOutputRequest::new(tables(dir.path()), 1))
        .unwrap();

    assert_eq!(report.participant.session, None);
    let lines = lines(&report.table_path);
    assert_eq!(lines[0], "Subject ID,A,B,C");
    assert_eq!(lines[1], "04,1.0,2.0,3.0");
}
