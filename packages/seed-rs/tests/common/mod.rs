//! Test fixtures: minimal CIFTI-2 files and stand-in `wb_command` scripts.
#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::path::{Path, PathBuf};

pub const INTENT_PARCELLATED_SERIES: i32 = 3004;
const INTENT_DENSE_LABEL: i32 = 3007;

/// On-disk encoding of a fixture's data matrix
#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    pub big_endian: bool,
    /// NIfTI datatype code (2 u8, 4 i16, 16 f32, 64 f64, ...)
    pub datatype: i16,
    pub scl_slope: f64,
    pub scl_inter: f64,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            big_endian: false,
            datatype: 64,
            scl_slope: 1.0,
            scl_inter: 0.0,
        }
    }
}

/// Write a little-endian float64 CIFTI-2 file holding a `rows x cols` matrix
/// given row-major.
pub fn write_cifti(path: &Path, rows: usize, cols: usize, row_major: &[f64], xml: &str, intent: i32) {
    write_cifti_encoded(path, rows, cols, row_major, xml, intent, Encoding::default());
}

/// Like [`write_cifti`], storing the raw (unscaled) values with `encoding`
pub fn write_cifti_encoded(
    path: &Path,
    rows: usize,
    cols: usize,
    row_major: &[f64],
    xml: &str,
    intent: i32,
    encoding: Encoding,
) {
    let bytes = if encoding.big_endian {
        cifti_bytes::<BigEndian>(rows, cols, row_major, xml, intent, encoding)
    } else {
        cifti_bytes::<LittleEndian>(rows, cols, row_major, xml, intent, encoding)
    };
    std::fs::write(path, bytes).unwrap();
}

fn cifti_bytes<B: ByteOrder>(
    rows: usize,
    cols: usize,
    row_major: &[f64],
    xml: &str,
    intent: i32,
    encoding: Encoding,
) -> Vec<u8> {
    assert_eq!(row_major.len(), rows * cols);

    let xml_bytes = xml.as_bytes();
    let esize = (8 + xml_bytes.len() + 15) / 16 * 16;
    let vox_offset = 540 + 4 + esize;

    let mut buf: Vec<u8> = Vec::with_capacity(vox_offset + rows * cols * 8);
    buf.write_i32::<B>(540).unwrap();
    buf.extend_from_slice(b"n+2\0\r\n\x1a\n");
    buf.write_i16::<B>(encoding.datatype).unwrap();
    buf.write_i16::<B>(bitpix(encoding.datatype)).unwrap();
    for d in [6i64, 1, 1, 1, 1, rows as i64, cols as i64, 1] {
        buf.write_i64::<B>(d).unwrap();
    }
    for _ in 0..3 {
        buf.write_f64::<B>(0.0).unwrap();
    }
    for _ in 0..8 {
        buf.write_f64::<B>(1.0).unwrap();
    }
    buf.write_i64::<B>(vox_offset as i64).unwrap();
    buf.write_f64::<B>(encoding.scl_slope).unwrap();
    buf.write_f64::<B>(encoding.scl_inter).unwrap();
    buf.resize(504, 0);
    buf.write_i32::<B>(intent).unwrap();
    buf.resize(540, 0);

    buf.extend_from_slice(&[1, 0, 0, 0]);
    buf.write_i32::<B>(esize as i32).unwrap();
    buf.write_i32::<B>(32).unwrap();
    buf.extend_from_slice(xml_bytes);
    buf.resize(vox_offset, 0);

    for j in 0..cols {
        for i in 0..rows {
            write_value::<B>(&mut buf, encoding.datatype, row_major[i * cols + j]);
        }
    }

    buf
}

fn bitpix(datatype: i16) -> i16 {
    match datatype {
        2 | 256 => 8,
        4 | 512 => 16,
        8 | 16 | 768 => 32,
        _ => 64,
    }
}

fn write_value<B: ByteOrder>(buf: &mut Vec<u8>, datatype: i16, v: f64) {
    let written = match datatype {
        2 => buf.write_u8(v as u8),
        4 => buf.write_i16::<B>(v as i16),
        8 => buf.write_i32::<B>(v as i32),
        16 => buf.write_f32::<B>(v as f32),
        64 => buf.write_f64::<B>(v),
        256 => buf.write_i8(v as i8),
        512 => buf.write_u16::<B>(v as u16),
        768 => buf.write_u32::<B>(v as u32),
        1024 => buf.write_i64::<B>(v as i64),
        1280 => buf.write_u64::<B>(v as u64),
        other => panic!("unsupported fixture datatype {}", other),
    };
    written.unwrap();
}

/// Series-by-parcels XML for a parcellated time series
pub fn ptseries_xml(rows: usize, parcels: &[&str]) -> String {
    let parcel_xml: String = parcels
        .iter()
        .map(|p| format!(r#"<Parcel Name="{}"/>"#, escape(p)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CIFTI Version="2"><Matrix>
<MatrixIndicesMap AppliesToMatrixDimension="0" IndicesMapToDataType="CIFTI_INDEX_TYPE_SERIES" NumberOfSeriesPoints="{}" SeriesExponent="0" SeriesStart="0" SeriesStep="0.72" SeriesUnit="SECOND"/>
<MatrixIndicesMap AppliesToMatrixDimension="1" IndicesMapToDataType="CIFTI_INDEX_TYPE_PARCELS">{}</MatrixIndicesMap>
</Matrix></CIFTI>"#,
        rows, parcel_xml
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Parcellation with a `???` background label (key 0) followed by `labels`
pub fn write_dlabel(path: &Path, labels: &[&str]) {
    let mut table = String::from(
        r#"<Label Key="0" Red="1" Green="1" Blue="1" Alpha="0">???</Label>"#,
    );
    for (i, l) in labels.iter().enumerate() {
        table.push_str(&format!(
            r#"<Label Key="{}" Red="0.5" Green="0.5" Blue="0.5" Alpha="1">{}</Label>"#,
            i + 1,
            escape(l)
        ));
    }
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CIFTI Version="2"><Matrix>
<MatrixIndicesMap AppliesToMatrixDimension="0" IndicesMapToDataType="CIFTI_INDEX_TYPE_LABELS">
<NamedMap><MapName>atlas</MapName><LabelTable>{}</LabelTable></NamedMap>
</MatrixIndicesMap>
<MatrixIndicesMap AppliesToMatrixDimension="1" IndicesMapToDataType="CIFTI_INDEX_TYPE_BRAIN_MODELS">
</MatrixIndicesMap>
</Matrix></CIFTI>"#,
        table
    );
    let keys: Vec<f64> = (0..=labels.len()).map(|k| k as f64).collect();
    write_cifti(path, 1, keys.len(), &keys, &xml, INTENT_DENSE_LABEL);
}

/// Parcellated series; `columns[p]` is the series of parcel `parcels[p]`
pub fn write_ptseries(path: &Path, parcels: &[&str], columns: &[Vec<f64>]) {
    assert_eq!(parcels.len(), columns.len());
    let rows = columns.first().map_or(0, |c| c.len());
    let mut row_major = Vec::with_capacity(rows * parcels.len());
    for r in 0..rows {
        for c in columns {
            row_major.push(c[r]);
        }
    }

    let xml = ptseries_xml(rows, parcels);
    write_cifti(path, rows, parcels.len(), &row_major, &xml, INTENT_PARCELLATED_SERIES);
}

/// One-row parcellated map (e.g. `zstat1.ptseries.nii`)
pub fn write_parcel_map(path: &Path, parcels: &[&str], values: &[f64]) {
    let columns: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
    write_ptseries(path, parcels, &columns);
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
    path.to_path_buf()
}

/// Stand-in `wb_command` that copies `fixture` to the requested output and
/// logs its arguments to `<dir>/wb_args.txt`
#[cfg(unix)]
pub fn fake_wb_command(dir: &Path, fixture: &Path) -> PathBuf {
    let log = dir.join("wb_args.txt");
    write_script(
        &dir.join("wb_command"),
        &format!(
            "echo \"$@\" > '{}'\n[ \"$1\" = \"-cifti-parcellate\" ] || exit 2\n[ \"$4\" = \"COLUMN\" ] || exit 2\ncp '{}' \"$5\"",
            log.display(),
            fixture.display()
        ),
    )
}

/// Stand-in `wb_command` that always fails
#[cfg(unix)]
pub fn failing_wb_command(dir: &Path) -> PathBuf {
    write_script(
        &dir.join("wb_command_fail"),
        "echo 'ERROR: parcellation does not match input' >&2\nexit 1",
    )
}

/// Stand-in `wb_command` that succeeds without writing anything
#[cfg(unix)]
pub fn silent_wb_command(dir: &Path) -> PathBuf {
    write_script(&dir.join("wb_command_silent"), "exit 0")
}
