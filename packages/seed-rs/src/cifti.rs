/*! CIFTI-2 file reader
 *
 * Decodes the parts of a CIFTI-2 file the seed workflow relies on:
 *
 * - the NIfTI-2 header (datatype, matrix dimensions, data offset, scaling)
 * - the CIFTI XML extension (first label table, parcel names, index map types)
 * - the 2-D data matrix, converted to `f64`
 *
 * # Data Layout
 * CIFTI matrices live in `dim[5]` (rows) and `dim[6]` (columns) of the
 * NIfTI-2 header. On disk the row index varies fastest, so element `(i, j)`
 * sits at storage index `i + j * rows`. [`CiftiImage`] keeps the decoded
 * values row-major: a parcellated time series (`.ptseries.nii`) has one row
 * per timepoint and one column per parcel.
 */

use crate::error::{Result, SeedError};
use crate::mmap_utils::mmap_file;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::path::Path;

/// Size of a NIfTI-2 header in bytes
pub const NIFTI2_HEADER_SIZE: usize = 540;

/// NIfTI-2 magic for single-file (`.nii`) storage
pub const NIFTI2_MAGIC: &[u8; 8] = b"n+2\0\r\n\x1a\n";

/// NIfTI extension code reserved for CIFTI XML
pub const CIFTI_EXTENSION_CODE: i32 = 32;

/// Label name workbench uses for unassigned brainordinates
pub const UNLABELED_MARKER: &str = "???";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// NIfTI datatypes supported for CIFTI matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DataType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            2 => Some(Self::U8),
            4 => Some(Self::I16),
            8 => Some(Self::I32),
            16 => Some(Self::F32),
            64 => Some(Self::F64),
            256 => Some(Self::I8),
            512 => Some(Self::U16),
            768 => Some(Self::U32),
            1024 => Some(Self::I64),
            1280 => Some(Self::U64),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::U8 => 2,
            Self::I16 => 4,
            Self::I32 => 8,
            Self::F32 => 16,
            Self::F64 => 64,
            Self::I8 => 256,
            Self::U16 => 512,
            Self::U32 => 768,
            Self::I64 => 1024,
            Self::U64 => 1280,
        }
    }

    /// Bytes per element
    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    fn decode<B: ByteOrder>(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::U8 => bytes[0] as f64,
            Self::I8 => bytes[0] as i8 as f64,
            Self::I16 => B::read_i16(bytes) as f64,
            Self::U16 => B::read_u16(bytes) as f64,
            Self::I32 => B::read_i32(bytes) as f64,
            Self::U32 => B::read_u32(bytes) as f64,
            Self::I64 => B::read_i64(bytes) as f64,
            Self::U64 => B::read_u64(bytes) as f64,
            Self::F32 => B::read_f32(bytes) as f64,
            Self::F64 => B::read_f64(bytes),
        }
    }
}

/// Fields of the NIfTI-2 header a CIFTI reader needs
#[derive(Debug, Clone)]
pub struct CiftiHeader {
    pub endianness: Endianness,
    pub datatype: DataType,
    pub dims: [i64; 8],
    pub vox_offset: u64,
    pub scl_slope: f64,
    pub scl_inter: f64,
    pub intent_code: i32,
}

impl CiftiHeader {
    /// Length of the first matrix dimension (`dim[5]`)
    pub fn rows(&self) -> usize {
        self.dims[5].max(1) as usize
    }

    /// Length of the second matrix dimension (`dim[6]`, 1 when absent)
    pub fn cols(&self) -> usize {
        if self.dims[0] >= 6 {
            self.dims[6].max(1) as usize
        } else {
            1
        }
    }

    fn scaling(&self) -> Option<(f64, f64)> {
        let slope = self.scl_slope;
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        let inter = if self.scl_inter.is_finite() {
            self.scl_inter
        } else {
            0.0
        };
        if slope == 1.0 && inter == 0.0 {
            None
        } else {
            Some((slope, inter))
        }
    }
}

/// One entry of a CIFTI label table
#[derive(Debug, Clone, PartialEq)]
pub struct CiftiLabel {
    pub key: i32,
    pub name: String,
}

impl CiftiLabel {
    /// Background / unassigned labels are named `???` by workbench
    pub fn is_unlabeled(&self) -> bool {
        self.name.contains(UNLABELED_MARKER)
    }
}

/// Metadata extracted from the CIFTI XML extension
#[derive(Debug, Clone, Default)]
pub struct CiftiXml {
    /// Entries of the first label table in file order
    pub labels: Vec<CiftiLabel>,
    /// Parcel names of the parcels index map, in file order
    pub parcels: Vec<String>,
    /// `IndicesMapToDataType` of every matrix indices map
    pub index_types: Vec<String>,
}

impl CiftiXml {
    /// Names of the labelled (non-background) entries of the first label table
    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .iter()
            .filter(|l| !l.is_unlabeled())
            .map(|l| l.name.clone())
            .collect()
    }
}

/// A fully decoded CIFTI-2 file
#[derive(Debug, Clone)]
pub struct CiftiImage {
    pub header: CiftiHeader,
    pub xml: CiftiXml,
    data: Vec<f64>,
}

impl CiftiImage {
    pub fn rows(&self) -> usize {
        self.header.rows()
    }

    pub fn cols(&self) -> usize {
        self.header.cols()
    }

    /// Row-major matrix values
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols() + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let cols = self.cols();
        &self.data[row * cols..(row + 1) * cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows()).map(|r| self.value(r, col)).collect()
    }

    /// The single row of a one-row matrix (e.g. a parcellated stat map)
    pub fn squeeze(&self) -> Option<&[f64]> {
        if self.rows() == 1 {
            Some(self.row(0))
        } else {
            None
        }
    }
}

fn check_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(SeedError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn invalid(path: &Path, msg: impl std::fmt::Display) -> SeedError {
    SeedError::InvalidCifti(format!("{}: {}", path.display(), msg))
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<CiftiHeader> {
    if bytes.len() < NIFTI2_HEADER_SIZE + 4 {
        return Err(invalid(path, "file is shorter than a NIfTI-2 header"));
    }

    let endianness = if LittleEndian::read_i32(&bytes[0..4]) == NIFTI2_HEADER_SIZE as i32 {
        Endianness::Little
    } else if BigEndian::read_i32(&bytes[0..4]) == NIFTI2_HEADER_SIZE as i32 {
        Endianness::Big
    } else {
        return Err(invalid(path, "sizeof_hdr is not 540, not a NIfTI-2 file"));
    };

    if &bytes[4..12] != NIFTI2_MAGIC {
        return Err(invalid(path, "missing NIfTI-2 magic"));
    }

    match endianness {
        Endianness::Little => header_fields::<LittleEndian>(path, bytes, endianness),
        Endianness::Big => header_fields::<BigEndian>(path, bytes, endianness),
    }
}

fn header_fields<B: ByteOrder>(
    path: &Path,
    bytes: &[u8],
    endianness: Endianness,
) -> Result<CiftiHeader> {
    let datatype_code = B::read_i16(&bytes[12..14]);
    let datatype = DataType::from_code(datatype_code)
        .ok_or_else(|| invalid(path, format!("unsupported datatype {}", datatype_code)))?;

    let mut dims = [0i64; 8];
    for (i, d) in dims.iter_mut().enumerate() {
        let off = 16 + i * 8;
        *d = B::read_i64(&bytes[off..off + 8]);
    }

    if dims[0] < 5 || dims[0] > 7 {
        return Err(invalid(
            path,
            format!("dim[0]={} is not a CIFTI matrix dimensionality", dims[0]),
        ));
    }
    if dims[1..5].iter().any(|&d| d != 1) {
        return Err(invalid(
            path,
            format!("spatial dims {:?} must all be 1 in a CIFTI file", &dims[1..5]),
        ));
    }
    if dims[5..=dims[0] as usize].iter().any(|&d| d < 1) {
        return Err(invalid(path, format!("non-positive matrix dims {:?}", dims)));
    }

    let vox_offset = B::read_i64(&bytes[168..176]);
    if vox_offset < (NIFTI2_HEADER_SIZE + 4) as i64 {
        return Err(invalid(path, format!("vox_offset {} is inside the header", vox_offset)));
    }

    Ok(CiftiHeader {
        endianness,
        datatype,
        dims,
        vox_offset: vox_offset as u64,
        scl_slope: B::read_f64(&bytes[176..184]),
        scl_inter: B::read_f64(&bytes[184..192]),
        intent_code: B::read_i32(&bytes[504..508]),
    })
}

/// Locate the CIFTI XML among the NIfTI extensions
fn extract_xml<'a>(path: &Path, bytes: &'a [u8], header: &CiftiHeader) -> Result<&'a [u8]> {
    if bytes[NIFTI2_HEADER_SIZE] == 0 {
        return Err(invalid(path, "no NIfTI extensions, CIFTI XML missing"));
    }

    let end = (header.vox_offset as usize).min(bytes.len());
    let mut offset = NIFTI2_HEADER_SIZE + 4;

    while offset + 8 <= end {
        let (esize, ecode) = match header.endianness {
            Endianness::Little => (
                LittleEndian::read_i32(&bytes[offset..offset + 4]),
                LittleEndian::read_i32(&bytes[offset + 4..offset + 8]),
            ),
            Endianness::Big => (
                BigEndian::read_i32(&bytes[offset..offset + 4]),
                BigEndian::read_i32(&bytes[offset + 4..offset + 8]),
            ),
        };

        if esize < 8 || offset + esize as usize > end {
            return Err(invalid(path, format!("corrupt extension at byte {}", offset)));
        }

        if ecode == CIFTI_EXTENSION_CODE {
            let body = &bytes[offset + 8..offset + esize as usize];
            let len = body.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
            return Ok(&body[..len]);
        }

        offset += esize as usize;
    }

    Err(invalid(path, "no CIFTI extension (code 32) found"))
}

/// Start offset and byte length of the data block, checked against the file length
fn data_extent(path: &Path, header: &CiftiHeader, file_len: usize) -> Result<(usize, usize)> {
    let needed = header
        .rows()
        .checked_mul(header.cols())
        .and_then(|n| n.checked_mul(header.datatype.size()));
    let start = usize::try_from(header.vox_offset).ok();

    let (start, needed) = match (start, needed) {
        (Some(start), Some(needed)) if start.checked_add(needed).is_some() => (start, needed),
        _ => {
            return Err(invalid(
                path,
                format!(
                    "matrix dims {:?} at offset {} exceed the addressable size",
                    &header.dims[5..=6],
                    header.vox_offset
                ),
            ))
        }
    };

    if start + needed > file_len {
        return Err(invalid(
            path,
            format!(
                "truncated: data block needs {} bytes at offset {}, file has {}",
                needed, start, file_len
            ),
        ));
    }

    Ok((start, needed))
}

fn decode_matrix(path: &Path, bytes: &[u8], header: &CiftiHeader) -> Result<Vec<f64>> {
    let rows = header.rows();
    let cols = header.cols();
    let elem = header.datatype.size();
    let (start, needed) = data_extent(path, header, bytes.len())?;

    let block = &bytes[start..start + needed];
    let scaling = header.scaling();
    let mut data = vec![0.0f64; rows * cols];

    for j in 0..cols {
        for i in 0..rows {
            let k = (i + j * rows) * elem;
            let raw = match header.endianness {
                Endianness::Little => header.datatype.decode::<LittleEndian>(&block[k..k + elem]),
                Endianness::Big => header.datatype.decode::<BigEndian>(&block[k..k + elem]),
            };
            data[i * cols + j] = match scaling {
                Some((slope, inter)) => raw * slope + inter,
                None => raw,
            };
        }
    }

    Ok(data)
}

/// Read header and XML without decoding the data matrix.
///
/// Also checks that the data block fits inside the file, so a successful
/// call means the file is a well-formed CIFTI-2 container.
pub fn validate(path: &Path) -> Result<(CiftiHeader, CiftiXml)> {
    check_exists(path)?;
    let mmap = mmap_file(path)?;
    let header = parse_header(path, &mmap)?;
    let xml = parse_cifti_xml(&String::from_utf8_lossy(extract_xml(path, &mmap, &header)?))
        .map_err(|e| invalid(path, e))?;

    data_extent(path, &header, mmap.len())?;

    log::debug!(
        "Validated CIFTI {:?}: {}x{} {:?}, maps {:?}",
        path,
        header.rows(),
        header.cols(),
        header.datatype,
        xml.index_types
    );

    Ok((header, xml))
}

/// Load a CIFTI-2 file completely
pub fn read_cifti(path: &Path) -> Result<CiftiImage> {
    check_exists(path)?;
    let mmap = mmap_file(path)?;
    let header = parse_header(path, &mmap)?;
    let xml = parse_cifti_xml(&String::from_utf8_lossy(extract_xml(path, &mmap, &header)?))
        .map_err(|e| invalid(path, e))?;
    let data = decode_matrix(path, &mmap, &header)?;

    log::debug!(
        "Loaded CIFTI {:?}: {} rows x {} cols",
        path,
        header.rows(),
        header.cols()
    );

    Ok(CiftiImage { header, xml, data })
}

/// Ordered names of the labelled parcels of a `.dlabel.nii` file
pub fn read_label_names(path: &Path) -> Result<Vec<String>> {
    let (_, xml) = validate(path)?;
    if xml.labels.is_empty() {
        return Err(invalid(path, "no label table, not a parcellation file"));
    }
    Ok(xml.label_names())
}

/// Attribute value with entity references replaced; kept raw if it does not unescape
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(a.value.as_ref()).into_owned();
            let unescaped = unescape(&raw).map(|v| v.into_owned());
            unescaped.unwrap_or(raw)
        })
}

/// Text of a `&name;` reference in element content; unknown entities are kept verbatim
fn resolve_reference(reference: &BytesRef<'_>) -> String {
    let name = String::from_utf8_lossy(reference).into_owned();
    if let Ok(Some(c)) = reference.resolve_char_ref() {
        return c.to_string();
    }
    match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{};", name),
    }
}

/// Parse the CIFTI XML document
pub fn parse_cifti_xml(xml: &str) -> std::result::Result<CiftiXml, String> {
    let mut reader = XmlReader::from_str(xml);

    let mut result = CiftiXml::default();
    let mut in_label_table = false;
    let mut label_tables_seen = 0usize;
    let mut current_label: Option<(i32, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"MatrixIndicesMap" => {
                    if let Some(t) = attr_value(&e, b"IndicesMapToDataType") {
                        result.index_types.push(t);
                    }
                }
                b"LabelTable" => {
                    label_tables_seen += 1;
                    in_label_table = label_tables_seen == 1;
                }
                b"Label" if in_label_table => {
                    let key = attr_value(&e, b"Key")
                        .ok_or_else(|| "Label without Key attribute".to_string())?;
                    let key = key
                        .trim()
                        .parse::<i32>()
                        .map_err(|_| format!("Label Key '{}' is not an integer", key))?;
                    current_label = Some((key, String::new()));
                }
                b"Parcel" => {
                    if let Some(name) = attr_value(&e, b"Name") {
                        result.parcels.push(name);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"Parcel" => {
                    if let Some(name) = attr_value(&e, b"Name") {
                        result.parcels.push(name);
                    }
                }
                b"Label" if in_label_table => {
                    if let Some(key) = attr_value(&e, b"Key").and_then(|k| k.trim().parse().ok()) {
                        result.labels.push(CiftiLabel {
                            key,
                            name: String::new(),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some((_, ref mut name)) = current_label {
                    name.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, ref mut name)) = current_label {
                    name.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some((_, ref mut name)) = current_label {
                    name.push_str(&resolve_reference(&e));
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Label" => {
                    if let Some((key, name)) = current_label.take() {
                        result.labels.push(CiftiLabel {
                            key,
                            name: name.trim().to_string(),
                        });
                    }
                }
                b"LabelTable" => in_label_table = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    if result.index_types.is_empty() {
        return Err("no MatrixIndicesMap in CIFTI XML".to_string());
    }

    Ok(result)
}
