use crate::error::{Result, SeedError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to the seed label to name the regressor file
pub const REGRESSOR_SUFFIX: &str = "-Regressor.txt";

/// Seed region(s) whose signal defines the regressor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedSelection {
    Single(String),
    Multiple(Vec<String>),
}

impl SeedSelection {
    /// Build from CLI-style input: one name stays `Single`, several become `Multiple`
    pub fn from_names(names: Vec<String>) -> Self {
        if names.len() == 1 {
            Self::Single(names.into_iter().next().unwrap_or_default())
        } else {
            Self::Multiple(names)
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Multiple(names) => names.iter().map(|s| s.as_str()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed label used in derived file and directory names (`A` or `A-B-C`)
    pub fn label(&self) -> String {
        self.names().join("-")
    }

    pub fn regressor_file_name(&self) -> String {
        format!("{}{}", self.label(), REGRESSOR_SUFFIX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SeedError::InvalidParameter(
                "At least one seed region must be specified".to_string(),
            ));
        }
        if let Some(blank) = self.names().iter().find(|n| n.trim().is_empty()) {
            return Err(SeedError::InvalidParameter(format!(
                "Seed region name '{}' is blank",
                blank
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for SeedSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(name) => write!(f, "{}", name),
            Self::Multiple(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

/// Parameters of one seed analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Directory receiving the regressor file (usually `.../sub-XX[/ses-YY]`)
    pub output_dir: PathBuf,
    /// Dense time series input (`.dtseries.nii`)
    pub cifti_file: PathBuf,
    /// Parcellation (`.dlabel.nii`)
    pub parcel_file: PathBuf,
    /// Short name of the parcellation used in derived file names
    pub parcel_name: String,
    #[serde(alias = "seed_roi_name", alias = "seed")]
    pub seeds: SeedSelection,
    /// Where the parcellated time series is written; defaults to the input's directory
    #[serde(default)]
    pub parcellated_dir: Option<PathBuf>,
}

impl SeedConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SeedError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| SeedError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.parcel_name.trim().is_empty() {
            return Err(SeedError::Config("parcel_name must not be empty".to_string()));
        }
        if self.parcel_name.contains(std::path::MAIN_SEPARATOR) || self.parcel_name.contains('/') {
            return Err(SeedError::Config(format!(
                "parcel_name '{}' must not contain a path separator",
                self.parcel_name
            )));
        }
        self.seeds.validate()
    }
}

/// Subject and optional session a first-level result belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantId {
    pub subject: String,
    pub session: Option<String>,
}

impl ParticipantId {
    pub fn new(subject: impl Into<String>, session: Option<String>) -> Result<Self> {
        let id = Self {
            subject: subject.into(),
            session,
        };
        check_label("sub", &id.subject)?;
        if let Some(ref ses) = id.session {
            check_label("ses", ses)?;
        }
        Ok(id)
    }
}

/// BIDS labels are non-empty and alphanumeric
pub(crate) fn check_label(entity: &str, label: &str) -> Result<()> {
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SeedError::Naming(format!(
            "'{}-{}' is not a valid {} label (expected letters and digits only)",
            entity, label, entity
        )));
    }
    Ok(())
}

/// Text table flavour for aggregated results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOutputFormat {
    Csv,
}

impl TextOutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for TextOutputFormat {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            other => Err(SeedError::InvalidParameter(format!(
                "Unsupported text output format '{}'. Supported: csv",
                other
            ))),
        }
    }
}

/// How to wait for the shared table lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    #[default]
    Blocking,
    NonBlocking,
}

/// Parameters of one aggregation call
#[derive(Debug, Clone)]
pub struct TextOutputRequest {
    /// Tag inserted after the parcellation name in FEAT directory names (may be empty)
    pub ica_string: String,
    pub text_output_dir: PathBuf,
    pub format: TextOutputFormat,
    /// Analysis level of the FEAT directory to read
    pub level: u32,
    /// Explicit participant; inferred from the output directory when `None`
    pub participant: Option<ParticipantId>,
    pub lock_mode: LockMode,
}

impl TextOutputRequest {
    pub fn new(text_output_dir: impl Into<PathBuf>, level: u32) -> Self {
        Self {
            ica_string: String::new(),
            text_output_dir: text_output_dir.into(),
            format: TextOutputFormat::Csv,
            level,
            participant: None,
            lock_mode: LockMode::default(),
        }
    }
}

/// What happened to the shared table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    /// Table was new or empty; header and row written
    Created,
    /// Row appended below an existing header
    Appended,
    /// A row for this participant already exists; nothing written
    AlreadyPresent,
}

/// Result of [`SeedContext::create_text_output`](crate::SeedContext::create_text_output)
#[derive(Debug, Clone, Serialize)]
pub struct TextOutputReport {
    pub table_path: PathBuf,
    pub zstat_file: PathBuf,
    pub participant: ParticipantId,
    pub outcome: AppendOutcome,
}
