use crate::cli::ContextArgs;
use seed_rs::{ParticipantId, SeedConfig, SeedSelection, WorkbenchRunner};
use std::path::{Path, PathBuf};

pub fn resolve_runner(binary_path: &Option<String>) -> Result<WorkbenchRunner, String> {
    match binary_path {
        Some(path) => WorkbenchRunner::new(path).map_err(|e| e.to_string()),
        None => WorkbenchRunner::discover().map_err(|e| e.to_string()),
    }
}

fn pick<T>(flag: Option<T>, file: Option<T>, name: &str) -> Result<T, String> {
    flag.or(file)
        .ok_or_else(|| format!("Missing --{} (or set it in --config)", name))
}

/// Merge a `--config` JSON file with command-line flags; flags win.
pub fn resolve_config(args: &ContextArgs) -> Result<SeedConfig, String> {
    let base = match args.config {
        Some(ref path) => Some(SeedConfig::from_json_file(Path::new(path)).map_err(|e| e.to_string())?),
        None => None,
    };

    let seeds = if args.seed.is_empty() {
        base.as_ref().map(|c| c.seeds.clone())
    } else {
        Some(SeedSelection::from_names(args.seed.clone()))
    };

    let config = SeedConfig {
        output_dir: pick(
            args.output_dir.as_ref().map(PathBuf::from),
            base.as_ref().map(|c| c.output_dir.clone()),
            "output-dir",
        )?,
        cifti_file: pick(
            args.cifti.as_ref().map(PathBuf::from),
            base.as_ref().map(|c| c.cifti_file.clone()),
            "cifti",
        )?,
        parcel_file: pick(
            args.parcel_file.as_ref().map(PathBuf::from),
            base.as_ref().map(|c| c.parcel_file.clone()),
            "parcel-file",
        )?,
        parcel_name: pick(
            args.parcel_name.clone(),
            base.as_ref().map(|c| c.parcel_name.clone()),
            "parcel-name",
        )?,
        seeds: pick(seeds, None, "seed")?,
        parcellated_dir: args
            .parcellated_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| base.as_ref().and_then(|c| c.parcellated_dir.clone())),
    };

    config.validate().map_err(|e| e.to_string())?;
    log::debug!("Resolved context parameters: {:?}", config);
    Ok(config)
}

/// Explicit participant from `--subject` / `--session`, if given
pub fn resolve_participant(
    subject: &Option<String>,
    session: &Option<String>,
) -> Result<Option<ParticipantId>, String> {
    match subject {
        Some(sub) => ParticipantId::new(sub.clone(), session.clone())
            .map(Some)
            .map_err(|e| e.to_string()),
        None if session.is_some() => Err("--session requires --subject".to_string()),
        None => Ok(None),
    }
}
