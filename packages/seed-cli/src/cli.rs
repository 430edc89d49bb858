use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rsfmri-seed",
    version,
    about = "Seed-based regressor extraction and z-stat aggregation for CIFTI fMRI data",
    long_about = "Extract a seed-region regressor from a CIFTI dense time series and collect\n\
                  first-level parcellated z-statistics into a shared CSV table.\n\
                  Requires Connectome Workbench's wb_command. Set $WB_COMMAND or use --wb-command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parcellate a dense time series and write the seed regressor file
    Regressor(RegressorArgs),
    /// Append a subject's parcellated z-statistics to the shared CSV table
    Aggregate(AggregateArgs),
    /// List the labelled parcels of a parcellation file
    Labels(LabelsArgs),
    /// Validate a CIFTI file
    Validate(ValidateArgs),
    /// Show wb_command path and version information
    Info(InfoArgs),
}

/// Parameters of the analysis context, from flags and/or a JSON file
#[derive(Args, Clone, Default)]
pub struct ContextArgs {
    /// JSON file with context parameters (flags override its values)
    #[arg(long)]
    pub config: Option<String>,

    /// Output directory (e.g. .../sub-01/ses-02); created if missing
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Dense time series input (.dtseries.nii)
    #[arg(long)]
    pub cifti: Option<String>,

    /// Parcellation file (.dlabel.nii)
    #[arg(long)]
    pub parcel_file: Option<String>,

    /// Short parcellation name used in derived file names
    #[arg(long)]
    pub parcel_name: Option<String>,

    /// Seed parcel name(s); several are averaged
    #[arg(long, num_args = 1..)]
    pub seed: Vec<String>,

    /// Directory for the parcellated time series (default: next to the input)
    #[arg(long)]
    pub parcellated_dir: Option<String>,
}

#[derive(Args)]
pub struct RegressorArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Path to wb_command
    #[arg(long, env = "WB_COMMAND")]
    pub wb_command: Option<String>,

    /// Print a JSON report instead of the regressor path
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON report to a file instead of stdout (implies --json)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Directory holding the shared results tables
    #[arg(long)]
    pub text_output_dir: String,

    /// Table format (csv)
    #[arg(long, default_value = "csv")]
    pub text_output_format: String,

    /// Tag following the parcellation name in FEAT directory names (e.g. _FIX)
    #[arg(long, default_value = "")]
    pub ica_string: String,

    /// Analysis level of the FEAT directory
    #[arg(long, default_value_t = 1)]
    pub level: u32,

    /// Subject label; inferred from a sub-<label> component of --output-dir if omitted
    #[arg(long)]
    pub subject: Option<String>,

    /// Session label (requires --subject)
    #[arg(long, requires = "subject")]
    pub session: Option<String>,

    /// Fail instead of waiting when another process holds the table lock
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    /// Print a JSON report
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON report to a file instead of stdout (implies --json)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct LabelsArgs {
    /// Parcellation file (.dlabel.nii)
    #[arg(long)]
    pub parcel_file: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// CIFTI file to check
    #[arg(long)]
    pub file: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Path to wb_command
    #[arg(long, env = "WB_COMMAND")]
    pub wb_command: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
