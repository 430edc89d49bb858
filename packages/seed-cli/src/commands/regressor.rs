use crate::cli::RegressorArgs;
use crate::exit_codes;
use crate::output;
use crate::params;
use seed_rs::SeedContext;
use serde::Serialize;

#[derive(Serialize)]
struct RegressorOutput {
    regressor_file: String,
    parcellated_file: String,
    seeds: Vec<String>,
    parcel_name: String,
    num_parcels: usize,
}

pub async fn execute(args: RegressorArgs) -> i32 {
    let config = match params::resolve_config(&args.context) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let runner = match params::resolve_runner(&args.wb_command) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::BINARY_NOT_FOUND;
        }
    };

    let ctx = match SeedContext::new(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if !args.quiet {
        eprintln!("Extracting regressor from {}...", ctx.cifti_file().display());
        eprintln!("  Parcellation: {} ({})", ctx.parcel_name(), ctx.parcel_file().display());
        eprintln!("  Seed: {}", ctx.seeds());
        eprintln!("  wb_command: {}", runner.binary_path().display());
    }

    let regressor_path = match ctx.write_regressor(&runner).await {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json || args.output.is_some() {
        let report = RegressorOutput {
            regressor_file: regressor_path.display().to_string(),
            parcellated_file: ctx
                .parcellated_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            seeds: ctx.seeds().names().iter().map(|s| s.to_string()).collect(),
            parcel_name: ctx.parcel_name().to_string(),
            num_parcels: ctx.parcel_labels().len(),
        };
        let code = output::emit_json(&report, args.output.as_deref(), args.compact);
        if code == exit_codes::SUCCESS && !args.quiet {
            if let Some(ref path) = args.output {
                eprintln!("Report written to {}", path);
            }
        }
        code
    } else {
        println!("{}", regressor_path.display());
        exit_codes::SUCCESS
    }
}
