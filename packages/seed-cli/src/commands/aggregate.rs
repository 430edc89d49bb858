use crate::cli::AggregateArgs;
use crate::exit_codes;
use crate::output;
use crate::params;
use seed_rs::{LockMode, SeedContext, TextOutputFormat, TextOutputRequest};

pub fn execute(args: AggregateArgs) -> i32 {
    let config = match params::resolve_config(&args.context) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let format = match args.text_output_format.parse::<TextOutputFormat>() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let participant = match params::resolve_participant(&args.subject, &args.session) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let ctx = match SeedContext::new(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let request = TextOutputRequest {
        ica_string: args.ica_string.clone(),
        text_output_dir: args.text_output_dir.clone().into(),
        format,
        level: args.level,
        participant,
        lock_mode: if args.no_wait {
            LockMode::NonBlocking
        } else {
            LockMode::Blocking
        },
    };

    match ctx.create_text_output(&request) {
        Ok(report) => {
            if args.json || args.output.is_some() {
                output::emit_json(&report, args.output.as_deref(), args.compact)
            } else {
                println!(
                    "{} ({:?})",
                    report.table_path.display(),
                    report.outcome
                );
                exit_codes::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::for_error(&e)
        }
    }
}
