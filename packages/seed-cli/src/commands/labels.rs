use crate::cli::LabelsArgs;
use crate::exit_codes;
use crate::output;
use std::path::Path;

pub fn execute(args: LabelsArgs) -> i32 {
    let labels = match seed_rs::cifti::read_label_names(Path::new(&args.parcel_file)) {
        Ok(labels) => labels,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json {
        return output::emit_json(&labels, None, false);
    }

    for label in &labels {
        println!("{}", label);
    }
    exit_codes::SUCCESS
}
