use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ValidateOutput {
    file: String,
    exists: bool,
    valid: bool,
    rows: Option<usize>,
    cols: Option<usize>,
    datatype: Option<String>,
    intent_code: Option<i32>,
    index_types: Vec<String>,
    num_labels: Option<usize>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let path = Path::new(&args.file);
    let checked = seed_rs::cifti::validate(path);

    let mut result = ValidateOutput {
        file: args.file.clone(),
        exists: path.is_file(),
        valid: checked.is_ok(),
        rows: None,
        cols: None,
        datatype: None,
        intent_code: None,
        index_types: Vec::new(),
        num_labels: None,
        error: None,
    };

    let code = match checked {
        Ok((header, xml)) => {
            result.rows = Some(header.rows());
            result.cols = Some(header.cols());
            result.datatype = Some(format!("{:?}", header.datatype));
            result.intent_code = Some(header.intent_code);
            result.num_labels = if xml.labels.is_empty() {
                None
            } else {
                Some(xml.label_names().len())
            };
            result.index_types = xml.index_types;
            exit_codes::SUCCESS
        }
        Err(e) => {
            let code = exit_codes::for_error(&e);
            result.error = Some(e.to_string());
            code
        }
    };

    if args.json {
        let written = output::emit_json(&result, None, false);
        if written != exit_codes::SUCCESS {
            return written;
        }
    } else if let Some(ref err) = result.error {
        eprintln!("Error: {}", err);
    } else {
        println!(
            "File '{}' is valid CIFTI ({} x {}, {}, maps: {})",
            args.file,
            result.rows.unwrap_or(0),
            result.cols.unwrap_or(0),
            result.datatype.as_deref().unwrap_or_default(),
            result.index_types.join(", ")
        );
    }

    code
}
