use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use seed_rs::workbench::{
    find_binary, BINARY_ENV_VAR, BINARY_HOME_ENV_VAR, BINARY_NAME, DEFAULT_BINARY_PATHS,
};
use serde::Serialize;

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    binary_name: &'static str,
    binary_path: Option<String>,
    binary_found: bool,
    platform: String,
    arch: String,
    search_paths: Vec<&'static str>,
}

pub fn execute(args: InfoArgs) -> i32 {
    let binary_path = find_binary(args.wb_command.as_deref());

    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        binary_name: BINARY_NAME,
        binary_path: binary_path.as_ref().map(|p| p.display().to_string()),
        binary_found: binary_path.is_some(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        search_paths: DEFAULT_BINARY_PATHS.to_vec(),
    };

    if args.json {
        return output::emit_json(&info, None, false);
    }

    println!("rsfmri-seed CLI v{}", info.cli_version);
    println!("Platform: {} ({})", info.platform, info.arch);
    println!();
    match info.binary_path {
        Some(ref path) => println!("wb_command: {}", path),
        None => println!("wb_command: not found"),
    }
    println!(
        "Search paths: ${}, ${}/<platform>, $PATH, {}",
        BINARY_ENV_VAR,
        BINARY_HOME_ENV_VAR,
        info.search_paths.join(", ")
    );

    exit_codes::SUCCESS
}
