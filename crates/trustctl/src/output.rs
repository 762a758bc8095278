//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use serde_json::{Value, json};

use crate::error::CliError;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let cli_error = error.downcast_ref::<CliError>();
    let error_type = cli_error.map_or("internal", CliError::type_name);
    let reason = cli_error
        .and_then(CliError::reason)
        .map(|reason| reason.to_string());
    print_json(&json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type,
            "reason": reason
        }
    }));
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the trust decision
pub fn print_decision(required: bool, json: bool) {
    if json {
        print_json(&json!({ "success": true, "required": required }));
    } else if required {
        println!("Signed URLs: {}", "required".green().bold());
    } else {
        println!("Signed URLs: {}", "not required".yellow());
    }
}

/// Print a verified signed URL
pub fn print_signed_url(resource: &str, signed_url: &str, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "resource": resource,
            "signed_url": signed_url
        }));
    } else {
        println!("{} {}", "Verified:".green().bold(), resource);
        println!("  {signed_url}");
    }
}

/// Print a content hash
pub fn print_hash(path: &str, hash: &str, json: bool) {
    if json {
        print_json(&json!({ "success": true, "path": path, "hash": hash }));
    } else {
        println!("{hash}  {path}");
    }
}

/// Print a resolved provisioning volume
pub fn print_volume(label: &str, drive: &str, media_path: &str, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "label": label,
            "drive": drive,
            "media_path": media_path
        }));
    } else {
        println!("{} {} on {}", "Volume:".bold(), label, drive.bold());
        println!("  Boot image: {media_path}");
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}
