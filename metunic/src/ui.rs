//! Output rendering for the metunic CLI.
//!
//! Human output goes to stdout with `console` styling; `--json` switches
//! every result to a single JSON document. Errors always go to stderr.

use console::style;
use metunic_lib::{MetunicError, SyncStatus, UNRECOGNISED_CODE};
use serde::Serialize;
use serde_json::{json, Value};

/// Print a styled error and any detail worth showing.
pub fn print_error(err: &MetunicError) {
    eprintln!("{} {}", style("error:").red().bold(), err);

    match err {
        MetunicError::MalformedResponse {
            content: Some(content),
            ..
        } => {
            eprintln!("  {} {}", style("body:").dim(), style(content).dim());
        }
        MetunicError::ApiError { code, .. } if *code == UNRECOGNISED_CODE => {
            eprintln!("  {}", style("unrecognised messageCode").dim());
        }
        MetunicError::ApiError { code, .. } => {
            eprintln!("  {}", style(format!("messageCode {}", code)).dim());
        }
        MetunicError::ConfigError { .. } => {
            eprintln!(
                "  {}",
                style("See `metunic --help` for configuration sources").dim()
            );
        }
        _ => {}
    }
}

/// Confirmation of a state-changing command.
pub fn print_done(message: &str, as_json: bool) {
    if as_json {
        emit_json(&json!({"success": true, "message": message}));
    } else {
        println!("{} {}", style("✓").green().bold(), message);
    }
}

/// A plain string result.
pub fn print_text(text: &str, as_json: bool) {
    if as_json {
        emit_json(&text);
    } else {
        println!("{}", text);
    }
}

/// An identifier lookup; `None` means nothing matched.
pub fn print_id(label: &str, id: Option<u64>, as_json: bool) {
    if as_json {
        emit_json(&json!({"query": label, "id": id}));
        return;
    }
    match id {
        Some(id) => println!("{}", id),
        None => println!("{} {}", style("no match for").yellow(), style(label).bold()),
    }
}

pub fn print_nameservers(domain: &str, hosts: &[String], as_json: bool) {
    if as_json {
        emit_json(&json!({"domain": domain, "nameservers": hosts}));
        return;
    }
    if hosts.is_empty() {
        println!("{} {}", style(domain).bold(), style("has no nameservers").dim());
        return;
    }
    for (index, host) in hosts.iter().enumerate() {
        println!("{} {}", style(format!("ns{}", index + 1)).dim(), host);
    }
}

pub fn print_sync(domain: &str, status: &SyncStatus, as_json: bool) {
    if as_json {
        #[derive(Serialize)]
        struct Report<'a> {
            domain: &'a str,
            #[serde(flatten)]
            status: &'a SyncStatus,
        }
        emit_json(&Report { domain, status });
        return;
    }

    let state = if status.active {
        style("ACTIVE").green().bold()
    } else {
        style("INACTIVE").red().bold()
    };
    println!("{} {}", style(domain).bold(), state);
    println!(
        "{} {}",
        style("expires:").dim(),
        status.expiry_date.as_deref().unwrap_or("unknown")
    );
}

/// Raw API result; pretty JSON in both modes.
pub fn print_value(value: &Value, as_json: bool) {
    if as_json {
        emit_json(value);
    } else {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }
}

fn emit_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{} {}", style("error:").red().bold(), e),
    }
}
