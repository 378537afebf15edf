//! Human and machine-readable result rendering.

use colored::Colorize;

use nit_agents::RunSummary;
use nit_core::TaskOutput;

pub fn print_json_or<F: FnOnce(&TaskOutput)>(output: &TaskOutput, json: bool, human: F) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".into())
        );
    } else {
        human(output);
        for error in &output.errors {
            eprintln!("{} {error}", "error:".red().bold());
        }
    }
}

pub fn print_detection(output: &TaskOutput, json: bool) {
    print_json_or(output, json, |output| {
        let stack = &output.result["stack"];
        println!(
            "{} {}",
            "primary language:".bold(),
            stack["primary_language"].as_str().unwrap_or("unknown")
        );
        if let Some(frameworks) = output.result["frameworks"]["frameworks"].as_array() {
            if frameworks.is_empty() {
                println!("no test frameworks detected");
            }
            for framework in frameworks {
                println!(
                    "  {} {} ({}, confidence {:.2})",
                    "framework:".bold(),
                    framework["name"].as_str().unwrap_or("?"),
                    framework["category"].as_str().unwrap_or("?"),
                    framework["confidence"].as_f64().unwrap_or(0.0)
                );
            }
        }
        if let Some(configs) = output.result["infra"]["ci_configs"].as_array() {
            for config in configs {
                println!(
                    "  {} {}",
                    "ci:".bold(),
                    config["provider"].as_str().unwrap_or("?")
                );
            }
        }
    });
}

pub fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".into())
        );
        return;
    }
    let headline = format!(
        "{} generated / {} targets ({} failed)",
        summary.tests_generated, summary.targets, summary.failed
    );
    if summary.failed == 0 {
        println!("{} {headline}", "ok:".green().bold());
    } else {
        println!("{} {headline}", "warn:".yellow().bold());
    }
    for file in &summary.generated_files {
        println!("  wrote {file}");
    }
    for error in &summary.errors {
        eprintln!("  {} {error}", "failed:".red());
    }
    println!("  tokens used: {}", summary.tokens_used);
}

pub fn print_verification(output: &TaskOutput, json: bool) {
    print_json_or(output, json, |output| {
        let verified = output.result["is_verified"] == true;
        if verified {
            println!("{} fix verified", "ok:".green().bold());
        } else {
            println!("{} fix not verified", "warn:".yellow().bold());
        }
        if let Some(notes) = output.result["verification"]["notes"].as_str() {
            println!("{notes}");
        }
    });
}

pub fn print_drift(output: &TaskOutput, json: bool) {
    print_json_or(output, json, |output| {
        let drift = output.result["drift_detected"] == true;
        println!(
            "{} {} passed, {} failed, {} skipped",
            if drift {
                "drift detected:".red().bold()
            } else {
                "stable:".green().bold()
            },
            output.result["passed"],
            output.result["failed"],
            output.result["skipped"]
        );
        if let Some(results) = output.result["results"].as_array() {
            for result in results.iter().filter(|r| r["passed"] != true) {
                println!(
                    "  {} {} {}",
                    result["test_id"].as_str().unwrap_or("?"),
                    result["error"].as_str().unwrap_or(""),
                    result["similarity_score"]
                        .as_f64()
                        .map(|s| format!("(similarity {s:.2})"))
                        .unwrap_or_default()
                );
            }
        }
    });
}

pub fn print_audit(output: &TaskOutput, json: bool) {
    print_json_or(output, json, |output| {
        let findings = output.result["findings"].as_array().cloned().unwrap_or_default();
        if findings.is_empty() {
            println!("{} no findings", "ok:".green().bold());
            return;
        }
        println!("{} {} finding(s)", "warn:".yellow().bold(), findings.len());
        for finding in &findings {
            println!(
                "  [{}] {}:{} {} ({})",
                finding["severity"].as_str().unwrap_or("?"),
                finding["file"].as_str().unwrap_or("?"),
                finding["line"],
                finding["vuln_type"].as_str().unwrap_or("?"),
                finding["cwe"].as_str().unwrap_or("")
            );
        }
    });
}
