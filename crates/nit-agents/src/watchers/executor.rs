//! Drift test definitions and execution.
//!
//! `drift-tests.yml` lists tests against CLI commands, importable
//! functions, or HTTP endpoints; execution captures the canonical output
//! string that comparators work on.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nit_adapters::process::run_tool;

use super::comparator::ComparisonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Cli,
    Function,
    Http,
}

/// One drift test from `drift-tests.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftTestSpec {
    pub id: String,
    pub name: String,
    pub endpoint_type: EndpointType,
    #[serde(default)]
    pub endpoint_config: serde_json::Value,
    pub comparison_type: ComparisonType,
    #[serde(default)]
    pub comparison_config: serde_json::Value,
}

impl DriftTestSpec {
    pub fn threshold(&self) -> f64 {
        self.comparison_config
            .get("threshold")
            .and_then(|v| v.as_f64())
            .unwrap_or(super::comparator::DEFAULT_SEMANTIC_THRESHOLD)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.comparison_config.get("pattern").and_then(|v| v.as_str())
    }

    pub fn schema(&self) -> Option<&serde_json::Value> {
        self.comparison_config.get("schema")
    }
}

#[derive(Debug, Deserialize)]
struct DriftTestsFile {
    #[serde(default)]
    tests: Vec<DriftTestSpec>,
}

/// Parse a drift-tests.yml file. A missing file yields no tests.
pub fn parse_drift_tests(path: &Path) -> Result<Vec<DriftTestSpec>, String> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: DriftTestsFile =
        serde_yaml::from_str(&text).map_err(|e| format!("invalid drift-tests.yml: {e}"))?;
    Ok(parsed.tests)
}

/// Execute one drift test and return its canonical output.
pub async fn execute_test(spec: &DriftTestSpec, project_root: &Path) -> Result<String, String> {
    match spec.endpoint_type {
        EndpointType::Cli => {
            let command = spec
                .endpoint_config
                .get("command")
                .and_then(|v| v.as_str())
                .ok_or("cli endpoint requires endpoint_config.command")?;
            let output = run_tool("sh", &["-c", command], project_root, 120)
                .await
                .map_err(|e| e.to_string())?;
            if output.exit_code != 0 {
                return Err(format!(
                    "command exited with {}: {}",
                    output.exit_code, output.stderr
                ));
            }
            Ok(output.stdout)
        }
        EndpointType::Function => {
            // Functions are reached through the project's interpreter.
            let module = spec
                .endpoint_config
                .get("module")
                .and_then(|v| v.as_str())
                .ok_or("function endpoint requires endpoint_config.module")?;
            let function = spec
                .endpoint_config
                .get("function")
                .and_then(|v| v.as_str())
                .ok_or("function endpoint requires endpoint_config.function")?;
            let args = spec
                .endpoint_config
                .get("args")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "[]".into());
            let script = format!(
                "import json, {module}; print({module}.{function}(*json.loads('{args}')))"
            );
            let output = run_tool("python3", &["-c", &script], project_root, 120)
                .await
                .map_err(|e| e.to_string())?;
            if output.exit_code != 0 {
                return Err(format!("function call failed: {}", output.stderr));
            }
            Ok(output.stdout)
        }
        EndpointType::Http => {
            let url = spec
                .endpoint_config
                .get("url")
                .and_then(|v| v.as_str())
                .ok_or("http endpoint requires endpoint_config.url")?;
            let method = spec
                .endpoint_config
                .get("method")
                .and_then(|v| v.as_str())
                .unwrap_or("GET")
                .to_uppercase();
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .map_err(|e| e.to_string())?;
            let mut request = match method.as_str() {
                "POST" => client.post(url),
                "PUT" => client.put(url),
                _ => client.get(url),
            };
            if let Some(body) = spec.endpoint_config.get("body") {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|e| e.to_string())?;
            response.text().await.map_err(|e| e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_specs_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift-tests.yml");
        std::fs::write(
            &path,
            concat!(
                "tests:\n",
                "  - id: greeting\n",
                "    name: \"Greeting output\"\n",
                "    endpoint_type: cli\n",
                "    endpoint_config:\n",
                "      command: \"echo hello drift\"\n",
                "    comparison_type: exact\n",
                "  - id: summary\n",
                "    name: \"Summary shape\"\n",
                "    endpoint_type: http\n",
                "    endpoint_config:\n",
                "      url: http://localhost:8000/summary\n",
                "    comparison_type: semantic\n",
                "    comparison_config:\n",
                "      threshold: 0.9\n",
            ),
        )
        .unwrap();

        let specs = parse_drift_tests(&path).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].endpoint_type, EndpointType::Cli);
        assert_eq!(specs[0].comparison_type, ComparisonType::Exact);
        assert!((specs[1].threshold() - 0.9).abs() < 1e-9);
        // Default threshold applies when unset.
        assert!((specs[0].threshold() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn missing_and_empty_files_yield_no_tests() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_drift_tests(&dir.path().join("absent.yml")).unwrap().is_empty());
        let empty = dir.path().join("empty.yml");
        std::fs::write(&empty, "").unwrap();
        assert!(parse_drift_tests(&empty).unwrap().is_empty());
    }

    #[tokio::test]
    async fn cli_test_executes() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DriftTestSpec {
            id: "echo".into(),
            name: "echo".into(),
            endpoint_type: EndpointType::Cli,
            endpoint_config: serde_json::json!({"command": "echo hello drift"}),
            comparison_type: ComparisonType::Exact,
            comparison_config: serde_json::Value::Null,
        };
        let output = execute_test(&spec, dir.path()).await.unwrap();
        assert_eq!(output, "hello drift\n");
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DriftTestSpec {
            id: "boom".into(),
            name: "boom".into(),
            endpoint_type: EndpointType::Cli,
            endpoint_config: serde_json::json!({"command": "exit 3"}),
            comparison_type: ComparisonType::Exact,
            comparison_config: serde_json::Value::Null,
        };
        assert!(execute_test(&spec, dir.path()).await.is_err());
    }
}
