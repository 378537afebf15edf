//! Contract analyzer: Pact-style JSON contracts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use walkdir::WalkDir;

use nit_core::{Agent, TaskInput, TaskOutput};

/// Directories where Pact contracts conventionally live.
const CONTRACT_DIRS: [&str; 3] = ["pacts", "pact", "contracts"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PactInteraction {
    pub description: String,
    #[serde(default)]
    pub provider_state: Option<String>,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub request_headers: serde_json::Value,
    #[serde(default)]
    pub request_body: serde_json::Value,
    pub response_status: u16,
    #[serde(default)]
    pub response_headers: serde_json::Value,
    #[serde(default)]
    pub response_body: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PactContract {
    pub file: String,
    pub consumer: String,
    pub provider: String,
    pub interactions: Vec<PactInteraction>,
}

fn parse_pact(path: &Path, rel: &str) -> Option<PactContract> {
    let text = std::fs::read_to_string(path).ok()?;
    let doc: serde_json::Value = serde_json::from_str(&text).ok()?;

    let consumer = doc.get("consumer")?.get("name")?.as_str()?.to_string();
    let provider = doc.get("provider")?.get("name")?.as_str()?.to_string();
    let interactions = doc
        .get("interactions")
        .and_then(|i| i.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let request = item.get("request")?;
                    let response = item.get("response")?;
                    Some(PactInteraction {
                        description: item
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or("")
                            .to_string(),
                        provider_state: item
                            .get("providerState")
                            .or_else(|| item.get("provider_state"))
                            .and_then(|s| s.as_str())
                            .map(str::to_string),
                        method: request
                            .get("method")
                            .and_then(|m| m.as_str())
                            .unwrap_or("GET")
                            .to_uppercase(),
                        path: request
                            .get("path")
                            .and_then(|p| p.as_str())
                            .unwrap_or("/")
                            .to_string(),
                        request_headers: request
                            .get("headers")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null),
                        request_body: request
                            .get("body")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null),
                        response_status: response
                            .get("status")
                            .and_then(|s| s.as_u64())
                            .unwrap_or(200) as u16,
                        response_headers: response
                            .get("headers")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null),
                        response_body: response
                            .get("body")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(PactContract {
        file: rel.to_string(),
        consumer,
        provider,
        interactions,
    })
}

/// Find and parse every Pact contract under the conventional dirs.
pub fn detect_contracts(root: &Path) -> Vec<PactContract> {
    let mut contracts = Vec::new();
    for dir_name in CONTRACT_DIRS {
        let dir = root.join(dir_name);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).max_depth(3).into_iter().flatten() {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path).display().to_string();
            if let Some(contract) = parse_pact(path, &rel) {
                contracts.push(contract);
            }
        }
    }
    contracts
}

pub struct ContractAnalyzer;

#[async_trait]
impl Agent for ContractAnalyzer {
    fn name(&self) -> &str {
        "contract-analyzer"
    }

    fn description(&self) -> &str {
        "Detect and parse Pact-style consumer/provider contracts"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        if !root.is_dir() {
            return TaskOutput::failed_with(format!("Not a directory: {}", root.display()));
        }
        let contracts = detect_contracts(&root);
        TaskOutput::completed(json!({ "contracts": contracts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACT: &str = r#"{
        "consumer": {"name": "web-app"},
        "provider": {"name": "user-service"},
        "interactions": [
            {
                "description": "a request for user 42",
                "providerState": "user 42 exists",
                "request": {"method": "get", "path": "/users/42"},
                "response": {"status": 200, "body": {"id": 42, "name": "Ada"}}
            }
        ]
    }"#;

    #[test]
    fn pact_parsed_from_pacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pacts = dir.path().join("pacts");
        std::fs::create_dir_all(&pacts).unwrap();
        std::fs::write(pacts.join("web-app-user-service.json"), PACT).unwrap();

        let contracts = detect_contracts(dir.path());
        assert_eq!(contracts.len(), 1);
        let contract = &contracts[0];
        assert_eq!(contract.consumer, "web-app");
        assert_eq!(contract.provider, "user-service");
        assert_eq!(contract.interactions.len(), 1);
        let interaction = &contract.interactions[0];
        assert_eq!(interaction.method, "GET");
        assert_eq!(interaction.path, "/users/42");
        assert_eq!(interaction.response_status, 200);
        assert_eq!(interaction.provider_state.as_deref(), Some("user 42 exists"));
    }

    #[test]
    fn non_pact_json_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let contracts_dir = dir.path().join("contracts");
        std::fs::create_dir_all(&contracts_dir).unwrap();
        std::fs::write(contracts_dir.join("schema.json"), r#"{"type": "object"}"#).unwrap();
        assert!(detect_contracts(dir.path()).is_empty());
    }

    #[test]
    fn no_contract_dirs_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_contracts(dir.path()).is_empty());
    }
}
