//! Contract-test builder. Non-LLM: each Pact interaction deterministically
//! becomes a consumer-mock test and a provider-verification test.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use nit_core::{Agent, GlobalMemory, TaskInput, TaskOutput};

use crate::analyzers::contract::{detect_contracts, PactContract, PactInteraction};

fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Emit a consumer-side test that mocks the provider per the contract.
pub fn consumer_test(contract: &PactContract, interaction: &PactInteraction) -> String {
    let name = slugify(&interaction.description);
    let body = serde_json::to_string(&interaction.response_body).unwrap_or_else(|_| "null".into());
    format!(
        "\
test('consumer: {description}', async () => {{
  // Provider mocked per the {provider} contract.
  const server = mockProvider({{
    method: '{method}',
    path: '{path}',
    status: {status},
    body: {body},
  }});

  const response = await consumerClient(server.url).request('{method}', '{path}');

  expect(response.status).toBe({status});
  expect(response.body).toEqual({body});
  server.close();
}});

",
        description = name,
        provider = contract.provider,
        method = interaction.method,
        path = interaction.path,
        status = interaction.response_status,
        body = body,
    )
}

/// Emit a provider-side verification test replaying the request.
pub fn provider_test(contract: &PactContract, interaction: &PactInteraction) -> String {
    let name = slugify(&interaction.description);
    let state = interaction
        .provider_state
        .as_deref()
        .unwrap_or("no specific state");
    format!(
        "\
test('provider: {description}', async () => {{
  // Verifies {provider} against the {consumer} expectation.
  await providerState('{state}');

  const response = await providerApp().request('{method}', '{path}');

  expect(response.status).toBe({status});
}});

",
        description = name,
        provider = contract.provider,
        consumer = contract.consumer,
        state = state,
        method = interaction.method,
        path = interaction.path,
        status = interaction.response_status,
    )
}

/// Render both files' content for one contract.
pub fn build_contract_tests(contract: &PactContract) -> (String, String) {
    let mut consumer = format!(
        "// Consumer contract tests: {} -> {}\n\n",
        contract.consumer, contract.provider
    );
    let mut provider = format!(
        "// Provider verification tests: {} <- {}\n\n",
        contract.provider, contract.consumer
    );
    for interaction in &contract.interactions {
        consumer.push_str(&consumer_test(contract, interaction));
        provider.push_str(&provider_test(contract, interaction));
    }
    (consumer, provider)
}

pub struct ContractTestBuilder {
    memory: Option<Arc<GlobalMemory>>,
    project_root: PathBuf,
}

impl ContractTestBuilder {
    pub fn new(memory: Option<Arc<GlobalMemory>>, project_root: PathBuf) -> Self {
        Self {
            memory,
            project_root,
        }
    }
}

#[async_trait]
impl Agent for ContractTestBuilder {
    fn name(&self) -> &str {
        "contract-test-builder"
    }

    fn description(&self) -> &str {
        "Emit consumer-mock and provider-verification tests from Pact contracts"
    }

    async fn run(&self, _task: TaskInput) -> TaskOutput {
        let contracts = detect_contracts(&self.project_root);
        if contracts.is_empty() {
            return TaskOutput::completed(json!({ "generated": [], "contracts": 0 }));
        }

        let out_dir = self.project_root.join("tests").join("contracts");
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            return TaskOutput::failed_with(format!("cannot create output dir: {e}"));
        }

        let mut generated = Vec::new();
        let mut case_count = 0u64;
        for contract in &contracts {
            let (consumer, provider) = build_contract_tests(contract);
            let base = slugify(&format!("{}_{}", contract.consumer, contract.provider));
            let consumer_path = out_dir.join(format!("{base}.consumer.test.ts"));
            let provider_path = out_dir.join(format!("{base}.provider.test.ts"));
            if let Err(e) = std::fs::write(&consumer_path, consumer) {
                return TaskOutput::failed_with(format!("write failed: {e}"));
            }
            if let Err(e) = std::fs::write(&provider_path, provider) {
                return TaskOutput::failed_with(format!("write failed: {e}"));
            }
            case_count += contract.interactions.len() as u64 * 2;
            generated.push(consumer_path.display().to_string());
            generated.push(provider_path.display().to_string());
        }

        if let Some(memory) = &self.memory {
            let _ = memory.update_stats(true, case_count);
        }

        TaskOutput::completed(json!({
            "generated": generated,
            "contracts": contracts.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contract() -> PactContract {
        PactContract {
            file: "pacts/web-user.json".into(),
            consumer: "web-app".into(),
            provider: "user-service".into(),
            interactions: vec![PactInteraction {
                description: "a request for user 42".into(),
                provider_state: Some("user 42 exists".into()),
                method: "GET".into(),
                path: "/users/42".into(),
                response_status: 200,
                response_body: json!({"id": 42}),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn both_sides_emitted_per_interaction() {
        let contract = sample_contract();
        let (consumer, provider) = build_contract_tests(&contract);
        assert!(consumer.contains("consumer: a_request_for_user_42"));
        assert!(consumer.contains("'/users/42'"));
        assert!(consumer.contains("toBe(200)"));
        assert!(provider.contains("provider: a_request_for_user_42"));
        assert!(provider.contains("user 42 exists"));
    }

    #[tokio::test]
    async fn builder_writes_files_from_pacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pacts = dir.path().join("pacts");
        std::fs::create_dir_all(&pacts).unwrap();
        std::fs::write(
            pacts.join("web-user.json"),
            r#"{"consumer":{"name":"web-app"},"provider":{"name":"user-service"},
                "interactions":[{"description":"fetch user","request":{"method":"get","path":"/users/1"},
                "response":{"status":200}}]}"#,
        )
        .unwrap();

        let builder = ContractTestBuilder::new(None, dir.path().to_path_buf());
        let output = builder.run(TaskInput::new("build_contract_tests", ".")).await;
        assert!(output.is_completed());
        let generated = output.result["generated"].as_array().unwrap();
        assert_eq!(generated.len(), 2);
        for path in generated {
            assert!(std::path::Path::new(path.as_str().unwrap()).is_file());
        }
    }

    #[tokio::test]
    async fn no_contracts_is_a_clean_noop() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ContractTestBuilder::new(None, dir.path().to_path_buf());
        let output = builder.run(TaskInput::new("build_contract_tests", ".")).await;
        assert!(output.is_completed());
        assert_eq!(output.result["contracts"], 0);
    }
}
