//! Prompt templates rendered with handlebars.
//!
//! Each template produces a system + user message pair from a JSON
//! context. Adapters pick the template matching their framework; the
//! builders fill in source code, signatures, conventions, and memory
//! hints before dispatching to the engine.

use handlebars::Handlebars;
use serde_json::Value;

use crate::engine::LlmMessage;
use crate::errors::LlmError;

/// A named two-part prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    system: String,
    user: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: system.into(),
            user: user.into(),
        }
    }

    /// Render into the message list sent to the engine.
    pub fn render(&self, context: &Value) -> Result<Vec<LlmMessage>, LlmError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);

        let render = |template: &str| {
            registry
                .render_template(template, context)
                .map_err(|e| LlmError::Other {
                    model: String::new(),
                    message: format!("template '{}' failed to render: {e}", self.name),
                })
        };

        Ok(vec![
            LlmMessage::system(render(&self.system)?),
            LlmMessage::user(render(&self.user)?),
        ])
    }

    /// The unit-test template for a framework.
    pub fn unit(framework: &str) -> Self {
        Self::new(
            format!("unit_{framework}"),
            format!(
                "You are an expert software test engineer. Generate {framework} tests that \
                 follow the project's existing conventions. Output only the test file \
                 content, with no explanation and no markdown fences."
            ),
            UNIT_USER_TEMPLATE,
        )
    }

    /// The integration-test template for a framework.
    pub fn integration(framework: &str) -> Self {
        Self::new(
            format!("integration_{framework}"),
            format!(
                "You are an expert software test engineer. Generate {framework} integration \
                 tests that exercise the module together with its external dependencies, \
                 using the recommended fixtures and mocks. Output only the test file \
                 content, with no explanation and no markdown fences."
            ),
            INTEGRATION_USER_TEMPLATE,
        )
    }

    /// The end-to-end template for a browser framework.
    pub fn e2e(framework: &str) -> Self {
        Self::new(
            format!("e2e_{framework}"),
            format!(
                "You are an expert E2E test engineer. Generate a {framework} test for the \
                 given route or user flow. Prefer resilient selectors (data-testid, roles) \
                 over brittle CSS paths. Output only the test file content, with no \
                 explanation and no markdown fences."
            ),
            E2E_USER_TEMPLATE,
        )
    }

    /// The selector-healing template.
    pub fn healing() -> Self {
        Self::new(
            "self_healing",
            "You are fixing a failing browser test. The selector it uses no longer exists \
             on the page. Rewrite the test to use one of the candidate selectors from the \
             current DOM. Output only the corrected test file content.",
            HEALING_USER_TEMPLATE,
        )
    }

    /// The semantic-gap analysis template.
    pub fn semantic_gap() -> Self {
        Self::new(
            "semantic_gap",
            "You are a test strategy expert. Identify missing high-value test scenarios \
             for the given function. Think about edge cases, error paths, integration \
             points, behavioral rules, concurrency, and security.",
            SEMANTIC_GAP_USER_TEMPLATE,
        )
    }

    /// The root-cause analysis template.
    pub fn root_cause() -> Self {
        Self::new(
            "root_cause",
            "You are a debugging expert. Given a bug report, the failing output, and the \
             relevant source, identify the most likely root cause.",
            ROOT_CAUSE_USER_TEMPLATE,
        )
    }

    /// The fix-generation template.
    pub fn fix_generation() -> Self {
        Self::new(
            "fix_generation",
            "You are a senior engineer producing a minimal fix. Change only what is \
             necessary to fix the root cause. Output the complete corrected file content, \
             with no explanation and no markdown fences.",
            FIX_USER_TEMPLATE,
        )
    }
}

const UNIT_USER_TEMPLATE: &str = "\
Generate unit tests for the following {{language}} source file.

File: {{source_path}}

```
{{source_code}}
```
{{#if function_signatures}}
Functions under test:
{{#each function_signatures}}- {{this}}
{{/each}}{{/if}}
{{#if test_patterns}}
Project test conventions:
- naming style: {{test_patterns.naming_style}}
- assertion style: {{test_patterns.assertion_style}}
{{#if test_patterns.sample_test}}
Example from the existing suite:
```
{{test_patterns.sample_test}}
```
{{/if}}{{/if}}
{{#if memory_hints}}{{memory_hints}}{{/if}}
Cover normal behavior, edge cases, and error paths for every public function.";

const INTEGRATION_USER_TEMPLATE: &str = "\
Generate integration tests for the following {{language}} source file.

File: {{source_path}}

```
{{source_code}}
```
{{#if dependencies}}
External dependencies detected:
{{#each dependencies}}- {{this.kind}}: {{this.name}} (suggested fixture: {{this.fixture}})
{{/each}}{{/if}}
{{#if memory_hints}}{{memory_hints}}{{/if}}
Exercise the module against its dependencies using the suggested fixtures.";

const E2E_USER_TEMPLATE: &str = "\
Generate an end-to-end test.

{{#if route_path}}Route: {{route_path}}{{/if}}
{{#if base_url}}Base URL: {{base_url}}{{/if}}
{{#if flow_description}}Flow: {{flow_description}}{{/if}}
{{#if auth}}
Authentication: {{auth.strategy}}
{{#if auth.login_url}}Login URL: {{auth.login_url}}{{/if}}
{{/if}}
{{#if source_code}}
Handler source:
```
{{source_code}}
```
{{/if}}
{{#if memory_hints}}{{memory_hints}}{{/if}}
The test must be self-contained and runnable against the base URL.";

const HEALING_USER_TEMPLATE: &str = "\
The following test failed because the selector `{{old_selector}}` was not found.

Failing test:
```
{{test_code}}
```

Current DOM snapshot:
{{#if test_ids}}data-testid values: {{#each test_ids}}{{this}} {{/each}}{{/if}}
{{#if roles}}roles: {{#each roles}}{{this}} {{/each}}{{/if}}
{{#if selectors}}candidate selectors: {{#each selectors}}{{this}} {{/each}}{{/if}}

Rewrite the test using a selector that exists in the snapshot.";

const SEMANTIC_GAP_USER_TEMPLATE: &str = "\
Analyze `{{function_name}}` in {{file_path}} ({{language}}, cyclomatic complexity \
{{complexity}}, line coverage {{coverage_percentage}}%).

```
{{source_code}}
```
{{#if ast_structure}}Control flow: {{ast_structure}}{{/if}}

List the missing test scenarios. For each gap output a section separated by `---`:
**CATEGORY**: one of edge_case, error_path, integration, behavioral, concurrency, security
**SEVERITY**: high, medium, or low
**DESCRIPTION**: what is untested
**TEST_CASES**:
- specific test case
**CONFIDENCE**: 0.0-1.0
**REASONING**: why this matters";

const ROOT_CAUSE_USER_TEMPLATE: &str = "\
Bug report: {{bug_description}}

Failing output:
```
{{failure_output}}
```

Relevant source ({{file_path}}):
```
{{source_code}}
```

Respond with:
**CATEGORY**: logic | state | concurrency | integration | configuration
**LOCATION**: file and line of the defect
**EXPLANATION**: what goes wrong and why
**CONFIDENCE**: 0.0-1.0";

const FIX_USER_TEMPLATE: &str = "\
Root cause: {{root_cause}}

File to fix ({{file_path}}):
```
{{source_code}}
```

Produce the full corrected content of {{file_path}}.";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_template_renders_source_and_conventions() {
        let template = PromptTemplate::unit("pytest");
        let messages = template
            .render(&json!({
                "language": "python",
                "source_path": "src/calc.py",
                "source_code": "def add(a, b):\n    return a + b",
                "function_signatures": ["def add(a, b)"],
                "test_patterns": {
                    "naming_style": "function",
                    "assertion_style": "assert",
                    "sample_test": "def test_add():\n    assert add(1, 2) == 3",
                },
            }))
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("pytest"));
        assert!(messages[1].content.contains("def add(a, b)"));
        assert!(messages[1].content.contains("naming style: function"));
    }

    #[test]
    fn healing_template_names_old_selector_and_candidates() {
        let template = PromptTemplate::healing();
        let messages = template
            .render(&json!({
                "old_selector": "#old-button",
                "test_code": "await page.click('#old-button');",
                "test_ids": ["new-button", "submit"],
                "selectors": ["[data-testid=\"new-button\"]"],
            }))
            .unwrap();

        let user = &messages[1].content;
        assert!(user.contains("#old-button"));
        assert!(user.contains("new-button"));
    }

    #[test]
    fn missing_optional_sections_render_empty() {
        let template = PromptTemplate::unit("vitest");
        let messages = template
            .render(&json!({
                "language": "typescript",
                "source_path": "src/a.ts",
                "source_code": "export const x = 1;",
            }))
            .unwrap();
        assert!(!messages[1].content.contains("conventions:"));
    }
}
