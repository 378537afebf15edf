//! Slack reporter: posts the run summary as block kit JSON to a webhook.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use nit_core::{Agent, TaskInput, TaskOutput};

use crate::orchestrator::RunSummary;

/// Build the Slack blocks payload for a summary.
pub fn build_payload(summary: &RunSummary) -> serde_json::Value {
    let status_line = if summary.failed == 0 {
        format!(":white_check_mark: {} tests generated", summary.tests_generated)
    } else {
        format!(
            ":warning: {} generated, {} target(s) failed",
            summary.tests_generated, summary.failed
        )
    };

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("Test generation: {}", summary.command) }
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": status_line }
        }),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Targets:* {}", summary.targets) },
                { "type": "mrkdwn", "text": format!("*Succeeded:* {}", summary.succeeded) },
                { "type": "mrkdwn", "text": format!("*Failed:* {}", summary.failed) },
                { "type": "mrkdwn", "text": format!("*Tokens:* {}", summary.tokens_used) },
            ]
        }),
    ];

    if !summary.errors.is_empty() {
        let shown: Vec<String> = summary.errors.iter().take(5).map(|e| format!("• {e}")).collect();
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Errors:*\n{}", shown.join("\n")) }
        }));
    }

    json!({ "blocks": blocks })
}

pub struct SlackReporter {
    webhook_url: String,
}

impl SlackReporter {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
        }
    }

    /// POST the summary. Failures are logged, never propagated.
    pub async fn report(&self, summary: &RunSummary) {
        if self.webhook_url.is_empty() {
            return;
        }
        let payload = build_payload(summary);
        match reqwest::Client::new()
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!("posted run summary to Slack");
            }
            Ok(response) => {
                warn!("Slack webhook returned HTTP {}", response.status());
            }
            Err(e) => warn!("Slack webhook failed: {e}"),
        }
    }
}

#[async_trait]
impl Agent for SlackReporter {
    fn name(&self) -> &str {
        "slack-reporter"
    }

    fn description(&self) -> &str {
        "Post run summaries to a Slack webhook"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let summary: RunSummary = match task
            .context
            .get("summary")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(summary)) => summary,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad summary payload: {e}")),
            None => return TaskOutput::failed_with("summary missing from task context"),
        };
        self.report(&summary).await;
        TaskOutput::completed(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            command: "generate".into(),
            targets: 4,
            succeeded: 3,
            failed: 1,
            tests_generated: 3,
            tokens_used: 1200,
            errors: vec!["src/a.py: validation exhausted".into()],
            ..Default::default()
        }
    }

    #[test]
    fn payload_contains_counts_and_errors() {
        let payload = build_payload(&summary());
        let text = payload.to_string();
        assert!(text.contains("Test generation: generate"));
        assert!(text.contains("*Targets:* 4"));
        assert!(text.contains("*Failed:* 1"));
        assert!(text.contains("validation exhausted"));
    }

    #[test]
    fn clean_run_gets_checkmark() {
        let mut clean = summary();
        clean.failed = 0;
        clean.errors.clear();
        let payload = build_payload(&clean);
        assert!(payload.to_string().contains("white_check_mark"));
    }
}
