//! Platform sink: optional uploads of reports, bugs, drift results,
//! usage, and security findings to the platform API. Every failure is
//! logged and swallowed — the platform is never load-bearing.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use nit_config::PlatformSettings;
use nit_llm::{UsageRecord, UsageSink};

#[async_trait]
pub trait PlatformSink: Send + Sync {
    async fn upload_report(&self, report: &Value);
    async fn upload_bugs(&self, bugs: &Value);
    async fn upload_drift(&self, report: &Value);
    async fn upload_security(&self, findings: &Value);
    async fn upload_coverage_gaps(&self, gaps: &Value);
    async fn upload_fixes(&self, fixes: &Value);
    async fn upload_usage(&self, usage: &Value);
}

/// HTTP implementation against the platform REST API.
pub struct HttpPlatformSink {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
}

impl HttpPlatformSink {
    /// Returns `None` when the platform is disabled or unconfigured.
    pub fn from_settings(settings: &PlatformSettings) -> Option<Self> {
        if settings.normalized_mode() == "disabled" {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            project_id: settings.project_id.clone(),
        })
    }

    async fn post(&self, path: &str, payload: &Value) {
        let url = format!("{}/api/v1/{path}", self.base_url);
        let mut body = payload.clone();
        if !self.project_id.is_empty() {
            if let Some(map) = body.as_object_mut() {
                map.insert("project_id".into(), Value::String(self.project_id.clone()));
            }
        }
        match self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("uploaded {path} to platform");
            }
            Ok(response) => warn!("platform upload {path} returned HTTP {}", response.status()),
            Err(e) => warn!("platform upload {path} failed: {e}"),
        }
    }
}

#[async_trait]
impl PlatformSink for HttpPlatformSink {
    async fn upload_report(&self, report: &Value) {
        self.post("reports", report).await;
    }

    async fn upload_bugs(&self, bugs: &Value) {
        self.post("bugs", bugs).await;
    }

    async fn upload_drift(&self, report: &Value) {
        self.post("drift", report).await;
    }

    async fn upload_security(&self, findings: &Value) {
        self.post("security", findings).await;
    }

    async fn upload_coverage_gaps(&self, gaps: &Value) {
        self.post("coverage-gaps", gaps).await;
    }

    async fn upload_fixes(&self, fixes: &Value) {
        self.post("fixes", fixes).await;
    }

    async fn upload_usage(&self, usage: &Value) {
        self.post("usage", usage).await;
    }
}

/// Usage sink that forwards each LLM usage record to the platform on a
/// background task (the `UsageSink` trait is synchronous).
pub struct PlatformUsageSink {
    base_url: String,
    api_key: String,
}

impl PlatformUsageSink {
    pub fn from_settings(settings: &PlatformSettings) -> Option<Self> {
        if settings.normalized_mode() == "disabled" {
            return None;
        }
        Some(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }
}

impl UsageSink for PlatformUsageSink {
    fn record(&self, usage: &UsageRecord) {
        let url = format!("{}/api/v1/usage", self.base_url);
        let api_key = self.api_key.clone();
        let payload = serde_json::to_value(usage).unwrap_or(Value::Null);
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            if let Err(e) = client.post(&url).bearer_auth(&api_key).json(&payload).send().await {
                warn!("usage upload failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_platform_builds_no_sink() {
        let settings = PlatformSettings {
            mode: "disabled".into(),
            ..Default::default()
        };
        assert!(HttpPlatformSink::from_settings(&settings).is_none());
        assert!(PlatformUsageSink::from_settings(&settings).is_none());
    }

    #[test]
    fn configured_platform_builds_sink() {
        let settings = PlatformSettings {
            url: "https://platform.example/".into(),
            api_key: "nit_key".into(),
            mode: "platform".into(),
            project_id: "proj-1".into(),
            ..Default::default()
        };
        let sink = HttpPlatformSink::from_settings(&settings).unwrap();
        assert_eq!(sink.base_url, "https://platform.example");
    }
}
