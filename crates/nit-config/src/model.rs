//! Typed configuration model.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project root directory.
    #[serde(default)]
    pub root: String,
    /// Primary programming language override ("" = auto-detect).
    #[serde(default)]
    pub primary_language: String,
    /// Workspace/monorepo tool (none, turborepo, nx, pnpm, yarn, cargo).
    #[serde(default = "default_workspace_tool")]
    pub workspace_tool: String,
}

fn default_workspace_tool() -> String {
    "none".into()
}

/// Testing framework pins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestingSettings {
    #[serde(default)]
    pub unit_framework: String,
    #[serde(default)]
    pub e2e_framework: String,
    #[serde(default)]
    pub integration_framework: String,
}

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name (openai, anthropic, ollama).
    pub provider: String,
    /// Model identifier (e.g. gpt-4o).
    pub model: String,
    /// API key; supports `${ENV_VAR}` expansion.
    pub api_key: String,
    /// Custom base URL (Ollama or proxied endpoints).
    pub base_url: String,
    /// Execution mode: builtin, cli, custom, or ollama.
    pub mode: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    /// Command to pipe prompts through in cli/custom mode.
    pub cli_command: String,
    /// Timeout in seconds for cli-mode commands.
    pub cli_timeout: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: env_or("NIT_LLM_PROVIDER", "openai"),
            model: env("NIT_LLM_MODEL"),
            api_key: env("NIT_LLM_API_KEY"),
            base_url: env("NIT_LLM_BASE_URL"),
            mode: "builtin".into(),
            temperature: 0.2,
            max_tokens: 4096,
            requests_per_minute: 60,
            max_retries: 3,
            cli_command: String::new(),
            cli_timeout: 300,
        }
    }
}

impl LlmSettings {
    /// Whether enough information is present for generation.
    pub fn is_configured(&self) -> bool {
        match self.mode.as_str() {
            "ollama" => !self.model.is_empty(),
            "cli" | "custom" => !self.model.is_empty() && !self.cli_command.is_empty(),
            _ => !self.model.is_empty() && !self.api_key.is_empty(),
        }
    }
}

/// Platform integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub url: String,
    pub api_key: String,
    /// platform | byok | disabled ("" = infer).
    pub mode: String,
    pub user_id: String,
    pub project_id: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            url: env("NIT_PLATFORM_URL"),
            api_key: env("NIT_PLATFORM_API_KEY"),
            mode: env("NIT_PLATFORM_MODE"),
            user_id: env("NIT_PLATFORM_USER_ID"),
            project_id: env("NIT_PLATFORM_PROJECT_ID"),
        }
    }
}

impl PlatformSettings {
    /// Resolve the platform mode with defaults: an explicit value wins,
    /// otherwise `platform` when both url and key are present.
    pub fn normalized_mode(&self) -> &'static str {
        match self.mode.trim().to_lowercase().as_str() {
            "platform" => "platform",
            "byok" => "byok",
            "disabled" => "disabled",
            _ if !self.url.is_empty() && !self.api_key.is_empty() => "platform",
            _ => "disabled",
        }
    }
}

/// Reporting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default)]
    pub slack_webhook: String,
    #[serde(default)]
    pub email_alerts: Vec<String>,
}

/// E2E authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// form, token, oauth, cookie, or custom.
    pub strategy: String,
    pub login_url: String,
    pub username: String,
    pub password: String,
    pub token: String,
    pub token_header: String,
    pub token_prefix: String,
    pub success_indicator: String,
    pub cookie_name: String,
    pub cookie_value: String,
    pub custom_script: String,
    /// Timeout in milliseconds for auth operations.
    pub timeout: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            strategy: String::new(),
            login_url: String::new(),
            username: String::new(),
            password: String::new(),
            token: String::new(),
            token_header: "Authorization".into(),
            token_prefix: "Bearer".into(),
            success_indicator: String::new(),
            cookie_name: String::new(),
            cookie_value: String::new(),
            custom_script: String::new(),
            timeout: 30_000,
        }
    }
}

/// E2E testing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eSettings {
    pub enabled: bool,
    pub base_url: String,
    pub auth: AuthSettings,
}

/// Workspace/monorepo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub auto_detect: bool,
    pub packages: Vec<String>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            auto_detect: true,
            packages: Vec::new(),
        }
    }
}

/// Complete configuration from `.nit.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NitConfig {
    pub project: ProjectSettings,
    pub testing: TestingSettings,
    pub llm: LlmSettings,
    pub platform: PlatformSettings,
    pub report: ReportSettings,
    pub e2e: E2eSettings,
    pub workspace: WorkspaceSettings,
    /// Per-package overrides keyed by package path, merged over globals.
    pub packages: BTreeMap<String, serde_yaml::Value>,
}

fn parse_section<T: serde::de::DeserializeOwned>(value: serde_yaml::Value) -> Option<T> {
    serde_yaml::from_value(value).ok()
}

impl NitConfig {
    pub(crate) fn from_yaml(root: &Path, raw: serde_yaml::Value) -> Self {
        let section = |key: &str| raw.get(key).cloned().unwrap_or(serde_yaml::Value::Null);

        let mut project: ProjectSettings = parse_section(section("project"))
            .unwrap_or_else(|| ProjectSettings {
                root: root.display().to_string(),
                primary_language: String::new(),
                workspace_tool: "none".into(),
            });
        if project.root.is_empty() {
            project.root = root.display().to_string();
        }

        Self {
            project,
            testing: parse_section(section("testing")).unwrap_or_default(),
            llm: parse_section(section("llm")).unwrap_or_default(),
            platform: parse_section(section("platform")).unwrap_or_default(),
            report: parse_section(section("report")).unwrap_or_default(),
            e2e: parse_section(section("e2e")).unwrap_or_default(),
            workspace: parse_section(section("workspace")).unwrap_or_default(),
            packages: parse_section(section("packages")).unwrap_or_default(),
        }
    }

    /// E2E configuration for one package: package-level keys override the
    /// global block field by field, auth included.
    pub fn package_e2e(&self, package_path: &str) -> E2eSettings {
        let Some(pkg) = self.packages.get(package_path) else {
            return self.e2e.clone();
        };
        let Some(e2e_raw) = pkg.get("e2e").filter(|v| v.is_mapping()) else {
            return self.e2e.clone();
        };

        let mut merged = self.e2e.clone();
        if let Some(enabled) = e2e_raw.get("enabled").and_then(|v| v.as_bool()) {
            merged.enabled = enabled;
        }
        if let Some(base_url) = e2e_raw.get("base_url").and_then(|v| v.as_str()) {
            merged.base_url = base_url.to_string();
        }
        if let Some(auth_raw) = e2e_raw.get("auth").filter(|v| v.is_mapping()) {
            merged.auth = merge_auth(&merged.auth, auth_raw);
        }
        merged
    }
}

fn merge_auth(base: &AuthSettings, raw: &serde_yaml::Value) -> AuthSettings {
    let get = |key: &str, fallback: &str| {
        raw.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    };
    AuthSettings {
        strategy: get("strategy", &base.strategy),
        login_url: get("login_url", &base.login_url),
        username: get("username", &base.username),
        password: get("password", &base.password),
        token: get("token", &base.token),
        token_header: get("token_header", &base.token_header),
        token_prefix: get("token_prefix", &base.token_prefix),
        success_indicator: get("success_indicator", &base.success_indicator),
        cookie_name: get("cookie_name", &base.cookie_name),
        cookie_value: get("cookie_value", &base.cookie_value),
        custom_script: get("custom_script", &base.custom_script),
        timeout: raw
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(base.timeout),
    }
}
