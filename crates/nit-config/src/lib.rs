//! Configuration parsing from `.nit.yml`.
//!
//! The file is parsed once at startup, `${NAME}` placeholders are resolved
//! eagerly against the environment, and the resulting `NitConfig` is
//! immutable for the rest of the run. Validation returns a list of error
//! strings; any entry aborts startup with exit code 2.

mod interpolate;
mod model;
mod validate;

pub use interpolate::resolve_env_vars;
pub use model::{
    AuthSettings, E2eSettings, LlmSettings, NitConfig, PlatformSettings, ProjectSettings,
    ReportSettings, TestingSettings, WorkspaceSettings,
};
pub use validate::{validate_auth, validate_config};

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML in .nit.yml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Load `.nit.yml` from `root`, falling back to defaults and `NIT_*`
/// environment variables where the file is missing or incomplete.
pub fn load_config(root: &Path) -> Result<NitConfig, ConfigError> {
    let path = root.join(".nit.yml");
    let raw: serde_yaml::Value = if path.is_file() {
        let text = std::fs::read_to_string(&path)?;
        if text.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(&text)?
        }
    } else {
        serde_yaml::Value::Null
    };

    let resolved = interpolate::resolve_value(raw);
    Ok(model::NitConfig::from_yaml(root, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, text: &str) {
        std::fs::write(dir.path().join(".nit.yml"), text).unwrap();
    }

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.llm.mode, "builtin");
        assert_eq!(cfg.llm.temperature, 0.2);
        assert_eq!(cfg.llm.max_tokens, 4096);
        assert_eq!(cfg.llm.requests_per_minute, 60);
        assert_eq!(cfg.llm.max_retries, 3);
        assert_eq!(cfg.project.workspace_tool, "none");
        assert!(!cfg.llm.is_configured());
    }

    #[test]
    fn llm_section_parsed() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            &dir,
            "llm:\n  provider: anthropic\n  model: claude-sonnet-4-5\n  api_key: sk-ant-test\n  temperature: 0.5\n",
        );
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.llm.model, "claude-sonnet-4-5");
        assert_eq!(cfg.llm.api_key, "sk-ant-test");
        assert_eq!(cfg.llm.temperature, 0.5);
        assert!(cfg.llm.is_configured());
    }

    #[test]
    fn env_expansion_in_api_key() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("NIT_TEST_KEY_A91", "real-key");
        write_config(&dir, "llm:\n  model: gpt-4o\n  api_key: ${NIT_TEST_KEY_A91}\n");
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.llm.api_key, "real-key");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_config(&dir, "");
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.llm.model, "");
    }

    #[test]
    fn package_e2e_override_merges_over_global() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            &dir,
            concat!(
                "e2e:\n",
                "  enabled: true\n",
                "  base_url: http://localhost:3000\n",
                "  auth:\n",
                "    strategy: token\n",
                "    token: global-token\n",
                "packages:\n",
                "  apps/web:\n",
                "    e2e:\n",
                "      base_url: http://localhost:4000\n",
            ),
        );
        let cfg = load_config(dir.path()).unwrap();
        let merged = cfg.package_e2e("apps/web");
        assert!(merged.enabled);
        assert_eq!(merged.base_url, "http://localhost:4000");
        // Auth falls back to the global block.
        assert_eq!(merged.auth.strategy, "token");
        assert_eq!(merged.auth.token, "global-token");
        // Unknown packages get the global block unchanged.
        assert_eq!(cfg.package_e2e("apps/api").base_url, "http://localhost:3000");
    }
}
