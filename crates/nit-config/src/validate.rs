//! Configuration validation.
//!
//! Returns a flat list of human-readable error strings; an empty list
//! means the configuration is valid.

use crate::model::{AuthSettings, LlmSettings, NitConfig, PlatformSettings};

const VALID_AUTH_STRATEGIES: [&str; 5] = ["form", "token", "oauth", "cookie", "custom"];
const MAX_TEMPERATURE: f32 = 2.0;
const MIN_AUTH_TIMEOUT_MS: u64 = 1000;

/// Validate the E2E auth block. `prefix` qualifies error messages
/// (e.g. "packages.apps/web.e2e.auth").
pub fn validate_auth(auth: &AuthSettings, prefix: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if auth.strategy.is_empty() {
        return errors; // Strategy is optional.
    }

    if !VALID_AUTH_STRATEGIES.contains(&auth.strategy.as_str()) {
        errors.push(format!(
            "{prefix}.strategy must be one of: {} (got: {})",
            VALID_AUTH_STRATEGIES.join(", "),
            auth.strategy
        ));
    }

    match auth.strategy.as_str() {
        "form" => {
            if auth.login_url.is_empty() {
                errors.push(format!("{prefix}.login_url is required for form-based auth"));
            }
            if auth.username.is_empty() || auth.password.is_empty() {
                errors.push(format!(
                    "{prefix}.username and {prefix}.password are required for form-based auth"
                ));
            }
        }
        "token" if auth.token.is_empty() => {
            errors.push(format!("{prefix}.token is required for token-based auth"));
        }
        "cookie" if auth.cookie_name.is_empty() || auth.cookie_value.is_empty() => {
            errors.push(format!(
                "{prefix}.cookie_name and {prefix}.cookie_value are required for cookie-based auth"
            ));
        }
        "custom" if auth.custom_script.is_empty() => {
            errors.push(format!("{prefix}.custom_script is required for custom auth strategy"));
        }
        _ => {}
    }

    if auth.timeout < MIN_AUTH_TIMEOUT_MS {
        errors.push(format!(
            "{prefix}.timeout should be at least {MIN_AUTH_TIMEOUT_MS}ms (got: {})",
            auth.timeout
        ));
    }

    errors
}

fn validate_llm(llm: &LlmSettings) -> Vec<String> {
    let mut errors = Vec::new();

    if !["builtin", "cli", "custom", "ollama"].contains(&llm.mode.as_str()) {
        errors.push(format!(
            "llm.mode must be one of: builtin, cli, custom, ollama (got: {})",
            llm.mode
        ));
    }

    if ["cli", "custom"].contains(&llm.mode.as_str()) {
        if llm.cli_command.is_empty() {
            errors.push(format!("llm.cli_command is required when llm.mode is {}", llm.mode));
        }
        if llm.cli_timeout < 1 {
            errors.push("llm.cli_timeout must be >= 1 for cli/custom mode".into());
        }
    }

    if !["openai", "anthropic", "ollama"].contains(&llm.provider.as_str()) {
        errors.push(format!(
            "llm.provider not recognized: {} (should be openai, anthropic, or ollama)",
            llm.provider
        ));
    }

    if llm.temperature < 0.0 || llm.temperature > MAX_TEMPERATURE {
        errors.push(format!(
            "llm.temperature should be between 0 and {MAX_TEMPERATURE} (got: {})",
            llm.temperature
        ));
    }

    if llm.max_tokens < 1 {
        errors.push(format!("llm.max_tokens must be positive (got: {})", llm.max_tokens));
    }

    errors
}

fn validate_platform(platform: &PlatformSettings) -> Vec<String> {
    let mut errors = Vec::new();
    let mode = platform.normalized_mode();

    if mode == "platform" || mode == "byok" {
        if platform.url.is_empty() {
            errors.push("platform.url is required when platform.mode is platform or byok".into());
        }
        if platform.api_key.is_empty() {
            errors.push("platform.api_key is required when platform.mode is platform or byok".into());
        }
    }

    errors
}

/// Validate the whole configuration.
pub fn validate_config(config: &NitConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.project.root.is_empty() {
        errors.push("project.root is required".into());
    }

    errors.extend(validate_llm(&config.llm));
    errors.extend(validate_platform(&config.platform));

    if !config.e2e.auth.strategy.is_empty() {
        errors.extend(validate_auth(&config.e2e.auth, "e2e.auth"));
    }

    for package_path in config.packages.keys() {
        let package_e2e = config.package_e2e(package_path);
        if !package_e2e.auth.strategy.is_empty() {
            errors.extend(validate_auth(
                &package_e2e.auth,
                &format!("packages.{package_path}.e2e.auth"),
            ));
        }
    }

    errors
}
