//! Eager `${NAME}` environment interpolation over parsed YAML.

use std::sync::OnceLock;

use regex::Regex;

fn env_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("static regex"))
}

/// Replace `${VAR}` placeholders with environment values; missing
/// variables resolve to the empty string.
pub fn resolve_env_vars(value: &str) -> String {
    env_var_re()
        .replace_all(value, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Recursively resolve every string in a YAML document.
pub fn resolve_value(value: serde_yaml::Value) -> serde_yaml::Value {
    match value {
        serde_yaml::Value::String(s) => serde_yaml::Value::String(resolve_env_vars(&s)),
        serde_yaml::Value::Sequence(items) => {
            serde_yaml::Value::Sequence(items.into_iter().map(resolve_value).collect())
        }
        serde_yaml::Value::Mapping(map) => serde_yaml::Value::Mapping(
            map.into_iter().map(|(k, v)| (k, resolve_value(v))).collect(),
        ),
        other => other,
    }
}
