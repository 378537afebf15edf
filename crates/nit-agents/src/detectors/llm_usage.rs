//! LLM-usage detector: where the target application itself calls LLMs.
//!
//! Finds known SDK imports, HTTP calls to known inference endpoints, and
//! prompt template files, and can seed a drift-tests.yml skeleton from
//! what it finds.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use nit_core::state::drift_tests_path;
use nit_core::{Agent, TaskInput, TaskOutput};

#[derive(Debug, Clone, Serialize)]
pub struct LlmUsageLocation {
    pub file: String,
    pub line: usize,
    /// sdk_import | http_endpoint | prompt_file
    pub kind: String,
    pub evidence: String,
}

const SDK_IMPORT_PATTERNS: [&str; 8] = [
    r"(?m)^\s*(?:import|from)\s+openai",
    r"(?m)^\s*(?:import|from)\s+anthropic",
    r"(?m)^\s*(?:import|from)\s+litellm",
    r"(?m)^\s*(?:import|from)\s+langchain",
    r#"from\s+['"]openai['"]"#,
    r#"from\s+['"]@anthropic-ai/sdk['"]"#,
    r#"from\s+['"]ai['"]"#,
    r#"require\s*\(\s*['"]openai['"]"#,
];

const ENDPOINT_PATTERNS: [&str; 4] = [
    r"api\.openai\.com",
    r"api\.anthropic\.com",
    r"generativelanguage\.googleapis\.com",
    r"localhost:11434",
];

const PROMPT_FILE_HINTS: [&str; 4] = ["prompt", "prompts", "system_prompt", "instructions"];

const SOURCE_EXTENSIONS: [&str; 8] = ["py", "js", "ts", "tsx", "jsx", "go", "rs", "java"];

fn scan_file(rel: &str, content: &str, locations: &mut Vec<LlmUsageLocation>) {
    for pattern in SDK_IMPORT_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        for m in re.find_iter(content) {
            let line = content[..m.start()].lines().count() + 1;
            locations.push(LlmUsageLocation {
                file: rel.to_string(),
                line,
                kind: "sdk_import".into(),
                evidence: m.as_str().trim().to_string(),
            });
        }
    }
    for pattern in ENDPOINT_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        for m in re.find_iter(content) {
            let line = content[..m.start()].lines().count() + 1;
            locations.push(LlmUsageLocation {
                file: rel.to_string(),
                line,
                kind: "http_endpoint".into(),
                evidence: m.as_str().to_string(),
            });
        }
    }
}

/// Scan the project for LLM usage.
pub fn detect_llm_usage(root: &Path) -> Result<Vec<LlmUsageLocation>, String> {
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }
    let mut locations = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !super::is_skipped_dir(n))
                .unwrap_or(true)
        })
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(path).display().to_string();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if PROMPT_FILE_HINTS.iter().any(|h| stem.contains(h))
            && ["txt", "md", "yaml", "yml", "j2", "hbs"].contains(&ext.as_str())
        {
            locations.push(LlmUsageLocation {
                file: rel,
                line: 1,
                kind: "prompt_file".into(),
                evidence: stem,
            });
            continue;
        }

        if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            if let Ok(content) = std::fs::read_to_string(path) {
                scan_file(&rel, &content, &mut locations);
            }
        }
    }

    Ok(locations)
}

/// Write a drift-tests.yml skeleton with one entry per distinct file
/// that calls an LLM. Existing files are left untouched.
pub fn write_drift_skeleton(
    root: &Path,
    locations: &[LlmUsageLocation],
) -> std::io::Result<Option<PathBuf>> {
    let path = drift_tests_path(root);
    if path.exists() || locations.is_empty() {
        return Ok(None);
    }

    let mut files: Vec<&str> = locations
        .iter()
        .filter(|l| l.kind != "prompt_file")
        .map(|l| l.file.as_str())
        .collect();
    files.sort();
    files.dedup();

    let mut doc = String::from("tests:\n");
    for (index, file) in files.iter().enumerate() {
        let id = format!("llm-usage-{}", index + 1);
        doc.push_str(&format!(
            concat!(
                "  - id: {id}\n",
                "    name: \"Drift check for {file}\"\n",
                "    endpoint_type: cli\n",
                "    endpoint_config:\n",
                "      command: \"echo TODO: invoke the LLM path in {file}\"\n",
                "    comparison_type: semantic\n",
                "    comparison_config:\n",
                "      threshold: 0.8\n",
            ),
            id = id,
            file = file,
        ));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, doc)?;
    Ok(Some(path))
}

pub struct LlmUsageDetector;

#[async_trait]
impl Agent for LlmUsageDetector {
    fn name(&self) -> &str {
        "llm-usage-detector"
    }

    fn description(&self) -> &str {
        "Locate LLM SDK imports, inference endpoints, and prompt files"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        let generate_skeleton = task
            .context
            .get("generate_drift_skeleton")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let locations = match detect_llm_usage(&root) {
            Ok(locations) => locations,
            Err(e) => return TaskOutput::failed_with(e),
        };

        let skeleton = if generate_skeleton {
            match write_drift_skeleton(&root, &locations) {
                Ok(path) => path.map(|p| p.display().to_string()),
                Err(e) => return TaskOutput::failed_with(format!("skeleton write failed: {e}")),
            }
        } else {
            None
        };

        TaskOutput::completed(json!({
            "locations": locations,
            "drift_skeleton": skeleton,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_imports_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bot.py"),
            "import openai\n\nclient = openai.OpenAI()\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("chat.ts"),
            "import Anthropic from '@anthropic-ai/sdk';\n",
        )
        .unwrap();

        let locations = detect_llm_usage(dir.path()).unwrap();
        assert!(locations
            .iter()
            .any(|l| l.file == "bot.py" && l.kind == "sdk_import" && l.line == 1));
        assert!(locations.iter().any(|l| l.file == "chat.ts"));
    }

    #[test]
    fn endpoints_and_prompt_files_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("client.go"),
            "package main\n\nconst url = \"https://api.openai.com/v1/chat/completions\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("system_prompt.txt"), "You are helpful.\n").unwrap();

        let locations = detect_llm_usage(dir.path()).unwrap();
        assert!(locations.iter().any(|l| l.kind == "http_endpoint" && l.line == 3));
        assert!(locations.iter().any(|l| l.kind == "prompt_file"));
    }

    #[test]
    fn skeleton_written_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bot.py"), "import openai\n").unwrap();
        let locations = detect_llm_usage(dir.path()).unwrap();

        let first = write_drift_skeleton(dir.path(), &locations).unwrap();
        assert!(first.is_some());
        let text = std::fs::read_to_string(first.unwrap()).unwrap();
        assert!(text.contains("llm-usage-1"));
        assert!(text.contains("comparison_type: semantic"));

        // Second call must not clobber the user's file.
        let second = write_drift_skeleton(dir.path(), &locations).unwrap();
        assert!(second.is_none());
    }
}
