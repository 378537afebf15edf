//! Stack detector: primary language and per-language statistics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use nit_core::{Agent, TaskInput, TaskOutput};

use super::is_skipped_dir;

/// Manifest files that strongly indicate a language is in active use.
const MANIFEST_WEIGHTS: [(&str, &str, u32); 8] = [
    ("package.json", "javascript", 25),
    ("tsconfig.json", "typescript", 25),
    ("pyproject.toml", "python", 25),
    ("requirements.txt", "python", 15),
    ("Cargo.toml", "rust", 25),
    ("go.mod", "go", 25),
    ("pom.xml", "java", 25),
    ("CMakeLists.txt", "cpp", 15),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct LanguageStats {
    pub file_count: u32,
    pub line_count: u64,
    pub score: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StackProfile {
    pub primary_language: String,
    pub languages: HashMap<String, LanguageStats>,
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" => Some("python"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "ts" | "tsx" | "mts" | "cts" => Some("typescript"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some("cpp"),
        "java" => Some("java"),
        "kt" | "kts" => Some("kotlin"),
        "cs" => Some("csharp"),
        "go" => Some("go"),
        "rs" => Some("rust"),
        _ => None,
    }
}

/// Walk the project and build the per-language profile.
pub fn detect_stack(root: &Path) -> Result<StackProfile, String> {
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }

    let mut profile = StackProfile::default();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !is_skipped_dir(n))
                .unwrap_or(true)
        })
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        for (manifest, language, weight) in MANIFEST_WEIGHTS {
            if name == manifest {
                profile
                    .languages
                    .entry(language.to_string())
                    .or_default()
                    .score += weight;
            }
        }

        let Some(language) = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .and_then(|e| language_for_extension(&e))
        else {
            continue;
        };
        let stats = profile.languages.entry(language.to_string()).or_default();
        stats.file_count += 1;
        stats.score += 1;
        if let Ok(text) = std::fs::read_to_string(entry.path()) {
            stats.line_count += text.lines().count() as u64;
        }
    }

    profile.primary_language = profile
        .languages
        .iter()
        .max_by_key(|(name, s)| (s.score, std::cmp::Reverse(name.as_str())))
        .map(|(name, _)| name.clone())
        .unwrap_or_default();
    Ok(profile)
}

/// Agent wrapper around `detect_stack`.
pub struct StackDetector;

#[async_trait]
impl Agent for StackDetector {
    fn name(&self) -> &str {
        "stack-detector"
    }

    fn description(&self) -> &str {
        "Detect the project's primary language and per-language statistics"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        match detect_stack(&root) {
            Ok(profile) => TaskOutput::completed(json!({
                "primary_language": profile.primary_language,
                "languages": profile.languages,
            })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_project_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"x\"\n").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("app.py"), "print('hi')\n").unwrap();
        std::fs::write(src.join("util.py"), "x = 1\n").unwrap();

        let profile = detect_stack(dir.path()).unwrap();
        assert_eq!(profile.primary_language, "python");
        assert_eq!(profile.languages["python"].file_count, 2);
    }

    #[test]
    fn manifest_outweighs_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        std::fs::write(dir.path().join("lib.rs"), "pub fn f() {}\n").unwrap();
        // A couple of scripts should not flip the primary language.
        std::fs::write(dir.path().join("a.py"), "\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "\n").unwrap();

        let profile = detect_stack(dir.path()).unwrap();
        assert_eq!(profile.primary_language, "rust");
    }

    #[test]
    fn node_modules_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let nm = dir.path().join("node_modules").join("dep");
        std::fs::create_dir_all(&nm).unwrap();
        std::fs::write(nm.join("index.js"), "module.exports = {};\n").unwrap();

        let profile = detect_stack(dir.path()).unwrap();
        assert!(profile.languages.is_empty());
    }
}
