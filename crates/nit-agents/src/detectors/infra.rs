//! Infrastructure detector: CI provider, Docker artifacts, Makefiles,
//! and the test commands CI actually runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use nit_core::{Agent, TaskInput, TaskOutput};

#[derive(Debug, Clone, Serialize)]
pub struct CiConfig {
    pub provider: String,
    pub path: String,
    pub test_commands: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InfraProfile {
    pub ci_configs: Vec<CiConfig>,
    pub dockerfiles: Vec<String>,
    pub compose_files: Vec<String>,
    pub makefiles: Vec<String>,
    pub make_targets: Vec<String>,
}

/// (provider, marker path or glob, is_directory)
const CI_MARKERS: [(&str, &str, bool); 7] = [
    ("github-actions", ".github/workflows", true),
    ("gitlab", ".gitlab-ci.yml", false),
    ("jenkins", "Jenkinsfile", false),
    ("circleci", ".circleci/config.yml", false),
    ("travis", ".travis.yml", false),
    ("azure-pipelines", "azure-pipelines.yml", false),
    ("bitbucket", "bitbucket-pipelines.yml", false),
];

/// Command substrings that mean "this line runs tests".
const TEST_COMMAND_RE: &str = r"(?m)^\s*(?:-\s+)?(?:run:\s*)?\|?\s*((?:npx\s+|npm\s+|pnpm\s+|yarn\s+|python\s+-m\s+|cargo\s+|go\s+|mvn\s+|gradle\s+|\./gradlew\s+|dotnet\s+|ctest|pytest|vitest|jest|playwright)[^\n]*(?:test|spec|pytest|vitest|jest|playwright|ctest)[^\n]*)";

fn extract_test_commands(content: &str) -> Vec<String> {
    let re = Regex::new(TEST_COMMAND_RE).expect("static regex");
    let mut commands: Vec<String> = re
        .captures_iter(content)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    commands.dedup();
    commands
}

fn collect_ci_configs(root: &Path) -> Vec<CiConfig> {
    let mut configs = Vec::new();
    for (provider, marker, is_dir) in CI_MARKERS {
        let path = root.join(marker);
        if is_dir {
            if !path.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&path).max_depth(1).into_iter().flatten() {
                let p = entry.path();
                let is_yaml = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e == "yml" || e == "yaml")
                    .unwrap_or(false);
                if entry.file_type().is_file() && is_yaml {
                    let content = std::fs::read_to_string(p).unwrap_or_default();
                    configs.push(CiConfig {
                        provider: provider.to_string(),
                        path: p.strip_prefix(root).unwrap_or(p).display().to_string(),
                        test_commands: extract_test_commands(&content),
                    });
                }
            }
        } else if path.is_file() {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            configs.push(CiConfig {
                provider: provider.to_string(),
                path: marker.to_string(),
                test_commands: extract_test_commands(&content),
            });
        }
    }
    configs
}

fn collect_docker(root: &Path, profile: &mut InfraProfile) {
    for entry in WalkDir::new(root)
        .max_depth(3)
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
        let name = entry.file_name().to_string_lossy();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        if name == "Dockerfile" || name.starts_with("Dockerfile.") {
            profile.dockerfiles.push(rel);
        } else if name == "docker-compose.yml"
            || name == "docker-compose.yaml"
            || name == "compose.yml"
            || name == "compose.yaml"
        {
            profile.compose_files.push(rel);
        }
    }
}

fn collect_makefiles(root: &Path, profile: &mut InfraProfile) {
    let makefile = root.join("Makefile");
    if !makefile.is_file() {
        return;
    }
    profile.makefiles.push("Makefile".into());
    if let Ok(text) = std::fs::read_to_string(&makefile) {
        let re = Regex::new(r"(?m)^([A-Za-z][\w-]*)\s*:").expect("static regex");
        profile.make_targets = re
            .captures_iter(&text)
            .map(|caps| caps[1].to_string())
            .collect();
    }
}

/// Scan the project for CI, Docker, and Makefile infrastructure.
pub fn detect_infra(root: &Path) -> Result<InfraProfile, String> {
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }
    let mut profile = InfraProfile {
        ci_configs: collect_ci_configs(root),
        ..Default::default()
    };
    collect_docker(root, &mut profile);
    collect_makefiles(root, &mut profile);
    Ok(profile)
}

pub struct InfraDetector;

#[async_trait]
impl Agent for InfraDetector {
    fn name(&self) -> &str {
        "infra-detector"
    }

    fn description(&self) -> &str {
        "Identify CI providers, Docker artifacts, and Makefile test targets"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        match detect_infra(&root) {
            Ok(profile) => TaskOutput::completed(json!({
                "ci_configs": profile.ci_configs,
                "dockerfiles": profile.dockerfiles,
                "compose_files": profile.compose_files,
                "makefiles": profile.makefiles,
                "make_targets": profile.make_targets,
            })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_actions_detected_with_test_commands() {
        let dir = tempfile::tempdir().unwrap();
        let workflows = dir.path().join(".github").join("workflows");
        std::fs::create_dir_all(&workflows).unwrap();
        std::fs::write(
            workflows.join("ci.yml"),
            "jobs:\n  test:\n    steps:\n      - run: npm install\n      - run: npx vitest run --coverage\n",
        )
        .unwrap();

        let profile = detect_infra(dir.path()).unwrap();
        assert_eq!(profile.ci_configs.len(), 1);
        assert_eq!(profile.ci_configs[0].provider, "github-actions");
        assert!(profile.ci_configs[0]
            .test_commands
            .iter()
            .any(|c| c.contains("vitest run")));
    }

    #[test]
    fn gitlab_and_docker_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".gitlab-ci.yml"),
            "test:\n  script:\n    - cargo test --all\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();

        let profile = detect_infra(dir.path()).unwrap();
        assert_eq!(profile.ci_configs[0].provider, "gitlab");
        assert!(profile.ci_configs[0].test_commands.iter().any(|c| c.contains("cargo test")));
        assert_eq!(profile.dockerfiles, vec!["Dockerfile"]);
        assert_eq!(profile.compose_files, vec!["docker-compose.yml"]);
    }

    #[test]
    fn makefile_targets_extracted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Makefile"),
            "build:\n\tcargo build\n\ntest: build\n\tcargo test\n",
        )
        .unwrap();
        let profile = detect_infra(dir.path()).unwrap();
        assert!(profile.make_targets.contains(&"build".to_string()));
        assert!(profile.make_targets.contains(&"test".to_string()));
    }
}
