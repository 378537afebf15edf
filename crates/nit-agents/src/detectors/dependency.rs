//! Dependency detector: declared dependencies, lock files, and
//! workspace-internal dependency edges.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;

use nit_core::{Agent, TaskInput, TaskOutput};

#[derive(Debug, Clone, Serialize)]
pub struct DeclaredDependency {
    pub name: String,
    pub version: String,
    pub dev: bool,
    pub manifest: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyProfile {
    pub dependencies: Vec<DeclaredDependency>,
    pub lock_files: Vec<String>,
    /// package path → workspace-local packages it depends on.
    pub internal_dependencies: BTreeMap<String, Vec<String>>,
}

const LOCK_FILES: [&str; 8] = [
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "uv.lock",
    "Cargo.lock",
    "go.sum",
    "composer.lock",
];

fn parse_package_json(root: &Path, out: &mut Vec<DeclaredDependency>) {
    let Ok(text) = std::fs::read_to_string(root.join("package.json")) else {
        return;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
        return;
    };
    for (section, dev) in [("dependencies", false), ("devDependencies", true)] {
        if let Some(deps) = json.get(section).and_then(|d| d.as_object()) {
            for (name, version) in deps {
                out.push(DeclaredDependency {
                    name: name.clone(),
                    version: version.as_str().unwrap_or("").to_string(),
                    dev,
                    manifest: "package.json".into(),
                });
            }
        }
    }
}

fn parse_requirements(root: &Path, out: &mut Vec<DeclaredDependency>) {
    for (file, dev) in [
        ("requirements.txt", false),
        ("requirements-dev.txt", true),
        ("requirements_dev.txt", true),
    ] {
        let Ok(text) = std::fs::read_to_string(root.join(file)) else {
            continue;
        };
        for line in text.lines() {
            let stripped = line.split('#').next().unwrap_or("").trim();
            if stripped.is_empty() || stripped.starts_with('-') {
                continue;
            }
            let mut split = stripped.splitn(2, ['<', '>', '=', '!', '~', ';', '[']);
            let name = split.next().unwrap_or("").trim();
            if !name.is_empty() {
                out.push(DeclaredDependency {
                    name: name.to_string(),
                    version: stripped[name.len()..].trim().to_string(),
                    dev,
                    manifest: file.into(),
                });
            }
        }
    }
}

fn parse_pyproject(root: &Path, out: &mut Vec<DeclaredDependency>) {
    let Ok(text) = std::fs::read_to_string(root.join("pyproject.toml")) else {
        return;
    };
    // Light-weight extraction of `dependencies = [ "pkg>=1.0", ... ]`
    // entries without a full TOML parser.
    let re = Regex::new(r#""([A-Za-z0-9_.-]+)\s*(\[[^\]]*\])?\s*([<>=!~][^"]*)?""#).unwrap();
    let mut in_deps = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("dependencies") && trimmed.contains('[') {
            in_deps = true;
        }
        if in_deps {
            for caps in re.captures_iter(trimmed) {
                out.push(DeclaredDependency {
                    name: caps[1].to_string(),
                    version: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
                    dev: false,
                    manifest: "pyproject.toml".into(),
                });
            }
            if trimmed.ends_with(']') {
                in_deps = false;
            }
        }
    }
}

fn parse_go_mod(root: &Path, out: &mut Vec<DeclaredDependency>) {
    let Ok(text) = std::fs::read_to_string(root.join("go.mod")) else {
        return;
    };
    let re = Regex::new(r"(?m)^\s*([\w./-]+)\s+(v[\w.+-]+)").unwrap();
    let mut in_require = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("require (") {
            in_require = true;
            continue;
        }
        if trimmed == ")" {
            in_require = false;
            continue;
        }
        let candidate = trimmed.strip_prefix("require ").unwrap_or(trimmed);
        if (in_require || trimmed.starts_with("require ")) && !candidate.is_empty() {
            if let Some(caps) = re.captures(candidate) {
                out.push(DeclaredDependency {
                    name: caps[1].to_string(),
                    version: caps[2].to_string(),
                    dev: false,
                    manifest: "go.mod".into(),
                });
            }
        }
    }
}

fn parse_cargo_toml(root: &Path, out: &mut Vec<DeclaredDependency>) {
    let Ok(text) = std::fs::read_to_string(root.join("Cargo.toml")) else {
        return;
    };
    let mut section: Option<bool> = None; // Some(dev) while in a deps table.
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            section = match trimmed {
                "[dependencies]" => Some(false),
                "[dev-dependencies]" => Some(true),
                _ => None,
            };
            continue;
        }
        let Some(dev) = section else { continue };
        let Some((name, rest)) = trimmed.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        out.push(DeclaredDependency {
            name: name.to_string(),
            version: rest.trim().trim_matches('"').to_string(),
            dev,
            manifest: "Cargo.toml".into(),
        });
    }
}

fn parse_jvm_manifests(root: &Path, out: &mut Vec<DeclaredDependency>) {
    for file in ["build.gradle", "build.gradle.kts"] {
        let Ok(text) = std::fs::read_to_string(root.join(file)) else {
            continue;
        };
        let re = Regex::new(
            r#"(implementation|api|testImplementation)\s*\(?["']([\w.-]+):([\w.-]+):([\w.-]+)["']"#,
        )
        .unwrap();
        for caps in re.captures_iter(&text) {
            out.push(DeclaredDependency {
                name: format!("{}:{}", &caps[2], &caps[3]),
                version: caps[4].to_string(),
                dev: &caps[1] == "testImplementation",
                manifest: file.into(),
            });
        }
    }

    if let Ok(text) = std::fs::read_to_string(root.join("pom.xml")) {
        let re = Regex::new(
            r"(?s)<dependency>.*?<groupId>([^<]+)</groupId>.*?<artifactId>([^<]+)</artifactId>(?:.*?<version>([^<]+)</version>)?.*?</dependency>",
        )
        .unwrap();
        for caps in re.captures_iter(&text) {
            out.push(DeclaredDependency {
                name: format!("{}:{}", caps[1].trim(), caps[2].trim()),
                version: caps.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                dev: false,
                manifest: "pom.xml".into(),
            });
        }
    }
}

fn parse_composer(root: &Path, out: &mut Vec<DeclaredDependency>) {
    let Ok(text) = std::fs::read_to_string(root.join("composer.json")) else {
        return;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
        return;
    };
    for (section, dev) in [("require", false), ("require-dev", true)] {
        if let Some(deps) = json.get(section).and_then(|d| d.as_object()) {
            for (name, version) in deps {
                out.push(DeclaredDependency {
                    name: name.clone(),
                    version: version.as_str().unwrap_or("").to_string(),
                    dev,
                    manifest: "composer.json".into(),
                });
            }
        }
    }
}

/// Collect declared dependencies and lock files for a project directory.
pub fn detect_dependencies(root: &Path) -> DependencyProfile {
    let mut profile = DependencyProfile::default();
    parse_package_json(root, &mut profile.dependencies);
    parse_requirements(root, &mut profile.dependencies);
    parse_pyproject(root, &mut profile.dependencies);
    parse_go_mod(root, &mut profile.dependencies);
    parse_cargo_toml(root, &mut profile.dependencies);
    parse_jvm_manifests(root, &mut profile.dependencies);
    parse_composer(root, &mut profile.dependencies);

    for lock in LOCK_FILES {
        if root.join(lock).is_file() {
            profile.lock_files.push(lock.to_string());
        }
    }
    profile
}

/// Map workspace-internal dependencies: for each package, which other
/// workspace packages it declares as dependencies.
pub fn map_internal_dependencies(
    root: &Path,
    package_paths: &[String],
) -> BTreeMap<String, Vec<String>> {
    // Package name → package path, from each package's manifest.
    let mut names: BTreeMap<String, String> = BTreeMap::new();
    for pkg in package_paths {
        let pkg_root = root.join(pkg);
        if let Ok(text) = std::fs::read_to_string(pkg_root.join("package.json")) {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                if let Some(name) = json.get("name").and_then(|n| n.as_str()) {
                    names.insert(name.to_string(), pkg.clone());
                }
            }
        }
        if let Ok(text) = std::fs::read_to_string(pkg_root.join("Cargo.toml")) {
            let re = Regex::new(r#"(?m)^name\s*=\s*"([^"]+)""#).unwrap();
            if let Some(caps) = re.captures(&text) {
                names.insert(caps[1].to_string(), pkg.clone());
            }
        }
    }

    let mut internal: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pkg in package_paths {
        let deps = detect_dependencies(&root.join(pkg));
        let mut local: Vec<String> = deps
            .dependencies
            .iter()
            .filter_map(|d| names.get(&d.name))
            .filter(|target| *target != pkg)
            .cloned()
            .collect();
        local.sort();
        local.dedup();
        internal.insert(pkg.clone(), local);
    }
    internal
}

/// Agent wrapper.
pub struct DependencyDetector;

#[async_trait]
impl Agent for DependencyDetector {
    fn name(&self) -> &str {
        "dependency-detector"
    }

    fn description(&self) -> &str {
        "Parse manifests for declared dependencies, lock files, and workspace edges"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        if !root.is_dir() {
            return TaskOutput::failed_with(format!("Not a directory: {}", root.display()));
        }
        let mut profile = detect_dependencies(&root);

        if let Some(packages) = task.context.get("workspace_packages").and_then(|v| v.as_array())
        {
            let paths: Vec<String> = packages
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect();
            profile.internal_dependencies = map_internal_dependencies(&root, &paths);
        }

        TaskOutput::completed(json!({
            "dependencies": profile.dependencies,
            "lock_files": profile.lock_files,
            "internal_dependencies": profile.internal_dependencies,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_json_dependencies_parsed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"express":"^4.18.0"},"devDependencies":{"vitest":"^1.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let profile = detect_dependencies(dir.path());
        let express = profile.dependencies.iter().find(|d| d.name == "express").unwrap();
        assert!(!express.dev);
        let vitest = profile.dependencies.iter().find(|d| d.name == "vitest").unwrap();
        assert!(vitest.dev);
        assert_eq!(profile.lock_files, vec!["package-lock.json"]);
    }

    #[test]
    fn requirements_and_pyproject_parsed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "requests>=2.31\n# comment\npytest==7.4.0  # pinned\n",
        )
        .unwrap();
        let profile = detect_dependencies(dir.path());
        assert!(profile.dependencies.iter().any(|d| d.name == "requests"));
        assert!(profile.dependencies.iter().any(|d| d.name == "pytest"));
    }

    #[test]
    fn go_mod_parsed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("go.mod"),
            "module example.com/m\n\ngo 1.21\n\nrequire (\n\tgithub.com/stretchr/testify v1.8.4\n)\n",
        )
        .unwrap();
        let profile = detect_dependencies(dir.path());
        let testify = profile
            .dependencies
            .iter()
            .find(|d| d.name == "github.com/stretchr/testify")
            .unwrap();
        assert_eq!(testify.version, "v1.8.4");
    }

    #[test]
    fn cargo_toml_sections_parsed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1.0\"\n\n[dev-dependencies]\ntempfile = \"3\"\n",
        )
        .unwrap();
        let profile = detect_dependencies(dir.path());
        assert!(profile.dependencies.iter().any(|d| d.name == "serde" && !d.dev));
        assert!(profile.dependencies.iter().any(|d| d.name == "tempfile" && d.dev));
    }

    #[test]
    fn internal_workspace_edges_mapped() {
        let dir = tempfile::tempdir().unwrap();
        for (pkg, manifest) in [
            ("packages/ui", r#"{"name":"@acme/ui","dependencies":{"@acme/core":"1.0.0"}}"#),
            ("packages/core", r#"{"name":"@acme/core","dependencies":{}}"#),
        ] {
            let p = dir.path().join(pkg);
            std::fs::create_dir_all(&p).unwrap();
            std::fs::write(p.join("package.json"), manifest).unwrap();
        }
        let packages = vec!["packages/ui".to_string(), "packages/core".to_string()];
        let internal = map_internal_dependencies(dir.path(), &packages);
        assert_eq!(internal["packages/ui"], vec!["packages/core"]);
        assert!(internal["packages/core"].is_empty());
    }
}
