//! Infra builder: bootstraps test infrastructure when none exists for
//! the target framework — config files, package scripts, and the install
//! commands to run (optionally inside Docker).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use nit_adapters::process::run_tool;
use nit_adapters::AdapterRegistry;
use nit_core::{Agent, TaskInput, TaskOutput};

#[derive(Debug, Deserialize)]
struct InfraBuildTask {
    framework: String,
    #[serde(default)]
    install_dependencies: bool,
    #[serde(default)]
    use_docker: bool,
}

/// What bootstrapping a framework entails.
struct BootstrapPlan {
    config_file: &'static str,
    config_content: &'static str,
    install_command: &'static [&'static str],
    package_script: Option<(&'static str, &'static str)>,
}

fn plan_for(framework: &str) -> Option<BootstrapPlan> {
    match framework {
        "vitest" => Some(BootstrapPlan {
            config_file: "vitest.config.ts",
            config_content: "\
import { defineConfig } from 'vitest/config';

export default defineConfig({
  test: {
    environment: 'node',
    coverage: { provider: 'v8', reporter: ['text', 'lcov'] },
  },
});
",
            install_command: &["npm", "install", "--save-dev", "vitest", "@vitest/coverage-v8"],
            package_script: Some(("test", "vitest run")),
        }),
        "jest" => Some(BootstrapPlan {
            config_file: "jest.config.js",
            config_content: "module.exports = {\n  testEnvironment: 'node',\n  collectCoverage: true,\n};\n",
            install_command: &["npm", "install", "--save-dev", "jest"],
            package_script: Some(("test", "jest")),
        }),
        "playwright" => Some(BootstrapPlan {
            config_file: "playwright.config.ts",
            config_content: "\
import { defineConfig } from '@playwright/test';

export default defineConfig({
  testDir: './e2e',
  use: { baseURL: process.env.BASE_URL ?? 'http://localhost:3000' },
});
",
            install_command: &["npm", "install", "--save-dev", "@playwright/test"],
            package_script: Some(("test:e2e", "playwright test")),
        }),
        "pytest" => Some(BootstrapPlan {
            config_file: "pytest.ini",
            config_content: "[pytest]\ntestpaths = tests\naddopts = -q\n",
            install_command: &["python3", "-m", "pip", "install", "pytest", "pytest-cov"],
            package_script: None,
        }),
        _ => None,
    }
}

pub struct InfraBuilder {
    registry: Arc<AdapterRegistry>,
    project_root: PathBuf,
}

impl InfraBuilder {
    pub fn new(registry: Arc<AdapterRegistry>, project_root: PathBuf) -> Self {
        Self {
            registry,
            project_root,
        }
    }

    fn add_package_script(&self, name: &str, command: &str) -> Result<bool, String> {
        let manifest = self.project_root.join("package.json");
        if !manifest.is_file() {
            return Ok(false);
        }
        let text = std::fs::read_to_string(&manifest).map_err(|e| e.to_string())?;
        let mut json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| e.to_string())?;
        let scripts = json
            .as_object_mut()
            .ok_or("package.json is not an object")?
            .entry("scripts")
            .or_insert_with(|| json!({}));
        if scripts.get(name).is_some() {
            return Ok(false);
        }
        scripts[name] = json!(command);
        std::fs::write(&manifest, serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?)
            .map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn install(&self, plan: &BootstrapPlan, use_docker: bool) -> Result<String, String> {
        if use_docker {
            let mut args = vec![
                "run",
                "--rm",
                "-v",
                ".:/workspace",
                "-w",
                "/workspace",
                "node:20",
            ];
            args.extend(plan.install_command);
            let output = run_tool("docker", &args, &self.project_root, 600)
                .await
                .map_err(|e| e.to_string())?;
            return Ok(output.combined());
        }
        let output = run_tool(
            plan.install_command[0],
            &plan.install_command[1..],
            &self.project_root,
            600,
        )
        .await
        .map_err(|e| e.to_string())?;
        Ok(output.combined())
    }
}

#[async_trait]
impl Agent for InfraBuilder {
    fn name(&self) -> &str {
        "infra-builder"
    }

    fn description(&self) -> &str {
        "Bootstrap test infrastructure for a framework that has none"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let build_task: InfraBuildTask = match serde_json::from_value(task.context.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return TaskOutput::failed_with(format!("bad infra build task: {e}")),
        };

        // Nothing to do when the framework is already set up.
        if let Some(adapter) = self.registry.get_test_adapter(&build_task.framework) {
            if adapter.detect(&self.project_root) {
                return TaskOutput::completed(json!({
                    "bootstrapped": false,
                    "reason": "framework already configured",
                }));
            }
        }

        let Some(plan) = plan_for(&build_task.framework) else {
            return TaskOutput::failed_with(format!(
                "no bootstrap plan for framework: {}",
                build_task.framework
            ));
        };

        let mut created = Vec::new();
        let config_path = self.project_root.join(plan.config_file);
        if !config_path.exists() {
            if let Err(e) = std::fs::write(&config_path, plan.config_content) {
                return TaskOutput::failed_with(format!("cannot write config: {e}"));
            }
            created.push(plan.config_file.to_string());
            info!("created {}", config_path.display());
        }

        let mut scripts_added = Vec::new();
        if let Some((name, command)) = plan.package_script {
            match self.add_package_script(name, command) {
                Ok(true) => scripts_added.push(name.to_string()),
                Ok(false) => {}
                Err(e) => return TaskOutput::failed_with(format!("cannot update package.json: {e}")),
            }
        }

        let install_output = if build_task.install_dependencies {
            match self.install(&plan, build_task.use_docker).await {
                Ok(output) => Some(output.chars().take(2000).collect::<String>()),
                Err(e) => {
                    return TaskOutput::failed_with(format!("dependency install failed: {e}"))
                }
            }
        } else {
            None
        };

        TaskOutput::completed(json!({
            "bootstrapped": true,
            "created_files": created,
            "scripts_added": scripts_added,
            "install_command": plan.install_command,
            "install_output": install_output,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstraps_vitest_config_and_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name":"app"}"#).unwrap();

        let builder = InfraBuilder::new(Arc::new(AdapterRegistry::new()), dir.path().to_path_buf());
        let output = builder
            .run(TaskInput::new("bootstrap", ".").with_context(json!({"framework": "vitest"})))
            .await;

        assert!(output.is_completed(), "errors: {:?}", output.errors);
        assert_eq!(output.result["bootstrapped"], true);
        assert!(dir.path().join("vitest.config.ts").is_file());
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("package.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["scripts"]["test"], "vitest run");
    }

    #[tokio::test]
    async fn existing_setup_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"app","devDependencies":{"vitest":"^1.0.0"},"scripts":{"test":"vitest"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("vitest.config.ts"), "// custom\n").unwrap();

        let builder = InfraBuilder::new(Arc::new(AdapterRegistry::new()), dir.path().to_path_buf());
        let output = builder
            .run(TaskInput::new("bootstrap", ".").with_context(json!({"framework": "vitest"})))
            .await;

        assert!(output.is_completed());
        assert_eq!(output.result["bootstrapped"], false);
        // The user's config was not touched.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("vitest.config.ts")).unwrap(),
            "// custom\n"
        );
    }

    #[tokio::test]
    async fn unknown_framework_fails() {
        let dir = tempfile::tempdir().unwrap();
        let builder = InfraBuilder::new(Arc::new(AdapterRegistry::new()), dir.path().to_path_buf());
        let output = builder
            .run(TaskInput::new("bootstrap", ".").with_context(json!({"framework": "mystery"})))
            .await;
        assert!(!output.is_completed());
    }
}
