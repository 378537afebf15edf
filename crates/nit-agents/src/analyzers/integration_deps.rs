//! Integration-dependency analyzer: classifies a module's external
//! touch-points and proposes fixtures and mock strategies for each.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_parsing::{extract_from_file, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    HttpClient,
    Database,
    Filesystem,
    MessageQueue,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationDependency {
    pub kind: DependencyKind,
    pub module: String,
    pub suggested_fixture: String,
    pub mock_strategy: String,
}

const HTTP_MODULES: [&str; 8] = [
    "requests", "httpx", "aiohttp", "axios", "node-fetch", "got", "reqwest", "undici",
];
const DB_MODULES: [&str; 10] = [
    "sqlalchemy",
    "psycopg2",
    "pymongo",
    "sqlite3",
    "sequelize",
    "mongoose",
    "prisma",
    "drizzle-orm",
    "sqlx",
    "diesel",
];
const QUEUE_MODULES: [&str; 6] = ["pika", "kafka", "kafkajs", "amqplib", "bullmq", "celery"];
const FS_MODULES: [&str; 4] = ["fs", "pathlib", "shutil", "tempfile"];

fn classify(module: &str) -> Option<DependencyKind> {
    let lower = module.to_lowercase();
    let matches_any = |candidates: &[&str]| {
        candidates
            .iter()
            .any(|c| lower == *c || lower.starts_with(&format!("{c}/")) || lower.starts_with(&format!("{c}.")))
    };
    if matches_any(&HTTP_MODULES) {
        Some(DependencyKind::HttpClient)
    } else if matches_any(&DB_MODULES) {
        Some(DependencyKind::Database)
    } else if matches_any(&QUEUE_MODULES) {
        Some(DependencyKind::MessageQueue)
    } else if matches_any(&FS_MODULES) {
        Some(DependencyKind::Filesystem)
    } else {
        None
    }
}

fn fixture_for(kind: DependencyKind, language: &str) -> (String, String) {
    match (kind, language) {
        (DependencyKind::HttpClient, "python") => (
            "responses/httpx_mock fixture intercepting outbound requests".into(),
            "patch the client session with a recording mock".into(),
        ),
        (DependencyKind::HttpClient, _) => (
            "mock HTTP server (msw or nock) with canned responses".into(),
            "intercept fetch/axios at the network boundary".into(),
        ),
        (DependencyKind::Database, "python") => (
            "in-memory SQLite bound to the session factory".into(),
            "transactional fixture rolled back after each test".into(),
        ),
        (DependencyKind::Database, _) => (
            "ephemeral database container or in-memory engine".into(),
            "repository interface stubbed with an in-memory store".into(),
        ),
        (DependencyKind::MessageQueue, _) => (
            "in-process broker stub capturing published messages".into(),
            "substitute the producer client and assert on captures".into(),
        ),
        (DependencyKind::Filesystem, _) => (
            "temporary directory created per test".into(),
            "point path configuration at the temp dir".into(),
        ),
    }
}

/// Classify a parse result's imports into integration dependencies.
pub fn analyze_integration_deps(
    parse_result: &ParseResult,
    language: &str,
) -> Vec<IntegrationDependency> {
    let mut deps: Vec<IntegrationDependency> = Vec::new();
    for import in &parse_result.imports {
        let Some(kind) = classify(&import.module) else {
            continue;
        };
        if deps.iter().any(|d| d.kind == kind && d.module == import.module) {
            continue;
        }
        let (suggested_fixture, mock_strategy) = fixture_for(kind, language);
        deps.push(IntegrationDependency {
            kind,
            module: import.module.clone(),
            suggested_fixture,
            mock_strategy,
        });
    }
    deps
}

pub struct IntegrationDepsAnalyzer;

#[async_trait]
impl Agent for IntegrationDepsAnalyzer {
    fn name(&self) -> &str {
        "integration-deps-analyzer"
    }

    fn description(&self) -> &str {
        "Classify external touch-points and propose fixtures and mocks"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let file = PathBuf::from(&task.target);
        let parse_result = match extract_from_file(&file) {
            Ok(result) => result,
            Err(e) => return TaskOutput::failed_with(e.to_string()),
        };
        let language = parse_result.language.clone();
        let deps = analyze_integration_deps(&parse_result, &language);
        TaskOutput::completed(json!({ "dependencies": deps }))
    }
}
