//! Code analyzer: per-function cyclomatic complexity, a file-local call
//! graph, and side-effect tags.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_parsing::{detect_language, extract_from_file, FunctionInfo, ImportInfo, ParseResult};

pub const COMPLEXITY_THRESHOLD_HIGH: u32 = 10;
pub const COMPLEXITY_THRESHOLD_MODERATE: u32 = 5;

/// Categories of side effects detected in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectType {
    Database,
    Filesystem,
    Http,
    ExternalProcess,
    Logging,
}

impl SideEffectType {
    const ALL: [SideEffectType; 5] = [
        SideEffectType::Database,
        SideEffectType::Filesystem,
        SideEffectType::Http,
        SideEffectType::ExternalProcess,
        SideEffectType::Logging,
    ];
}

/// Cyclomatic complexity with its per-keyword breakdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplexityMetrics {
    /// 1 + decision points.
    pub cyclomatic: u32,
    /// Count per decision-point kind (if, for, while, ...).
    pub decision_points: BTreeMap<String, u32>,
}

impl ComplexityMetrics {
    pub fn is_complex(&self) -> bool {
        self.cyclomatic > COMPLEXITY_THRESHOLD_HIGH
    }

    pub fn is_moderate(&self) -> bool {
        (COMPLEXITY_THRESHOLD_MODERATE..=COMPLEXITY_THRESHOLD_HIGH).contains(&self.cyclomatic)
    }
}

/// A detected side effect in a function.
#[derive(Debug, Clone, Serialize)]
pub struct SideEffect {
    pub effect_type: SideEffectType,
    pub evidence: String,
    pub line_number: usize,
}

/// An edge in the file-local call graph.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionCall {
    pub caller: String,
    pub callee: String,
    pub line_number: usize,
}

/// The structured map for one analyzed file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CodeMap {
    pub file_path: String,
    pub language: String,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<nit_parsing::ClassInfo>,
    pub imports: Vec<ImportInfo>,
    pub complexity: BTreeMap<String, ComplexityMetrics>,
    pub side_effects: BTreeMap<String, Vec<SideEffect>>,
    pub call_graph: Vec<FunctionCall>,
    pub has_errors: bool,
}

// ── Pattern packs ───────────────────────────────────────────────────

struct DecisionPatterns {
    by_kind: Vec<(&'static str, Vec<Regex>)>,
}

fn decision_patterns() -> &'static DecisionPatterns {
    static PATTERNS: OnceLock<DecisionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| {
                    regex::RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("static regex")
                })
                .collect()
        };
        DecisionPatterns {
            by_kind: vec![
                ("if", build(&[r"\bif\b", r"\belif\b", r"\belse\s+if\b"])),
                ("else", build(&[r"\belse\b"])),
                ("for", build(&[r"\bfor\b", r"\bforeach\b"])),
                ("while", build(&[r"\bwhile\b"])),
                ("case", build(&[r"\bcase\b", r"\bwhen\b"])),
                ("catch", build(&[r"\bcatch\b", r"\bexcept\b", r"\brescue\b"])),
                ("and", build(&[r"\band\b", r"&&"])),
                ("or", build(&[r"\bor\b", r"\|\|"])),
                ("ternary", build(&[r"\?[^?]*:", r"\bif\b[^\n]*\belse\b"])),
                ("match", build(&[r"\bmatch\b"])),
            ],
        }
    })
}

struct SideEffectPatterns {
    import_patterns: Vec<(SideEffectType, Vec<Regex>)>,
    call_patterns: Vec<(SideEffectType, Vec<Regex>)>,
}

fn side_effect_patterns() -> &'static SideEffectPatterns {
    static PATTERNS: OnceLock<SideEffectPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| {
                    regex::RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("static regex")
                })
                .collect()
        };
        SideEffectPatterns {
            import_patterns: vec![
                (
                    SideEffectType::Database,
                    build(&[
                        r"\bsqlalchemy\b",
                        r"\bpsycopg\d?\b",
                        r"\bpymongo\b",
                        r"\bsqlite3\b",
                        r"\bsequelize\b",
                        r"\bmongoose\b",
                        r"\bprisma\b",
                        r"\bdrizzle\b",
                        r"\bsqlx\b",
                        r"\bdiesel\b",
                    ]),
                ),
                (
                    SideEffectType::Filesystem,
                    build(&[r"\bfs\b", r"\bshutil\b", r"\bpathlib\b", r"\bos\.path\b"]),
                ),
                (
                    SideEffectType::Http,
                    build(&[
                        r"\brequests\b",
                        r"\bhttpx\b",
                        r"\baxios\b",
                        r"\baiohttp\b",
                        r"\breqwest\b",
                        r"\bnode-fetch\b",
                    ]),
                ),
                (
                    SideEffectType::ExternalProcess,
                    build(&[r"\bsubprocess\b", r"\bchild_process\b"]),
                ),
                (SideEffectType::Logging, build(&[r"\blogging\b", r"\btracing\b"])),
            ],
            call_patterns: vec![
                (
                    SideEffectType::Filesystem,
                    build(&[
                        r"\bopen\(",
                        r"\breadFile\w*\(",
                        r"\bwriteFile\w*\(",
                        r"\bread_text\(",
                        r"\bwrite_text\(",
                        r"\bunlink\(",
                        r"\bmkdir\(",
                    ]),
                ),
                (
                    SideEffectType::Http,
                    build(&[r"\bfetch\(", r"\brequests\.\w+\(", r"\baxios\.", r"\bhttpx\."]),
                ),
                (
                    SideEffectType::ExternalProcess,
                    build(&[r"\bexec\(", r"\bspawn\(", r"\bpopen\(", r"\bsubprocess\.run\("]),
                ),
                (
                    SideEffectType::Logging,
                    build(&[r"\bconsole\.", r"\blogger\.", r"\blogging\.", r"\bprint\("]),
                ),
            ],
        }
    })
}

// ── Analysis ────────────────────────────────────────────────────────

/// Cyclomatic complexity = 1 + decision points. `else` is tallied but
/// adds nothing; short-circuit operators each count as one branch.
pub fn calculate_complexity(function: &FunctionInfo) -> ComplexityMetrics {
    let mut metrics = ComplexityMetrics {
        cyclomatic: 1,
        decision_points: BTreeMap::new(),
    };

    for (kind, patterns) in &decision_patterns().by_kind {
        let count: u32 = patterns
            .iter()
            .map(|re| re.find_iter(&function.body_text).count() as u32)
            .sum();
        if count > 0 {
            metrics.decision_points.insert(kind.to_string(), count);
            if *kind != "else" {
                metrics.cyclomatic += count;
            }
        }
    }
    metrics
}

fn call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").expect("static regex"))
}

fn extract_calls(
    function: &FunctionInfo,
    known: &HashSet<String>,
    caller: &str,
) -> Vec<FunctionCall> {
    call_regex()
        .captures_iter(&function.body_text)
        .filter_map(|caps| {
            let callee = caps.get(1)?.as_str();
            if !known.contains(callee) || callee == function.name {
                return None;
            }
            let offset = caps.get(0)?.start();
            let line_offset = function.body_text[..offset].matches('\n').count();
            Some(FunctionCall {
                caller: caller.to_string(),
                callee: callee.to_string(),
                line_number: function.start_line + line_offset,
            })
        })
        .collect()
}

fn build_call_graph(parse_result: &ParseResult) -> Vec<FunctionCall> {
    let mut known: HashSet<String> =
        parse_result.functions.iter().map(|f| f.name.clone()).collect();
    for class in &parse_result.classes {
        known.extend(class.methods.iter().map(|m| m.name.clone()));
    }

    let mut graph = Vec::new();
    for function in &parse_result.functions {
        graph.extend(extract_calls(function, &known, &function.name));
    }
    for class in &parse_result.classes {
        for method in &class.methods {
            let caller = format!("{}.{}", class.name, method.name);
            graph.extend(extract_calls(method, &known, &caller));
        }
    }
    graph
}

fn import_evidence(imports: &[ImportInfo]) -> Vec<(SideEffectType, Vec<String>)> {
    let patterns = side_effect_patterns();
    let mut evidence: Vec<(SideEffectType, Vec<String>)> =
        SideEffectType::ALL.iter().map(|t| (*t, Vec::new())).collect();

    for import in imports {
        let mut haystack = import.module.to_lowercase();
        for name in &import.names {
            haystack.push(' ');
            haystack.push_str(&name.to_lowercase());
        }
        for (effect_type, type_patterns) in &patterns.import_patterns {
            if type_patterns.iter().any(|re| re.is_match(&haystack)) {
                if let Some((_, modules)) =
                    evidence.iter_mut().find(|(t, _)| t == effect_type)
                {
                    modules.push(import.module.clone());
                }
            }
        }
    }
    evidence
}

fn function_side_effects(
    function: &FunctionInfo,
    evidence: &[(SideEffectType, Vec<String>)],
) -> Vec<SideEffect> {
    let patterns = side_effect_patterns();
    let body = function.body_text.to_lowercase();
    let mut effects = Vec::new();
    let mut seen: HashSet<SideEffectType> = HashSet::new();

    // Import-based evidence: the function must actually reference the
    // imported module.
    for (effect_type, modules) in evidence {
        for module in modules {
            if body.contains(&module.to_lowercase()) && seen.insert(*effect_type) {
                effects.push(SideEffect {
                    effect_type: *effect_type,
                    evidence: format!("import: {module}"),
                    line_number: function.start_line,
                });
                break;
            }
        }
    }

    // Call-site evidence.
    for (effect_type, type_patterns) in &patterns.call_patterns {
        if seen.contains(effect_type) {
            continue;
        }
        for re in type_patterns {
            if let Some(m) = re.find(&body) {
                let line_offset = body[..m.start()].matches('\n').count();
                effects.push(SideEffect {
                    effect_type: *effect_type,
                    evidence: format!("call: {}", m.as_str()),
                    line_number: function.start_line + line_offset,
                });
                seen.insert(*effect_type);
                break;
            }
        }
    }
    effects
}

/// Analyze one source file into a complete `CodeMap`.
pub fn analyze_file(file_path: &Path) -> CodeMap {
    let Some(language) = detect_language(file_path) else {
        return CodeMap {
            file_path: file_path.display().to_string(),
            language: "unknown".into(),
            has_errors: true,
            ..Default::default()
        };
    };

    let parse_result = match extract_from_file(file_path) {
        Ok(result) => result,
        Err(e) => {
            warn!("failed to parse {}: {e}", file_path.display());
            return CodeMap {
                file_path: file_path.display().to_string(),
                language: language.into(),
                has_errors: true,
                ..Default::default()
            };
        }
    };

    let mut map = CodeMap {
        file_path: file_path.display().to_string(),
        language: parse_result.language.clone(),
        has_errors: parse_result.has_errors,
        call_graph: build_call_graph(&parse_result),
        ..Default::default()
    };

    let evidence = import_evidence(&parse_result.imports);

    for function in &parse_result.functions {
        map.complexity
            .insert(function.name.clone(), calculate_complexity(function));
        let effects = function_side_effects(function, &evidence);
        if !effects.is_empty() {
            map.side_effects.insert(function.name.clone(), effects);
        }
    }
    for class in &parse_result.classes {
        for method in &class.methods {
            let full_name = format!("{}.{}", class.name, method.name);
            map.complexity.insert(full_name.clone(), calculate_complexity(method));
            let effects = function_side_effects(method, &evidence);
            if !effects.is_empty() {
                map.side_effects.insert(full_name, effects);
            }
        }
    }

    map.functions = parse_result.functions;
    map.classes = parse_result.classes;
    map.imports = parse_result.imports;
    map
}

/// Agent wrapper.
pub struct CodeAnalyzer;

#[async_trait]
impl Agent for CodeAnalyzer {
    fn name(&self) -> &str {
        "code-analyzer"
    }

    fn description(&self) -> &str {
        "Deep code analysis: complexity, call graphs, side effects"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let file_path = PathBuf::from(&task.target);
        if !file_path.exists() {
            return TaskOutput::failed_with(format!("File does not exist: {}", file_path.display()));
        }

        let map = analyze_file(&file_path);
        info!(
            file = %map.file_path,
            functions = map.functions.len(),
            classes = map.classes.len(),
            "code analysis complete"
        );
        match serde_json::to_value(&map) {
            Ok(value) => TaskOutput::completed(json!({ "code_map": value })),
            Err(e) => TaskOutput::failed_with(format!("serialization failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_with_body(body: &str) -> FunctionInfo {
        FunctionInfo {
            name: "f".into(),
            start_line: 1,
            end_line: body.lines().count().max(1),
            body_text: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn straight_line_code_has_complexity_one() {
        let metrics = calculate_complexity(&function_with_body("def f():\n    return 1\n"));
        assert_eq!(metrics.cyclomatic, 1);
        assert!(metrics.decision_points.is_empty());
    }

    #[test]
    fn nested_if_else_counts_each_branch() {
        let body = "\
def f(x, y, z):
    if x > 0:
        if y > 0:
            if z > 0:
                return 1
            elif z < 0:
                return 2
            else:
                return 3
        else:
            return 4
    else:
        return 5
";
        let metrics = calculate_complexity(&function_with_body(body));
        assert!(metrics.cyclomatic >= 5, "cyclomatic {}", metrics.cyclomatic);
        assert!(metrics.decision_points["if"] >= 4);
        assert!(metrics.decision_points.contains_key("else"));
        // `else` never adds to the total.
        let without_else: u32 = metrics
            .decision_points
            .iter()
            .filter(|(k, _)| k.as_str() != "else")
            .map(|(_, v)| v)
            .sum();
        assert_eq!(metrics.cyclomatic, 1 + without_else);
    }

    #[test]
    fn boolean_operators_add_complexity() {
        let metrics =
            calculate_complexity(&function_with_body("if a and b or c:\n    return 1\n"));
        assert_eq!(metrics.decision_points["and"], 1);
        assert_eq!(metrics.decision_points["or"], 1);
        assert_eq!(metrics.cyclomatic, 4); // if + and + or
    }

    #[test]
    fn loops_and_exception_handlers_counted() {
        let body = "for i in xs:\n    while busy:\n        try:\n            pass\n        except ValueError:\n            pass\n";
        let metrics = calculate_complexity(&function_with_body(body));
        assert_eq!(metrics.decision_points["for"], 1);
        assert_eq!(metrics.decision_points["while"], 1);
        assert_eq!(metrics.decision_points["catch"], 1);
    }

    #[test]
    fn call_graph_restricted_to_local_functions() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("calc.py");
        std::fs::write(
            &file,
            "\
def helper(x):
    return x * 2

def main(x):
    print(x)
    return helper(x) + external(x)
",
        )
        .unwrap();

        let map = analyze_file(&file);
        let edges: Vec<(&str, &str)> = map
            .call_graph
            .iter()
            .map(|c| (c.caller.as_str(), c.callee.as_str()))
            .collect();
        assert!(edges.contains(&("main", "helper")));
        assert!(!edges.iter().any(|(_, callee)| *callee == "external"));
        assert!(!edges.iter().any(|(_, callee)| *callee == "print"));
    }

    #[test]
    fn side_effects_from_imports_and_calls() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("service.py");
        std::fs::write(
            &file,
            "\
import requests
import sqlalchemy

def fetch_user(user_id):
    session = sqlalchemy.orm.Session()
    return requests.get(f'https://api.example.com/users/{user_id}')

def pure(a, b):
    return a + b
",
        )
        .unwrap();

        let map = analyze_file(&file);
        let effects = &map.side_effects["fetch_user"];
        let types: Vec<SideEffectType> = effects.iter().map(|e| e.effect_type).collect();
        assert!(types.contains(&SideEffectType::Http));
        assert!(types.contains(&SideEffectType::Database));
        assert!(!map.side_effects.contains_key("pure"));
    }

    #[test]
    fn unknown_language_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.csv");
        std::fs::write(&file, "a,b\n").unwrap();
        let map = analyze_file(&file);
        assert!(map.has_errors);
        assert_eq!(map.language, "unknown");
    }

    #[tokio::test]
    async fn agent_fails_on_missing_file() {
        let output = CodeAnalyzer
            .run(TaskInput::new("analyze_code", "/no/such/file.py"))
            .await;
        assert!(!output.is_completed());
    }
}
