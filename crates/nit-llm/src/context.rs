//! Context assembly for builder prompts.
//!
//! Given a source path this produces everything a prompt needs: the
//! source itself, its parse result, nearby test files, project-local
//! imports, and the conventions detected in existing tests — windowed to
//! a token budget with fixed section priorities.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use nit_parsing::{detect_language, extract_from_source, ParseResult};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Section priorities for windowing.
const PRIORITY_SOURCE: u32 = 100;
const PRIORITY_SIGNATURES: u32 = 80;
const PRIORITY_RELATED: u32 = 60;
const PRIORITY_PATTERNS: u32 = 50;
const PRIORITY_IMPORTS: u32 = 40;

const TRUNCATION_MARKER: &str = "# ... (truncated)\n";
const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8000;

/// Directories never scanned for related or test files.
const SKIP_DIRS: [&str; 16] = [
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    ".nit",
    ".next",
    "target",
    "vendor",
];

/// 4-characters-per-token estimate used when no tokenizer is wired.
pub fn default_token_count(text: &str) -> usize {
    text.len() / 4
}

pub type TokenCounter = dyn Fn(&str) -> usize + Send + Sync;

/// A file related to the source under test.
#[derive(Debug, Clone)]
pub struct RelatedFile {
    pub path: String,
    /// "test" or "import".
    pub relationship: String,
    pub content: String,
}

/// Conventions detected in existing test files.
#[derive(Debug, Clone, Default)]
pub struct DetectedTestPattern {
    /// function | class | describe | unknown
    pub naming_style: String,
    /// assert | expect | should | unknown
    pub assertion_style: String,
    pub mocking_patterns: Vec<String>,
    pub imports: Vec<String>,
    pub sample_test: String,
}

/// The assembled prompt context for one source file.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub source_path: String,
    pub source_code: String,
    pub language: String,
    pub parse_result: ParseResult,
    pub related_files: Vec<RelatedFile>,
    pub test_patterns: Option<DetectedTestPattern>,
    pub total_tokens: usize,
}

impl AssembledContext {
    /// Compact one-line signatures for every top-level function.
    pub fn function_signatures(&self) -> Vec<String> {
        self.parse_result
            .functions
            .iter()
            .map(|f| {
                let params: Vec<String> = f
                    .parameters
                    .iter()
                    .map(|p| {
                        if p.type_annotation.is_empty() {
                            p.name.clone()
                        } else {
                            format!("{}: {}", p.name, p.type_annotation)
                        }
                    })
                    .collect();
                let ret = if f.return_type.is_empty() {
                    String::new()
                } else {
                    format!(" -> {}", f.return_type)
                };
                format!("{}({}){}", f.name, params.join(", "), ret)
            })
            .collect()
    }

    /// Compact one-line signatures for every class.
    pub fn class_signatures(&self) -> Vec<String> {
        self.parse_result
            .classes
            .iter()
            .map(|c| {
                if c.bases.is_empty() {
                    format!("{} ({} methods)", c.name, c.methods.len())
                } else {
                    format!("{}({}) ({} methods)", c.name, c.bases.join(", "), c.methods.len())
                }
            })
            .collect()
    }
}

// ── Test pattern extraction ────────────────────────────────────────

struct PatternRegexes {
    naming: Vec<(&'static str, Regex)>,
    assertion: Vec<(&'static str, Regex)>,
    mocking: Vec<(&'static str, Regex)>,
    python_imports: Regex,
    js_imports: Regex,
    python_sample: Regex,
    js_sample: Regex,
}

fn pattern_regexes() -> &'static PatternRegexes {
    static REGEXES: OnceLock<PatternRegexes> = OnceLock::new();
    REGEXES.get_or_init(|| PatternRegexes {
        naming: vec![
            (
                "function",
                Regex::new(r"(?m)^\s*(?:async\s+)?(?:def|function)\s+test_?\w+").unwrap(),
            ),
            (
                "class",
                Regex::new(r"(?mi)^\s*class\s+Test\w+|^\s*class\s+\w+Test").unwrap(),
            ),
            ("describe", Regex::new(r"\bdescribe\s*\(").unwrap()),
        ],
        assertion: vec![
            ("assert", Regex::new(r"\bassert\s+").unwrap()),
            ("expect", Regex::new(r"\bexpect\s*\(").unwrap()),
            ("should", Regex::new(r"\.should\b").unwrap()),
        ],
        mocking: vec![
            ("pytest.fixture", Regex::new(r"@pytest\.fixture\b").unwrap()),
            (
                "unittest.mock",
                Regex::new(r"\bunittest\.mock\b|\bfrom unittest import mock\b").unwrap(),
            ),
            ("mock.patch", Regex::new(r"@mock\.patch\b|@patch\b").unwrap()),
            ("monkeypatch", Regex::new(r"\bmonkeypatch\b").unwrap()),
            ("vi.mock", Regex::new(r"\bvi\.mock\s*\(").unwrap()),
            ("jest.mock", Regex::new(r"\bjest\.mock\s*\(").unwrap()),
            ("vitest.mock", Regex::new(r"\bvitest\.mock\s*\(").unwrap()),
        ],
        python_imports: Regex::new(
            r"(?m)^(?:from\s+[\w.]+\s+import\s+[\w,\s*()]+|import\s+[\w.,\s]+)",
        )
        .unwrap(),
        js_imports: Regex::new(r#"(?m)^import\s+(?:[\w\{\},\s*]+\s+from\s+)?['"][\w./@-]+['"]"#)
            .unwrap(),
        python_sample: Regex::new(r"(?m)(def test_\w+\([^)]*\):(?:\n(?:    |\t).+)+)").unwrap(),
        js_sample: Regex::new(
            r#"(?s)((?:test|it)\s*\(['"][\w\s]+['"]\s*,\s*(?:async\s+)?\([^)]*\)\s*=>\s*\{[^}]+\})"#,
        )
        .unwrap(),
    })
}

/// Scan test files for naming, assertion, and mocking conventions.
pub fn extract_test_patterns(test_files: &[PathBuf], language: &str) -> DetectedTestPattern {
    let regexes = pattern_regexes();
    let mut naming: Vec<(&str, usize)> = Vec::new();
    let mut assertion: Vec<(&str, usize)> = Vec::new();
    let mut mocking: Vec<String> = Vec::new();
    let mut imports: Vec<String> = Vec::new();
    let mut sample_test = String::new();

    for file in test_files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };

        for (style, regex) in &regexes.naming {
            let count = regex.find_iter(&content).count();
            if count > 0 {
                match naming.iter().position(|(s, _)| s == style) {
                    Some(index) => naming[index].1 += count,
                    None => naming.push((style, count)),
                }
            }
        }

        for (style, regex) in &regexes.assertion {
            let count = regex.find_iter(&content).count();
            if count > 0 {
                match assertion.iter().position(|(s, _)| s == style) {
                    Some(index) => assertion[index].1 += count,
                    None => assertion.push((style, count)),
                }
            }
        }

        for (name, regex) in &regexes.mocking {
            if regex.is_match(&content) && !mocking.contains(&name.to_string()) {
                mocking.push(name.to_string());
            }
        }

        let import_regex = match language {
            "python" => Some(&regexes.python_imports),
            "javascript" | "typescript" | "tsx" => Some(&regexes.js_imports),
            _ => None,
        };
        if let Some(regex) = import_regex {
            for m in regex.find_iter(&content) {
                let line = m.as_str().trim().to_string();
                if !imports.contains(&line) {
                    imports.push(line);
                }
            }
        }

        if sample_test.is_empty() {
            sample_test = extract_sample_test(&content, language);
        }
    }

    let pick = |counts: &[(&str, usize)]| {
        counts
            .iter()
            .max_by_key(|(_, n)| *n)
            .map(|(s, _)| s.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };

    DetectedTestPattern {
        naming_style: pick(&naming),
        assertion_style: pick(&assertion),
        mocking_patterns: mocking,
        imports: imports.into_iter().take(10).collect(),
        sample_test,
    }
}

fn extract_sample_test(content: &str, language: &str) -> String {
    // Prefer a clean function body from the parser.
    if let Ok(parsed) = extract_from_source(content.as_bytes(), language) {
        let candidate = parsed
            .functions
            .iter()
            .find(|f| f.name.starts_with("test"))
            .or_else(|| parsed.functions.first());
        if let Some(f) = candidate {
            let lines: Vec<&str> = content.lines().collect();
            if f.start_line >= 1 && f.end_line <= lines.len() {
                return lines[f.start_line - 1..f.end_line].join("\n");
            }
        }
    }

    let regexes = pattern_regexes();
    match language {
        "python" => regexes
            .python_sample
            .captures(content)
            .map(|c| c[1].to_string())
            .unwrap_or_default(),
        "javascript" | "typescript" | "tsx" => regexes
            .js_sample
            .captures(content)
            .map(|c| c[1].chars().take(200).collect())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

// ── Related file discovery ─────────────────────────────────────────

fn test_name_candidates(stem: &str, language: &str) -> Vec<String> {
    match language {
        "python" => vec![format!("test_{stem}.py"), format!("{stem}_test.py")],
        "javascript" => vec![
            format!("{stem}.test.js"),
            format!("{stem}.spec.js"),
            format!("{stem}.test.jsx"),
        ],
        "typescript" => vec![
            format!("{stem}.test.ts"),
            format!("{stem}.spec.ts"),
        ],
        "tsx" => vec![format!("{stem}.test.tsx"), format!("{stem}.spec.tsx")],
        "go" => vec![format!("{stem}_test.go")],
        "java" => vec![format!("{stem}Test.java"), format!("{stem}Tests.java")],
        "c" => vec![format!("{stem}_test.c"), format!("test_{stem}.c")],
        "cpp" => vec![
            format!("{stem}_test.cpp"),
            format!("test_{stem}.cpp"),
            format!("{stem}_test.cc"),
        ],
        "rust" => Vec::new(),
        _ => Vec::new(),
    }
}

fn generic_test_globs(language: &str) -> Vec<&'static str> {
    match language {
        "python" => vec!["test_*.py", "*_test.py"],
        "javascript" => vec!["*.test.js", "*.spec.js"],
        "typescript" => vec!["*.test.ts", "*.spec.ts"],
        "tsx" => vec!["*.test.tsx", "*.spec.tsx"],
        "go" => vec!["*_test.go"],
        "java" => vec!["*Test.java", "*Tests.java"],
        "c" => vec!["*_test.c", "test_*.c"],
        "cpp" => vec!["*_test.cpp", "test_*.cpp"],
        _ => Vec::new(),
    }
}

/// Find test files that belong to `source`: siblings, a `tests/` directory
/// next to it, and the project-root `tests/` mirror.
pub fn find_test_files_for(source: &Path, root: &Path, language: &str) -> Vec<PathBuf> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let candidates = test_name_candidates(&stem, language);
    let mut found: Vec<PathBuf> = Vec::new();
    let mut push = |p: PathBuf| {
        if p.is_file() && !found.contains(&p) {
            found.push(p);
        }
    };

    if let Some(dir) = source.parent() {
        for name in &candidates {
            push(dir.join(name));
        }
        for name in &candidates {
            push(dir.join("tests").join(name));
        }
        for name in &candidates {
            push(dir.join("__tests__").join(name));
        }
    }

    // Mirror under the project-level tests/ directory.
    let tests_root = root.join("tests");
    if tests_root.is_dir() {
        for entry in WalkDir::new(&tests_root)
            .into_iter()
            .filter_entry(|e| !is_skipped(e.path()))
            .flatten()
        {
            if entry.file_type().is_file() {
                let name = entry.file_name().to_string_lossy();
                if candidates.iter().any(|c| c == name.as_ref()) {
                    push(entry.into_path());
                }
            }
        }
    }

    found
}

/// Find any test files in the project for convention extraction.
pub fn find_any_test_files(root: &Path, language: &str, limit: usize) -> Vec<PathBuf> {
    let globs: Vec<glob::Pattern> = generic_test_globs(language)
        .iter()
        .filter_map(|g| glob::Pattern::new(g).ok())
        .collect();

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e.path()))
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if globs.iter().any(|g| g.matches(&name)) {
            found.push(entry.into_path());
            if found.len() >= limit {
                break;
            }
        }
    }
    found
}

fn is_skipped(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| SKIP_DIRS.contains(&n))
        .unwrap_or(false)
}

/// Resolve imports to project-local files; external packages are ignored.
fn resolve_imports(
    parse_result: &ParseResult,
    source: &Path,
    root: &Path,
    language: &str,
) -> Vec<PathBuf> {
    let mut resolved = Vec::new();
    let mut push = |p: PathBuf| {
        if p.is_file() && p != source && !resolved.contains(&p) {
            resolved.push(p);
        }
    };

    for import in &parse_result.imports {
        match language {
            "python" => {
                if import.module.starts_with('.') {
                    continue;
                }
                let rel: PathBuf = import.module.split('.').collect();
                push(root.join(&rel).with_extension("py"));
                push(root.join("src").join(&rel).with_extension("py"));
            }
            "javascript" | "typescript" | "tsx" => {
                if !import.module.starts_with('.') {
                    continue; // node_modules package
                }
                let Some(dir) = source.parent() else { continue };
                let base = dir.join(&import.module);
                for ext in ["ts", "tsx", "js", "jsx", "mjs"] {
                    push(base.with_extension(ext));
                }
                for ext in ["ts", "tsx", "js"] {
                    push(base.join(format!("index.{ext}")));
                }
            }
            _ => {}
        }
    }
    resolved
}

// ── Windowing ──────────────────────────────────────────────────────

/// One prioritized context section.
#[derive(Debug, Clone)]
pub struct ContextSection {
    pub name: String,
    pub content: String,
    pub tokens: usize,
    pub priority: u32,
}

/// Truncate `text` at line boundaries so the result (marker included)
/// fits the token budget.
pub fn truncate_to_tokens(text: &str, budget: usize, counter: &TokenCounter) -> String {
    if counter(text) <= budget {
        return text.to_string();
    }

    let marker_tokens = counter(TRUNCATION_MARKER);
    let mut kept = String::new();
    let mut used = 0;
    for line in text.lines() {
        let with_newline = format!("{line}\n");
        let line_tokens = counter(&with_newline);
        if used + line_tokens + marker_tokens > budget {
            break;
        }
        kept.push_str(&with_newline);
        used += line_tokens;
    }
    kept.push_str(TRUNCATION_MARKER);
    kept
}

// ── ContextAssembler ───────────────────────────────────────────────

pub struct ContextAssembler {
    root: PathBuf,
    max_context_tokens: usize,
    token_counter: Box<TokenCounter>,
}

impl ContextAssembler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            token_counter: Box::new(default_token_count),
        }
    }

    pub fn with_max_tokens(mut self, max_context_tokens: usize) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    /// Use the engine's tokenizer instead of the 4-chars-per-token
    /// estimate.
    pub fn with_token_counter(
        mut self,
        counter: impl Fn(&str) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.token_counter = Box::new(counter);
        self
    }

    /// Assemble the prompt context for `source_path`.
    pub fn assemble(&self, source_path: impl AsRef<Path>) -> Result<AssembledContext, ContextError> {
        let source_path = source_path.as_ref();
        let abs_path = if source_path.is_absolute() {
            source_path.to_path_buf()
        } else {
            self.root.join(source_path)
        };

        let language = detect_language(&abs_path).ok_or_else(|| {
            ContextError::UnsupportedLanguage(abs_path.display().to_string())
        })?;

        let source_code = std::fs::read_to_string(&abs_path)?;
        let parse_result = extract_from_source(source_code.as_bytes(), language)
            .unwrap_or_else(|_| {
                let mut r = ParseResult::empty(language);
                r.has_errors = true;
                r
            });

        // Related files: tests for this source, then resolved imports.
        let mut test_files = find_test_files_for(&abs_path, &self.root, language);
        let import_files = resolve_imports(&parse_result, &abs_path, &self.root, language);

        // Conventions: prefer this file's tests, else any project tests.
        let pattern_sources = if test_files.is_empty() {
            find_any_test_files(&self.root, language, 5)
        } else {
            test_files.clone()
        };
        let test_patterns = if pattern_sources.is_empty() {
            None
        } else {
            Some(extract_test_patterns(&pattern_sources, language))
        };

        test_files.truncate(5);
        let mut related: Vec<(PathBuf, &str)> =
            test_files.into_iter().map(|p| (p, "test")).collect();
        related.extend(import_files.into_iter().take(5).map(|p| (p, "import")));

        let context = self.window(
            &abs_path,
            language,
            source_code,
            parse_result,
            related,
            test_patterns,
        );
        debug!(
            source = %abs_path.display(),
            tokens = context.total_tokens,
            related = context.related_files.len(),
            "assembled context"
        );
        Ok(context)
    }

    fn window(
        &self,
        abs_path: &Path,
        language: &str,
        source_code: String,
        parse_result: ParseResult,
        related: Vec<(PathBuf, &str)>,
        test_patterns: Option<DetectedTestPattern>,
    ) -> AssembledContext {
        let counter = self.token_counter.as_ref();
        let mut context = AssembledContext {
            source_path: abs_path.display().to_string(),
            source_code: String::new(),
            language: language.to_string(),
            parse_result,
            related_files: Vec::new(),
            test_patterns: None,
            total_tokens: 0,
        };

        let mut sections: Vec<(ContextSection, Option<(PathBuf, &str)>)> = Vec::new();
        sections.push((
            ContextSection {
                name: "source".into(),
                tokens: counter(&source_code),
                content: source_code,
                priority: PRIORITY_SOURCE,
            },
            None,
        ));

        let signatures = context.function_signatures().join("\n");
        if !signatures.is_empty() {
            sections.push((
                ContextSection {
                    name: "signatures".into(),
                    tokens: counter(&signatures),
                    content: signatures,
                    priority: PRIORITY_SIGNATURES,
                },
                None,
            ));
        }

        for (path, relationship) in related {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            sections.push((
                ContextSection {
                    name: format!("related:{}", path.display()),
                    tokens: counter(&content),
                    content,
                    priority: PRIORITY_RELATED,
                },
                Some((path, relationship)),
            ));
        }

        if let Some(patterns) = &test_patterns {
            let rendered = format!(
                "naming: {}\nassertions: {}\nmocking: {}\n{}",
                patterns.naming_style,
                patterns.assertion_style,
                patterns.mocking_patterns.join(", "),
                patterns.sample_test
            );
            sections.push((
                ContextSection {
                    name: "patterns".into(),
                    tokens: counter(&rendered),
                    content: rendered,
                    priority: PRIORITY_PATTERNS,
                },
                None,
            ));
        }

        let imports = context
            .parse_result
            .imports
            .iter()
            .map(|i| i.module.clone())
            .collect::<Vec<_>>()
            .join("\n");
        if !imports.is_empty() {
            sections.push((
                ContextSection {
                    name: "imports".into(),
                    tokens: counter(&imports),
                    content: imports,
                    priority: PRIORITY_IMPORTS,
                },
                None,
            ));
        }

        // Highest priority first; fill until the budget is exhausted.
        sections.sort_by_key(|(s, _)| std::cmp::Reverse(s.priority));
        let mut remaining = self.max_context_tokens;
        let mut budget_exhausted = false;
        let mut patterns_included = false;

        for (section, origin) in sections {
            if budget_exhausted {
                break;
            }
            let name = section.name.clone();
            let content = if section.tokens <= remaining {
                remaining -= section.tokens;
                section.content
            } else {
                // Last partial section, truncated at a line boundary.
                budget_exhausted = true;
                let truncated = truncate_to_tokens(&section.content, remaining, counter);
                let tokens = counter(&truncated);
                if tokens > remaining {
                    continue; // Not even the marker fits.
                }
                remaining -= tokens;
                truncated
            };

            match origin {
                None if name == "source" => context.source_code = content,
                None => {
                    if name == "patterns" {
                        patterns_included = true;
                    }
                }
                Some((path, relationship)) => context.related_files.push(RelatedFile {
                    path: path.display().to_string(),
                    relationship: relationship.to_string(),
                    content,
                }),
            }
        }

        context.total_tokens = self.max_context_tokens - remaining;
        if patterns_included {
            context.test_patterns = test_patterns;
        }
        context
    }
}
