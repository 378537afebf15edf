//! Shared detection helpers for adapters.

use std::path::Path;

use walkdir::WalkDir;

const SKIP_DIRS: [&str; 10] = [
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
    ".nit",
    ".next",
    "vendor",
];

/// Whether any top-level file in `root` matches `pattern`.
pub fn root_file_matching(root: &Path, pattern: &str) -> bool {
    let Ok(compiled) = glob::Pattern::new(pattern) else {
        return false;
    };
    let Ok(entries) = std::fs::read_dir(root) else {
        return false;
    };
    entries.flatten().any(|e| {
        e.file_type().map(|t| t.is_file()).unwrap_or(false)
            && compiled.matches(&e.file_name().to_string_lossy())
    })
}

/// Whether any file below `root` (bounded depth, skip dirs applied)
/// matches `pattern` by file name.
pub fn any_file_matching(root: &Path, pattern: &str, max_depth: usize) -> bool {
    let Ok(compiled) = glob::Pattern::new(pattern) else {
        return false;
    };
    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !SKIP_DIRS.contains(&n))
                .unwrap_or(true)
        })
        .flatten()
        .any(|e| {
            e.file_type().is_file() && compiled.matches(&e.file_name().to_string_lossy())
        })
}

/// Whether package.json declares `name` in dependencies or
/// devDependencies.
pub fn package_json_has_dep(root: &Path, name: &str) -> bool {
    let Ok(text) = std::fs::read_to_string(root.join("package.json")) else {
        return false;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
        return false;
    };
    for section in ["devDependencies", "dependencies"] {
        if json
            .get(section)
            .and_then(|d| d.as_object())
            .map(|d| d.contains_key(name))
            .unwrap_or(false)
        {
            return true;
        }
    }
    false
}

/// Whether a top-level manifest file contains `needle` as a substring.
pub fn manifest_contains(root: &Path, manifest: &str, needle: &str) -> bool {
    std::fs::read_to_string(root.join(manifest))
        .map(|text| text.contains(needle))
        .unwrap_or(false)
}
