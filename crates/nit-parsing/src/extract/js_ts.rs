//! JavaScript / TypeScript / TSX extractor.
//!
//! Handles function declarations, arrow functions bound to `const`/`let`,
//! classes with methods, and the default / named / namespace import forms.
//! TypeScript adds return-type and parameter-type annotations; the same
//! walker covers all three grammars.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct JsTsExtractor {
    language: &'static str,
}

impl JsTsExtractor {
    pub fn new(language: &'static str) -> Self {
        Self { language }
    }
}

impl Extractor for JsTsExtractor {
    fn language(&self) -> &'static str {
        self.language
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        extract_scope(root, source, result);
    }
}

fn extract_scope(scope: Node<'_>, source: &[u8], result: &mut ParseResult) {
    for node in named_children(scope) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                result.functions.push(function_info(node, source, false));
            }
            "lexical_declaration" | "variable_declaration" => {
                extract_bound_functions(node, source, result);
            }
            "class_declaration" => result.classes.push(class_info(node, source)),
            "import_statement" => extract_import(node, source, result),
            // export function / export class / export const ...
            "export_statement" => extract_scope(node, source, result),
            _ => {}
        }
    }
}

fn extract_bound_functions(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    for declarator in named_children(node) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(value) = declarator.child_by_field_name("value") else {
            continue;
        };
        if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
            continue;
        }
        let mut info = function_info(value, source, false);
        info.name = field_text(declarator, "name", source);
        info.start_line = start_line(node);
        info.body_text = node_text(node, source);
        result.functions.push(info);
    }
}

fn function_info(node: Node<'_>, source: &[u8], is_method: bool) -> FunctionInfo {
    let is_async = node
        .child(0)
        .map(|c| c.kind() == "async")
        .unwrap_or(false);

    FunctionInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters: parameters(node, source),
        return_type: strip_annotation(&field_text(node, "return_type", source)),
        body_text: node_text(node, source),
        decorators: Vec::new(),
        is_async,
        is_method,
    }
}

/// Type annotations arrive as `: string`; strip the leading colon.
fn strip_annotation(annotation: &str) -> String {
    annotation.trim_start_matches(':').trim().to_string()
}

fn parameters(node: Node<'_>, source: &[u8]) -> Vec<ParamInfo> {
    let Some(params) = node.child_by_field_name("parameters") else {
        // Arrow functions may have a single bare identifier parameter.
        if let Some(param) = node.child_by_field_name("parameter") {
            return vec![ParamInfo {
                name: node_text(param, source),
                ..Default::default()
            }];
        }
        return Vec::new();
    };

    named_children(params)
        .into_iter()
        .filter_map(|param| match param.kind() {
            "identifier" => Some(ParamInfo {
                name: node_text(param, source),
                ..Default::default()
            }),
            "required_parameter" | "optional_parameter" => Some(ParamInfo {
                name: field_text(param, "pattern", source),
                type_annotation: strip_annotation(&field_text(param, "type", source)),
                default_value: field_text(param, "value", source),
            }),
            "assignment_pattern" => Some(ParamInfo {
                name: field_text(param, "left", source),
                default_value: field_text(param, "right", source),
                ..Default::default()
            }),
            _ => None,
        })
        .collect()
}

fn class_info(node: Node<'_>, source: &[u8]) -> ClassInfo {
    // `extends Base` lives in the class_heritage child. The JS grammar
    // nests the expression directly; TS wraps it in an extends_clause.
    let mut bases = Vec::new();
    for child in named_children(node) {
        if child.kind() != "class_heritage" {
            continue;
        }
        for clause in named_children(child) {
            match clause.kind() {
                "extends_clause" => {
                    bases.extend(named_children(clause).iter().map(|n| node_text(*n, source)));
                }
                "implements_clause" => {}
                _ => bases.push(node_text(clause, source)),
            }
        }
    }
    bases.retain(|b| !b.is_empty());

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in named_children(body) {
            if child.kind() == "method_definition" {
                methods.push(function_info(child, source, true));
            }
        }
    }

    ClassInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        bases,
        methods,
        decorators: Vec::new(),
    }
}

fn extract_import(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let module = field_text(node, "source", source)
        .trim_matches(['"', '\''])
        .to_string();

    let mut names = Vec::new();
    let mut alias = String::new();
    let mut is_wildcard = false;

    for child in named_children(node) {
        if child.kind() != "import_clause" {
            continue;
        }
        for clause in named_children(child) {
            match clause.kind() {
                // Default import: the bare identifier doubles as the alias.
                "identifier" => alias = node_text(clause, source),
                "named_imports" => {
                    for spec in named_children(clause) {
                        if spec.kind() == "import_specifier" {
                            names.push(field_text(spec, "name", source));
                        }
                    }
                }
                "namespace_import" => {
                    is_wildcard = true;
                    for inner in named_children(clause) {
                        if inner.kind() == "identifier" {
                            alias = node_text(inner, source);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    result.imports.push(ImportInfo {
        module,
        names,
        alias,
        is_wildcard,
        line: start_line(node),
    });
}
