//! C extractor: free functions, structs, and `#include` directives.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct CExtractor;

impl Extractor for CExtractor {
    fn language(&self) -> &'static str {
        "c"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        for node in named_children(root) {
            match node.kind() {
                "function_definition" => {
                    if let Some(info) = function_info(node, source) {
                        result.functions.push(info);
                    }
                }
                "struct_specifier" => push_struct(node, source, result),
                "declaration" | "type_definition" => {
                    for child in named_children(node) {
                        if child.kind() == "struct_specifier" {
                            push_struct(child, source, result);
                        }
                    }
                }
                "preproc_include" => {
                    let path = field_text(node, "path", source);
                    result.imports.push(ImportInfo {
                        module: path.trim_matches(['"', '<', '>']).to_string(),
                        line: start_line(node),
                        ..Default::default()
                    });
                }
                _ => {}
            }
        }
    }
}

/// Walk declarator wrappers (pointers, etc.) down to the
/// function_declarator that carries the name and parameter list.
fn find_function_declarator<'a>(node: Node<'a>) -> Option<Node<'a>> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    let declarator = node.child_by_field_name("declarator")?;
    find_function_declarator(declarator)
}

pub(super) fn function_info(node: Node<'_>, source: &[u8]) -> Option<FunctionInfo> {
    let declarator = find_function_declarator(node.child_by_field_name("declarator")?)?;
    let name_node = declarator.child_by_field_name("declarator")?;

    Some(FunctionInfo {
        name: node_text(name_node, source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters: parameters(declarator, source),
        return_type: field_text(node, "type", source),
        body_text: node_text(node, source),
        decorators: Vec::new(),
        is_async: false,
        is_method: false,
    })
}

fn parameters(declarator: Node<'_>, source: &[u8]) -> Vec<ParamInfo> {
    let Some(params) = declarator.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(params)
        .into_iter()
        .filter(|p| p.kind() == "parameter_declaration")
        .filter_map(|p| {
            let name = p
                .child_by_field_name("declarator")
                .map(|d| node_text(d, source).trim_start_matches(['*', '&']).to_string())?;
            Some(ParamInfo {
                name,
                type_annotation: field_text(p, "type", source),
                default_value: String::new(),
            })
        })
        .collect()
}

pub(super) fn push_struct(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let name = field_text(node, "name", source);
    if name.is_empty() || node.child_by_field_name("body").is_none() {
        return;
    }
    result.classes.push(ClassInfo {
        name,
        start_line: start_line(node),
        end_line: end_line(node),
        bases: Vec::new(),
        methods: Vec::new(),
        decorators: Vec::new(),
    });
}
