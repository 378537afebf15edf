//! Go extractor: functions, struct types, methods attached to receiver
//! types, and single or grouped imports.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct GoExtractor;

impl Extractor for GoExtractor {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        // First pass: collect struct types so methods can attach to them.
        for node in named_children(root) {
            if node.kind() == "type_declaration" {
                for spec in named_children(node) {
                    if spec.kind() != "type_spec" {
                        continue;
                    }
                    let is_struct = spec
                        .child_by_field_name("type")
                        .map(|t| t.kind() == "struct_type")
                        .unwrap_or(false);
                    if is_struct {
                        result.classes.push(ClassInfo {
                            name: field_text(spec, "name", source),
                            start_line: start_line(node),
                            end_line: end_line(node),
                            bases: Vec::new(),
                            methods: Vec::new(),
                            decorators: Vec::new(),
                        });
                    }
                }
            }
        }

        for node in named_children(root) {
            match node.kind() {
                "function_declaration" => {
                    result.functions.push(function_info(node, source, false));
                }
                "method_declaration" => {
                    let mut info = function_info(node, source, true);
                    info.is_method = true;
                    let receiver_type = receiver_type_name(node, source);
                    match result.classes.iter_mut().find(|c| c.name == receiver_type) {
                        Some(class) => class.methods.push(info),
                        // Receiver type defined elsewhere; keep the method
                        // visible as a free function.
                        None => result.functions.push(info),
                    }
                }
                "import_declaration" => extract_imports(node, source, result),
                _ => {}
            }
        }
    }
}

fn receiver_type_name(node: Node<'_>, source: &[u8]) -> String {
    let Some(receiver) = node.child_by_field_name("receiver") else {
        return String::new();
    };
    let text = named_children(receiver)
        .first()
        .and_then(|decl| decl.child_by_field_name("type"))
        .map(|t| node_text(t, source))
        .unwrap_or_default();
    text.trim_start_matches('*').to_string()
}

fn function_info(node: Node<'_>, source: &[u8], is_method: bool) -> FunctionInfo {
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| {
            named_children(params)
                .into_iter()
                .filter(|p| p.kind() == "parameter_declaration")
                .flat_map(|p| {
                    let ty = field_text(p, "type", source);
                    // `a, b int` declares several names with one type.
                    let names: Vec<String> = named_children(p)
                        .into_iter()
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| node_text(n, source))
                        .collect();
                    names
                        .into_iter()
                        .map(move |name| ParamInfo {
                            name,
                            type_annotation: ty.clone(),
                            default_value: String::new(),
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
        .unwrap_or_default();

    FunctionInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters,
        return_type: field_text(node, "result", source),
        body_text: node_text(node, source),
        decorators: Vec::new(),
        is_async: false,
        is_method,
    }
}

fn extract_imports(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let mut push_spec = |spec: Node<'_>| {
        if spec.kind() != "import_spec" {
            return;
        }
        let module = field_text(spec, "path", source).trim_matches('"').to_string();
        let alias = field_text(spec, "name", source);
        result.imports.push(ImportInfo {
            module,
            alias,
            line: start_line(spec),
            ..Default::default()
        });
    };

    for child in named_children(node) {
        if child.kind() == "import_spec_list" {
            for spec in named_children(child) {
                push_spec(spec);
            }
        } else {
            push_spec(child);
        }
    }
}
