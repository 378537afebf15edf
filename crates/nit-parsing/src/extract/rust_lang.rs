//! Rust extractor: free functions, structs with their impl methods, and
//! `use` declarations.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct RustExtractor;

impl Extractor for RustExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        // Structs first so impl blocks can attach methods.
        for node in named_children(root) {
            if node.kind() == "struct_item" {
                result.classes.push(ClassInfo {
                    name: field_text(node, "name", source),
                    start_line: start_line(node),
                    end_line: end_line(node),
                    bases: Vec::new(),
                    methods: Vec::new(),
                    decorators: Vec::new(),
                });
            }
        }

        for node in named_children(root) {
            match node.kind() {
                "function_item" => result.functions.push(function_info(node, source)),
                "impl_item" => attach_impl_methods(node, source, result),
                "use_declaration" => {
                    let text = node_text(node, source);
                    let module = text
                        .trim_start_matches("pub")
                        .trim()
                        .trim_start_matches("use")
                        .trim()
                        .trim_end_matches(';')
                        .to_string();
                    result.imports.push(ImportInfo {
                        is_wildcard: module.ends_with("::*"),
                        module,
                        line: start_line(node),
                        ..Default::default()
                    });
                }
                _ => {}
            }
        }
    }
}

fn attach_impl_methods(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    // Skip trait impls: methods there describe the trait, not the type.
    if node.child_by_field_name("trait").is_some() {
        return;
    }
    let type_name = field_text(node, "type", source);
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };

    let methods: Vec<FunctionInfo> = named_children(body)
        .into_iter()
        .filter(|c| c.kind() == "function_item")
        .map(|c| function_info(c, source))
        .collect();

    match result.classes.iter_mut().find(|c| c.name == type_name) {
        Some(class) => class.methods.extend(methods),
        None => result.classes.push(ClassInfo {
            name: type_name,
            start_line: start_line(node),
            end_line: end_line(node),
            bases: Vec::new(),
            methods,
            decorators: Vec::new(),
        }),
    }
}

fn function_info(node: Node<'_>, source: &[u8]) -> FunctionInfo {
    let mut is_method = false;
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| {
            named_children(params)
                .into_iter()
                .filter_map(|p| match p.kind() {
                    "self_parameter" => {
                        is_method = true;
                        None
                    }
                    "parameter" => Some(ParamInfo {
                        name: field_text(p, "pattern", source),
                        type_annotation: field_text(p, "type", source),
                        default_value: String::new(),
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    // `async fn` carries the modifier in a function_modifiers child.
    let is_async = (0..node.child_count())
        .filter_map(|i| node.child(i))
        .any(|c| {
            c.kind() == "function_modifiers"
                && node_text(c, source).split_whitespace().any(|m| m == "async")
        });

    FunctionInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters,
        return_type: field_text(node, "return_type", source),
        body_text: node_text(node, source),
        decorators: Vec::new(),
        is_async,
        is_method,
    }
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_from_source;

    #[test]
    fn function_with_types() {
        let result =
            extract_from_source(b"fn add(a: i32, b: i32) -> i32 { a + b }", "rust").unwrap();
        let f = &result.functions[0];
        assert_eq!(f.name, "add");
        assert_eq!(f.return_type, "i32");
        assert_eq!(f.parameters.len(), 2);
        assert_eq!(f.parameters[0].name, "a");
        assert_eq!(f.parameters[0].type_annotation, "i32");
    }

    #[test]
    fn async_function() {
        let result =
            extract_from_source(b"async fn fetch() -> Result<(), Error> { Ok(()) }", "rust")
                .unwrap();
        assert!(result.functions[0].is_async);
    }

    #[test]
    fn struct_with_impl() {
        let source = b"
pub struct Point { pub x: f64, pub y: f64 }
impl Point {
    pub fn new(x: f64, y: f64) -> Self { Point { x, y } }
    pub fn distance(&self) -> f64 { 0.0 }
}
";
        let result = extract_from_source(source, "rust").unwrap();
        assert_eq!(result.classes.len(), 1);
        let cls = &result.classes[0];
        assert_eq!(cls.name, "Point");
        assert_eq!(cls.methods.len(), 2);
        assert_eq!(cls.methods[0].name, "new");
        assert!(!cls.methods[0].is_method);
        assert_eq!(cls.methods[1].name, "distance");
        assert!(cls.methods[1].is_method);
    }

    #[test]
    fn use_import() {
        let result = extract_from_source(b"use std::collections::HashMap;", "rust").unwrap();
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].module, "std::collections::HashMap");
    }

    #[test]
    fn use_group_import() {
        let result = extract_from_source(b"use std::io::{self, Read};", "rust").unwrap();
        assert_eq!(result.imports.len(), 1);
        assert!(result.imports[0].module.contains("std::io"));
    }
}
