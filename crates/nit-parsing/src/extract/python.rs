//! Python extractor: functions (incl. async and decorated), classes with
//! methods and bases, and the three import forms.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        for node in named_children(root) {
            match node.kind() {
                "function_definition" => {
                    result.functions.push(function_info(node, source, &[], false));
                }
                "decorated_definition" => extract_decorated(node, source, result),
                "class_definition" => result.classes.push(class_info(node, source, &[])),
                "import_statement" => extract_plain_import(node, source, result),
                "import_from_statement" => extract_from_import(node, source, result),
                _ => {}
            }
        }
    }
}

fn extract_decorated(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let mut decorators = Vec::new();
    let mut definition = None;
    for child in named_children(node) {
        match child.kind() {
            "decorator" => {
                // Decorator text minus the leading '@'.
                let text = node_text(child, source);
                decorators.push(text.trim_start_matches('@').to_string());
            }
            "function_definition" | "class_definition" => definition = Some(child),
            _ => {}
        }
    }
    let Some(def) = definition else { return };
    match def.kind() {
        "function_definition" => result
            .functions
            .push(function_info(def, source, &decorators, false)),
        _ => result.classes.push(class_info(def, source, &decorators)),
    }
}

fn function_info(
    node: Node<'_>,
    source: &[u8],
    decorators: &[String],
    is_method: bool,
) -> FunctionInfo {
    let is_async = node
        .child(0)
        .map(|c| c.kind() == "async")
        .unwrap_or(false);

    FunctionInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters: parameters(node, source, is_method),
        return_type: field_text(node, "return_type", source),
        body_text: node_text(node, source),
        decorators: decorators.to_vec(),
        is_async,
        is_method,
    }
}

fn parameters(node: Node<'_>, source: &[u8], is_method: bool) -> Vec<ParamInfo> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for param in named_children(params) {
        let info = match param.kind() {
            "identifier" => ParamInfo {
                name: node_text(param, source),
                ..Default::default()
            },
            "typed_parameter" => ParamInfo {
                name: param
                    .named_child(0)
                    .map(|n| node_text(n, source))
                    .unwrap_or_default(),
                type_annotation: field_text(param, "type", source),
                ..Default::default()
            },
            "default_parameter" => ParamInfo {
                name: field_text(param, "name", source),
                default_value: field_text(param, "value", source),
                ..Default::default()
            },
            "typed_default_parameter" => ParamInfo {
                name: field_text(param, "name", source),
                type_annotation: field_text(param, "type", source),
                default_value: field_text(param, "value", source),
            },
            _ => continue,
        };
        // Drop the implicit receiver on methods.
        if is_method && (info.name == "self" || info.name == "cls") {
            continue;
        }
        out.push(info);
    }
    out
}

fn class_info(node: Node<'_>, source: &[u8], decorators: &[String]) -> ClassInfo {
    let bases = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|n| n.kind() != "keyword_argument")
                .map(|n| node_text(n, source))
                .collect()
        })
        .unwrap_or_default();

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in named_children(body) {
            match child.kind() {
                "function_definition" => methods.push(function_info(child, source, &[], true)),
                "decorated_definition" => {
                    let mut decs = Vec::new();
                    let mut def = None;
                    for inner in named_children(child) {
                        if inner.kind() == "decorator" {
                            decs.push(node_text(inner, source).trim_start_matches('@').to_string());
                        } else if inner.kind() == "function_definition" {
                            def = Some(inner);
                        }
                    }
                    if let Some(d) = def {
                        methods.push(function_info(d, source, &decs, true));
                    }
                }
                _ => {}
            }
        }
    }

    ClassInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        bases,
        methods,
        decorators: decorators.to_vec(),
    }
}

fn extract_plain_import(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    for child in named_children(node) {
        match child.kind() {
            "dotted_name" => result.imports.push(ImportInfo {
                module: node_text(child, source),
                line: start_line(node),
                ..Default::default()
            }),
            "aliased_import" => result.imports.push(ImportInfo {
                module: field_text(child, "name", source),
                alias: field_text(child, "alias", source),
                line: start_line(node),
                ..Default::default()
            }),
            _ => {}
        }
    }
}

fn extract_from_import(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut names = Vec::new();
    let mut is_wildcard = false;
    for child in named_children(node) {
        if Some(child) == node.child_by_field_name("module_name") {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => names.push(node_text(child, source)),
            "aliased_import" => names.push(field_text(child, "name", source)),
            "wildcard_import" => is_wildcard = true,
            _ => {}
        }
    }

    result.imports.push(ImportInfo {
        module,
        names,
        is_wildcard,
        line: start_line(node),
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_from_source;

    #[test]
    fn simple_function() {
        let result =
            extract_from_source(b"def greet(name: str) -> str:\n    return 'hi'", "python")
                .unwrap();
        assert_eq!(result.functions.len(), 1);
        let f = &result.functions[0];
        assert_eq!(f.name, "greet");
        assert_eq!(f.return_type, "str");
        assert_eq!(f.parameters.len(), 1);
        assert_eq!(f.parameters[0].name, "name");
        assert_eq!(f.parameters[0].type_annotation, "str");
        assert!(!f.is_method);
        assert!(!f.is_async);
    }

    #[test]
    fn async_function() {
        let result =
            extract_from_source(b"async def fetch(url: str) -> bytes:\n    pass", "python")
                .unwrap();
        assert!(result.functions[0].is_async);
    }

    #[test]
    fn decorated_function() {
        let result =
            extract_from_source(b"@app.route('/hello')\ndef hello():\n    pass", "python")
                .unwrap();
        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.functions[0].decorators, vec!["app.route('/hello')"]);
    }

    #[test]
    fn default_parameter() {
        let result = extract_from_source(b"def greet(name='world'):\n    pass", "python").unwrap();
        let p = &result.functions[0].parameters[0];
        assert_eq!(p.name, "name");
        assert_eq!(p.default_value, "'world'");
    }

    #[test]
    fn class_with_methods() {
        let source = b"
class MyService(Base):
    def get(self, id: int) -> str:
        pass

    async def fetch(self) -> None:
        pass
";
        let result = extract_from_source(source, "python").unwrap();
        assert_eq!(result.classes.len(), 1);
        let cls = &result.classes[0];
        assert_eq!(cls.name, "MyService");
        assert_eq!(cls.bases, vec!["Base"]);
        assert_eq!(cls.methods.len(), 2);
        assert_eq!(cls.methods[0].name, "get");
        assert!(cls.methods[0].is_method);
        assert_eq!(cls.methods[1].name, "fetch");
        assert!(cls.methods[1].is_async);
    }

    #[test]
    fn multiple_inheritance() {
        let result = extract_from_source(b"class Child(Base, Mixin):\n    pass", "python").unwrap();
        assert_eq!(result.classes[0].bases, vec!["Base", "Mixin"]);
    }

    #[test]
    fn import_forms() {
        let result = extract_from_source(b"import os", "python").unwrap();
        assert_eq!(result.imports[0].module, "os");

        let result = extract_from_source(b"import numpy as np", "python").unwrap();
        assert_eq!(result.imports[0].module, "numpy");
        assert_eq!(result.imports[0].alias, "np");

        let result = extract_from_source(b"from pathlib import Path", "python").unwrap();
        assert_eq!(result.imports[0].module, "pathlib");
        assert_eq!(result.imports[0].names, vec!["Path"]);

        let result = extract_from_source(b"from typing import Any, Optional", "python").unwrap();
        assert_eq!(result.imports[0].names, vec!["Any", "Optional"]);

        let result = extract_from_source(b"from . import utils", "python").unwrap();
        assert_eq!(result.imports[0].module, ".");
    }

    #[test]
    fn line_numbers_are_one_based() {
        let result = extract_from_source(
            b"# comment\ndef foo():\n    pass\n\ndef bar():\n    pass",
            "python",
        )
        .unwrap();
        assert_eq!(result.functions[0].start_line, 2);
        assert_eq!(result.functions[1].start_line, 5);
        for f in &result.functions {
            assert!(f.end_line >= f.start_line);
        }
    }
}
