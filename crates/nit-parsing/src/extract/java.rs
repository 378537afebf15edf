//! Java extractor. Java has no top-level functions: methods only appear
//! inside classes, interfaces, and enums.

use tree_sitter::Node;

use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseResult};

pub struct JavaExtractor;

impl Extractor for JavaExtractor {
    fn language(&self) -> &'static str {
        "java"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        for node in named_children(root) {
            match node.kind() {
                "class_declaration" | "interface_declaration" | "enum_declaration" => {
                    result.classes.push(class_info(node, source));
                }
                "import_declaration" => {
                    let text = node_text(node, source);
                    let module = text
                        .trim_start_matches("import")
                        .trim()
                        .trim_start_matches("static")
                        .trim()
                        .trim_end_matches(';')
                        .trim()
                        .to_string();
                    result.imports.push(ImportInfo {
                        is_wildcard: module.ends_with(".*"),
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

fn class_info(node: Node<'_>, source: &[u8]) -> ClassInfo {
    let mut bases = Vec::new();
    if let Some(superclass) = node.child_by_field_name("superclass") {
        // superclass: "extends Parent" — the type is the named child.
        for child in named_children(superclass) {
            bases.push(node_text(child, source));
        }
        if bases.is_empty() {
            let text = node_text(superclass, source);
            bases.push(text.trim_start_matches("extends").trim().to_string());
        }
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        for list in named_children(interfaces) {
            for ty in named_children(list) {
                bases.push(node_text(ty, source));
            }
        }
    }

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in named_children(body) {
            if matches!(child.kind(), "method_declaration" | "constructor_declaration") {
                methods.push(method_info(child, source));
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

fn method_info(node: Node<'_>, source: &[u8]) -> FunctionInfo {
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| {
            named_children(params)
                .into_iter()
                .filter(|p| p.kind() == "formal_parameter")
                .map(|p| ParamInfo {
                    name: field_text(p, "name", source),
                    type_annotation: field_text(p, "type", source),
                    default_value: String::new(),
                })
                .collect()
        })
        .unwrap_or_default();

    FunctionInfo {
        name: field_text(node, "name", source),
        start_line: start_line(node),
        end_line: end_line(node),
        parameters,
        return_type: field_text(node, "type", source),
        body_text: node_text(node, source),
        decorators: Vec::new(),
        is_async: false,
        is_method: true,
    }
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_from_source;

    #[test]
    fn no_top_level_functions() {
        let result = extract_from_source(
            b"public class Main { public static void main(String[] args) {} }",
            "java",
        )
        .unwrap();
        assert!(result.functions.is_empty());
    }

    #[test]
    fn class_with_methods() {
        let source = b"
public class UserService {
    public String getUser(int id) {
        return \"user\";
    }
    private void helper() {}
}
";
        let result = extract_from_source(source, "java").unwrap();
        let cls = &result.classes[0];
        assert_eq!(cls.name, "UserService");
        assert_eq!(cls.methods.len(), 2);
        assert_eq!(cls.methods[0].name, "getUser");
        assert_eq!(cls.methods[0].return_type, "String");
    }

    #[test]
    fn method_parameters() {
        let result = extract_from_source(
            b"public class Calc { public int add(int a, int b) { return a+b; } }",
            "java",
        )
        .unwrap();
        let method = &result.classes[0].methods[0];
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].name, "a");
        assert_eq!(method.parameters[0].type_annotation, "int");
    }

    #[test]
    fn imports() {
        let result =
            extract_from_source(b"import java.util.List;\nimport java.util.Map;", "java").unwrap();
        assert_eq!(result.imports.len(), 2);
        assert_eq!(result.imports[0].module, "java.util.List");
        assert_eq!(result.imports[1].module, "java.util.Map");
    }

    #[test]
    fn inheritance() {
        let result =
            extract_from_source(b"public class Child extends Parent { }", "java").unwrap();
        assert!(result.classes[0].bases.contains(&"Parent".to_string()));
    }
}
