//! C++ extractor: free functions, classes/structs with methods and base
//! classes, and `#include` directives. Reuses the C declarator walking.

use tree_sitter::Node;

use super::c::function_info;
use super::{end_line, field_text, named_children, node_text, start_line, Extractor};
use crate::types::{ClassInfo, ImportInfo, ParseResult};

pub struct CppExtractor;

impl Extractor for CppExtractor {
    fn language(&self) -> &'static str {
        "cpp"
    }

    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult) {
        for node in named_children(root) {
            match node.kind() {
                "function_definition" => {
                    if let Some(info) = function_info(node, source) {
                        result.functions.push(info);
                    }
                }
                "class_specifier" | "struct_specifier" => {
                    push_class(node, source, result);
                }
                "declaration" | "type_definition" => {
                    for child in named_children(node) {
                        if matches!(child.kind(), "class_specifier" | "struct_specifier") {
                            push_class(child, source, result);
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

fn push_class(node: Node<'_>, source: &[u8], result: &mut ParseResult) {
    let name = field_text(node, "name", source);
    let Some(body) = node.child_by_field_name("body") else {
        return; // Forward declaration.
    };
    if name.is_empty() {
        return;
    }

    // `: public Base, private Mixin` — keep the type names only.
    let mut bases = Vec::new();
    for child in named_children(node) {
        if child.kind() == "base_class_clause" {
            for base in named_children(child) {
                if matches!(
                    base.kind(),
                    "type_identifier" | "qualified_identifier" | "template_type"
                ) {
                    bases.push(node_text(base, source));
                }
            }
        }
    }

    let mut methods = Vec::new();
    for child in named_children(body) {
        if child.kind() == "function_definition" {
            if let Some(mut info) = function_info(child, source) {
                info.is_method = true;
                methods.push(info);
            }
        }
    }

    result.classes.push(ClassInfo {
        name,
        start_line: start_line(node),
        end_line: end_line(node),
        bases,
        methods,
        decorators: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_from_source;

    #[test]
    fn free_function() {
        let result =
            extract_from_source(b"int add(int a, int b) { return a + b; }", "cpp").unwrap();
        assert_eq!(result.functions[0].name, "add");
    }

    #[test]
    fn class_with_method() {
        let source = b"
class Calculator {
public:
    int add(int a, int b) { return a + b; }
};
";
        let result = extract_from_source(source, "cpp").unwrap();
        assert_eq!(result.classes.len(), 1);
        let cls = &result.classes[0];
        assert_eq!(cls.name, "Calculator");
        assert_eq!(cls.methods.len(), 1);
        assert_eq!(cls.methods[0].name, "add");
        assert!(cls.methods[0].is_method);
    }

    #[test]
    fn inheritance() {
        let result = extract_from_source(b"class Derived : public Base { };", "cpp").unwrap();
        assert_eq!(result.classes[0].bases, vec!["Base"]);
    }

    #[test]
    fn struct_also_detected() {
        let result = extract_from_source(b"struct Vec2 { float x; float y; };", "cpp").unwrap();
        assert!(result.classes.iter().any(|c| c.name == "Vec2"));
    }
}
