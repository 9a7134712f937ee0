//! Declarations and call sites read off a tree-sitter Java tree

use callweave_core::{Method, Param, UnitId};
use std::sync::Arc;
use tree_sitter::Node;

/// A method or constructor together with its body, if it has one.
pub struct Declaration<'t> {
    pub method: Arc<Method>,
    pub body: Option<Node<'t>>,
}

/// How the target of a call was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// `foo()`
    Implicit,
    /// `this.foo()`
    This,
    /// `super.foo()`
    Super,
    /// `name.foo()`; a capitalized name is usually a type.
    Named(String),
    /// Any other receiver expression.
    Expression,
    /// `new Foo()` or `this(...)`
    Construct,
}

/// One invocation inside a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub name: String,
    pub arity: usize,
    pub receiver: Receiver,
}

fn text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or_default()
}

/// Source text with whitespace removed, so `Map<K, V>` reads `Map<K,V>`.
fn compact(node: Node<'_>, src: &str) -> String {
    text(node, src).split_whitespace().collect()
}

/// `a.b.Foo<T>` -> `Foo`
fn simple_type_name(raw: &str) -> String {
    let base = raw.split('<').next().unwrap_or(raw);
    base.rsplit('.').next().unwrap_or(base).trim().to_string()
}

fn argument_count(node: Node<'_>) -> usize {
    let Some(args) = node.child_by_field_name("arguments") else {
        return 0;
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|c| !c.kind().ends_with("comment"))
        .count()
}

fn params(node: Node<'_>, src: &str) -> Vec<Param> {
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter_map(|p| match p.kind() {
            "formal_parameter" => {
                let ty = p.child_by_field_name("type")?;
                let name = p.child_by_field_name("name")?;
                let dims = p
                    .child_by_field_name("dimensions")
                    .map(|d| compact(d, src))
                    .unwrap_or_default();
                Some(Param::new(compact(ty, src) + &dims, text(name, src)))
            }
            "spread_parameter" => {
                let mut inner = p.walk();
                let children: Vec<_> = p.named_children(&mut inner).collect();
                let ty = children.iter().find(|c| c.kind() != "modifiers")?;
                let name = match children.iter().find(|c| c.kind() == "variable_declarator") {
                    Some(declarator) => declarator.child_by_field_name("name")?,
                    None => *children.iter().rev().find(|c| c.kind() == "identifier")?,
                };
                Some(Param::new(compact(*ty, src) + "...", text(name, src)))
            }
            _ => None,
        })
        .collect()
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
    )
}

/// Every method and constructor declared in a compilation unit, nested
/// types included. Nested types are named `Outer.Inner`.
pub fn declarations<'t>(root: Node<'t>, src: &str, unit: &UnitId) -> Vec<Declaration<'t>> {
    let mut out = Vec::new();
    let mut type_path = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if is_type_declaration(child.kind()) {
            visit_type(child, src, unit, &mut type_path, &mut out);
        }
    }
    out
}

fn visit_type<'t>(
    node: Node<'t>,
    src: &str,
    unit: &UnitId,
    type_path: &mut Vec<String>,
    out: &mut Vec<Declaration<'t>>,
) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    type_path.push(text(name, src).to_string());
    if let Some(body) = node.child_by_field_name("body") {
        visit_members(body, src, unit, type_path, out);
    }
    type_path.pop();
}

fn visit_members<'t>(
    body: Node<'t>,
    src: &str,
    unit: &UnitId,
    type_path: &mut Vec<String>,
    out: &mut Vec<Declaration<'t>>,
) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                let Some(name) = member.child_by_field_name("name") else {
                    continue;
                };
                let method = Method::new(
                    unit.clone(),
                    type_path.join("."),
                    text(name, src),
                    params(member, src),
                );
                out.push(Declaration {
                    method: Arc::new(method),
                    body: member.child_by_field_name("body"),
                });
            }
            // Enum constants come first, then the regular members.
            "enum_body_declarations" => visit_members(member, src, unit, type_path, out),
            kind if is_type_declaration(kind) => visit_type(member, src, unit, type_path, out),
            _ => {}
        }
    }
}

/// Calls and instantiations anywhere inside `body`, lambdas and anonymous
/// classes included, in source order.
pub fn call_sites(body: Node<'_>, src: &str) -> Vec<CallSite> {
    let mut sites = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "method_invocation" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let receiver = match node.child_by_field_name("object") {
                        None => Receiver::Implicit,
                        Some(object) => match object.kind() {
                            "this" => Receiver::This,
                            "super" => Receiver::Super,
                            "identifier" => Receiver::Named(text(object, src).to_string()),
                            _ => Receiver::Expression,
                        },
                    };
                    sites.push(CallSite {
                        name: text(name, src).to_string(),
                        arity: argument_count(node),
                        receiver,
                    });
                }
            }
            "object_creation_expression" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    sites.push(CallSite {
                        name: simple_type_name(&compact(ty, src)),
                        arity: argument_count(node),
                        receiver: Receiver::Construct,
                    });
                }
            }
            "explicit_constructor_invocation" => {
                let delegates_to_this = node
                    .child_by_field_name("constructor")
                    .is_some_and(|c| c.kind() == "this");
                if delegates_to_this {
                    sites.push(CallSite {
                        // Resolved against the caller's own type.
                        name: String::new(),
                        arity: argument_count(node),
                        receiver: Receiver::Construct,
                    });
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        // Reverse so the stack pops children in source order.
        stack.extend(children.into_iter().rev());
    }
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(src: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_java::LANGUAGE.into()).unwrap();
        parser.parse(src, None).unwrap()
    }

    #[test]
    fn test_declarations_with_nested_types() {
        let src = r#"
package demo;

class Outer {
    Outer(int size) {}
    void run(String[] args, java.util.Map<String, Integer> counts) {}

    static class Inner {
        void poke(String... values) {}
    }
}

enum Mode {
    FAST, SLOW;
    boolean isFast() { return this == FAST; }
}

interface Shape {
    double area();
}
"#;
        let tree = parse(src);
        let unit = UnitId::new("demo/Outer.java");
        let decls = declarations(tree.root_node(), src, &unit);
        let signatures: Vec<_> = decls.iter().map(|d| d.method.signature()).collect();

        assert_eq!(
            signatures,
            vec![
                "Outer::Outer(int size)",
                "Outer::run(String[] args,java.util.Map<String,Integer> counts)",
                "Outer.Inner::poke(String... values)",
                "Mode::isFast()",
                "Shape::area()",
            ]
        );
        assert!(decls[4].body.is_none());
        assert!(decls.iter().all(|d| d.method.unit == unit));
    }

    #[test]
    fn test_call_sites() {
        let src = r#"
class Service {
    Service() { this(1); }
    Service(int n) {}

    void handle(Repository repo) {
        helper();
        this.helper();
        repo.load("key", 2);
        Util.format(repo.load("k", 1).trim());
        new java.util.ArrayList<String>();
        Runnable r = () -> done();
    }
}
"#;
        let tree = parse(src);
        let unit = UnitId::new("Service.java");
        let decls = declarations(tree.root_node(), src, &unit);

        let ctor_sites = call_sites(decls[0].body.unwrap(), src);
        assert_eq!(ctor_sites.len(), 1);
        assert_eq!(ctor_sites[0].receiver, Receiver::Construct);
        assert_eq!(ctor_sites[0].arity, 1);

        let sites = call_sites(decls[2].body.unwrap(), src);
        let summary: Vec<_> = sites
            .iter()
            .map(|s| (s.name.as_str(), s.arity, s.receiver.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("helper", 0, Receiver::Implicit),
                ("helper", 0, Receiver::This),
                ("load", 2, Receiver::Named("repo".into())),
                ("format", 1, Receiver::Named("Util".into())),
                ("trim", 0, Receiver::Expression),
                ("load", 2, Receiver::Named("repo".into())),
                ("ArrayList", 0, Receiver::Construct),
                ("done", 0, Receiver::Implicit),
            ]
        );
    }
}
