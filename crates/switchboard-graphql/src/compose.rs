//! Schema text composition.
//!
//! Collected declaration fragments merge into one schema document: base type
//! definitions first, then synthesized `Query`/`Mutation`/`Subscription` root
//! types (only when at least one fragment of that kind exists), then raw
//! `type`, `interface`, `union`, `enum`, `input` blocks in that fixed order.
//! Some schema-language parsers are order-sensitive for forward references,
//! and downstream tooling asserts on the layout, so the order is part of the
//! contract.

use std::sync::LazyLock;

use regex::Regex;
use switchboard_broker::{Fragments, GraphqlDeclaration};

/// Accumulated declaration fragments, by kind, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct SchemaFragments {
    pub queries: Vec<String>,
    pub mutations: Vec<String>,
    pub subscriptions: Vec<String>,
    pub types: Vec<String>,
    pub interfaces: Vec<String>,
    pub unions: Vec<String>,
    pub enums: Vec<String>,
    pub inputs: Vec<String>,
}

fn extend(into: &mut Vec<String>, fragments: Option<&Fragments>) {
    if let Some(fragments) = fragments {
        into.extend(fragments.iter().map(str::to_string));
    }
}

impl SchemaFragments {
    /// Absorbs one declaration block, appending its fragments per kind.
    pub fn absorb(&mut self, declaration: &GraphqlDeclaration) {
        extend(&mut self.queries, declaration.query.as_ref());
        extend(&mut self.mutations, declaration.mutation.as_ref());
        extend(&mut self.subscriptions, declaration.subscription.as_ref());
        extend(&mut self.types, declaration.types.as_ref());
        extend(&mut self.interfaces, declaration.interfaces.as_ref());
        extend(&mut self.unions, declaration.unions.as_ref());
        extend(&mut self.enums, declaration.enums.as_ref());
        extend(&mut self.inputs, declaration.inputs.as_ref());
    }

    /// Returns whether no fragment of any kind was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
            && self.mutations.is_empty()
            && self.subscriptions.is_empty()
            && self.types.is_empty()
            && self.interfaces.is_empty()
            && self.unions.is_empty()
            && self.enums.is_empty()
            && self.inputs.is_empty()
    }

    /// Composes the full schema document.
    ///
    /// `base_type_defs` are always emitted, even when nothing was collected;
    /// `directives` are appended verbatim right after them.
    #[must_use]
    pub fn compose(&self, base_type_defs: &[String], directives: &[String]) -> String {
        let mut doc = String::new();

        for fragment in base_type_defs.iter().chain(directives) {
            push_block(&mut doc, fragment);
        }

        push_root(&mut doc, "Query", &self.queries);
        push_root(&mut doc, "Mutation", &self.mutations);
        push_root(&mut doc, "Subscription", &self.subscriptions);

        for group in [
            &self.types,
            &self.interfaces,
            &self.unions,
            &self.enums,
            &self.inputs,
        ] {
            for fragment in group.iter() {
                push_block(&mut doc, fragment);
            }
        }

        doc.trim_end().to_string()
    }
}

fn push_block(doc: &mut String, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    doc.push_str(fragment);
    doc.push_str("\n\n");
}

fn push_root(doc: &mut String, name: &str, fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    doc.push_str(&format!("type {name} {{\n{}\n}}\n\n", fields.join("\n")));
}

static BLOCK_STRINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)""".*?""""#).expect("valid regex"));
static QUOTED_STRINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("valid regex"));
static LINE_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)#.*$").expect("valid regex"));

/// Extracts the GraphQL field name from a raw field declaration.
///
/// Description strings and `#` comments are stripped first; the name is the
/// substring up to the first `(` or `:`, whichever comes first. Tolerates
/// multi-line declarations with embedded parameter lists.
#[must_use]
pub fn field_name(declaration: &str) -> Option<String> {
    let stripped = BLOCK_STRINGS.replace_all(declaration, "");
    let stripped = QUOTED_STRINGS.replace_all(&stripped, "");
    let stripped = LINE_COMMENTS.replace_all(&stripped, "");
    let stripped: &str = &stripped;

    let head = match stripped.find(['(', ':']) {
        Some(pos) => &stripped[..pos],
        None => stripped,
    };
    let name = head.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_simple() {
        assert_eq!(field_name("posts(limit: Int): [Post]").as_deref(), Some("posts"));
        assert_eq!(field_name("hello: String!").as_deref(), Some("hello"));
    }

    #[test]
    fn test_field_name_multiline_parameters() {
        let decl = "\n\t\t\twelcome(\n\t\t\t\tname: String!\n\t\t\t): String!\n\t\t";
        assert_eq!(field_name(decl).as_deref(), Some("welcome"));
    }

    #[test]
    fn test_field_name_strips_comments_and_descriptions() {
        let decl = r#"
            # counts the posts
            """
            Post count: by author.
            """
            postCount(author: Int): Int
        "#;
        assert_eq!(field_name(decl).as_deref(), Some("postCount"));
    }

    #[test]
    fn test_field_name_empty() {
        assert_eq!(field_name("   "), None);
        assert_eq!(field_name("# only a comment"), None);
    }

    #[test]
    fn test_compose_wraps_root_types() {
        let mut fragments = SchemaFragments::default();
        fragments.queries.push("posts(limit: Int): [Post]".into());
        fragments.queries.push("users(limit: Int): [User]".into());
        fragments.mutations.push("upvote(id: Int!): Post".into());
        fragments.types.push("type Post { id: Int! }".into());

        let doc = fragments.compose(&[], &[]);

        assert!(doc.contains("type Query {\nposts(limit: Int): [Post]\nusers(limit: Int): [User]\n}"));
        assert!(doc.contains("type Mutation {\nupvote(id: Int!): Post\n}"));
        assert!(!doc.contains("type Subscription"));
        assert!(doc.contains("type Post { id: Int! }"));
    }

    #[test]
    fn test_compose_kind_order_is_fixed() {
        let mut fragments = SchemaFragments::default();
        fragments.inputs.push("input In { a: Int }".into());
        fragments.enums.push("enum Kind { A B }".into());
        fragments.unions.push("union Any = Post".into());
        fragments.interfaces.push("interface Node { id: Int! }".into());
        fragments.types.push("type Post { id: Int! }".into());

        let doc = fragments.compose(&[], &[]);

        let type_pos = doc.find("type Post").unwrap();
        let iface_pos = doc.find("interface Node").unwrap();
        let union_pos = doc.find("union Any").unwrap();
        let enum_pos = doc.find("enum Kind").unwrap();
        let input_pos = doc.find("input In").unwrap();
        assert!(type_pos < iface_pos);
        assert!(iface_pos < union_pos);
        assert!(union_pos < enum_pos);
        assert!(enum_pos < input_pos);
    }

    #[test]
    fn test_compose_base_type_defs_always_included() {
        let fragments = SchemaFragments::default();
        let doc = fragments.compose(&["scalar Timestamp".to_string()], &[]);
        assert_eq!(doc, "scalar Timestamp");
    }
}
