//! `{{path}}` template rendering.
//!
//! # Syntax
//!
//! - `{{name}}` substitutes the top-level variable `name`
//! - `{{step.output.field}}` walks nested maps (and list indices)
//! - Whitespace inside the braces is ignored: `{{ name }}`
//!
//! Rendering is a single pass. Substituted text is never scanned again, so a
//! value that itself contains `{{...}}` is inserted literally. Anything that
//! is not a complete marker (single braces, `{{` without a closing `}}`,
//! `{{}}`) is copied through unchanged. Missing variables render as an empty
//! string.

use super::Context;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A complete `{{...}}` marker whose body contains no braces.
static TEMPLATE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("Invalid template marker regex"));

/// Render a template string against a context.
pub fn render(template: &str, context: &Context) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    TEMPLATE_MARKER
        .replace_all(template, |caps: &Captures<'_>| {
            let path = caps[1].trim();
            if path.is_empty() {
                return caps[0].to_string();
            }
            context.get(path).render()
        })
        .into_owned()
}

/// List the variable paths referenced by a template, in order of appearance.
pub fn referenced_paths(template: &str) -> Vec<String> {
    TEMPLATE_MARKER
        .captures_iter(template)
        .map(|caps| caps[1].trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;
    use std::collections::BTreeMap;

    fn ctx(pairs: &[(&str, Value)]) -> Context {
        let mut context = Context::new();
        for (k, v) in pairs {
            context.set(*k, v.clone());
        }
        context
    }

    #[test]
    fn test_simple_substitution() {
        let context = ctx(&[("name", "Alice".into()), ("greeting", "Hello".into())]);
        assert_eq!(render("{{greeting}}, {{name}}!", &context), "Hello, Alice!");
    }

    #[test]
    fn test_no_markers() {
        let context = Context::new();
        assert_eq!(render("Just plain text", &context), "Just plain text");
        assert_eq!(render("", &context), "");
    }

    #[test]
    fn test_whitespace_in_marker() {
        let context = ctx(&[("name", "Alice".into())]);
        assert_eq!(render("Hello {{ name }}!", &context), "Hello Alice!");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let context = Context::new();
        assert_eq!(render("before{{missing}}after", &context), "beforeafter");
        assert_eq!(render("[{{a.b.c}}]", &context), "[]");
    }

    #[test]
    fn test_missing_intermediate_segment_renders_empty() {
        let context = ctx(&[("a", "scalar".into())]);
        assert_eq!(render("[{{a.b}}]", &context), "[]");
    }

    #[test]
    fn test_nested_path() {
        let mut inner = BTreeMap::new();
        inner.insert("version".to_string(), Value::from("1.2.3"));
        let mut outer = BTreeMap::new();
        outer.insert("release".to_string(), Value::Map(inner));
        let context = ctx(&[("build", Value::Map(outer))]);

        assert_eq!(render("v{{build.release.version}}", &context), "v1.2.3");
    }

    #[test]
    fn test_list_index_path() {
        let context = ctx(&[(
            "items",
            Value::List(vec![Value::from("first"), Value::from("second")]),
        )]);
        assert_eq!(render("{{items.1}}", &context), "second");
        assert_eq!(render("{{items.9}}", &context), "");
    }

    #[test]
    fn test_no_recursive_rendering() {
        let context = ctx(&[("a", "{{b}}".into()), ("b", "expanded".into())]);
        assert_eq!(render("{{a}}", &context), "{{b}}");
    }

    #[test]
    fn test_self_referencing_value_is_inserted_once() {
        let context = ctx(&[("loop", "{{loop}}".into())]);
        assert_eq!(render("{{loop}}", &context), "{{loop}}");
    }

    #[test]
    fn test_single_and_partial_braces_pass_through() {
        let context = ctx(&[("x", "value".into())]);
        assert_eq!(render("{x}", &context), "{x}");
        assert_eq!(render("{{x", &context), "{{x");
        assert_eq!(render("x}}", &context), "x}}");
        assert_eq!(render("{{x}", &context), "{{x}");
        assert_eq!(render("{{}}", &context), "{{}}");
        assert_eq!(render("fn main() { }", &context), "fn main() { }");
    }

    #[test]
    fn test_triple_braces() {
        let context = ctx(&[("x", "value".into())]);
        assert_eq!(render("{{{x}}}", &context), "{value}");
    }

    #[test]
    fn test_no_escaping_applied() {
        let markup = "<script>alert('x')</script> \"; DROP TABLE users; --";
        let context = ctx(&[("payload", markup.into())]);
        assert_eq!(render("{{payload}}", &context), markup);
    }

    #[test]
    fn test_booleans_and_null() {
        let context = ctx(&[
            ("yes", Value::Bool(true)),
            ("no", Value::Bool(false)),
            ("nothing", Value::Null),
        ]);
        assert_eq!(render("{{yes}}/{{no}}/{{nothing}}", &context), "True/False/");
    }

    #[test]
    fn test_bytes_render_without_error() {
        let context = ctx(&[("blob", Value::bytes(vec![0u8, 159, 146, 150]))]);
        assert_eq!(render("{{blob}}", &context), "b\"\\x00\\x9f\\x92\\x96\"");
    }

    #[test]
    fn test_unicode_values() {
        let context = ctx(&[
            ("emoji", "🎉".into()),
            ("text", "日本語".into()),
            ("rtl", "مرحبا".into()),
        ]);
        assert_eq!(
            render("{{emoji}} {{text}} {{rtl}}", &context),
            "🎉 日本語 مرحبا"
        );
    }

    #[test]
    fn test_large_collection_round_trips() {
        let map: BTreeMap<String, Value> = (0..10_000)
            .map(|i| {
                (
                    format!("key-{:05}", i),
                    Value::List(vec![Value::Int(i), Value::from(format!("v{}", i))]),
                )
            })
            .collect();
        let context = ctx(&[("big", Value::Map(map.clone()))]);

        let rendered = render("{{big}}", &context);
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, Value::Map(map));
    }

    #[test]
    fn test_referenced_paths() {
        assert_eq!(
            referenced_paths("echo {{a}} {{ b.c }} {{}} {x}"),
            vec!["a".to_string(), "b.c".to_string()]
        );
    }
}
