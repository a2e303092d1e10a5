//! Source re-emitter
//!
//! Renders a [`ConfigTree`] back into config source text that [`crate::load`]
//! reads back into an equal tree. Layout follows black: an expression stays
//! on one line when it fits, otherwise its brackets are split.

use std::collections::HashSet;
use std::fmt::Write as _;

use lazycfg_tree::{CallNode, ConfigTree, Value};
use tracing::warn;

use crate::namespace::prelude;
use crate::parser::is_keyword;

/// Default maximum line width
pub const DEFAULT_LINE_WIDTH: usize = 88;

/// Default indentation step
pub const DEFAULT_INDENT: usize = 4;

/// Layout settings for [`to_source_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    /// Lines longer than this are split where possible
    pub line_width: usize,
    /// Spaces per nesting level
    pub indent: usize,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            indent: DEFAULT_INDENT,
        }
    }
}

impl EmitOptions {
    /// Set the maximum line width
    #[must_use]
    pub const fn with_line_width(mut self, width: usize) -> Self {
        self.line_width = width;
        self
    }

    /// Set the indent step
    #[must_use]
    pub const fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

/// Render a tree as config source with default layout
#[must_use]
pub fn to_source(tree: &ConfigTree) -> String {
    to_source_with(tree, &EmitOptions::default())
}

/// Render a tree as config source
///
/// Emits one `cfg.<path> = <expr>` statement per leaf of the top-level
/// mapping chain, in declaration order. Non-empty plain mappings are
/// flattened into dotted paths.
#[must_use]
pub fn to_source_with(tree: &ConfigTree, options: &EmitOptions) -> String {
    let emitter = Emitter {
        options: *options,
        scope: Scope::new(tree),
    };
    let mut out = emitter.scope.header();
    for (key, value) in tree.iter() {
        emitter.statement(&mut out, &format!("cfg{}", path_segment(key)), value);
    }
    out
}

/// Render a single value on one line
#[must_use]
pub fn render_flat(value: &Value) -> String {
    build(value, &Scope::default()).flat()
}

/// Python spelling of a float; always reads back as a float
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "float(\"nan\")".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "float(\"inf\")".to_string()
        } else {
            "-float(\"inf\")".to_string()
        }
    } else {
        format!("{value:?}")
    }
}

/// Double-quoted string literal
#[must_use]
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !is_keyword(name)
}

fn path_segment(key: &str) -> String {
    if is_identifier(key) {
        format!(".{key}")
    } else {
        format!("[{}]", quote(key))
    }
}

/// Names the emitted source refers to, given the tree's top-level keys
///
/// Every `cfg.<key>` statement binds `<key>` in the reloading namespace, so a
/// key can shadow a call target root, the `LazyCall` helper or `float`.
#[derive(Debug, Clone)]
struct Scope {
    keys: HashSet<String>,
    lazy_call: String,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
            lazy_call: "LazyCall".to_string(),
        }
    }
}

impl Scope {
    fn new(tree: &ConfigTree) -> Self {
        let keys: HashSet<String> = tree.keys().map(str::to_string).collect();
        let lazy_call = ["LazyCall", "L"]
            .into_iter()
            .find(|name| !keys.contains(*name))
            .map_or_else(
                || {
                    let mut alias = "_lazy_call".to_string();
                    while keys.contains(&alias) {
                        alias.push('_');
                    }
                    alias
                },
                str::to_string,
            );
        Self { keys, lazy_call }
    }

    /// Import line needed before the statements, if any
    fn header(&self) -> String {
        if self.lazy_call.starts_with('_') {
            format!("from lazycfg import LazyCall as {}\n", self.lazy_call)
        } else {
            String::new()
        }
    }

    fn float(&self, value: f64) -> String {
        if value.is_finite() || !self.keys.contains("float") {
            return format_float(value);
        }
        // Overflowing literals read back as infinities without naming `float`
        if value.is_nan() {
            "(1e999 - 1e999)".to_string()
        } else if value > 0.0 {
            "1e999".to_string()
        } else {
            "-1e999".to_string()
        }
    }

    /// Opening of a call expression for `name`
    ///
    /// Dotted names whose root is free in a config file are written as plain
    /// calls; anything else goes through `LazyCall` so it reloads as a call
    /// node.
    fn call_open(&self, name: &str) -> String {
        let root = name.split('.').next().unwrap_or_default();
        let plain = name.contains('.')
            && name.split('.').all(is_identifier)
            && prelude(root).is_none()
            && !self.keys.contains(root);
        if plain {
            format!("{name}(")
        } else {
            format!("{}({})(", self.lazy_call, quote(name))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Call,
    Collection,
}

/// Layout document: a token or a bracketed, comma separated group
#[derive(Debug, Clone)]
enum Doc {
    Atom(String),
    Group {
        open: String,
        items: Vec<(String, Doc)>,
        close: &'static str,
        kind: GroupKind,
    },
}

fn width(text: &str) -> usize {
    text.chars().count()
}

fn build(value: &Value, scope: &Scope) -> Doc {
    match value {
        Value::Null => Doc::Atom("None".to_string()),
        Value::Bool(true) => Doc::Atom("True".to_string()),
        Value::Bool(false) => Doc::Atom("False".to_string()),
        Value::Int(i) => Doc::Atom(i.to_string()),
        Value::Float(f) => Doc::Atom(scope.float(*f)),
        Value::Str(s) => Doc::Atom(quote(s)),
        Value::List(items) => Doc::Group {
            open: "[".to_string(),
            items: items.iter().map(|item| (String::new(), build(item, scope))).collect(),
            close: "]",
            kind: GroupKind::Collection,
        },
        Value::Map(map) => Doc::Group {
            open: "{".to_string(),
            items: map
                .iter()
                .map(|(key, value)| (format!("{}: ", quote(key)), build(value, scope)))
                .collect(),
            close: "}",
            kind: GroupKind::Collection,
        },
        Value::Call(call) => build_call(call, scope),
        Value::Opaque(opaque) => {
            warn!(type_name = opaque.type_name(), "opaque value cannot be written as source; emitting None");
            Doc::Atom("None".to_string())
        }
    }
}

fn build_call(call: &CallNode, scope: &Scope) -> Doc {
    let items = call
        .args()
        .iter()
        .map(|(name, value)| {
            if is_identifier(name) {
                (format!("{name}="), build(value, scope))
            } else {
                let splat = Doc::Group {
                    open: "{".to_string(),
                    items: vec![(format!("{}: ", quote(name)), build(value, scope))],
                    close: "}",
                    kind: GroupKind::Collection,
                };
                ("**".to_string(), splat)
            }
        })
        .collect();
    Doc::Group {
        open: scope.call_open(call.target_name()),
        items,
        close: ")",
        kind: GroupKind::Call,
    }
}

impl Doc {
    fn flat(&self) -> String {
        match self {
            Self::Atom(text) => text.clone(),
            Self::Group {
                open, items, close, ..
            } => {
                let body = items
                    .iter()
                    .map(|(prefix, doc)| format!("{prefix}{}", doc.flat()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{open}{body}{close}")
            }
        }
    }
}

struct Emitter {
    options: EmitOptions,
    scope: Scope,
}

impl Emitter {
    fn statement(&self, out: &mut String, path: &str, value: &Value) {
        if let Value::Map(map) = value {
            if !map.is_empty() {
                for (key, child) in map {
                    self.statement(out, &format!("{path}{}", path_segment(key)), child);
                }
                return;
            }
        }
        let head = format!("{path} = ");
        let expr = self.layout(&build(value, &self.scope), 0, width(&head), 0);
        out.push_str(&head);
        out.push_str(&expr);
        out.push('\n');
    }

    /// Lay out `doc` starting at column `head`, followed by `tail` columns
    fn layout(&self, doc: &Doc, indent: usize, head: usize, tail: usize) -> String {
        let flat = doc.flat();
        let Doc::Group {
            open,
            items,
            close,
            kind,
        } = doc
        else {
            return flat;
        };
        if items.is_empty() || head + width(&flat) + tail <= self.options.line_width {
            return flat;
        }

        let inner = indent + self.options.indent;
        let pad = " ".repeat(inner);
        let pad_close = " ".repeat(indent);

        if *kind == GroupKind::Call || items.len() == 1 {
            let body = items
                .iter()
                .map(|(prefix, doc)| format!("{prefix}{}", doc.flat()))
                .collect::<Vec<_>>()
                .join(", ");
            if inner + width(&body) <= self.options.line_width {
                return format!("{open}\n{pad}{body}\n{pad_close}{close}");
            }
            if let [(prefix, only)] = items.as_slice() {
                let body = self.layout(only, inner, inner + width(prefix), 0);
                return format!("{open}\n{pad}{prefix}{body}\n{pad_close}{close}");
            }
        }

        let mut out = format!("{open}\n");
        for (prefix, item) in items {
            let body = self.layout(item, inner, inner + width(prefix), 1);
            let _ = writeln!(out, "{pad}{prefix}{body},");
        }
        out.push_str(&pad_close);
        out.push_str(close);
        out
    }
}
