//! Target-language expression tree.
//!
//! Resolvers build `Expr` values; codegen renders them to Python source and
//! asks them which imports they need. The tree is closed: every construct the
//! generator emits has a variant here, including the lazy thunk used for
//! forward and self references.

pub mod sdk;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::RenderOptions;
use crate::parse::Definition;

/// A symbol imported from a module: `from {module} import {name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Import {
    pub module: Vec<String>,
    pub name: String,
}

impl Import {
    /// `Import::new("workflows.references", "LazyReference")`
    pub fn new(module: &str, name: impl Into<String>) -> Self {
        Import {
            module: module.split('.').map(str::to_string).collect(),
            name: name.into(),
        }
    }

    pub fn module_path(&self) -> String {
        self.module.join(".")
    }
}

impl From<&Definition> for Import {
    fn from(def: &Definition) -> Self {
        Import {
            module: def.module.clone(),
            name: def.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `&`
    And,
    /// `|`
    Or,
    /// `>>`
    RShift,
}

impl BinOp {
    fn token(self) -> &'static str {
        match self {
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::RShift => ">>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Named(String, Expr),
}

impl Arg {
    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Arg::Named(name.into(), value)
    }

    fn value(&self) -> &Expr {
        match self {
            Arg::Positional(v) | Arg::Named(_, v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The absent-value sentinel.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// An imported class or symbol, rendered by name.
    Reference(Import),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
        /// One argument per line, each followed by a comma.
        trailing_comma: bool,
    },
    /// Explicit parentheses.
    Group(Box<Expr>),
    BinaryOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Deferred evaluation: `LazyReference(lambda: <expr>)`.
    Lazy(Box<Expr>),
}

impl Expr {
    pub fn str(s: impl Into<String>) -> Self {
        Expr::Str(s.into())
    }

    /// Integral finite values become `Int`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
            Expr::Int(n as i64)
        } else {
            Expr::Float(n)
        }
    }

    pub fn reference(def: &Definition) -> Self {
        Expr::Reference(Import::from(def))
    }

    pub fn attr(self, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn call(self, args: Vec<Arg>) -> Self {
        Expr::Call {
            func: Box::new(self),
            args,
            trailing_comma: false,
        }
    }

    pub fn method(self, name: &str, args: Vec<Expr>) -> Self {
        self.attr(name)
            .call(args.into_iter().map(Arg::Positional).collect())
    }

    /// Switch a call to one-argument-per-line layout. No-op for other variants.
    pub fn multiline(self) -> Self {
        match self {
            Expr::Call { func, args, .. } => Expr::Call {
                func,
                args,
                trailing_comma: true,
            },
            other => other,
        }
    }

    pub fn group(self) -> Self {
        Expr::Group(Box::new(self))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn lazy(self) -> Self {
        match self {
            already @ Expr::Lazy(_) => already,
            other => Expr::Lazy(Box::new(other)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Expr::None)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Expr::Lazy(_))
    }

    pub fn is_literal(&self) -> bool {
        match self {
            Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => true,
            Expr::List(items) => items.iter().all(Expr::is_literal),
            Expr::Dict(entries) => entries.iter().all(|(k, v)| k.is_literal() && v.is_literal()),
            _ => false,
        }
    }

    /// The thunk body, or the expression itself when it is not lazy.
    pub fn unwrap_lazy(&self) -> &Expr {
        match self {
            Expr::Lazy(inner) => inner,
            other => other,
        }
    }

    /// Literal JSON as an expression.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Expr::None,
            Value::Bool(b) => Expr::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Expr::Int(i),
                None => Expr::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Expr::Str(s.clone()),
            Value::Array(items) => Expr::List(items.iter().map(Expr::from_json).collect()),
            Value::Object(map) => Expr::Dict(
                map.iter()
                    .map(|(k, v)| (Expr::Str(k.clone()), Expr::from_json(v)))
                    .collect(),
            ),
        }
    }

    // =========================================================================
    // IMPORTS
    // =========================================================================

    /// Symbols needed when the expression is evaluated, which for generated
    /// class bodies means at module load. Names read only inside a thunk are
    /// left to `deferred_imports`.
    pub fn imports(&self) -> BTreeSet<Import> {
        let mut eager = BTreeSet::new();
        let mut deferred = BTreeSet::new();
        self.collect_imports(&mut eager, &mut deferred, false);
        eager
    }

    /// Symbols read only inside a `LazyReference` thunk. They must not be
    /// imported ahead of the module body, or a loop between two nodes
    /// becomes an import cycle.
    pub fn deferred_imports(&self) -> BTreeSet<Import> {
        let mut eager = BTreeSet::new();
        let mut deferred = BTreeSet::new();
        self.collect_imports(&mut eager, &mut deferred, false);
        deferred.retain(|import| !eager.contains(import));
        deferred
    }

    fn collect_imports(&self, eager: &mut BTreeSet<Import>, deferred: &mut BTreeSet<Import>, in_thunk: bool) {
        let mut walk = |e: &Expr| e.collect_imports(eager, deferred, in_thunk);
        match self {
            Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {}
            Expr::List(items) | Expr::Set(items) => items.iter().for_each(walk),
            Expr::Dict(entries) => {
                for (k, v) in entries {
                    walk(k);
                    walk(v);
                }
            }
            Expr::Reference(import) => {
                let target = if in_thunk { deferred } else { eager };
                target.insert(import.clone());
            }
            Expr::Attribute { value, .. } | Expr::Group(value) => walk(value),
            Expr::Call { func, args, .. } => {
                walk(func);
                args.iter().for_each(|a| walk(a.value()));
            }
            Expr::BinaryOp { lhs, rhs, .. } => {
                walk(lhs);
                walk(rhs);
            }
            Expr::Lazy(inner) => {
                eager.insert(sdk::lazy_reference());
                inner.collect_imports(eager, deferred, true);
            }
        }
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    pub fn render(&self) -> String {
        self.render_with(&RenderOptions::default())
    }

    /// Render to source text. Multi-line output is indented relative to
    /// column zero; callers add their own base indentation.
    pub fn render_with(&self, opts: &RenderOptions) -> String {
        let mut out = String::new();
        self.write(&mut out, 0, opts);
        out
    }

    fn write(&self, out: &mut String, depth: usize, opts: &RenderOptions) {
        match self {
            Expr::None => out.push_str("None"),
            Expr::Bool(true) => out.push_str("True"),
            Expr::Bool(false) => out.push_str("False"),
            Expr::Int(i) => out.push_str(&i.to_string()),
            Expr::Float(f) => out.push_str(&render_float(*f)),
            Expr::Str(s) => {
                out.push('"');
                out.push_str(&escape_string(s));
                out.push('"');
            }
            Expr::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write(out, depth, opts);
                }
                out.push(']');
            }
            Expr::Set(items) if items.is_empty() => out.push_str("set()"),
            Expr::Set(items) => {
                out.push('{');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write(out, depth, opts);
                }
                out.push('}');
            }
            Expr::Dict(entries) => {
                out.push('{');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write(out, depth, opts);
                    out.push_str(": ");
                    v.write(out, depth, opts);
                }
                out.push('}');
            }
            Expr::Reference(import) => out.push_str(&import.name),
            Expr::Attribute { value, attr } => {
                value.write_receiver(out, depth, opts);
                out.push('.');
                out.push_str(attr);
            }
            Expr::Call {
                func,
                args,
                trailing_comma,
            } => {
                func.write_receiver(out, depth, opts);
                let multiline = !args.is_empty()
                    && (*trailing_comma
                        || (opts.trailing_comma && args.iter().any(|a| matches!(a, Arg::Named(..)))));
                out.push('(');
                if multiline {
                    let pad = " ".repeat(opts.indent * (depth + 1));
                    for arg in args {
                        out.push('\n');
                        out.push_str(&pad);
                        arg.write(out, depth + 1, opts);
                        out.push(',');
                    }
                    out.push('\n');
                    out.push_str(&" ".repeat(opts.indent * depth));
                } else {
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        arg.write(out, depth, opts);
                    }
                }
                out.push(')');
            }
            Expr::Group(inner) => {
                out.push('(');
                inner.write(out, depth, opts);
                out.push(')');
            }
            Expr::BinaryOp { op, lhs, rhs } => {
                lhs.write(out, depth, opts);
                out.push(' ');
                out.push_str(op.token());
                out.push(' ');
                rhs.write(out, depth, opts);
            }
            Expr::Lazy(inner) => {
                out.push_str(&sdk::lazy_reference().name);
                out.push_str("(lambda: ");
                inner.write(out, depth, opts);
                out.push(')');
            }
        }
    }

    /// Receivers of `.attr` and `(...)` that would bind wrongly get parentheses.
    fn write_receiver(&self, out: &mut String, depth: usize, opts: &RenderOptions) {
        if matches!(self, Expr::BinaryOp { .. } | Expr::Int(_) | Expr::Float(_)) {
            out.push('(');
            self.write(out, depth, opts);
            out.push(')');
        } else {
            self.write(out, depth, opts);
        }
    }
}

impl Arg {
    fn write(&self, out: &mut String, depth: usize, opts: &RenderOptions) {
        match self {
            Arg::Positional(v) => v.write(out, depth, opts),
            Arg::Named(name, v) => {
                out.push_str(name);
                out.push('=');
                v.write(out, depth, opts);
            }
        }
    }
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        return "float(\"nan\")".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "float(\"inf\")".into() } else { "float(\"-inf\")".into() };
    }
    let s = format!("{}", f);
    if s.contains(['.', 'e', 'E']) { s } else { format!("{}.0", s) }
}

pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
