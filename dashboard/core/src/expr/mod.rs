//! Condition expressions evaluated against an application.
//!
//! The filter stage only depends on [`ExpressionEngine`]; [`Expr`] is the default engine. It
//! implements a small, statically typed language over the environment:
//!
//! | variable      | type                |
//! |---------------|---------------------|
//! | `name`        | `string`            |
//! | `namespace`   | `string`            |
//! | `annotations` | `map<string, string>` |
//!
//! ```text
//! namespace != "kube-system" && !("glance/hide" in annotations)
//! annotations["app.kubernetes.io/part-of"] == "monitoring"
//! name.startsWith("grafana") || name.matches("^prom(etheus)?-")
//! namespace in ["default", "apps"]
//! ```
//!
//! Indexing a map with a missing key fails evaluation; guard such lookups with `in`.

mod eval;
mod lexer;
mod parser;

use glance_k8s_api::Annotations;

pub use self::parser::Program;

/// Compiles and evaluates condition expressions.
pub trait ExpressionEngine: Send + Sync {
    type Program: Send + Sync;

    /// Compiles an expression, which must produce a boolean.
    fn compile(&self, source: &str) -> Result<Self::Program, CompileError>;

    fn evaluate(&self, program: &Self::Program, env: &Env<'_>) -> Result<bool, EvalError>;
}

/// The values an expression may refer to.
#[derive(Copy, Clone, Debug)]
pub struct Env<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub annotations: &'a Annotations,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct CompileError {
    pub offset: usize,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("no such key: {0:?}")]
    NoSuchKey(String),

    #[error("expected a {expected} value")]
    Mismatch { expected: &'static str },
}

/// The built-in expression engine.
#[derive(Copy, Clone, Debug, Default)]
pub struct Expr(());

// === impl Expr ===

impl ExpressionEngine for Expr {
    type Program = Program;

    fn compile(&self, source: &str) -> Result<Program, CompileError> {
        parser::compile(source)
    }

    fn evaluate(&self, program: &Program, env: &Env<'_>) -> Result<bool, EvalError> {
        eval::evaluate(program, env)
    }
}

// === impl CompileError ===

impl CompileError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
