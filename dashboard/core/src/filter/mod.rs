//! Exclusion and ordering of aggregated applications.

use crate::{
    app::App,
    expr::{CompileError, Env, EvalError, Expr, ExpressionEngine},
    workload::ResourceRef,
};
use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

/// Caller-supplied filter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppsOptions {
    /// Regular expressions matched against `{namespace}/{name}` of each application's owner.
    ///
    /// Deprecated in favor of `conditions`.
    pub exclude_patterns: Vec<String>,

    /// Expressions that must all evaluate to `true` for an application to be kept.
    pub conditions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid exclusion pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid condition {expression:?}: {source}")]
    Condition {
        expression: String,
        #[source]
        source: CompileError,
    },
}

/// A condition that could not be evaluated for an application, which was excluded as a result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub app: ResourceRef,
    pub expression: String,
    pub error: EvalError,
}

/// Compiled filters, ready to be applied to any number of application lists.
pub struct Filters<E: ExpressionEngine = Expr> {
    engine: E,
    patterns: Vec<Regex>,
    conditions: Vec<Condition<E::Program>>,
}

struct Condition<P> {
    source: String,
    program: P,
}

// === impl Filters ===

impl Filters {
    pub fn compile(options: &AppsOptions) -> Result<Self, FilterError> {
        Self::compile_with(Expr::default(), options)
    }
}

impl<E: ExpressionEngine> Filters<E> {
    pub fn compile_with(engine: E, options: &AppsOptions) -> Result<Self, FilterError> {
        let patterns = options
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| FilterError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let conditions = options
            .conditions
            .iter()
            .map(|expression| {
                let program =
                    engine
                        .compile(expression)
                        .map_err(|source| FilterError::Condition {
                            expression: expression.clone(),
                            source,
                        })?;
                Ok(Condition {
                    source: expression.clone(),
                    program,
                })
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        Ok(Self {
            engine,
            patterns,
            conditions,
        })
    }

    /// Drops excluded applications and sorts the remainder by display name.
    pub fn apply(&self, apps: Vec<App>) -> (Vec<App>, Vec<Diagnostic>) {
        if !self.patterns.is_empty() {
            warn!(
                patterns = self.patterns.len(),
                "Exclusion patterns are deprecated; use conditions instead"
            );
        }

        let mut diagnostics = Vec::new();
        let mut kept = apps
            .into_iter()
            .filter(|app| !self.is_excluded(app))
            .filter(|app| self.satisfies(app, &mut diagnostics))
            .collect::<Vec<_>>();

        // `sort_by_cached_key` is stable, so equal names keep their relative order.
        kept.sort_by_cached_key(|app| app.name().to_lowercase());
        (kept, diagnostics)
    }

    fn is_excluded(&self, app: &App) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let id = app.workload.reference().to_string();
        match self.patterns.iter().find(|re| re.is_match(&id)) {
            Some(re) => {
                debug!(app = %id, pattern = %re, "Excluded by pattern");
                true
            }
            None => false,
        }
    }

    fn satisfies(&self, app: &App, diagnostics: &mut Vec<Diagnostic>) -> bool {
        let env = Env {
            name: &app.workload.name,
            namespace: &app.workload.namespace,
            annotations: &app.annotations,
        };

        for Condition { source, program } in &self.conditions {
            match self.engine.evaluate(program, &env) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(app = %app.workload.reference(), condition = %source, "Excluded by condition");
                    return false;
                }
                Err(error) => {
                    warn!(app = %app.workload.reference(), condition = %source, %error, "Failed to evaluate condition");
                    diagnostics.push(Diagnostic {
                        app: app.workload.reference(),
                        expression: source.clone(),
                        error,
                    });
                    return false;
                }
            }
        }
        true
    }
}

impl<E: ExpressionEngine + fmt::Debug> fmt::Debug for Filters<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("engine", &self.engine)
            .field("patterns", &self.patterns)
            .field(
                "conditions",
                &self.conditions.iter().map(|c| &c.source).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// === impl Diagnostic ===

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: condition {:?} failed: {}",
            self.app, self.expression, self.error
        )
    }
}
