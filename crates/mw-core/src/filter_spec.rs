//! Persistable filter specifications
//!
//! Filters are stored and persisted as data, never as code: a tagged
//! variant per predicate kind. The view layer reconstructs the actual
//! predicate from the variant on every application, so a persisted
//! list can be replayed against a freshly parsed table after restart.

use serde::{Deserialize, Serialize};

/// Matching mode of a pattern filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    Start,
    End,
    Contains,
}

/// Comparison operator of a relation filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl RelationOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            RelationOp::Gt => ">",
            RelationOp::Lt => "<",
            RelationOp::Ge => ">=",
            RelationOp::Le => "<=",
            RelationOp::Eq => "==",
            RelationOp::Ne => "!=",
        }
    }

    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            RelationOp::Gt => left > right,
            RelationOp::Lt => left < right,
            RelationOp::Ge => left >= right,
            RelationOp::Le => left <= right,
            RelationOp::Eq => left == right,
            RelationOp::Ne => left != right,
        }
    }
}

/// One persisted filter. The wire shape is the settings-file schema:
/// `{"type": "value" | "pattern" | "relation", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterSpec {
    Value {
        column: String,
        values: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Pattern {
        column: String,
        mode: PatternMode,
        text: String,
        #[serde(default)]
        length: Option<usize>,
        #[serde(default)]
        exclude: bool,
    },
    Relation {
        left: String,
        op: RelationOp,
        right: String,
    },
}

impl FilterSpec {
    /// Human-readable summary shown in filter lists.
    pub fn description(&self) -> String {
        match self {
            FilterSpec::Value {
                column,
                values,
                exclude,
            } => {
                let verb = if *exclude { "not in" } else { "in" };
                format!("{column} {verb} [{}]", values.join(", "))
            }
            FilterSpec::Pattern {
                column,
                mode,
                text,
                length,
                exclude,
            } => {
                let verb = match (mode, exclude) {
                    (PatternMode::Start, false) => "starts with",
                    (PatternMode::Start, true) => "does not start with",
                    (PatternMode::End, false) => "ends with",
                    (PatternMode::End, true) => "does not end with",
                    (PatternMode::Contains, false) => "contains",
                    (PatternMode::Contains, true) => "does not contain",
                };
                match length {
                    Some(n) => format!("{column} {verb} '{text}' (length {n})"),
                    None => format!("{column} {verb} '{text}'"),
                }
            }
            FilterSpec::Relation { left, op, right } => {
                format!("{left} {} {right}", op.symbol())
            }
        }
    }
}
