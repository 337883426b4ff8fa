//! Filter pipeline
//!
//! An ordered, toggleable list of persisted filter specs. Applying the
//! pipeline walks the enabled entries in insertion order, intersecting
//! the surviving rows (logical AND), then renumbers ordinals 1..N.
//! Predicates are reconstructed from the spec on every application, so
//! a persisted list replays cleanly against a freshly parsed table.
//!
//! Evaluation is fail-closed: a row whose cells cannot be resolved for
//! a predicate is excluded by that predicate, and the rest of the
//! pipeline still runs.

use ahash::AHashSet;
use tracing::warn;

use mw_core::value::parse_decimal;
use mw_core::{normalize, FilterSpec, PatternMode, RelationOp, Table};

use crate::ViewError;

/// One pipeline entry: the persisted spec, its display description,
/// and whether it currently participates in `apply`.
#[derive(Debug, Clone)]
pub struct FilterEntry {
    pub spec: FilterSpec,
    pub description: String,
    pub enabled: bool,
}

/// Ordered, enable/disable-able sequence of filters.
#[derive(Debug, Default)]
pub struct FilterPipeline {
    entries: Vec<FilterEntry>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pipeline from persisted specs, e.g. at startup.
    /// Specs that no longer validate are dropped with a warning.
    pub fn from_specs(specs: impl IntoIterator<Item = FilterSpec>) -> Self {
        let mut pipeline = Self::new();
        for spec in specs {
            if let Err(e) = pipeline.add(spec.clone()) {
                warn!(filter = %spec.description(), error = %e, "dropping persisted filter");
            }
        }
        pipeline
    }

    /// Append a filter, enabled. Relation right-hand expressions are
    /// validated against the closed grammar here, at add time.
    pub fn add(&mut self, spec: FilterSpec) -> Result<(), ViewError> {
        if let FilterSpec::Relation { right, .. } = &spec {
            expr::parse(right)?;
        }
        let description = spec.description();
        self.entries.push(FilterEntry {
            spec,
            description,
            enabled: true,
        });
        Ok(())
    }

    pub fn toggle(&mut self, index: usize, enabled: bool) -> Result<(), ViewError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(ViewError::FilterIndex(index))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<FilterEntry, ViewError> {
        if index >= self.entries.len() {
            return Err(ViewError::FilterIndex(index));
        }
        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The persisted shape of the pipeline.
    pub fn specs(&self) -> Vec<FilterSpec> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    /// Produce the current view: base table reduced by every enabled
    /// entry in order, ordinals renumbered over the survivors.
    /// Reapplying an unchanged pipeline to an unchanged base yields an
    /// identical view.
    pub fn apply(&self, base: &Table) -> Table {
        let mut view = base.clone();
        view.renumber();
        for entry in &self.entries {
            if !entry.enabled {
                continue;
            }
            let keep = evaluate_mask(&entry.spec, &view);
            view = view.with_rows_where(&keep);
        }
        view
    }
}

/// Row mask for one spec over one table. Unresolvable predicates
/// (missing column, non-numeric operands) exclude the row.
fn evaluate_mask(spec: &FilterSpec, table: &Table) -> Vec<bool> {
    let rows = table.row_count();
    match compile(spec, table) {
        Some(predicate) => (0..rows)
            .map(|row| predicate.keep(table, row).unwrap_or(false))
            .collect(),
        None => {
            warn!(filter = %spec.description(), "filter references missing column, excluding all rows");
            vec![false; rows]
        }
    }
}

enum Predicate {
    Value {
        index: usize,
        accepted: AHashSet<String>,
        exclude: bool,
    },
    Pattern {
        index: usize,
        mode: PatternMode,
        text: String,
        length: Option<usize>,
        exclude: bool,
    },
    Relation {
        left: usize,
        op: RelationOp,
        right: expr::Expr,
    },
}

fn compile(spec: &FilterSpec, table: &Table) -> Option<Predicate> {
    match spec {
        FilterSpec::Value {
            column,
            values,
            exclude,
        } => Some(Predicate::Value {
            index: table.column_index(column)?,
            accepted: values.iter().map(|v| normalize(v)).collect(),
            exclude: *exclude,
        }),
        FilterSpec::Pattern {
            column,
            mode,
            text,
            length,
            exclude,
        } => Some(Predicate::Pattern {
            index: table.column_index(column)?,
            mode: *mode,
            text: normalize(text),
            length: *length,
            exclude: *exclude,
        }),
        FilterSpec::Relation { left, op, right } => Some(Predicate::Relation {
            left: table.column_index(left)?,
            op: *op,
            right: expr::parse(right).ok()?,
        }),
    }
}

impl Predicate {
    fn keep(&self, table: &Table, row: usize) -> Option<bool> {
        match self {
            Predicate::Value {
                index,
                accepted,
                exclude,
            } => {
                let cell = table.rows().get(row)?.get(*index)?.normalized();
                Some(accepted.contains(&cell) != *exclude)
            }
            Predicate::Pattern {
                index,
                mode,
                text,
                length,
                exclude,
            } => {
                let cell = table.rows().get(row)?.get(*index)?.normalized();
                let matched = match mode {
                    PatternMode::Contains => cell.contains(text.as_str()),
                    PatternMode::Start => {
                        let len = length.unwrap_or_else(|| text.chars().count());
                        cell.chars().take(len).collect::<String>() == *text
                    }
                    PatternMode::End => {
                        let len = length.unwrap_or_else(|| text.chars().count());
                        let chars: Vec<char> = cell.chars().collect();
                        let start = chars.len().saturating_sub(len);
                        chars[start..].iter().collect::<String>() == *text
                    }
                };
                Some(matched != *exclude)
            }
            Predicate::Relation { left, op, right } => {
                let lhs = table.rows().get(row)?.get(*left)?.as_number()?;
                let rhs = expr::eval(right, table, row)?;
                if !rhs.is_finite() {
                    return None;
                }
                Some(op.holds(lhs, rhs))
            }
        }
    }
}

/// Closed grammar for relation right-hand expressions:
/// number | column key | `+ - * /` | parentheses. Anything else is
/// rejected when the filter is added, never substituted into the row.
pub(crate) mod expr {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Expr {
        Number(f64),
        Column(String),
        Negate(Box<Expr>),
        Binary(BinOp, Box<Expr>, Box<Expr>),
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(crate) enum BinOp {
        Add,
        Sub,
        Mul,
        Div,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Tok {
        Num(f64),
        Word(String),
        Plus,
        Minus,
        Star,
        Slash,
        LParen,
        RParen,
    }

    fn lex(input: &str) -> Result<Vec<Tok>, ViewError> {
        let mut tokens = Vec::new();
        let mut word = String::new();
        let flush = |word: &mut String, tokens: &mut Vec<Tok>| {
            if word.is_empty() {
                return;
            }
            let token = match parse_decimal(&normalize(word)) {
                Some(n) => Tok::Num(n),
                None => Tok::Word(std::mem::take(word)),
            };
            word.clear();
            tokens.push(token);
        };
        for ch in input.chars() {
            match ch {
                '+' | '-' | '*' | '/' | '(' | ')' => {
                    flush(&mut word, &mut tokens);
                    tokens.push(match ch {
                        '+' => Tok::Plus,
                        '-' => Tok::Minus,
                        '*' => Tok::Star,
                        '/' => Tok::Slash,
                        '(' => Tok::LParen,
                        _ => Tok::RParen,
                    });
                }
                c if c.is_whitespace() => flush(&mut word, &mut tokens),
                c => word.push(c),
            }
        }
        flush(&mut word, &mut tokens);
        if tokens.is_empty() {
            return Err(ViewError::Expression("empty expression".to_string()));
        }
        Ok(tokens)
    }

    pub(crate) fn parse(input: &str) -> Result<Expr, ViewError> {
        let tokens = lex(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expression = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(ViewError::Expression(format!(
                "unexpected trailing input in '{input}'"
            )));
        }
        Ok(expression)
    }

    struct Parser {
        tokens: Vec<Tok>,
        pos: usize,
    }

    impl Parser {
        fn peek(&self) -> Option<&Tok> {
            self.tokens.get(self.pos)
        }

        fn next(&mut self) -> Option<Tok> {
            let token = self.tokens.get(self.pos).cloned();
            if token.is_some() {
                self.pos += 1;
            }
            token
        }

        fn expression(&mut self) -> Result<Expr, ViewError> {
            let mut left = self.term()?;
            while let Some(op) = match self.peek() {
                Some(Tok::Plus) => Some(BinOp::Add),
                Some(Tok::Minus) => Some(BinOp::Sub),
                _ => None,
            } {
                self.pos += 1;
                let right = self.term()?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        }

        fn term(&mut self) -> Result<Expr, ViewError> {
            let mut left = self.factor()?;
            while let Some(op) = match self.peek() {
                Some(Tok::Star) => Some(BinOp::Mul),
                Some(Tok::Slash) => Some(BinOp::Div),
                _ => None,
            } {
                self.pos += 1;
                let right = self.factor()?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        }

        fn factor(&mut self) -> Result<Expr, ViewError> {
            match self.next() {
                Some(Tok::Num(n)) => Ok(Expr::Number(n)),
                Some(Tok::Word(name)) => Ok(Expr::Column(name)),
                Some(Tok::Minus) => Ok(Expr::Negate(Box::new(self.factor()?))),
                Some(Tok::Plus) => self.factor(),
                Some(Tok::LParen) => {
                    let inner = self.expression()?;
                    match self.next() {
                        Some(Tok::RParen) => Ok(inner),
                        _ => Err(ViewError::Expression("missing closing paren".to_string())),
                    }
                }
                other => Err(ViewError::Expression(format!(
                    "expected number, column or '(', got {other:?}"
                ))),
            }
        }
    }

    /// Per-row evaluation; `None` when a referenced column is missing
    /// or non-numeric for this row.
    pub(crate) fn eval(expression: &Expr, table: &Table, row: usize) -> Option<f64> {
        match expression {
            Expr::Number(n) => Some(*n),
            Expr::Column(key) => table.value(row, key)?.as_number(),
            Expr::Negate(inner) => eval(inner, table, row).map(|v| -v),
            Expr::Binary(op, left, right) => {
                let l = eval(left, table, row)?;
                let r = eval(right, table, row)?;
                Some(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::{Column, Row, Value, SEQ_COLUMN};

    fn base_table() -> Table {
        let mut t = Table::new();
        for key in ["نماد", "کد_بازار", "قیمت_پایانی", "قیمت_دیروز"] {
            t.add_column(Column::base(key)).unwrap();
        }
        let rows: [(&str, &str, &str, &str); 10] = [
            ("alpha1", "300", "100", "90"),
            ("alpha2", "301", "200", "210"),
            ("beta1", "303", "300", "100"),
            ("beta2", "305", "400", "400"),
            ("gamma1", "300", "500", "200"),
            ("gamma2", "306", "600", "600"),
            ("delta1", "303", "700", "100"),
            ("delta2", "307", "800", "790"),
            ("epsilon", "308", "900", "900"),
            ("zeta", "309", "", "10"),
        ];
        for (a, b, c, d) in rows {
            t.push_row(Row::from_iter([a.into(), b.into(), c.into(), d.into()]))
                .unwrap();
        }
        t.renumber();
        t
    }

    fn value_filter(values: &[&str], exclude: bool) -> FilterSpec {
        FilterSpec::Value {
            column: "کد_بازار".to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
            exclude,
        }
    }

    #[test]
    fn value_filter_keeps_matching_rows_with_contiguous_ordinals() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300", "303"], false)).unwrap();
        let view = pipeline.apply(&base_table());
        assert_eq!(view.row_count(), 4);
        for (i, expected) in ["alpha1", "beta1", "gamma1", "delta1"].iter().enumerate() {
            assert_eq!(view.value(i, "نماد"), Some(&Value::from(*expected)));
            assert_eq!(
                view.value(i, SEQ_COLUMN),
                Some(&Value::Number((i + 1) as f64))
            );
        }
    }

    #[test]
    fn exclude_inverts_the_value_set() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300", "303"], true)).unwrap();
        let view = pipeline.apply(&base_table());
        assert_eq!(view.row_count(), 6);
    }

    #[test]
    fn filters_intersect_in_insertion_order() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300", "303"], false)).unwrap();
        pipeline
            .add(FilterSpec::Pattern {
                column: "نماد".to_string(),
                mode: PatternMode::Start,
                text: "beta".to_string(),
                length: None,
                exclude: false,
            })
            .unwrap();
        let view = pipeline.apply(&base_table());
        assert_eq!(view.row_count(), 1);
        assert_eq!(view.value(0, "نماد"), Some(&Value::from("beta1")));
    }

    #[test]
    fn disabled_entries_are_skipped() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300"], false)).unwrap();
        pipeline.toggle(0, false).unwrap();
        let view = pipeline.apply(&base_table());
        assert_eq!(view.row_count(), 10);
        pipeline.toggle(0, true).unwrap();
        assert_eq!(pipeline.apply(&base_table()).row_count(), 2);
    }

    #[test]
    fn pattern_end_with_length_truncates_before_comparing() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Pattern {
                column: "نماد".to_string(),
                mode: PatternMode::End,
                text: "1".to_string(),
                length: Some(1),
                exclude: false,
            })
            .unwrap();
        let view = pipeline.apply(&base_table());
        assert_eq!(view.row_count(), 4); // alpha1, beta1, gamma1, delta1
    }

    #[test]
    fn pattern_matching_normalizes_both_sides() {
        let mut t = Table::new();
        t.add_column(Column::base("نماد")).unwrap();
        t.push_row(Row::from_iter(["علي".into()])).unwrap();
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Pattern {
                column: "نماد".to_string(),
                mode: PatternMode::Contains,
                text: "علی".to_string(),
                length: None,
                exclude: false,
            })
            .unwrap();
        assert_eq!(pipeline.apply(&t).row_count(), 1);
    }

    #[test]
    fn relation_with_literal_right_hand_side() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Relation {
                left: "قیمت_پایانی".to_string(),
                op: RelationOp::Ge,
                right: "600".to_string(),
            })
            .unwrap();
        // The empty-price row fails coercion and is excluded.
        assert_eq!(pipeline.apply(&base_table()).row_count(), 4);
    }

    #[test]
    fn relation_with_column_expression() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Relation {
                left: "قیمت_پایانی".to_string(),
                op: RelationOp::Gt,
                right: "2 * قیمت_دیروز".to_string(),
            })
            .unwrap();
        let view = pipeline.apply(&base_table());
        // 300 > 200, 500 > 400, 700 > 200.
        assert_eq!(view.row_count(), 3);
        assert_eq!(view.value(0, "نماد"), Some(&Value::from("beta1")));
    }

    #[test]
    fn relation_grammar_rejected_at_add_time() {
        let mut pipeline = FilterPipeline::new();
        let bad = FilterSpec::Relation {
            left: "قیمت_پایانی".to_string(),
            op: RelationOp::Gt,
            right: "df['x'] ** 2".to_string(),
        };
        assert!(matches!(pipeline.add(bad), Err(ViewError::Expression(_))));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn relation_parses_parens_and_unary_minus() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Relation {
                left: "قیمت_پایانی".to_string(),
                op: RelationOp::Lt,
                right: "-(قیمت_دیروز - 1000)".to_string(),
            })
            .unwrap();
        // -(90-1000)=910 etc.; rows with closing price below that pass.
        let view = pipeline.apply(&base_table());
        assert!(view.row_count() > 0);
    }

    #[test]
    fn missing_column_fails_closed() {
        let mut pipeline = FilterPipeline::new();
        pipeline
            .add(FilterSpec::Value {
                column: "ناموجود".to_string(),
                values: vec!["x".to_string()],
                exclude: true,
            })
            .unwrap();
        assert_eq!(pipeline.apply(&base_table()).row_count(), 0);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300", "303"], false)).unwrap();
        let base = base_table();
        let first = pipeline.apply(&base);
        let second = pipeline.apply(&base);
        assert_eq!(first.row_count(), second.row_count());
        for row in 0..first.row_count() {
            for col in first.columns() {
                assert_eq!(first.value(row, &col.key), second.value(row, &col.key));
            }
        }
    }

    #[test]
    fn replay_from_specs_reproduces_the_view() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300", "303"], false)).unwrap();
        pipeline
            .add(FilterSpec::Relation {
                left: "قیمت_پایانی".to_string(),
                op: RelationOp::Gt,
                right: "100".to_string(),
            })
            .unwrap();
        let base = base_table();
        let before = pipeline.apply(&base);

        let replayed = FilterPipeline::from_specs(pipeline.specs());
        let after = replayed.apply(&base);
        assert_eq!(before.row_count(), after.row_count());
        for row in 0..before.row_count() {
            assert_eq!(before.value(row, "نماد"), after.value(row, "نماد"));
        }
    }

    #[test]
    fn remove_and_clear() {
        let mut pipeline = FilterPipeline::new();
        pipeline.add(value_filter(&["300"], false)).unwrap();
        pipeline.add(value_filter(&["303"], false)).unwrap();
        assert!(pipeline.remove(5).is_err());
        let removed = pipeline.remove(0).unwrap();
        assert!(matches!(removed.spec, FilterSpec::Value { .. }));
        assert_eq!(pipeline.entries().len(), 1);
        pipeline.clear();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.apply(&base_table()).row_count(), 10);
    }
}
