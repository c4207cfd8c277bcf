//! Condition evaluation against a snapshot.
//!
//! # Evaluation Semantics
//!
//! - Both sides resolve through [`Snapshot::value`]; an undefined side never matches
//! - `eq`: |actual - compare| < 0.1
//! - `between`: inclusive on both bounds
//! - `crosses_above`/`crosses_below`: a snapshot holds one bar of history per
//!   indicator, so these compare the current bar only (strict `>` / `<`)

use crate::domain::condition::{Condition, Operand, Operator};
use crate::domain::snapshot::Snapshot;

pub const EQ_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOutcome {
    pub matches: bool,
    pub description: String,
    /// Resolved left-hand value, used by weighted scoring.
    pub actual: Option<f64>,
}

fn resolve_operand(operand: &Operand, snapshot: &Snapshot) -> Option<f64> {
    match operand {
        Operand::Indicator(ind) => snapshot.value(*ind),
        Operand::Literal(v) => Some(*v),
    }
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Cheap boolean check, no description.
pub fn matches(snapshot: &Snapshot, condition: &Condition) -> bool {
    let actual = snapshot.value(condition.indicator);
    let compare = resolve_operand(&condition.value, snapshot);
    compare_values(condition, actual, compare)
}

fn compare_values(condition: &Condition, actual: Option<f64>, compare: Option<f64>) -> bool {
    let (Some(a), Some(c)) = (actual, compare) else {
        return false;
    };
    match condition.operator {
        Operator::Gt | Operator::CrossesAbove => a > c,
        Operator::Gte => a >= c,
        Operator::Lt | Operator::CrossesBelow => a < c,
        Operator::Lte => a <= c,
        Operator::Eq => (a - c).abs() < EQ_TOLERANCE,
        Operator::Between => condition.value2.is_some_and(|hi| a >= c && a <= hi),
    }
}

pub fn evaluate(snapshot: &Snapshot, condition: &Condition) -> ConditionOutcome {
    let actual = snapshot.value(condition.indicator);
    let compare = resolve_operand(&condition.value, snapshot);
    let matches = compare_values(condition, actual, compare);

    let label = condition.indicator.name().to_uppercase();
    let description = match condition.operator {
        Operator::Gt => format!("{label} > {}", fmt_value(compare)),
        Operator::Gte => format!("{label} >= {}", fmt_value(compare)),
        Operator::Lt => format!("{label} < {}", fmt_value(compare)),
        Operator::Lte => format!("{label} <= {}", fmt_value(compare)),
        Operator::Eq => format!("{label} = {}", fmt_value(compare)),
        Operator::Between => format!(
            "{label} {}-{}",
            fmt_value(compare),
            fmt_value(condition.value2)
        ),
        Operator::CrossesAbove => format!("{label} > {}", condition.value),
        Operator::CrossesBelow => format!("{label} < {}", condition.value),
    };

    ConditionOutcome {
        matches,
        description,
        actual,
    }
}
