use serde_json::Value;

use crate::competition::CompetitionType;
use crate::frame::Row;

/// Score a submitted row against the resolved answer row.
///
/// `targets` names the columns to compare; when empty every answer column
/// counts. The result is always finite and within [0, 1].
pub fn score(kind: CompetitionType, submitted: &Row, answer: &Row, targets: &[String]) -> f64 {
    let columns: Vec<&str> = if targets.is_empty() {
        answer.keys().map(String::as_str).collect()
    } else {
        targets.iter().map(String::as_str).collect()
    };

    match kind {
        CompetitionType::Classify => classify(submitted, answer, &columns),
        CompetitionType::Predict => predict(submitted, answer, &columns),
    }
}

/// Fraction of target columns answered with an exact match.
fn classify(submitted: &Row, answer: &Row, columns: &[&str]) -> f64 {
    let mut total = 0u32;
    let mut matched = 0u32;
    for col in columns {
        let Some(expected) = answer.get(*col) else {
            continue;
        };
        total += 1;
        if submitted.get(*col) == Some(expected) {
            matched += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    f64::from(matched) / f64::from(total)
}

/// `1 / (1 + mean absolute error)` over the target columns. Columns that are
/// not numeric on both sides contribute a unit error unless exactly equal.
fn predict(submitted: &Row, answer: &Row, columns: &[&str]) -> f64 {
    let mut errors = Vec::new();
    for col in columns {
        let Some(expected) = answer.get(*col) else {
            continue;
        };
        let got = submitted.get(*col);
        let err = match (got.and_then(as_f64), as_f64(expected)) {
            (Some(g), Some(e)) => (g - e).abs(),
            _ => {
                if got == Some(expected) {
                    0.0
                } else {
                    1.0
                }
            }
        };
        errors.push(err);
    }
    if errors.is_empty() {
        return 0.0;
    }
    let mae = errors.iter().sum::<f64>() / errors.len() as f64;
    1.0 / (1.0 + mae)
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|f| f.is_finite())
}
