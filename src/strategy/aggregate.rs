//! Combining two backend results into one value.

use serde_json::{json, Value};

use crate::task::{AggregationStrategy, TaskResult};

/// Combine the settled results per `strategy`.
///
/// Depends only on the final state of both results, never on which finished first.
pub fn aggregate(
    strategy: AggregationStrategy,
    code: Option<&TaskResult>,
    analysis: Option<&TaskResult>,
) -> Value {
    if code.is_none() && analysis.is_none() {
        return json!({ "error": "No results from either agent" });
    }

    match strategy {
        AggregationStrategy::Merge => merge(code, analysis),
        AggregationStrategy::PrioritizeCode => prioritize(code, analysis),
        AggregationStrategy::PrioritizeAnalysis => prioritize(analysis, code),
        AggregationStrategy::Custom => json!({ "code": code, "analysis": analysis }),
    }
}

fn merge(code: Option<&TaskResult>, analysis: Option<&TaskResult>) -> Value {
    let code_ok = succeeded(code);
    let analysis_ok = succeeded(analysis);
    let status = match (code_ok, analysis_ok) {
        (true, true) => "both_successful",
        (false, false) => "both_failed",
        _ => "partial_success",
    };

    json!({
        "code": side(code),
        "analysis": side(analysis),
        "summary": {
            "status": status,
            "codeSuccess": code_ok,
            "analysisSuccess": analysis_ok,
        },
    })
}

/// Preferred data if it succeeded, otherwise the other side's data.
fn prioritize(preferred: Option<&TaskResult>, other: Option<&TaskResult>) -> Value {
    for result in [preferred, other].into_iter().flatten() {
        if result.success {
            return result.data.clone().unwrap_or(Value::Null);
        }
    }
    json!({
        "error": "Both agents failed",
        "codeError": error_of(preferred, other, crate::task::ResultSource::Code),
        "analysisError": error_of(preferred, other, crate::task::ResultSource::Analysis),
    })
}

fn error_of(
    a: Option<&TaskResult>,
    b: Option<&TaskResult>,
    source: crate::task::ResultSource,
) -> Value {
    [a, b]
        .into_iter()
        .flatten()
        .find(|r| r.source == source)
        .map(|r| Value::String(r.error_message().to_string()))
        .unwrap_or(Value::Null)
}

fn succeeded(result: Option<&TaskResult>) -> bool {
    result.map(|r| r.success).unwrap_or(false)
}

fn side(result: Option<&TaskResult>) -> Value {
    match result {
        Some(r) if r.success => r.data.clone().unwrap_or(Value::Null),
        Some(r) => json!({ "error": r.error_message() }),
        None => json!({ "error": "not requested" }),
    }
}
