use serde_json::Value;

use super::scalar_text;

/// Print just the key answer value from the output.
///
/// Looks inside the envelope's `result` (and a search `outcome`) for
/// well-known fields in order of priority, then falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    let result_obj = result_obj
        .as_object()
        .and_then(|m| m.get("outcome").or_else(|| m.get("projection")))
        .unwrap_or(result_obj);

    let priority_keys = [
        "ppa_term",
        "irr_pct",
        "levered_irr_pct",
        "capex",
        "status",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        _ => scalar_text(value),
    }
}
