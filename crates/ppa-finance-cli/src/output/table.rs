use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::scalar_text;

/// Format output as tables using the tabled crate. Nested objects are
/// flattened one level as `parent.child`; arrays of rows get their own table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_object(map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_object(res_map),
        Value::Array(arr) => print_array_table(arr),
        other => println!("{}", scalar_text(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut row_tables: Vec<(String, &Vec<Value>)> = Vec::new();

    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    if let Some(rows) = row_array(inner_val) {
                        row_tables.push((format!("{key}.{inner_key}"), rows));
                    } else {
                        builder.push_record([format!("{key}.{inner_key}"), format_value(inner_val)]);
                    }
                }
            }
            _ => {
                if let Some(rows) = row_array(val) {
                    row_tables.push((key.clone(), rows));
                } else {
                    builder.push_record([key.clone(), format_value(val)]);
                }
            }
        }
    }
    println!("{}", Table::from(builder));

    for (title, rows) in row_tables {
        println!("\n{title}:");
        print_array_table(rows);
    }
}

/// Arrays of objects, or a ledger-like `{ "rows": [...] }` wrapper.
fn row_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(arr) if arr.first().map_or(false, Value::is_object) => Some(arr),
        Value::Object(map) if map.len() == 1 => row_array(map.get("rows")?),
        _ => None,
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        _ => scalar_text(value),
    }
}
