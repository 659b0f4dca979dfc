use serde_json::{Map, Value};
use tracing::debug;

/// Lazily yields every line of `raw` that parses as a JSON object.
///
/// Empty lines are dropped. Lines that are not JSON, or that hold an array or a
/// scalar, are logged and skipped; they never end the scan.
pub fn json_objects(raw: &str) -> impl Iterator<Item = Map<String, Value>> + '_ {
    raw.split('\n')
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(index, line)| parse_object_line(index, line))
}

fn parse_object_line(index: usize, line: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => Some(object),
        Ok(other) => {
            debug!("json line {index}: skipping non-object value ({})", kind(&other));
            None
        }
        Err(error) => {
            debug!("json line {index}: {error}");
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// String field of `object`, or `None` when absent or not a string.
pub fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

pub fn object_field<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Option<&'a Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::json_objects;

    #[test]
    fn bad_lines_do_not_stop_the_scan() {
        let raw = "not json\n[1,2]\n\"text\"\n{\"a\":1}\n\n{broken\n{\"b\":2}\n";
        let keys = json_objects(raw)
            .map(|object| object.keys().cloned().collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn trailing_carriage_return_is_tolerated() {
        let raw = "{\"a\":1}\r\n{\"b\":2}";
        assert_eq!(json_objects(raw).count(), 2);
    }

    #[test]
    fn scan_is_restartable() {
        let raw = "{\"a\":1}\n{\"b\":2}\n";
        assert_eq!(json_objects(raw).count(), json_objects(raw).count());
    }
}
