use serde_json::Value;

use crate::jsonl::{json_objects, object_field, str_field};
use crate::model::FailureAdvice;

/// One record per event whose `data` object carries an `exitcode`.
///
/// Informational events (no `exitcode`) are skipped.
pub fn extract_failure_advice(raw: &str) -> Vec<FailureAdvice> {
    json_objects(raw)
        .filter_map(|object| {
            let data = object_field(&object, "data")?;
            let exit_code = data.get("exitcode")?;
            let text = |key: &str| str_field(data, key).unwrap_or_default().to_string();
            Some(FailureAdvice {
                exit_code: exit_code_value(exit_code),
                error_code: text("name"),
                advice: text("advice"),
                message: text("message"),
                docs_url: text("url"),
                issues_url: text("issues"),
            })
        })
        .collect()
}

// The tool has emitted the exit code both as a number and as a string.
fn exit_code_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::extract_failure_advice;
    use crate::model::FailureAdvice;

    #[test]
    fn only_lines_with_exit_code_produce_advice() {
        let raw = concat!(
            r#"{"data":{"exitcode":1,"advice":"install a hypervisor","message":"no driver","name":"E1","url":"https://x","issues":"https://y"}}"#,
            "\n",
            r#"{"data":{"other":true}}"#,
            "\n"
        );

        assert_eq!(
            extract_failure_advice(raw),
            vec![FailureAdvice {
                exit_code: Some(1),
                error_code: "E1".to_string(),
                advice: "install a hypervisor".to_string(),
                message: "no driver".to_string(),
                docs_url: "https://x".to_string(),
                issues_url: "https://y".to_string(),
            }]
        );
    }

    #[test]
    fn stream_without_errors_yields_nothing() {
        let raw = concat!(
            "{\"specversion\":\"1.0\",\"type\":\"io.k8s.sigs.minikube.step\",\"data\":{\"currentstep\":\"0\",\"message\":\"minikube v1.30\"}}\n",
            "{\"valid\":[]}\n",
            "garbage\n",
        );
        assert!(extract_failure_advice(raw).is_empty());
    }

    #[test]
    fn missing_fields_default_to_empty_and_order_is_kept() {
        let raw = concat!(
            "{\"data\":{\"exitcode\":\"80\",\"name\":\"GUEST_DRIVER\"}}\n",
            "[\"not\",\"an\",\"object\"]\n",
            "{\"data\":{\"exitcode\":14,\"message\":\"second\"}}\n",
        );
        let advice = extract_failure_advice(raw);

        assert_eq!(advice.len(), 2);
        assert_eq!(advice[0].exit_code, Some(80));
        assert_eq!(advice[0].error_code, "GUEST_DRIVER");
        assert_eq!(advice[0].advice, "");
        assert_eq!(advice[1].exit_code, Some(14));
        assert_eq!(advice[1].message, "second");
        assert_eq!(advice[1].docs_url, "");
    }

    #[test]
    fn exit_code_outside_data_is_ignored() {
        let raw = "{\"exitcode\":1,\"data\":\"flat\"}\n{\"data\":{\"exitcode\":null}}\n";
        let advice = extract_failure_advice(raw);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].exit_code, None);
    }
}
