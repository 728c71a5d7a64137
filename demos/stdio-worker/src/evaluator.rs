//! Line-command evaluator for the demo worker.
//!
//! A deliberately small language, enough to exercise the protocol:
//! - `let NAME = VALUE` binds `NAME` to a JSON value in the namespace
//! - `print NAME` writes the bound value and a newline to stdout
//! - `echo TEXT` writes `TEXT` and a newline to stdout
//! - `fail MESSAGE` fails the segment

use exec_worker_core::{EvalError, Evaluator, Namespace, OutputSinks};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct LineEvaluator;

impl LineEvaluator {
    fn eval_line(
        line: &str,
        namespace: &mut Namespace,
        sinks: &OutputSinks,
    ) -> Result<(), EvalError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("let ") {
            let (name, literal) = rest.split_once('=').ok_or_else(|| {
                EvalError::new("SyntaxError", format!("`let` without `=`: `{line}`"))
            })?;
            let value: Value = serde_json::from_str(literal.trim()).map_err(|e| {
                EvalError::new("ValueError", format!("bad literal in `{line}`: {e}"))
            })?;
            namespace.insert(name.trim().to_string(), value);
            Ok(())
        } else if let Some(name) = line.strip_prefix("print ") {
            let name = name.trim();
            let value = namespace.get(name).ok_or_else(|| {
                EvalError::new("NameError", format!("name `{name}` is not defined"))
            })?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            write(sinks, &text)?;
            write(sinks, "\n")
        } else if let Some(text) = line.strip_prefix("echo ") {
            write(sinks, text)?;
            write(sinks, "\n")
        } else if let Some(message) = line.strip_prefix("fail ") {
            Err(EvalError::new("RuntimeError", message.trim())
                .with_trace(format!("  while evaluating `{line}`")))
        } else {
            Err(EvalError::new(
                "SyntaxError",
                format!("unrecognized statement: `{line}`"),
            ))
        }
    }
}

fn write(sinks: &OutputSinks, data: &str) -> Result<(), EvalError> {
    sinks
        .stdout
        .write(data)
        .map_err(|e| EvalError::new("IOError", e.to_string()))
}

impl Evaluator for LineEvaluator {
    fn eval(
        &mut self,
        code: &str,
        namespace: &mut Namespace,
        sinks: &OutputSinks,
    ) -> Result<(), EvalError> {
        for line in code.lines() {
            Self::eval_line(line, namespace, sinks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use exec_worker_core::OutboundSender;

    use super::*;

    fn eval(codes: &[&str]) -> (Result<(), EvalError>, Vec<String>) {
        let (outbound, mut rx) = OutboundSender::channel();
        let parents = OutputSinks::null();
        let sinks = OutputSinks::captured("demo", 0, &parents, &outbound);
        let mut namespace = Namespace::new();
        let mut evaluator = LineEvaluator;

        let mut result = Ok(());
        for code in codes {
            result = evaluator.eval(code, &mut namespace, &sinks);
            if result.is_err() {
                break;
            }
        }
        let mut writes = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let Some(data) = envelope.value.get("data").and_then(Value::as_str) {
                writes.push(data.to_string());
            }
        }
        (result, writes)
    }

    #[test]
    fn let_then_print_reads_the_binding() {
        let (result, writes) = eval(&["let x = 1", "print x"]);
        assert!(result.is_ok());
        assert_eq!(writes, vec!["1".to_string(), "\n".to_string()]);
    }

    #[test]
    fn print_of_unknown_name_fails() {
        let (result, writes) = eval(&["print y"]);
        let error = result.unwrap_err();
        assert_eq!(error.kind, "NameError");
        assert!(writes.is_empty());
    }

    #[test]
    fn fail_carries_the_message() {
        let (result, _) = eval(&["fail division by zero"]);
        assert_eq!(result.unwrap_err().to_string(), "division by zero");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let (result, writes) = eval(&["# intro\n\necho hi"]);
        assert!(result.is_ok());
        assert_eq!(writes, vec!["hi".to_string(), "\n".to_string()]);
    }
}
