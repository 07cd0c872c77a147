//! Evaluator for declarative script instructions.
//!
//! Values follow JavaScript rules closely enough for the assertions the
//! scripting surface offers: `undefined` is modelled as `None`, everything
//! else is a JSON value.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use courier_domain::{
    Assertion, Expr, Instruction, PathSegment, ResponseSnapshot, SandboxContext, SandboxResult,
    TestResult, VariableSnapshot,
};
use serde_json::Value;
use tracing::warn;

/// Keys `environment.set` refuses to write.
pub const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A script value. `None` is `undefined`.
type ScriptValue = Option<Value>;

/// An uncaught exception. Carries the message only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown(pub String);

/// Runs instructions against one context and buffers their effects.
#[derive(Debug)]
pub struct Interpreter {
    context: SandboxContext,
    updates: VariableSnapshot,
    test_results: Vec<TestResult>,
    logs: Vec<String>,
}

impl Interpreter {
    /// Creates an interpreter with empty buffers.
    #[must_use]
    pub fn new(context: SandboxContext) -> Self {
        Self {
            context,
            updates: VariableSnapshot::new(),
            test_results: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Runs the whole script. An uncaught exception stops execution but
    /// keeps everything buffered before it.
    pub async fn run(mut self, instructions: &[Instruction]) -> SandboxResult {
        let error = self.block(instructions).await.err().map(|thrown| thrown.0);
        SandboxResult {
            environment_updates: self.updates,
            test_results: self.test_results,
            logs: self.logs,
            error,
        }
    }

    fn block<'a>(&'a mut self, instructions: &'a [Instruction]) -> BoxFuture<'a, Result<(), Thrown>> {
        Box::pin(async move {
            for instruction in instructions {
                self.step(instruction).await?;
            }
            Ok(())
        })
    }

    async fn step(&mut self, instruction: &Instruction) -> Result<(), Thrown> {
        match instruction {
            Instruction::SetEnvironment { key, value } => {
                let key = display(&self.eval(key)?);
                let value = display(&self.eval(value)?);
                self.set_environment(key, value);
            }
            Instruction::Log { args } => {
                let line = args
                    .iter()
                    .map(|arg| self.eval(arg).map(|value| display(&value)))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(" ");
                self.logs.push(line);
            }
            Instruction::Test { name, body } => {
                let result = match self.block(body).await {
                    Ok(()) => TestResult::pass(name),
                    Err(Thrown(message)) => TestResult::fail(name, message),
                };
                self.test_results.push(result);
            }
            Instruction::Expect { actual, assertion } => {
                let actual = self.eval(actual)?;
                self.check(&actual, assertion)?;
            }
            Instruction::Throw { message } => {
                return Err(Thrown(display(&self.eval(message)?)));
            }
            Instruction::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            Instruction::ResponseStatus { name, expected } => {
                let outcome = self.response().map(|response| response.status).and_then(|status| {
                    if status == *expected {
                        Ok(())
                    } else {
                        Err(Thrown(format!(
                            "expected response to have status code {expected} but got {status}"
                        )))
                    }
                });
                self.record(name, outcome);
            }
            Instruction::EnvEqual {
                name,
                key,
                expected,
            } => {
                let actual = self.environment_get(key);
                let expected = Some(expected.clone());
                let outcome = if loose_equals(&actual, &expected) {
                    Ok(())
                } else {
                    Err(mismatch(&actual, "equal", &expected))
                };
                self.record(name, outcome);
            }
            Instruction::EnvBe {
                name,
                key,
                expected,
            } => {
                let actual = self.environment_get(key);
                let expected = Some(expected.clone());
                let outcome = if strict_equals(&actual, &expected) {
                    Ok(())
                } else {
                    Err(mismatch(&actual, "be", &expected))
                };
                self.record(name, outcome);
            }
        }
        Ok(())
    }

    fn record(&mut self, name: &str, outcome: Result<(), Thrown>) {
        self.test_results.push(match outcome {
            Ok(()) => TestResult::pass(name),
            Err(Thrown(message)) => TestResult::fail(name, message),
        });
    }

    fn set_environment(&mut self, key: String, value: String) {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "script tried to set a reserved key");
            self.logs
                .push(format!("warning: refused to set reserved key '{key}'"));
            return;
        }
        self.updates.insert(key, value);
    }

    fn environment_get(&self, key: &str) -> ScriptValue {
        self.updates
            .get(key)
            .or_else(|| self.context.environment.get(key))
            .map(|value| Value::String(value.clone()))
    }

    fn response(&self) -> Result<&ResponseSnapshot, Thrown> {
        self.context
            .response
            .as_ref()
            .ok_or_else(|| Thrown("response is not available in pre-request scripts".to_string()))
    }

    fn check(&self, actual: &ScriptValue, assertion: &Assertion) -> Result<(), Thrown> {
        match assertion {
            Assertion::Be { expected } => {
                let expected = self.eval(expected)?;
                if strict_equals(actual, &expected) {
                    Ok(())
                } else {
                    Err(mismatch(actual, "be", &expected))
                }
            }
            Assertion::Equal { expected } => {
                let expected = self.eval(expected)?;
                if loose_equals(actual, &expected) {
                    Ok(())
                } else {
                    Err(mismatch(actual, "equal", &expected))
                }
            }
            Assertion::HaveStatus { code } => {
                let status = self.response()?.status;
                if status == *code {
                    Ok(())
                } else {
                    Err(Thrown(format!(
                        "expected response to have status code {code} but got {status}"
                    )))
                }
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Result<ScriptValue, Thrown> {
        match expr {
            Expr::Literal { value } => Ok(Some(value.clone())),
            Expr::Undefined => Ok(None),
            Expr::EnvGet { key } => {
                let key = display(&self.eval(key)?);
                Ok(self.environment_get(&key))
            }
            Expr::ResponseCode => Ok(Some(Value::from(self.response()?.status))),
            Expr::ResponseStatus => Ok(Some(Value::String(self.response()?.status_text.clone()))),
            Expr::ResponseHeader { name } => Ok(self
                .response()?
                .headers
                .iter()
                .find(|(header, _)| header.eq_ignore_ascii_case(name))
                .map(|(_, value)| Value::String(value.clone()))),
            Expr::ResponseText => Ok(Some(Value::String(match &self.response()?.body {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            }))),
            Expr::ResponseJson { path } => {
                let document = match &self.response()?.body {
                    Value::String(text) => serde_json::from_str(text).map_err(|err| {
                        Thrown(format!("SyntaxError: response body is not valid JSON ({err})"))
                    })?,
                    other => other.clone(),
                };
                walk(Some(document), path)
            }
        }
    }
}

fn walk(mut value: ScriptValue, path: &[PathSegment]) -> Result<ScriptValue, Thrown> {
    for segment in path {
        let Some(current) = value else {
            return Err(Thrown(format!(
                "TypeError: Cannot read properties of undefined (reading '{}')",
                segment_name(segment)
            )));
        };
        value = match (current, segment) {
            (Value::Null, segment) => {
                return Err(Thrown(format!(
                    "TypeError: Cannot read properties of null (reading '{}')",
                    segment_name(segment)
                )));
            }
            (Value::Array(items), PathSegment::Key(key)) if key == "length" => {
                Some(Value::from(items.len()))
            }
            (Value::String(text), PathSegment::Key(key)) if key == "length" => {
                Some(Value::from(text.encode_utf16().count()))
            }
            (Value::Array(mut items), PathSegment::Index(index)) => {
                (*index < items.len()).then(|| items.swap_remove(*index))
            }
            (Value::Array(mut items), PathSegment::Key(key)) => key
                .parse::<usize>()
                .ok()
                .filter(|index| *index < items.len())
                .map(|index| items.swap_remove(index)),
            (Value::Object(mut map), PathSegment::Key(key)) => map.remove(key),
            (Value::Object(mut map), PathSegment::Index(index)) => map.remove(&index.to_string()),
            _ => None,
        };
    }
    Ok(value)
}

fn segment_name(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Index(index) => index.to_string(),
        PathSegment::Key(key) => key.clone(),
    }
}

fn mismatch(actual: &ScriptValue, verb: &str, expected: &ScriptValue) -> Thrown {
    Thrown(format!(
        "expected {} to {verb} {}",
        inspect(actual),
        inspect(expected)
    ))
}

/// String conversion used by `console.log`, `environment.set` and `throw`.
fn display(value: &ScriptValue) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(n)) => format_number(n),
        Some(other) => other.to_string(),
    }
}

/// Quoted form used in assertion messages.
fn inspect(value: &ScriptValue) -> String {
    match value {
        Some(Value::String(text)) => format!("'{text}'"),
        other => display(other),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

/// `===`. Objects and arrays compare structurally since scripts never
/// hold references.
#[allow(clippy::float_cmp)]
fn strict_equals(a: &ScriptValue, b: &ScriptValue) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// `==`.
#[allow(clippy::float_cmp)]
fn loose_equals(a: &ScriptValue, b: &ScriptValue) -> bool {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (None | Some(Value::Null), _) | (_, None | Some(Value::Null)) => false,
        (Some(x), Some(y)) => match (x, y) {
            (Value::String(s), Value::String(t)) => s == t,
            (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => x == y,
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            _ => match (as_number(x), as_number(y)) {
                (Some(m), Some(n)) => m == n,
                _ => false,
            },
        },
    }
}
