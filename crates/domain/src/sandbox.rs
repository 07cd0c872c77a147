//! Script sandbox message types.
//!
//! A script invocation is one request message in and one result message
//! out. Both sides own their copies; nothing is shared with the caller.
//!
//! Scripts are either pm-style source text, parsed inside the sandbox, or
//! a declarative [`Instruction`] list interpreted directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::VariableSnapshot;

/// Error text reported when a script exceeds its wall-clock budget.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Deepest nesting of `test()` callbacks and `environment.get` calls a
/// script may use.
pub const MAX_NESTING: usize = 64;

/// A user script attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Script {
    /// Source text in the pm-style scripting language.
    Source(String),
    /// A pre-parsed instruction list.
    Instructions(Vec<Instruction>),
}

impl Script {
    /// Creates a script from source text.
    #[must_use]
    pub fn source(text: impl Into<String>) -> Self {
        Self::Source(text.into())
    }

    /// Returns true if running the script would do nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Source(text) => text.trim().is_empty(),
            Self::Instructions(list) => list.is_empty(),
        }
    }
}

/// Returns how deeply `test()` bodies and `environment.get` keys nest in
/// `instructions`. Walks with an explicit stack so any depth is safe to
/// measure.
#[must_use]
pub fn nesting_depth(instructions: &[Instruction]) -> usize {
    enum Node<'a> {
        Instruction(&'a Instruction),
        Expr(&'a Expr),
    }

    let mut stack: Vec<(Node<'_>, usize)> = instructions
        .iter()
        .map(|instruction| (Node::Instruction(instruction), 0))
        .collect();
    let mut deepest = 0;

    while let Some((node, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        match node {
            Node::Instruction(Instruction::SetEnvironment { key, value }) => {
                stack.push((Node::Expr(key), depth));
                stack.push((Node::Expr(value), depth));
            }
            Node::Instruction(Instruction::Log { args }) => {
                stack.extend(args.iter().map(|arg| (Node::Expr(arg), depth)));
            }
            Node::Instruction(Instruction::Test { body, .. }) => {
                deepest = deepest.max(depth + 1);
                stack.extend(
                    body.iter()
                        .map(|instruction| (Node::Instruction(instruction), depth + 1)),
                );
            }
            Node::Instruction(Instruction::Expect { actual, assertion }) => {
                stack.push((Node::Expr(actual), depth));
                if let Assertion::Be { expected } | Assertion::Equal { expected } = assertion {
                    stack.push((Node::Expr(expected), depth));
                }
            }
            Node::Instruction(Instruction::Throw { message }) => {
                stack.push((Node::Expr(message), depth));
            }
            Node::Expr(Expr::EnvGet { key }) => stack.push((Node::Expr(key), depth + 1)),
            Node::Instruction(_) | Node::Expr(_) => {}
        }
    }
    deepest
}

/// One step of a declarative script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    /// `environment.set(key, value)`
    SetEnvironment {
        /// Variable name
        key: Expr,
        /// Variable value, stringified before buffering
        value: Expr,
    },
    /// `console.log(...)`
    Log {
        /// Values joined by a space
        args: Vec<Expr>,
    },
    /// `test(name, callback)`
    Test {
        /// Test name
        name: String,
        /// Callback body
        body: Vec<Instruction>,
    },
    /// `expect(actual).to...`
    Expect {
        /// Value under test
        actual: Expr,
        /// Matcher applied to `actual`
        assertion: Assertion,
    },
    /// `throw message`
    Throw {
        /// Exception message
        message: Expr,
    },
    /// `sleep(ms)`
    Sleep {
        /// Milliseconds to wait
        ms: u64,
    },
    /// Test that the response has the expected status code.
    ResponseStatus {
        /// Test name
        name: String,
        /// Expected status code
        expected: u16,
    },
    /// Test that an environment value loosely equals `expected`.
    EnvEqual {
        /// Test name
        name: String,
        /// Variable name
        key: String,
        /// Expected value
        expected: Value,
    },
    /// Test that an environment value strictly equals `expected`.
    EnvBe {
        /// Test name
        name: String,
        /// Variable name
        key: String,
        /// Expected value
        expected: Value,
    },
}

/// Matchers available after `expect(actual).to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "matcher", rename_all = "camelCase")]
pub enum Assertion {
    /// `.to.be(x)`, strict equality
    Be {
        /// Expected value
        expected: Expr,
    },
    /// `.to.equal(x)`, loose equality
    Equal {
        /// Expected value
        expected: Expr,
    },
    /// `.to.have.status(code)`, checks the response snapshot
    HaveStatus {
        /// Expected status code
        code: u16,
    },
}

/// A value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    /// A JSON literal
    Literal {
        /// The literal value
        value: Value,
    },
    /// `undefined`
    Undefined,
    /// `environment.get(key)`
    EnvGet {
        /// Variable name expression
        key: Box<Expr>,
    },
    /// `response.code`
    ResponseCode,
    /// `response.status`, the status text
    ResponseStatus,
    /// `response.headers[name]`
    ResponseHeader {
        /// Header name, matched case-insensitively
        name: String,
    },
    /// `response.text()`
    ResponseText,
    /// `response.json()` followed by accessors
    ResponseJson {
        /// Accessors applied to the decoded document
        #[serde(default)]
        path: Vec<PathSegment>,
    },
}

impl Expr {
    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }
}

/// One accessor step into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index
    Index(usize),
    /// Object key
    Key(String),
}

/// Read-only view of a response given to test scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    /// Decoded body
    pub body: Value,
}

/// Everything a script may read. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SandboxContext {
    /// Flat environment snapshot
    pub environment: VariableSnapshot,
    /// Response view, present for test scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
}

impl SandboxContext {
    /// Creates a context with only an environment.
    #[must_use]
    pub const fn new(environment: VariableSnapshot) -> Self {
        Self {
            environment,
            response: None,
        }
    }

    /// Attaches a response view.
    #[must_use]
    pub fn with_response(mut self, response: ResponseSnapshot) -> Self {
        self.response = Some(response);
        self
    }
}

/// The inbound sandbox message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxRequest {
    /// Script to run
    pub script: Script,
    /// Data the script may read
    pub context: SandboxContext,
}

/// Outcome of one `test()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The callback completed
    Pass,
    /// The callback threw
    Fail,
}

/// One recorded test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Pass or fail
    pub status: TestStatus,
    /// Exception message for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    /// Records a passing test.
    #[must_use]
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pass,
            message: None,
        }
    }

    /// Records a failing test.
    #[must_use]
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Fail,
            message: Some(message.into()),
        }
    }

    /// Returns true if the test passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

/// The outbound sandbox message. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResult {
    /// Buffered `environment.set` calls
    pub environment_updates: VariableSnapshot,
    /// Tests in execution order
    pub test_results: Vec<TestResult>,
    /// Log lines in execution order
    pub logs: Vec<String>,
    /// Uncaught exception, parse failure or timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SandboxResult {
    /// The result of a script that ran out of time: nothing is kept.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::failed(TIMEOUT_ERROR)
    }

    /// An empty result carrying only an error.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Returns true if this is the timeout result.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }

    /// Returns true if every recorded test passed and nothing threw.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.error.is_none() && self.test_results.iter().all(TestResult::passed)
    }
}
