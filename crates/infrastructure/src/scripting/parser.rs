//! Script parser for the pm-style scripting language.
//!
//! Source text is parsed into the declarative [`Instruction`] list that the
//! interpreter runs. The language supports:
//! - `environment.set(key, value)` and `environment.get(key)`
//! - `console.log(...)`
//! - `test("name", function () { ... })` and `test("name", () => { ... })`
//! - `expect(actual).to.be(x)`, `.to.equal(x)`, `.to.have.status(code)`
//! - `response.code`, `response.status`, `response.headers[...]`,
//!   `response.text()`, `response.json()` with `.key` / `[key]` / `[i]`
//! - `throw "message"`, `throw new Error("message")`, `sleep(ms)`
//!
//! Every API name may carry a `pm.` prefix. Statements may end in `;`.
//! `test()` callbacks and `environment.get` calls nest at most
//! [`MAX_NESTING`] levels deep.

use courier_domain::{Assertion, Expr, Instruction, MAX_NESTING, PathSegment};
use serde_json::Value;
use thiserror::Error;

/// Error type for script parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("Unexpected character '{found}' at line {line}")]
    UnexpectedChar {
        /// The line number where the error occurred.
        line: usize,
        /// The offending character.
        found: char,
    },
    /// A string literal without its closing quote.
    #[error("Unterminated string at line {line}")]
    UnterminatedString {
        /// The line number where the string starts.
        line: usize,
    },
    /// Invalid syntax.
    #[error("Invalid syntax at line {line}: expected {expected}, found {found}")]
    InvalidSyntax {
        /// The line number where the error occurred.
        line: usize,
        /// What the parser was looking for.
        expected: String,
        /// What it found instead.
        found: String,
    },
    /// A call to something outside the scripting surface.
    #[error("Unknown function '{name}' at line {line}")]
    UnknownFunction {
        /// The line number where the error occurred.
        line: usize,
        /// The dotted name that was called.
        name: String,
    },
    /// Callbacks or `environment.get` calls nested past the limit.
    #[error("Script nests deeper than {limit} levels at line {line}")]
    TooDeep {
        /// The line where the limit was crossed.
        line: usize,
        /// The nesting limit.
        limit: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Punct(char),
    Arrow,
    End,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::Str(text) => write!(f, "string \"{text}\""),
            Self::Num(n) => write!(f, "number {n}"),
            Self::Punct(c) => write!(f, "'{c}'"),
            Self::Arrow => f.write_str("'=>'"),
            Self::End => f.write_str("end of script"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                match chars.peek() {
                    Some('/') => {
                        while chars.peek().is_some_and(|c| *c != '\n') {
                            chars.next();
                        }
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = '\0';
                        for c in chars.by_ref() {
                            if c == '\n' {
                                line += 1;
                            }
                            if prev == '*' && c == '/' {
                                break;
                            }
                            prev = c;
                        }
                    }
                    _ => return Err(ParseError::UnexpectedChar { line, found: '/' }),
                }
            }
            '"' | '\'' | '`' => {
                let start_line = line;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some(other) => text.push(other),
                            None => break,
                        },
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        '\n' => {
                            line += 1;
                            text.push('\n');
                        }
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedString { line: start_line });
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line: start_line,
                });
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' || c == '_' {
                        if c != '_' {
                            digits.push(c);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidSyntax {
                        line,
                        expected: "a number".to_string(),
                        found: digits.clone(),
                    })?;
                tokens.push(Spanned {
                    token: Token::Num(value),
                    line,
                });
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Ident(name),
                    line,
                });
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'>').is_some() {
                    tokens.push(Spanned {
                        token: Token::Arrow,
                        line,
                    });
                } else {
                    return Err(ParseError::UnexpectedChar { line, found: '=' });
                }
            }
            '(' | ')' | '{' | '}' | '[' | ']' | '.' | ',' | ';' | '-' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Punct(ch),
                    line,
                });
            }
            other => return Err(ParseError::UnexpectedChar { line, found: other }),
        }
    }

    tokens.push(Spanned {
        token: Token::End,
        line,
    });
    Ok(tokens)
}

/// Parse a script into a list of instructions.
///
/// # Errors
///
/// Returns an error if the script contains invalid syntax or calls
/// anything outside the scripting surface.
pub fn parse_script(source: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
    };
    let instructions = parser.statements()?;
    parser.consume(&Token::End, "end of script")?;
    Ok(instructions)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::End, |spanned| &spanned.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.line)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Token::Ident(ident) if ident == name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError::InvalidSyntax {
            line: self.line(),
            expected: expected.to_string(),
            found: self.peek().to_string(),
        }
    }

    fn consume(&mut self, token: &Token, expected: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                line: self.line(),
                limit: MAX_NESTING,
            });
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        self.consume(&Token::Punct(c), &format!("'{c}'"))
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("a name")),
        }
    }

    /// Reads `a.b.c`, dropping a leading `pm`.
    fn dotted_path(&mut self) -> Result<Vec<String>, ParseError> {
        let mut path = vec![self.ident()?];
        while self.peek() == &Token::Punct('.')
            && matches!(self.tokens.get(self.pos + 1).map(|s| &s.token), Some(Token::Ident(_)))
        {
            self.advance();
            path.push(self.ident()?);
        }
        if path.len() > 1 && path[0] == "pm" {
            path.remove(0);
        }
        Ok(path)
    }

    fn statements(&mut self) -> Result<Vec<Instruction>, ParseError> {
        let mut instructions = Vec::new();
        loop {
            while self.eat(&Token::Punct(';')) {}
            if matches!(self.peek(), Token::End | Token::Punct('}')) {
                return Ok(instructions);
            }
            instructions.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> Result<Instruction, ParseError> {
        let instruction = if self.eat_ident("throw") {
            self.throw()?
        } else {
            self.call_statement()?
        };
        self.eat(&Token::Punct(';'));
        Ok(instruction)
    }

    fn throw(&mut self) -> Result<Instruction, ParseError> {
        if self.eat_ident("new") {
            self.ident()?;
            self.expect_punct('(')?;
            let message = if self.peek() == &Token::Punct(')') {
                Expr::literal("")
            } else {
                self.expr()?
            };
            self.expect_punct(')')?;
            return Ok(Instruction::Throw { message });
        }
        Ok(Instruction::Throw {
            message: self.expr()?,
        })
    }

    fn call_statement(&mut self) -> Result<Instruction, ParseError> {
        let line = self.line();
        let path = self.dotted_path()?;
        let names: Vec<&str> = path.iter().map(String::as_str).collect();

        match names.as_slice() {
            ["environment", "set"] => {
                self.expect_punct('(')?;
                let key = self.expr()?;
                self.expect_punct(',')?;
                let value = self.expr()?;
                self.expect_punct(')')?;
                Ok(Instruction::SetEnvironment { key, value })
            }
            ["console", "log" | "info" | "warn" | "error" | "debug"] => {
                let args = self.arguments()?;
                Ok(Instruction::Log { args })
            }
            ["test"] => self.test(),
            ["expect"] => {
                self.expect_punct('(')?;
                let actual = self.expr()?;
                self.expect_punct(')')?;
                self.expect_punct('.')?;
                if !self.eat_ident("to") {
                    return Err(self.error("'to'"));
                }
                self.expect_punct('.')?;
                let assertion = self.matcher()?;
                Ok(Instruction::Expect { actual, assertion })
            }
            ["response", "to", "have", "status"] => Ok(Instruction::Expect {
                actual: Expr::ResponseCode,
                assertion: Assertion::HaveStatus {
                    code: self.status_argument()?,
                },
            }),
            ["sleep"] => {
                self.expect_punct('(')?;
                let ms = self.non_negative_integer("milliseconds")?;
                self.expect_punct(')')?;
                Ok(Instruction::Sleep { ms })
            }
            _ => Err(ParseError::UnknownFunction {
                line,
                name: path.join("."),
            }),
        }
    }

    fn test(&mut self) -> Result<Instruction, ParseError> {
        self.expect_punct('(')?;
        let name = match self.advance() {
            Token::Str(name) => name,
            _ => {
                self.pos -= 1;
                return Err(self.error("a test name string"));
            }
        };
        self.expect_punct(',')?;
        let body = self.nested(Self::callback)?;
        self.expect_punct(')')?;
        Ok(Instruction::Test { name, body })
    }

    /// `function [name]() { ... }`, `() => { ... }` or `() => statement`.
    fn callback(&mut self) -> Result<Vec<Instruction>, ParseError> {
        if self.eat_ident("function") {
            if matches!(self.peek(), Token::Ident(_)) {
                self.advance();
            }
            self.expect_punct('(')?;
            self.expect_punct(')')?;
            return self.block();
        }

        self.expect_punct('(')?;
        self.expect_punct(')')?;
        self.consume(&Token::Arrow, "'=>'")?;
        if self.peek() == &Token::Punct('{') {
            self.block()
        } else {
            let instruction = if self.eat_ident("throw") {
                self.throw()?
            } else {
                self.call_statement()?
            };
            Ok(vec![instruction])
        }
    }

    fn block(&mut self) -> Result<Vec<Instruction>, ParseError> {
        self.expect_punct('{')?;
        let body = self.statements()?;
        self.expect_punct('}')?;
        Ok(body)
    }

    fn matcher(&mut self) -> Result<Assertion, ParseError> {
        let name = self.ident()?;
        match name.as_str() {
            "be" => Ok(Assertion::Be {
                expected: self.single_argument()?,
            }),
            "equal" | "eq" | "equals" => Ok(Assertion::Equal {
                expected: self.single_argument()?,
            }),
            "have" => {
                self.expect_punct('.')?;
                if !self.eat_ident("status") {
                    return Err(self.error("'status'"));
                }
                Ok(Assertion::HaveStatus {
                    code: self.status_argument()?,
                })
            }
            _ => {
                self.pos -= 1;
                Err(self.error("'be', 'equal' or 'have.status'"))
            }
        }
    }

    fn single_argument(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct('(')?;
        let expr = self.expr()?;
        self.expect_punct(')')?;
        Ok(expr)
    }

    fn status_argument(&mut self) -> Result<u16, ParseError> {
        self.expect_punct('(')?;
        let line = self.line();
        let code = self.non_negative_integer("a status code")?;
        self.expect_punct(')')?;
        u16::try_from(code).map_err(|_| ParseError::InvalidSyntax {
            line,
            expected: "a status code".to_string(),
            found: code.to_string(),
        })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_punct('(')?;
        let mut args = Vec::new();
        if self.eat(&Token::Punct(')')) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Punct(')')) {
                return Ok(args);
            }
            self.expect_punct(',')?;
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )]
    fn non_negative_integer(&mut self, expected: &str) -> Result<u64, ParseError> {
        match self.peek() {
            Token::Num(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64 => {
                let value = *n as u64;
                self.advance();
                Ok(value)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Str(text) => {
                self.advance();
                Ok(Expr::literal(text))
            }
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: number(n),
                })
            }
            Token::Punct('-') => {
                self.advance();
                match self.advance() {
                    Token::Num(n) => Ok(Expr::Literal {
                        value: number(-n),
                    }),
                    _ => {
                        self.pos -= 1;
                        Err(self.error("a number"))
                    }
                }
            }
            Token::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::literal(name == "true"))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::literal(Value::Null))
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Undefined)
                }
                _ => self.path_expr(),
            },
            _ => Err(self.error("an expression")),
        }
    }

    fn path_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let path = self.dotted_path()?;
        let names: Vec<&str> = path.iter().map(String::as_str).collect();

        match names.as_slice() {
            ["environment", "get"] => Ok(Expr::EnvGet {
                key: Box::new(self.nested(Self::single_argument)?),
            }),
            ["response", "code"] => Ok(Expr::ResponseCode),
            ["response", "status" | "statusText"] => Ok(Expr::ResponseStatus),
            ["response", "headers"] => {
                self.expect_punct('[')?;
                let name = self.string("a header name")?;
                self.expect_punct(']')?;
                Ok(Expr::ResponseHeader { name })
            }
            ["response", "headers", "get"] => {
                self.expect_punct('(')?;
                let name = self.string("a header name")?;
                self.expect_punct(')')?;
                Ok(Expr::ResponseHeader { name })
            }
            ["response", "text"] => {
                self.expect_punct('(')?;
                self.expect_punct(')')?;
                Ok(Expr::ResponseText)
            }
            ["response", "json"] => {
                self.expect_punct('(')?;
                self.expect_punct(')')?;
                Ok(Expr::ResponseJson {
                    path: self.accessors()?,
                })
            }
            _ => Err(ParseError::UnknownFunction {
                line,
                name: path.join("."),
            }),
        }
    }

    fn accessors(&mut self) -> Result<Vec<PathSegment>, ParseError> {
        let mut path = Vec::new();
        loop {
            if self.eat(&Token::Punct('.')) {
                path.push(PathSegment::Key(self.ident()?));
            } else if self.eat(&Token::Punct('[')) {
                match self.advance() {
                    Token::Str(key) => path.push(PathSegment::Key(key)),
                    Token::Num(n) if n >= 0.0 && n.fract() == 0.0 => {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        path.push(PathSegment::Index(n as usize));
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.error("a key or an index"));
                    }
                }
                self.expect_punct(']')?;
            } else {
                return Ok(path);
            }
        }
    }

    fn string(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Str(text) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            _ => Err(self.error(expected)),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
