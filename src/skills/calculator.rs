//! Calculator capability: a small recursive-descent expression evaluator

use super::BuiltinSkill;
use crate::capability::{
    parse_args, Capability, CapabilityContext, CapabilityError, Operation, OperationError,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

const MANIFEST: &str = include_str!("manifests/calculator.md");

/// Nesting limit for unary signs, parentheses and exponents.
const MAX_DEPTH: usize = 256;

pub(super) fn build(_ctx: &CapabilityContext) -> Result<Arc<dyn Capability>, CapabilityError> {
    BuiltinSkill::new("calculator", MANIFEST, vec![Arc::new(Calculator)])
}

struct Calculator;

#[derive(Deserialize)]
struct CalculatorArgs {
    expression: String,
}

#[async_trait]
impl Operation for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Supports arithmetic, powers, remainders, square roots, logarithms and trigonometry."
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate, e.g. \"2 + 2\", \"sqrt(16)\", \"2^10 / 4\""
                }
            },
            "required": ["expression"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        let CalculatorArgs { expression } = parse_args(args)?;
        Ok(match evaluate(&expression) {
            Ok(value) => format!("Result: {}", format_number(value)),
            Err(e) => format!("Error evaluating expression: {e}"),
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("undefined symbol '{0}'")]
    UnknownSymbol(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
    #[error("expression nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().enumerate().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse()
                    .map_err(|_| EvalError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() => {
                let mut ident = String::new();
                while let Some(&(_, a)) = chars.peek() {
                    if a.is_alphanumeric() || a == '_' {
                        ident.push(a);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_lowercase()));
            }
            '+' | '-' | '*' | '/' | '^' | '%' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            other => return Err(EvalError::UnexpectedChar(other, pos)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect_rparen(&mut self) -> Result<(), EvalError> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            Some(other) => Err(EvalError::UnexpectedToken(format!("{other:?}"))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(EvalError::DivisionByZero),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := ('-' | '+') unary | power
    //
    // Every recursive cycle in the grammar passes through here, so this is
    // where nesting is counted.
    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   (right associative)
    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Op('^')) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    apply_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(other) => Err(EvalError::UnexpectedToken(format!("{other:?}"))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

fn constant(name: &str) -> Result<f64, EvalError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        _ => Err(EvalError::UnknownSymbol(name.to_string())),
    }
}

fn apply_function(name: &str, x: f64) -> Result<f64, EvalError> {
    Ok(match name {
        "sqrt" => x.sqrt(),
        "abs" => x.abs(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "ln" => x.ln(),
        "log" => x.log10(),
        "exp" => x.exp(),
        "round" => x.round(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        _ => return Err(EvalError::UnknownSymbol(name.to_string())),
    })
}

pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::UnexpectedEnd);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(EvalError::UnexpectedToken(format!("{extra:?}")));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NotFinite)
    }
}

/// Integral values print without a fractional part.
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(s: &str) -> f64 {
        evaluate(s).unwrap()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert!((eval("2 + 3 * 4") - 14.0).abs() < f64::EPSILON);
        assert!((eval("(2 + 3) * 4") - 20.0).abs() < f64::EPSILON);
        assert!((eval("2 ^ 3 ^ 2") - 512.0).abs() < f64::EPSILON);
        assert!((eval("-2 ^ 2") + 4.0).abs() < f64::EPSILON);
        assert!((eval("2 ^ -1") - 0.5).abs() < f64::EPSILON);
        assert!((eval("10 - 4 - 3") - 3.0).abs() < f64::EPSILON);
        assert!((eval("17 % 5") - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_functions_and_constants() {
        assert!((eval("sqrt(16)") - 4.0).abs() < f64::EPSILON);
        assert!((eval("log(1000)") - 3.0).abs() < 1e-12);
        assert!((eval("ln(e)") - 1.0).abs() < 1e-12);
        assert!(eval("sin(pi)").abs() < 1e-12);
        assert!((eval("ceil(1.2) + floor(1.8) + round(2.5)") - 6.0).abs() < f64::EPSILON);
        assert!((eval("abs(-3)") - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate(""), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate("2 +"), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate("foo(2)"), Err(EvalError::UnknownSymbol("foo".to_string())));
        assert_eq!(evaluate("2 $ 3"), Err(EvalError::UnexpectedChar('$', 2)));
        assert!(matches!(evaluate("1.2.3"), Err(EvalError::InvalidNumber(_))));
        assert!(matches!(evaluate("1 2"), Err(EvalError::UnexpectedToken(_))));
        assert_eq!(evaluate("sqrt(-1)"), Err(EvalError::NotFinite));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let signs = format!("{}1", "-".repeat(100_000));
        assert_eq!(evaluate(&signs), Err(EvalError::TooDeep));

        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(evaluate(&parens), Err(EvalError::TooDeep));

        let powers = vec!["2"; 100_000].join("^");
        assert_eq!(evaluate(&powers), Err(EvalError::TooDeep));

        // Moderate nesting still evaluates
        let nested = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!((eval(&nested) - 1.0).abs() < f64::EPSILON);
        assert!((eval(&format!("{}1", "-".repeat(200))) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[tokio::test]
    async fn test_operation_output() {
        let op = Calculator;
        assert_eq!(
            op.invoke(json!({"expression": "2+2"})).await.unwrap(),
            "Result: 4"
        );
        assert_eq!(
            op.invoke(json!({"expression": "1/0"})).await.unwrap(),
            "Error evaluating expression: division by zero"
        );
        assert!(op.invoke(json!({"expr": "2+2"})).await.is_err());

        let deep = format!("{}1", "-".repeat(200_000));
        let output = op.invoke(json!({"expression": deep})).await.unwrap();
        assert!(output.starts_with("Error evaluating expression: expression nested deeper"));
    }
}
