use std::future::ready;

use chatloop_core::tool::{Error as ToolError, Tool, ToolResult};

/// How deep parentheses, signs and exponents may nest.
const MAX_DEPTH: usize = 64;

/// A tool that evaluates arithmetic expressions.
///
/// Supports `+`, `-`, `*`, `/`, `%`, `^` (or `**`), parentheses, unary
/// signs and decimal numbers.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        r#"
Useful for when you need to answer questions about math.
Input should be a single arithmetic expression, such as `12 * 7` or `(3 + 4) ^ 2`."#
    }

    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let expr = input
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`'))
            .trim();
        let result = evaluate(expr).map(format_number).map_err(|reason| {
            ToolError::invalid_input()
                .with_reason(format!("cannot evaluate `{expr}`: {reason}"))
        });
        ready(result)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluates an arithmetic expression.
fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected {token}"));
    }
    if !value.is_finite() {
        return Err("the result is not a finite number".to_owned());
    }
    Ok(value)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Star => write!(f, "`*`"),
            Token::Slash => write!(f, "`/`"),
            Token::Percent => write!(f, "`%`"),
            Token::Caret => write!(f, "`^`"),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.next_if(|&(_, c)| c == '*').is_some() => Token::Caret,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + 1;
                while let Some((idx, _)) =
                    chars.next_if(|&(_, c)| c.is_ascii_digit() || c == '.')
                {
                    end = idx + 1;
                }
                let text = &input[start..end];
                let number = text
                    .parse()
                    .map_err(|_| format!("invalid number `{text}`"))?;
                Token::Number(number)
            }
            c => return Err(format!("unexpected character `{c}`")),
        };
        tokens.push(token);
    }

    if tokens.is_empty() {
        return Err("the expression is empty".to_owned());
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    left += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    left -= self.parse_term()?;
                }
                _ => return Ok(left),
            }
        }
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(op @ (Token::Star | Token::Slash | Token::Percent)) => op,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_unary()?;
            left = match op {
                Token::Star => left * right,
                _ if right == 0.0 => return Err("division by zero".to_owned()),
                Token::Slash => left / right,
                _ => left % right,
            };
        }
    }

    // unary = ('-' | '+') unary | power
    //
    // Every recursive rule passes through here, so this is where nesting is
    // bounded.
    fn parse_unary(&mut self) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression is nested too deeply".to_owned());
        }
        self.depth += 1;
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    fn parse_signed(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.next();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('^' unary)?
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if self.peek() == Some(Token::Caret) {
            self.next();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.parse_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("missing closing parenthesis".to_owned()),
                }
            }
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("unexpected end of expression".to_owned()),
        }
    }
}
