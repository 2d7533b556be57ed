//! Arithmetic expression evaluator behind `calculate_expression`.
//!
//! Input is restricted to `0-9 + - * / . ( )` and spaces; anything else is
//! rejected before parsing. That whitelist is the tool's security boundary.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term   (('+' | '-') term)*
//! term   := unary  (('*' | '/' | '//') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom ('**' unary)?
//! atom   := number | '(' expr ')'
//! ```

use crate::error::ToolError;

/// Characters the evaluator accepts.
pub const ALLOWED_CHARS: &str = "0123456789+-*/.() ";

/// Nesting bound for parentheses and chained unary signs.
const MAX_DEPTH: usize = 64;

/// Evaluate an arithmetic expression to a float.
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    if let Some(bad) = expression.chars().find(|c| !ALLOWED_CHARS.contains(*c)) {
        return Err(ToolError::InvalidCharacter(bad));
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolError::Malformed("empty expression".into()));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(ToolError::Malformed(format!(
            "unexpected {} at token {}",
            tokens[parser.pos],
            parser.pos + 1
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::Malformed("result is not a finite number".into()));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Power,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::DoubleSlash => write!(f, "'//'"),
            Self::Power => write!(f, "'**'"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                if literal == "." || literal.matches('.').count() > 1 {
                    return Err(ToolError::Malformed(format!("invalid number '{}'", literal)));
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ToolError::Malformed(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Num(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Power);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => return Err(ToolError::InvalidCharacter(other)),
        }
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

    fn advance(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn descend(&mut self) -> Result<(), ToolError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ToolError::Malformed("expression nested too deeply".into()));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(tok @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if tok == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.unary()?;
        while let Some(tok @ (Token::Star | Token::Slash | Token::DoubleSlash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match tok {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(ToolError::DivisionByZero),
                Token::Slash => value / rhs,
                _ => (value / rhs).floor(),
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(-v)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(v)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, ToolError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Power) {
            self.pos += 1;
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            if base == 0.0 && exponent < 0.0 {
                return Err(ToolError::DivisionByZero);
            }
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, ToolError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolError::Malformed("unbalanced parentheses".into())),
                }
            }
            Some(tok) => Err(ToolError::Malformed(format!("unexpected {}", tok))),
            None => Err(ToolError::Malformed("unexpected end of expression".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence() {
        assert_eq!(evaluate("2+3*4").unwrap(), 14.0);
        assert_eq!(evaluate("(2+3)*4").unwrap(), 20.0);
        assert_eq!(evaluate("10/2").unwrap(), 5.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("8 / 4 / 2").unwrap(), 1.0);
    }

    #[test]
    fn decimals_and_signs() {
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
        assert_eq!(evaluate(".5 + 5.").unwrap(), 5.5);
        assert_eq!(evaluate("-3 + +5").unwrap(), 2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
        assert_eq!(evaluate("--4").unwrap(), 4.0);
    }

    #[test]
    fn power_and_floor_division() {
        assert_eq!(evaluate("2**3").unwrap(), 8.0);
        assert_eq!(evaluate("2**3**2").unwrap(), 512.0);
        assert_eq!(evaluate("-2**2").unwrap(), -4.0);
        assert_eq!(evaluate("2**-1").unwrap(), 0.5);
        assert_eq!(evaluate("7//2").unwrap(), 3.0);
        assert_eq!(evaluate("-7//2").unwrap(), -4.0);
    }

    #[test]
    fn whitelist_is_enforced_before_parsing() {
        assert_eq!(evaluate("2+x"), Err(ToolError::InvalidCharacter('x')));
        assert_eq!(
            evaluate("__import__('os')"),
            Err(ToolError::InvalidCharacter('_'))
        );
        assert_eq!(evaluate("2^3"), Err(ToolError::InvalidCharacter('^')));
        assert_eq!(evaluate("1,000"), Err(ToolError::InvalidCharacter(',')));
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(evaluate("1/0"), Err(ToolError::DivisionByZero));
        assert_eq!(evaluate("5//(2-2)"), Err(ToolError::DivisionByZero));
        assert_eq!(evaluate("0**-1"), Err(ToolError::DivisionByZero));
    }

    #[test]
    fn malformed_input() {
        for bad in ["", "   ", "2+", "(2+3", "2+3)", "1..2", "()", "* 3", "3 4", "."] {
            assert!(
                matches!(evaluate(bad), Err(ToolError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(evaluate(&deep), Err(ToolError::Malformed(_))));
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&shallow).unwrap(), 1.0);
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(evaluate("10**400"), Err(ToolError::Malformed(_))));
    }
}
