// Rule parser - converts rule strings into AST
// Supports: column references (Amount, [Payee Name]), numbers, quoted strings,
// arithmetic (+ - * / %), comparisons (== = != <> < > <= >=, IN, NOT IN),
// boolean chaining (AND / OR / NOT, any case), parentheses and value lists.
// Anything else is rejected: there are no function calls.

use std::fmt;

use crate::error::RuleError;

/// Rule expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Column reference, resolved against the row at evaluation time
    Column(String),
    /// Parenthesized value list, only valid on the right of IN
    List(Vec<Expr>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    NotIn,
    // Chaining
    And,
    Or,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Eq => "==",
            Op::NotEq => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::LtEq => "<=",
            Op::GtEq => ">=",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::And => "AND",
            Op::Or => "OR",
        }
    }
}

/// Parse a rule string into an AST.
pub fn parse(rule: &str) -> Result<Expr, RuleError> {
    let tokens = tokenize(rule.trim())?;
    if tokens.is_empty() {
        return Err(RuleError::Parse("empty rule".to_string()));
    }

    let (expr, pos) = parse_or(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(RuleError::Parse(format!(
            "unexpected {} after end of rule",
            tokens[pos]
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    Ident(String),
    /// Bracketed column name: [Payee Name]
    Column(String),
    And,
    Or,
    Not,
    In,
    True,
    False,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::StringLit(s) => write!(f, "string \"{s}\""),
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Column(s) => write!(f, "'[{s}]'"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::In => write!(f, "IN"),
            Token::True => write!(f, "TRUE"),
            Token::False => write!(f, "FALSE"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Eq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::LtEq => write!(f, "'<='"),
            Token::GtEq => write!(f, "'>='"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ',' => { tokens.push(Token::Comma); chars.next(); }
            '=' => {
                // Single '=' is equality, as in the configuration files
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(RuleError::Parse("'!' must be followed by '='".to_string()));
                }
                tokens.push(Token::NotEq);
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(RuleError::Parse("unterminated string literal".to_string())),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '[' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(RuleError::Parse("unterminated column reference".to_string())),
                    }
                }
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(RuleError::Parse("empty column reference '[]'".to_string()));
                }
                tokens.push(Token::Column(name));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        num_str.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = num_str
                    .parse::<f64>()
                    .map_err(|_| RuleError::Parse(format!("invalid number literal '{num_str}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match ident.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "IN" => Token::In,
                    "TRUE" => Token::True,
                    "FALSE" => Token::False,
                    _ => Token::Ident(ident),
                };
                tokens.push(token);
            }
            other => {
                return Err(RuleError::Parse(format!("unsupported character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// Lowest precedence: OR
fn parse_or(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let (mut left, mut pos) = parse_and(tokens, pos)?;

    while let Some(Token::Or) = tokens.get(pos) {
        let (right, new_pos) = parse_and(tokens, pos + 1)?;
        left = binary(Op::Or, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_and(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let (mut left, mut pos) = parse_not(tokens, pos)?;

    while let Some(Token::And) = tokens.get(pos) {
        let (right, new_pos) = parse_not(tokens, pos + 1)?;
        left = binary(Op::And, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_not(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    if let Some(Token::Not) = tokens.get(pos) {
        let (inner, new_pos) = parse_not(tokens, pos + 1)?;
        return Ok((Expr::Not(Box::new(inner)), new_pos));
    }
    parse_comparison(tokens, pos)
}

// Comparisons do not chain: `a < b < c` is rejected
fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let (left, pos) = parse_add_sub(tokens, pos)?;

    let (op, rhs_pos) = match tokens.get(pos) {
        Some(Token::Eq) => (Op::Eq, pos + 1),
        Some(Token::NotEq) => (Op::NotEq, pos + 1),
        Some(Token::Lt) => (Op::Lt, pos + 1),
        Some(Token::Gt) => (Op::Gt, pos + 1),
        Some(Token::LtEq) => (Op::LtEq, pos + 1),
        Some(Token::GtEq) => (Op::GtEq, pos + 1),
        Some(Token::In) => (Op::In, pos + 1),
        Some(Token::Not) if tokens.get(pos + 1) == Some(&Token::In) => (Op::NotIn, pos + 2),
        _ => return Ok((left, pos)),
    };

    let (right, new_pos) = if matches!(op, Op::In | Op::NotIn) {
        parse_list_or_value(tokens, rhs_pos)?
    } else {
        parse_add_sub(tokens, rhs_pos)?
    };

    if let Some(tok @ (Token::Eq | Token::NotEq | Token::Lt | Token::Gt | Token::LtEq | Token::GtEq | Token::In)) =
        tokens.get(new_pos)
    {
        return Err(RuleError::Parse(format!("comparison cannot be chained with {tok}")));
    }

    Ok((binary(op, left, right), new_pos))
}

// Right-hand side of IN: `(a, b, c)` or a single operand
fn parse_list_or_value(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    if let Some(Token::LParen) = tokens.get(pos) {
        let mut items = Vec::new();
        let mut pos = pos + 1;
        if let Some(Token::RParen) = tokens.get(pos) {
            return Ok((Expr::List(items), pos + 1));
        }
        loop {
            let (item, new_pos) = parse_add_sub(tokens, pos)?;
            items.push(item);
            match tokens.get(new_pos) {
                Some(Token::Comma) => pos = new_pos + 1,
                Some(Token::RParen) => return Ok((Expr::List(items), new_pos + 1)),
                Some(tok) => return Err(RuleError::Parse(format!("expected ',' or ')' in list, found {tok}"))),
                None => return Err(RuleError::Parse("unterminated value list".to_string())),
            }
        }
    }
    parse_add_sub(tokens, pos)
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            Token::Percent => Op::Mod,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (inner, new_pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Negate(Box::new(inner)), new_pos))
        }
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), RuleError> {
    let token = tokens
        .get(pos)
        .ok_or_else(|| RuleError::Parse("unexpected end of rule".to_string()))?;

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::True => Ok((Expr::Boolean(true), pos + 1)),
        Token::False => Ok((Expr::Boolean(false), pos + 1)),
        Token::Column(name) => Ok((Expr::Column(name.clone()), pos + 1)),
        Token::Ident(name) => {
            if let Some(Token::LParen) = tokens.get(pos + 1) {
                return Err(RuleError::Parse(format!(
                    "function calls are not supported ('{name}(')"
                )));
            }
            Ok((Expr::Column(name.clone()), pos + 1))
        }
        Token::LParen => {
            let (inner, new_pos) = parse_or(tokens, pos + 1)?;
            match tokens.get(new_pos) {
                Some(Token::RParen) => Ok((inner, new_pos + 1)),
                Some(tok) => Err(RuleError::Parse(format!("expected ')', found {tok}"))),
                None => Err(RuleError::Parse("missing closing parenthesis".to_string())),
            }
        }
        other => Err(RuleError::Parse(format!("unexpected {other}"))),
    }
}

impl Expr {
    /// Column names referenced by the expression, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_columns(self, &mut out);
        out
    }
}

fn collect_columns<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Column(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Expr::List(items) => items.iter().for_each(|i| collect_columns(i, out)),
        Expr::Negate(inner) | Expr::Not(inner) => collect_columns(inner, out),
        Expr::BinaryOp { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) => {}
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Text(s) => write!(f, "\"{s}\""),
            Expr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Column(name) => {
                if name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                    write!(f, "{name}")
                } else {
                    write!(f, "[{name}]")
                }
            }
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Expr::Negate(inner) => write!(f, "-{inner}"),
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::BinaryOp { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    #[test]
    fn parse_simple_comparison() {
        let expr = parse("Amount > 100").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp {
                op: Op::Gt,
                left: col("Amount"),
                right: Box::new(Expr::Number(100.0)),
            }
        );
    }

    #[test]
    fn single_equals_is_equality() {
        let a = parse("PaymentType = 'Cash'").unwrap();
        let b = parse("PaymentType == \"Cash\"").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn precedence_mul_over_add_and_over_or() {
        let expr = parse("a + b * 2 > 10 or c = 1 and d = 2").unwrap();
        assert_eq!(
            expr.to_string(),
            "(((a + (b * 2)) > 10) OR ((c == 1) AND (d == 2)))"
        );
        match expr {
            Expr::BinaryOp { op: Op::Or, right, .. } => {
                assert!(matches!(*right, Expr::BinaryOp { op: Op::And, .. }));
            }
            other => panic!("expected OR at the root, got {other:?}"),
        }
    }

    #[test]
    fn chaining_keywords_any_case() {
        assert!(parse("a = 1 AND b = 2").is_ok());
        assert!(parse("a = 1 and b = 2").is_ok());
        assert!(parse("a = 1 Or b = 2").is_ok());
    }

    #[test]
    fn in_and_not_in_lists() {
        let expr = parse("Type IN ('cash', 'check')").unwrap();
        match expr {
            Expr::BinaryOp { op: Op::In, right, .. } => match *right {
                Expr::List(items) => assert_eq!(items.len(), 2),
                other => panic!("expected list, got {other:?}"),
            },
            other => panic!("expected IN, got {other:?}"),
        }
        assert!(matches!(
            parse("Type not in ('cash')").unwrap(),
            Expr::BinaryOp { op: Op::NotIn, .. }
        ));
    }

    #[test]
    fn bracketed_columns_allow_spaces() {
        let expr = parse("[Payee Name] != ''").unwrap();
        assert_eq!(expr.columns(), vec!["Payee Name"]);
    }

    #[test]
    fn columns_are_deduplicated() {
        let expr = parse("Amount + Fee > Amount").unwrap();
        assert_eq!(expr.columns(), vec!["Amount", "Fee"]);
    }

    #[test]
    fn rejects_function_calls() {
        let err = parse("__import__('os')").unwrap_err();
        assert!(matches!(err, RuleError::Parse(_)));
        assert!(err.to_string().contains("function calls"));
    }

    #[test]
    fn rejects_unsupported_characters() {
        assert!(matches!(parse("a; b").unwrap_err(), RuleError::Parse(_)));
        assert!(matches!(parse("a @ b").unwrap_err(), RuleError::Parse(_)));
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!(parse("").is_err());
        assert!(parse("(a > 1").is_err());
        assert!(parse("a > ").is_err());
        assert!(parse("a > 1 2").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("1 < a < 3").is_err());
        assert!(parse("1.2.3").is_err());
    }
}
