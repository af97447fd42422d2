//! Translation of legacy calculated-field formulas and default values into
//! PostgreSQL expressions.
//!
//! Only a conservative subset is understood. Anything outside it is an
//! error, which callers treat as "not convertible" and degrade gracefully.

use std::collections::HashMap;

use crate::naming::{quote_ident, quote_literal};

/// Names the converter may reference and what it may emit.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    /// Lowercased legacy field name -> sanitized target column name.
    columns: HashMap<String, String>,
    /// Permit non-immutable functions such as `Now()` (defaults only).
    allow_volatile: bool,
}

impl ExpressionContext {
    /// Context for generated-column expressions over the given columns.
    pub fn for_columns<'a, I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(original, target)| (original.to_lowercase(), target.to_string()))
                .collect(),
            allow_volatile: false,
        }
    }

    /// Context for column defaults: no field references, volatile allowed.
    pub fn for_defaults() -> Self {
        Self {
            columns: HashMap::new(),
            allow_volatile: true,
        }
    }

    fn resolve(&self, field: &str) -> Result<String, String> {
        self.columns
            .get(&field.trim().to_lowercase())
            .map(|target| quote_ident(target))
            .ok_or_else(|| format!("Unknown or non-storable field [{field}]"))
    }
}

/// Convert a legacy expression into target-dialect SQL.
///
/// A leading `=` (as used in default values) is ignored.
pub fn convert_expression(expr: &str, ctx: &ExpressionContext) -> Result<String, String> {
    let body = expr.trim();
    let body = body.strip_prefix('=').unwrap_or(body);
    if body.trim().is_empty() {
        return Err("Expression is empty".to_string());
    }

    let tokens = tokenize(body)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        ctx,
    };
    let sql = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected trailing input near {:?}",
            parser.tokens[parser.pos]
        ));
    }
    Ok(sql)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Str(String),
    Field(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or("Unterminated field reference")?;
                let name: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(Token::Field(name));
                i += end + 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("Unterminated string literal".to_string()),
                        Some(&ch) if ch == quote => {
                            if chars.get(i + 1) == Some(&quote) {
                                value.push(quote);
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || (c == '.' && starts_digit(chars.get(i + 1))) => {
                let start = i;
                let mut seen_dot = false;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || (chars[i] == '.' && !seen_dot))
                {
                    seen_dot |= chars[i] == '.';
                    i += 1;
                }
                let mut literal: String = chars[start..i].iter().collect();
                if literal.starts_with('.') {
                    literal.insert(0, '0');
                }
                tokens.push(Token::Number(literal));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, chars.get(i + 1)) {
                    ('<', Some('>')) => "<>",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    _ => ">",
                };
                i += op.len();
                tokens.push(Token::Op(op));
            }
            '=' | '+' | '-' | '*' | '/' | '\\' | '^' | '&' => {
                let op = match c {
                    '=' => "=",
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '\\' => "\\",
                    '^' => "^",
                    _ => "&",
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
            other => return Err(format!("Unsupported character '{other}'")),
        }
    }

    Ok(tokens)
}

fn starts_digit(c: Option<&char>) -> bool {
    c.is_some_and(|d| d.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a ExpressionContext,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn peek_op(&self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(ref token) if *token == expected => Ok(()),
            other => Err(format!("Expected {expected:?}, found {other:?}")),
        }
    }

    fn parse_or(&mut self) -> Result<String, String> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = format!("({left} OR {right})");
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<String, String> {
        let mut left = self.parse_not()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = format!("({left} AND {right})");
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<String, String> {
        if self.peek_keyword("not") {
            self.pos += 1;
            let operand = self.parse_not()?;
            return Ok(format!("(NOT {operand})"));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<String, String> {
        let left = self.parse_concat()?;
        if let Some(op) = self.peek_op(&["=", "<>", "<", "<=", ">", ">="]) {
            self.pos += 1;
            let right = self.parse_concat()?;
            return Ok(format!("({left} {op} {right})"));
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<String, String> {
        let mut left = self.parse_additive()?;
        while self.peek_op(&["&"]).is_some() {
            self.pos += 1;
            let right = self.parse_additive()?;
            // Legacy concatenation treats Null as an empty string.
            left = format!(
                "(COALESCE(CAST({left} AS text), '') || COALESCE(CAST({right} AS text), ''))"
            );
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<String, String> {
        let mut left = self.parse_modulo()?;
        while let Some(op) = self.peek_op(&["+", "-"]) {
            self.pos += 1;
            let right = self.parse_modulo()?;
            left = format!("({left} {op} {right})");
        }
        Ok(left)
    }

    fn parse_modulo(&mut self) -> Result<String, String> {
        let mut left = self.parse_int_division()?;
        while self.peek_keyword("mod") {
            self.pos += 1;
            let right = self.parse_int_division()?;
            left = format!("({left} % NULLIF({right}, 0))");
        }
        Ok(left)
    }

    fn parse_int_division(&mut self) -> Result<String, String> {
        let mut left = self.parse_multiplicative()?;
        while self.peek_op(&["\\"]).is_some() {
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = format!("(CAST({left} AS bigint) / NULLIF(CAST({right} AS bigint), 0))");
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<String, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_op(&["*", "/"]) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = if op == "/" {
                format!("(CAST({left} AS double precision) / NULLIF({right}, 0))")
            } else {
                format!("({left} * {right})")
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<String, String> {
        if let Some(op) = self.peek_op(&["-", "+"]) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(if op == "-" {
                format!("(-{operand})")
            } else {
                operand
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<String, String> {
        let mut left = self.parse_primary()?;
        while self.peek_op(&["^"]).is_some() {
            self.pos += 1;
            let right = self.parse_primary()?;
            left = format!("power({left}, {right})");
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Str(s)) => Ok(quote_literal(&s)),
            Some(Token::Field(name)) => self.ctx.resolve(&name),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    return self.call(&word, args);
                }
                match word.to_lowercase().as_str() {
                    "true" | "yes" => Ok("TRUE".to_string()),
                    "false" | "no" => Ok("FALSE".to_string()),
                    "null" => Ok("NULL".to_string()),
                    _ => self.ctx.resolve(&word),
                }
            }
            other => Err(format!("Unexpected token {other:?}")),
        }
    }

    /// Parse a comma-separated argument list; the opening paren is consumed.
    fn parse_args(&mut self) -> Result<Vec<String>, String> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                other => return Err(format!("Expected ',' or ')', found {other:?}")),
            }
        }
    }

    fn call(&self, name: &str, args: Vec<String>) -> Result<String, String> {
        let lower = name.to_lowercase();
        let arity = |allowed: &[usize]| -> Result<(), String> {
            if allowed.contains(&args.len()) {
                Ok(())
            } else {
                Err(format!(
                    "{name}() expects {allowed:?} arguments, got {}",
                    args.len()
                ))
            }
        };

        match lower.as_str() {
            "iif" => {
                arity(&[3])?;
                Ok(format!(
                    "(CASE WHEN {} THEN {} ELSE {} END)",
                    args[0], args[1], args[2]
                ))
            }
            "nz" => {
                arity(&[2])?;
                Ok(format!("COALESCE({}, {})", args[0], args[1]))
            }
            "left" | "right" => {
                arity(&[2])?;
                Ok(format!("{lower}(CAST({} AS text), {})", args[0], args[1]))
            }
            "mid" => {
                arity(&[2, 3])?;
                let rest = args[1..].join(", ");
                Ok(format!("substr(CAST({} AS text), {rest})", args[0]))
            }
            "len" => {
                arity(&[1])?;
                Ok(format!("length(CAST({} AS text))", args[0]))
            }
            "ucase" | "lcase" => {
                arity(&[1])?;
                let func = if lower == "ucase" { "upper" } else { "lower" };
                Ok(format!("{func}(CAST({} AS text))", args[0]))
            }
            "trim" | "ltrim" | "rtrim" => {
                arity(&[1])?;
                let func = if lower == "trim" { "btrim" } else { lower.as_str() };
                Ok(format!("{func}(CAST({} AS text))", args[0]))
            }
            "abs" => {
                arity(&[1])?;
                Ok(format!("abs({})", args[0]))
            }
            "round" => {
                arity(&[1, 2])?;
                match args.get(1) {
                    Some(digits) => Ok(format!("round(CAST({} AS numeric), {digits})", args[0])),
                    None => Ok(format!("round(CAST({} AS numeric))", args[0])),
                }
            }
            "int" => {
                arity(&[1])?;
                Ok(format!("floor({})", args[0]))
            }
            "now" if self.ctx.allow_volatile => {
                arity(&[0])?;
                Ok("LOCALTIMESTAMP".to_string())
            }
            "date" if self.ctx.allow_volatile => {
                arity(&[0])?;
                Ok("CURRENT_DATE".to_string())
            }
            _ => Err(format!("Unsupported function {name}()")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExpressionContext {
        ExpressionContext::for_columns([
            ("Quantity", "quantity"),
            ("Unit Price", "unit_price"),
            ("First Name", "first_name"),
            ("LastName", "lastname"),
        ])
    }

    #[test]
    fn arithmetic_over_fields() {
        assert_eq!(
            convert_expression("[Quantity]*[Unit Price]", &ctx()).unwrap(),
            "(\"quantity\" * \"unit_price\")"
        );
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        assert_eq!(
            convert_expression("[quantity] + 1", &ctx()).unwrap(),
            "(\"quantity\" + 1)"
        );
    }

    #[test]
    fn bare_identifiers_resolve_as_fields() {
        assert_eq!(convert_expression("LastName", &ctx()).unwrap(), "\"lastname\"");
    }

    #[test]
    fn concatenation_casts_and_coalesces() {
        let sql = convert_expression("[First Name] & \" \" & [LastName]", &ctx()).unwrap();
        assert!(sql.contains("COALESCE(CAST(\"first_name\" AS text), '')"));
        assert!(sql.contains("' '"));
        assert!(sql.contains("\"lastname\""));
    }

    #[test]
    fn iif_becomes_case() {
        assert_eq!(
            convert_expression("IIf([Quantity] > 10, \"bulk\", \"single\")", &ctx()).unwrap(),
            "(CASE WHEN (\"quantity\" > 10) THEN 'bulk' ELSE 'single' END)"
        );
    }

    #[test]
    fn division_guards_against_zero() {
        assert_eq!(
            convert_expression("[Quantity] / 2", &ctx()).unwrap(),
            "(CAST(\"quantity\" AS double precision) / NULLIF(2, 0))"
        );
    }

    #[test]
    fn precedence_follows_legacy_rules() {
        assert_eq!(
            convert_expression("1 + 2 * 3", &ctx()).unwrap(),
            "(1 + (2 * 3))"
        );
        assert_eq!(convert_expression("-2 ^ 2", &ctx()).unwrap(), "(-power(2, 2))");
        assert_eq!(
            convert_expression("Not [Quantity] = 1 And True", &ctx()).unwrap(),
            "((NOT (\"quantity\" = 1)) AND TRUE)"
        );
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(
            convert_expression("\"O'Brien\"", &ctx()).unwrap(),
            "'O''Brien'"
        );
        assert_eq!(
            convert_expression("\"say \"\"hi\"\"\"", &ctx()).unwrap(),
            "'say \"hi\"'"
        );
    }

    #[test]
    fn functions_translate() {
        assert_eq!(
            convert_expression("UCase(Left([First Name], 1))", &ctx()).unwrap(),
            "upper(CAST(left(CAST(\"first_name\" AS text), 1) AS text))"
        );
        assert_eq!(
            convert_expression("Nz([Quantity], 0)", &ctx()).unwrap(),
            "COALESCE(\"quantity\", 0)"
        );
        assert_eq!(
            convert_expression("Round([Unit Price], 2)", &ctx()).unwrap(),
            "round(CAST(\"unit_price\" AS numeric), 2)"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(convert_expression("[Discount] * 2", &ctx()).is_err());
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert!(convert_expression("DLookup(\"x\", \"y\")", &ctx()).is_err());
    }

    #[test]
    fn volatile_functions_only_in_defaults() {
        assert!(convert_expression("Now()", &ctx()).is_err());
        assert_eq!(
            convert_expression("=Now()", &ExpressionContext::for_defaults()).unwrap(),
            "LOCALTIMESTAMP"
        );
    }

    #[test]
    fn defaults_cannot_reference_fields() {
        assert!(convert_expression("[Quantity]", &ExpressionContext::for_defaults()).is_err());
        assert_eq!(
            convert_expression("0", &ExpressionContext::for_defaults()).unwrap(),
            "0"
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in ["", "   ", "[Quantity", "\"open", "(1 + 2", "1 +", "1 2", "#1/1/2020#", "a.b"] {
            assert!(convert_expression(bad, &ctx()).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn leading_decimal_point_is_normalized() {
        assert_eq!(convert_expression(".5", &ctx()).unwrap(), "0.5");
    }
}
