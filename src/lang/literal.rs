//! Literal parsing, the last step of word resolution.
//!
//! Tokens that are not compiler words, defined words, primitives, headers, word references,
//! quoted strings or plain digit strings are handed to a [`LiteralParser`].  The parser is a
//! narrow pluggable capability: the interpreter holds it as a trait object and embedders may
//! replace it.  [`StandardLiteralParser`] understands the usual literal syntax for the value
//! types the runtime knows about.

use crate::{
    lang::tokenizing::translate_escapes,
    runtime::data_structures::value::{Complex, Value, ValueMap, ValueSet},
};
use std::{iter::Peekable, str::Chars};

/// Turn a token into a value or explain why it is not a literal.
pub trait LiteralParser {
    fn parse_literal(&self, token: &str) -> Result<Value, String>;
}

/// Parses numbers (including `0x`, `0o`, `0b`, exponents and complex `j` suffixes), `True`,
/// `False`, `None`, quoted strings and nested lists `[..]`, tuples `(..)`, dicts `{k:v}` and sets
/// `{a,b}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLiteralParser;

impl LiteralParser for StandardLiteralParser {
    fn parse_literal(&self, token: &str) -> Result<Value, String> {
        let mut parser = Parser {
            chars: token.chars().peekable(),
        };

        let value = parser.value()?;

        parser.skip_blanks();

        match parser.chars.next() {
            None => Ok(value),
            Some(next) => Err(format!("unexpected '{}' after literal", next)),
        }
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

/// Characters that end a bare atom inside a container.
fn ends_atom(next: char) -> bool {
    matches!(next, ',' | ':' | ']' | ')' | '}') || next.is_whitespace()
}

impl Parser<'_> {
    fn skip_blanks(&mut self) {
        while self.chars.next_if(|next| next.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, wanted: char) -> Result<(), String> {
        self.skip_blanks();

        match self.chars.next() {
            Some(next) if next == wanted => Ok(()),
            Some(next) => Err(format!("expected '{}' but found '{}'", wanted, next)),
            None => Err(format!("expected '{}' but the literal ended", wanted)),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_blanks();

        match self.chars.peek().copied() {
            Some(quote @ ('\'' | '"')) => {
                let _ = self.chars.next();
                self.string(quote)
            }
            Some('[') => {
                let _ = self.chars.next();
                Ok(Value::List(self.sequence(']')?.0))
            }
            Some('(') => {
                let _ = self.chars.next();
                let (mut items, trailing_comma) = self.sequence(')')?;

                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Tuple(items))
                }
            }
            Some('{') => {
                let _ = self.chars.next();
                self.braces()
            }
            Some(_) => self.atom(),
            None => Err("empty literal".to_string()),
        }
    }

    fn string(&mut self, quote: char) -> Result<Value, String> {
        let mut raw = String::new();

        loop {
            match self.chars.next() {
                Some('\\') => {
                    raw.push('\\');

                    if let Some(escaped) = self.chars.next() {
                        raw.push(escaped);
                    }
                }
                Some(next) if next == quote => return Ok(Value::Str(translate_escapes(&raw))),
                Some(next) => raw.push(next),
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    /// Comma separated values up to the closing character.  Also reports whether the last item
    /// was followed by a comma, which is what makes `(x,)` a tuple.
    fn sequence(&mut self, close: char) -> Result<(Vec<Value>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;

        loop {
            self.skip_blanks();

            if self.chars.next_if_eq(&close).is_some() {
                return Ok((items, trailing_comma));
            }

            items.push(self.value()?);
            self.skip_blanks();

            match self.chars.next() {
                Some(',') => trailing_comma = true,
                Some(next) if next == close => return Ok((items, false)),
                Some(next) => return Err(format!("expected ',' or '{}' but found '{}'", close, next)),
                None => return Err(format!("missing closing '{}'", close)),
            }
        }
    }

    /// `{}` is an empty dict, `{k: v, ..}` a dict and `{a, ..}` a set.
    fn braces(&mut self) -> Result<Value, String> {
        self.skip_blanks();

        if self.chars.next_if_eq(&'}').is_some() {
            return Ok(Value::Dict(ValueMap::new()));
        }

        let first = self.value()?;

        self.skip_blanks();

        if self.chars.next_if_eq(&':').is_some() {
            let mut map = ValueMap::new();
            let mut key = first;

            loop {
                let value = self.value()?;

                let _ = map.insert(key, value);
                self.skip_blanks();

                match self.chars.next() {
                    Some(',') => {
                        self.skip_blanks();

                        if self.chars.next_if_eq(&'}').is_some() {
                            return Ok(Value::Dict(map));
                        }

                        key = self.value()?;
                        self.expect(':')?;
                    }
                    Some('}') => return Ok(Value::Dict(map)),
                    Some(next) => return Err(format!("expected ',' or '}}' but found '{}'", next)),
                    None => return Err("missing closing '}'".to_string()),
                }
            }
        }

        let mut set = ValueSet::new();
        let _ = set.insert(first);

        loop {
            self.skip_blanks();

            match self.chars.next() {
                Some(',') => {
                    self.skip_blanks();

                    if self.chars.next_if_eq(&'}').is_some() {
                        return Ok(Value::Set(set));
                    }

                    let _ = set.insert(self.value()?);
                }
                Some('}') => return Ok(Value::Set(set)),
                Some(next) => return Err(format!("expected ',' or '}}' but found '{}'", next)),
                None => return Err("missing closing '}'".to_string()),
            }
        }
    }

    fn atom(&mut self) -> Result<Value, String> {
        let mut text = String::new();

        while let Some(next) = self.chars.next_if(|next| !ends_atom(*next)) {
            text.push(next);
        }

        parse_atom(&text)
    }
}

/// Parse a bare word: a keyword, an integer, a float or a complex number.
fn parse_atom(text: &str) -> Result<Value, String> {
    match text {
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        "None" => return Ok(Value::None),
        "" => return Err("invalid syntax".to_string()),
        _ => {}
    }

    if let Some(value) = parse_integer(text) {
        return Ok(Value::Int(value));
    }

    if let Some(value) = parse_real(text) {
        return Ok(Value::Float(value));
    }

    if let Some(value) = parse_complex(text) {
        return Ok(Value::Complex(value));
    }

    Err(format!("name '{}' is not defined", text))
}

/// Digits in the radix, no sign allowed after a `0x`, `0o` or `0b` prefix.
fn parse_digits(digits: &str, radix: u32) -> Option<i128> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    i128::from_str_radix(digits, radix).ok()
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let digits = digits.replace('_', "");
    let lower = digits.to_ascii_lowercase();

    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        parse_digits(hex, 16)?
    } else if let Some(octal) = lower.strip_prefix("0o") {
        parse_digits(octal, 8)?
    } else if let Some(binary) = lower.strip_prefix("0b") {
        parse_digits(binary, 2)?
    } else {
        parse_digits(&digits, 10)?
    };

    let value = if negative { magnitude.checked_neg()? } else { magnitude };

    i64::try_from(value).ok()
}

/// Only plain decimal forms, Rust also accepts `inf` and `nan` which are names here.
fn parse_real(text: &str) -> Option<f64> {
    let is_numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-' | '_'));

    if !is_numeric || !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    text.replace('_', "").parse::<f64>().ok()
}

/// `3j`, `-1.5j`, `1+2j`, `2e3-1e-2j`.
fn parse_complex(text: &str) -> Option<Complex> {
    let body = text.strip_suffix('j').or_else(|| text.strip_suffix('J'))?;
    let bytes = body.as_bytes();

    let split = (1..bytes.len())
        .rev()
        .find(|&index| {
            matches!(bytes[index], b'+' | b'-') && !matches!(bytes[index - 1], b'e' | b'E')
        });

    let imaginary = |part: &str| match part {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        _ => parse_real(part),
    };

    match split {
        Some(index) => Some(Complex::new(
            parse_real(&body[..index])?,
            imaginary(&body[index..])?,
        )),
        None => Some(Complex::new(0.0, imaginary(body)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Value, String> {
        StandardLiteralParser.parse_literal(text)
    }

    #[test]
    fn numbers() {
        assert_eq!(parse("-3"), Ok(Value::Int(-3)));
        assert_eq!(parse("0x1f"), Ok(Value::Int(31)));
        assert_eq!(parse("1_000"), Ok(Value::Int(1000)));
        assert_eq!(parse("2.5e1"), Ok(Value::Float(25.0)));
        assert_eq!(parse("1+2j"), Ok(Value::Complex(Complex::new(1.0, 2.0))));
        assert_eq!(parse("-j"), Ok(Value::Complex(Complex::new(0.0, -1.0))));
    }

    #[test]
    fn radix_digits_take_no_sign() {
        assert!(parse("0x-5").is_err());
        assert!(parse("-0x-8000000000000000").is_err());
        assert!(parse("0b+1").is_err());
        assert_eq!(parse("-0x8000000000000000"), Ok(Value::Int(i64::MIN)));
        assert_eq!(parse("-0o17"), Ok(Value::Int(-15)));
    }

    #[test]
    fn names_are_not_literals() {
        assert!(parse("inf").is_err());
        assert!(parse("undefined_word").is_err());
        assert!(parse("1e").is_err());
    }

    #[test]
    fn containers_nest() {
        let parsed = parse("[1,'a b',(2,),{'k':[None]},{3,3}]");

        let mut map = ValueMap::new();
        map.insert(Value::Str("k".into()), Value::List(vec![Value::None]));

        let mut set = ValueSet::new();
        set.insert(Value::Int(3));

        assert_eq!(
            parsed,
            Ok(Value::List(vec![
                Value::Int(1),
                Value::Str("a b".into()),
                Value::Tuple(vec![Value::Int(2)]),
                Value::Dict(map),
                Value::Set(set),
            ]))
        );
    }

    #[test]
    fn parenthesised_value_is_not_a_tuple() {
        assert_eq!(parse("(5)"), Ok(Value::Int(5)));
        assert_eq!(parse("()"), Ok(Value::Tuple(vec![])));
    }

    #[test]
    fn malformed_containers_are_rejected() {
        assert!(parse("[1,2").is_err());
        assert!(parse("{1:2,3}").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("[1]]").is_err());
    }
}
