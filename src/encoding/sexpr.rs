//! Tagged ordered lists used as the structured boundary format.
//!
//! Every value is written as `(label field1 field2 ...)`. The surrounding platform owns the
//! grammar; the printer and reader here exist so values can be inspected and read back.
use crate::{
    arithmetics::ModInt,
    error::{Error, Result},
    BigInt,
};
use std::fmt;
use std::str::FromStr;

pub const INTEGER_LABEL: &str = "adder-integer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

pub trait ToSExpr {
    fn to_sexpr(&self) -> SExpr;
}

pub trait FromSExpr: Sized {
    fn from_sexpr(expr: &SExpr) -> Result<Self>;
}

impl SExpr {
    pub fn atom(text: impl Into<String>) -> Self {
        return SExpr::Atom(text.into());
    }

    pub fn as_atom(&self) -> Option<&str> {
        return match self {
            SExpr::Atom(text) => Some(text),
            SExpr::List(_) => None,
        };
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        return match self {
            SExpr::Atom(_) => None,
            SExpr::List(items) => Some(items),
        };
    }

    /// The leading atom of a list
    pub fn label(&self) -> Option<&str> {
        return self.as_list()?.first()?.as_atom();
    }
}

/// Check that `expr` is a list with the given label and one of the allowed lengths (label
/// included). Returns the whole list.
pub(crate) fn expect_labeled<'a>(
    expr: &'a SExpr,
    kind: &'static str,
    label: &str,
    lengths: &[usize],
) -> Result<&'a [SExpr]> {
    let items = expect_list(expr, kind)?;
    if expr.label() != Some(label) {
        return Err(Error::parse(kind, format!("expected label `{label}`")));
    }
    if !lengths.contains(&items.len()) {
        return Err(Error::parse(
            kind,
            format!("unexpected field count {}", items.len()),
        ));
    }
    return Ok(items);
}

pub(crate) fn expect_list<'a>(expr: &'a SExpr, kind: &'static str) -> Result<&'a [SExpr]> {
    return expr
        .as_list()
        .ok_or_else(|| Error::parse(kind, "expected a list"));
}

/// Decode each element of a list field
pub(crate) fn decode_all<T: FromSExpr>(expr: &SExpr, kind: &'static str) -> Result<Vec<T>> {
    return expect_list(expr, kind)?
        .iter()
        .map(T::from_sexpr)
        .collect();
}

pub(crate) fn encode_all<T: ToSExpr>(values: &[T]) -> SExpr {
    return SExpr::List(values.iter().map(ToSExpr::to_sexpr).collect());
}

impl ToSExpr for ModInt {
    fn to_sexpr(&self) -> SExpr {
        return SExpr::List(vec![
            SExpr::atom(INTEGER_LABEL),
            SExpr::atom(self.to_string()),
            SExpr::atom(ModInt::plain(*self.get_modulus()).to_string()),
        ]);
    }
}

impl FromSExpr for ModInt {
    fn from_sexpr(expr: &SExpr) -> Result<Self> {
        let items = expect_labeled(expr, "integer", INTEGER_LABEL, &[3])?;
        let value = ModInt::parse(atom_field(items, 1)?, &BigInt::ZERO)?;
        let modulus = ModInt::parse(atom_field(items, 2)?, &BigInt::ZERO)?;
        if !modulus.is_zero() && value.get_value() >= modulus.get_value() {
            return Err(Error::parse("integer", "value is not reduced"));
        }
        return Ok(value.modulo(modulus.get_value()));
    }
}

fn atom_field(items: &[SExpr], index: usize) -> Result<&str> {
    return items[index]
        .as_atom()
        .ok_or_else(|| Error::parse("integer", "expected an atom"));
}

fn needs_quotes(text: &str) -> bool {
    return text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '\\');
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(text) if needs_quotes(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                return f.write_str("\"");
            }
            SExpr::Atom(text) => return f.write_str(text),
            SExpr::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                return f.write_str(")");
            }
        }
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Reader<'a> {
    fn error(reason: &str) -> Error {
        return Error::parse("s-expression", reason);
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn expression(&mut self) -> Result<SExpr> {
        self.skip_whitespace();
        match self.chars.peek() {
            None => return Err(Self::error("unexpected end of input")),
            Some(')') => return Err(Self::error("unbalanced `)`")),
            Some('(') => {
                self.chars.next();
                let mut items = vec![];
                loop {
                    self.skip_whitespace();
                    match self.chars.peek() {
                        None => return Err(Self::error("unterminated list")),
                        Some(')') => {
                            self.chars.next();
                            return Ok(SExpr::List(items));
                        }
                        Some(_) => items.push(self.expression()?),
                    }
                }
            }
            Some('"') => {
                self.chars.next();
                let mut text = String::new();
                loop {
                    match self.chars.next() {
                        None => return Err(Self::error("unterminated string")),
                        Some('"') => return Ok(SExpr::Atom(text)),
                        Some('\\') => {
                            let escaped = self
                                .chars
                                .next()
                                .ok_or_else(|| Self::error("dangling escape"))?;
                            text.push(escaped);
                        }
                        Some(c) => text.push(c),
                    }
                }
            }
            Some(_) => {
                let mut text = String::new();
                while let Some(c) = self
                    .chars
                    .next_if(|c| !c.is_whitespace() && *c != '(' && *c != ')' && *c != '"')
                {
                    text.push(c);
                }
                return Ok(SExpr::Atom(text));
            }
        }
    }
}

impl FromStr for SExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut reader = Reader {
            chars: s.chars().peekable(),
        };
        let expr = reader.expression()?;
        reader.skip_whitespace();
        if reader.chars.peek().is_some() {
            return Err(Reader::error("trailing input"));
        }
        return Ok(expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_roundtrip() {
        let values = [
            ModInt::from_u64(42),
            ModInt::new(BigInt::from_u64(5), BigInt::from_u64(23)),
            ModInt::ZERO,
        ];
        for value in values {
            assert_eq!(ModInt::from_sexpr(&value.to_sexpr()).unwrap(), value);
        }
        assert_eq!(
            ModInt::new(BigInt::from_u64(5), BigInt::from_u64(23))
                .to_sexpr()
                .to_string(),
            "(adder-integer 5 23)"
        );
    }

    #[test]
    fn test_integer_rejects_malformed() {
        for text in [
            "(adder-integer 5)",
            "(adder-int 5 23)",
            "(adder-integer 30 23)",
            "(adder-integer x 23)",
            "adder-integer",
        ] {
            let expr: SExpr = text.parse().unwrap();
            assert!(ModInt::from_sexpr(&expr).is_err(), "{text}");
        }
    }

    #[test]
    fn test_print_and_read() {
        let expr = SExpr::List(vec![
            SExpr::atom("vote-ids"),
            SExpr::List(vec![SExpr::atom("alice"), SExpr::atom("bob smith"), SExpr::atom("")]),
            SExpr::atom("say \"hi\""),
        ]);
        let text = expr.to_string();
        assert_eq!(text, r#"(vote-ids (alice "bob smith" "") "say \"hi\"")"#);
        assert_eq!(text.parse::<SExpr>().unwrap(), expr);
    }

    #[test]
    fn test_reader_rejects_unbalanced() {
        assert!("(a (b)".parse::<SExpr>().is_err());
        assert!("(a))".parse::<SExpr>().is_err());
        assert!(")".parse::<SExpr>().is_err());
        assert!("".parse::<SExpr>().is_err());
    }
}
