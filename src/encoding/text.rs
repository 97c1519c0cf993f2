//! Tokenizer for the compact canonical text forms such as `p23G4H9`.
//!
//! Single-letter tags double as delimiters: splitting on them yields the tags themselves as
//! one-character tokens interleaved with the decimal values between them. Empty runs are
//! skipped, so `pp` yields two `p` tokens and no empty value.
use crate::{
    arithmetics::ModInt,
    error::{Error, Result},
    BigInt,
};

pub struct Tokenizer<'a> {
    input: &'a str,
    delimiters: &'static str,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, delimiters: &'static str) -> Self {
        return Self {
            input,
            delimiters,
            position: 0,
        };
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = &self.input[self.position..];
        let first = rest.chars().next()?;
        if self.delimiters.contains(first) {
            self.position += first.len_utf8();
            return Some(&rest[..first.len_utf8()]);
        }
        let end = rest
            .find(|c: char| self.delimiters.contains(c))
            .unwrap_or(rest.len());
        self.position += end;
        return Some(&rest[..end]);
    }
}

/// Sequential reader over the tokens of one encoded value
pub(crate) struct TokenStream<'a> {
    kind: &'static str,
    tokens: Vec<&'a str>,
    next: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(input: &'a str, delimiters: &'static str, kind: &'static str) -> Self {
        return Self {
            kind,
            tokens: Tokenizer::new(input, delimiters).collect(),
            next: 0,
        };
    }

    pub fn len(&self) -> usize {
        return self.tokens.len();
    }

    pub fn error(&self, reason: impl Into<String>) -> Error {
        return Error::parse(self.kind, reason);
    }

    fn take(&mut self) -> Result<&'a str> {
        let token = self
            .tokens
            .get(self.next)
            .copied()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.next += 1;
        return Ok(token);
    }

    pub fn expect_tag(&mut self, tag: &str) -> Result<()> {
        let token = self.take()?;
        if token != tag {
            return Err(self.error(format!("expected token `{tag}`, found `{token}`")));
        }
        return Ok(());
    }

    /// A decimal value reduced under `modulus`
    pub fn integer(&mut self, modulus: &BigInt) -> Result<ModInt> {
        let token = self.take()?;
        return ModInt::parse(token, modulus).map_err(|_| {
            self.error(format!("`{token}` is not a decimal integer"))
        });
    }

    /// A tag followed by its value
    pub fn tagged(&mut self, tag: &str, modulus: &BigInt) -> Result<ModInt> {
        self.expect_tag(tag)?;
        return self.integer(modulus);
    }

    pub fn finish(&self) -> Result<()> {
        if self.next != self.tokens.len() {
            return Err(self.error("too many tokens"));
        }
        return Ok(());
    }
}

/// Split a space separated sequence of encodings, ignoring repeated spaces
pub(crate) fn words(input: &str) -> impl Iterator<Item = &str> {
    return input.split(' ').filter(|word| !word.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_returns_delimiters() {
        let tokens: Vec<&str> = Tokenizer::new("p23G4H9", "pGH").collect();
        assert_eq!(tokens, vec!["p", "23", "G", "4", "H", "9"]);
    }

    #[test]
    fn test_tokenizer_skips_empty_runs() {
        let tokens: Vec<&str> = Tokenizer::new("pp1", "p").collect();
        assert_eq!(tokens, vec!["p", "p", "1"]);
        assert_eq!(Tokenizer::new("", "p").count(), 0);
    }

    #[test]
    fn test_stream_checks_tags_and_trailing_tokens() {
        let mut stream = TokenStream::new("x5y6", "xy", "pair");
        assert_eq!(
            stream.tagged("x", &BigInt::ZERO).unwrap(),
            ModInt::from_u64(5)
        );
        assert!(stream.finish().is_err());
        assert!(stream.tagged("x", &BigInt::ZERO).is_err());
    }
}
