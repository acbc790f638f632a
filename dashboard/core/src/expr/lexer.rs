use super::CompileError;
use std::{iter::Peekable, str::CharIndices};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Token {
    Str(String),
    Ident(String),
    True,
    False,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

type Chars<'s> = Peekable<CharIndices<'s>>;

/// Splits an expression into tokens, terminated by [`Token::Eof`].
pub(super) fn tokenize(source: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut chars = source.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '"' | '\'' => consume_string(&mut chars)?,
            c if c.is_ascii_alphabetic() || c == '_' => {
                let ident = consume_identifier(&mut chars);
                match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "in" => Token::In,
                    _ => Token::Ident(ident),
                }
            }
            _ => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    '=' => expect_next(&mut chars, '=', Token::Eq, offset)?,
                    '&' => expect_next(&mut chars, '&', Token::And, offset)?,
                    '|' => expect_next(&mut chars, '|', Token::Or, offset)?,
                    '!' => {
                        if chars.next_if(|&(_, c)| c == '=').is_some() {
                            Token::Ne
                        } else {
                            Token::Not
                        }
                    }
                    c => return Err(CompileError::new(offset, format!("unexpected {c:?}"))),
                }
            }
        };
        tokens.push(Spanned { token, offset });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

fn expect_next(
    chars: &mut Chars<'_>,
    expected: char,
    token: Token,
    offset: usize,
) -> Result<Token, CompileError> {
    match chars.next_if(|&(_, c)| c == expected) {
        Some(_) => Ok(token),
        None => Err(CompileError::new(
            offset,
            format!("expected {expected:?} to follow {expected:?}"),
        )),
    }
}

fn consume_identifier(chars: &mut Chars<'_>) -> String {
    let mut ident = String::new();
    while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_') {
        ident.push(c);
    }
    ident
}

/// Consumes a single- or double-quoted string literal, including its quotes.
fn consume_string(chars: &mut Chars<'_>) -> Result<Token, CompileError> {
    let Some((start, quote)) = chars.next() else {
        return Err(CompileError::new(0, "expected a string"));
    };

    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(CompileError::new(start, "unterminated string")),
            Some((_, c)) if c == quote => return Ok(Token::Str(value)),
            Some((offset, '\\')) => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, c @ ('\\' | '"' | '\''))) => c,
                    Some((_, c)) => {
                        return Err(CompileError::new(offset, format!("invalid escape \\{c}")))
                    }
                    None => return Err(CompileError::new(start, "unterminated string")),
                };
                value.push(escaped);
            }
            Some((_, c)) => value.push(c),
        }
    }
}
