use super::{
    lexer::{self, Spanned, Token},
    CompileError,
};
use regex::Regex;
use std::fmt;

/// A compiled, type-checked expression.
#[derive(Clone, Debug)]
pub struct Program {
    pub(super) root: Node,
}

#[derive(Clone, Debug)]
pub(super) enum Node {
    Bool(bool),
    Str(String),
    List(Vec<Node>),
    Var(Var),
    Index { map: Box<Node>, key: Box<Node> },
    In { needle: Box<Node>, haystack: Box<Node> },
    Eq { lhs: Box<Node>, rhs: Box<Node> },
    Ne { lhs: Box<Node>, rhs: Box<Node> },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Method { target: Box<Node>, method: Method },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Var {
    Name,
    Namespace,
    Annotations,
}

#[derive(Clone, Debug)]
pub(super) enum Method {
    StartsWith(Box<Node>),
    EndsWith(Box<Node>),
    Contains(Box<Node>),
    Matches(Regex),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Ty {
    Bool,
    String,
    List,
    Map,
}

/// A node annotated with its type and the offset at which it starts.
struct Typed {
    node: Node,
    ty: Ty,
    offset: usize,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

pub(super) fn compile(source: &str) -> Result<Program, CompileError> {
    let mut parser = Parser {
        tokens: lexer::tokenize(source)?,
        pos: 0,
    };

    let expr = parser.or()?;
    let next = parser.peek();
    if next.token != Token::Eof {
        return Err(CompileError::new(next.offset, "expected end of expression"));
    }
    if expr.ty != Ty::Bool {
        return Err(CompileError::new(
            0,
            format!("expression must evaluate to a bool, not a {}", expr.ty),
        ));
    }

    Ok(Program { root: expr.node })
}

// === impl Parser ===

impl Parser {
    fn peek(&self) -> &Spanned {
        // The token stream always ends with `Eof`, which is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let next = self.peek().clone();
        if next.token != Token::Eof {
            self.pos += 1;
        }
        next
    }

    fn eat(&mut self, token: &Token) -> Option<usize> {
        let next = self.peek();
        if next.token == *token {
            let offset = next.offset;
            self.pos += 1;
            return Some(offset);
        }
        None
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<usize, CompileError> {
        match self.eat(token) {
            Some(offset) => Ok(offset),
            None => Err(CompileError::new(
                self.peek().offset,
                format!("expected {what}"),
            )),
        }
    }

    fn or(&mut self) -> Result<Typed, CompileError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or).is_some() {
            let rhs = self.and()?;
            let offset = lhs.offset;
            lhs = Typed {
                node: Node::Or(expect_bool(lhs)?, expect_bool(rhs)?),
                ty: Ty::Bool,
                offset,
            };
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Typed, CompileError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::And).is_some() {
            let rhs = self.comparison()?;
            let offset = lhs.offset;
            lhs = Typed {
                node: Node::And(expect_bool(lhs)?, expect_bool(rhs)?),
                ty: Ty::Bool,
                offset,
            };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Typed, CompileError> {
        let lhs = self.unary()?;
        let op = self.peek().clone();
        let offset = lhs.offset;
        let node = match op.token {
            Token::Eq | Token::Ne => {
                self.advance();
                let rhs = self.unary()?;
                if lhs.ty != rhs.ty {
                    return Err(CompileError::new(
                        op.offset,
                        format!("cannot compare a {} with a {}", lhs.ty, rhs.ty),
                    ));
                }
                if !matches!(lhs.ty, Ty::Bool | Ty::String) {
                    return Err(CompileError::new(
                        op.offset,
                        format!("cannot compare {} values", lhs.ty),
                    ));
                }
                let (lhs, rhs) = (Box::new(lhs.node), Box::new(rhs.node));
                if op.token == Token::Eq {
                    Node::Eq { lhs, rhs }
                } else {
                    Node::Ne { lhs, rhs }
                }
            }
            Token::In => {
                self.advance();
                let rhs = self.unary()?;
                if lhs.ty != Ty::String || !matches!(rhs.ty, Ty::Map | Ty::List) {
                    return Err(CompileError::new(
                        op.offset,
                        format!(
                            "`in` requires a string and a map or list, not a {} and a {}",
                            lhs.ty, rhs.ty
                        ),
                    ));
                }
                Node::In {
                    needle: Box::new(lhs.node),
                    haystack: Box::new(rhs.node),
                }
            }
            _ => return Ok(lhs),
        };

        Ok(Typed {
            node,
            ty: Ty::Bool,
            offset,
        })
    }

    fn unary(&mut self) -> Result<Typed, CompileError> {
        if let Some(offset) = self.eat(&Token::Not) {
            let inner = self.unary()?;
            return Ok(Typed {
                node: Node::Not(expect_bool(inner)?),
                ty: Ty::Bool,
                offset,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Typed, CompileError> {
        let mut target = self.primary()?;
        loop {
            if let Some(offset) = self.eat(&Token::LBracket) {
                if target.ty != Ty::Map {
                    return Err(CompileError::new(
                        offset,
                        format!("cannot index a {}", target.ty),
                    ));
                }
                let key = self.or()?;
                let key = expect_string(key)?;
                self.expect(&Token::RBracket, "']'")?;
                target = Typed {
                    node: Node::Index {
                        map: Box::new(target.node),
                        key,
                    },
                    ty: Ty::String,
                    offset: target.offset,
                };
            } else if let Some(offset) = self.eat(&Token::Dot) {
                if target.ty != Ty::String {
                    return Err(CompileError::new(
                        offset,
                        format!("{} values have no methods", target.ty),
                    ));
                }
                let method = self.method()?;
                target = Typed {
                    node: Node::Method {
                        target: Box::new(target.node),
                        method,
                    },
                    ty: Ty::Bool,
                    offset: target.offset,
                };
            } else {
                return Ok(target);
            }
        }
    }

    /// Parses a method call on a string, following the `.`.
    fn method(&mut self) -> Result<Method, CompileError> {
        let Spanned { token, offset } = self.advance();
        let Token::Ident(name) = token else {
            return Err(CompileError::new(offset, "expected a method name"));
        };
        self.expect(&Token::LParen, "'('")?;

        let method = match name.as_str() {
            "startsWith" => Method::StartsWith(expect_string(self.or()?)?),
            "endsWith" => Method::EndsWith(expect_string(self.or()?)?),
            "contains" => Method::Contains(expect_string(self.or()?)?),
            "matches" => {
                let Spanned { token, offset } = self.advance();
                let Token::Str(pattern) = token else {
                    return Err(CompileError::new(
                        offset,
                        "matches() requires a string literal",
                    ));
                };
                let re = Regex::new(&pattern)
                    .map_err(|e| CompileError::new(offset, format!("invalid regex: {e}")))?;
                Method::Matches(re)
            }
            _ => {
                return Err(CompileError::new(
                    offset,
                    format!("unknown method {name:?}"),
                ))
            }
        };

        self.expect(&Token::RParen, "')'")?;
        Ok(method)
    }

    fn primary(&mut self) -> Result<Typed, CompileError> {
        let Spanned { token, offset } = self.advance();
        let (node, ty) = match token {
            Token::True => (Node::Bool(true), Ty::Bool),
            Token::False => (Node::Bool(false), Ty::Bool),
            Token::Str(s) => (Node::Str(s), Ty::String),
            Token::Ident(ident) => match ident.as_str() {
                "name" => (Node::Var(Var::Name), Ty::String),
                "namespace" => (Node::Var(Var::Namespace), Ty::String),
                "annotations" => (Node::Var(Var::Annotations), Ty::Map),
                _ => {
                    return Err(CompileError::new(
                        offset,
                        format!("unknown variable {ident:?}"),
                    ))
                }
            },
            Token::LParen => {
                let inner = self.or()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(Typed { offset, ..inner });
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if self.eat(&Token::RBracket).is_none() {
                    loop {
                        items.push(*expect_string(self.or()?)?);
                        if self.eat(&Token::Comma).is_none() {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket, "']'")?;
                }
                (Node::List(items), Ty::List)
            }
            Token::Eof => return Err(CompileError::new(offset, "unexpected end of expression")),
            token => return Err(CompileError::new(offset, format!("unexpected {token:?}"))),
        };

        Ok(Typed { node, ty, offset })
    }
}

fn expect_bool(typed: Typed) -> Result<Box<Node>, CompileError> {
    expect_ty(typed, Ty::Bool)
}

fn expect_string(typed: Typed) -> Result<Box<Node>, CompileError> {
    expect_ty(typed, Ty::String)
}

fn expect_ty(typed: Typed, ty: Ty) -> Result<Box<Node>, CompileError> {
    if typed.ty != ty {
        return Err(CompileError::new(
            typed.offset,
            format!("expected a {ty}, found a {}", typed.ty),
        ));
    }
    Ok(Box::new(typed.node))
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
        })
    }
}
