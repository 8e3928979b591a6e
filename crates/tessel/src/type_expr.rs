//! Textual type expressions used in program files.
//!
//! ```text
//! union  := inter ('|' inter)*
//! inter  := prefix ('&' prefix)*
//! prefix := ('mutable' | 'const' | 'readonly' | 'var' | '&' | '*') prefix | primary
//! primary := IDENT ('<' union (',' union)* '>')? | '(' union ')'
//! ```

use tessel_syntax::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named { name: String, args: Vec<TypeExpr> },
    Mutable(Box<TypeExpr>),
    Const(Box<TypeExpr>),
    ReadOnly(Box<TypeExpr>),
    Reassignable(Box<TypeExpr>),
    Reference(Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeExprError {
    #[error("unexpected {found:?} in type expression, expected {expected}")]
    Unexpected {
        expected: &'static str,
        found: char,
        span: Span,
    },
    #[error("type expression ended early, expected {expected}")]
    UnexpectedEnd { expected: &'static str, span: Span },
}

impl TypeExprError {
    pub fn span(&self) -> Span {
        match self {
            TypeExprError::Unexpected { span, .. } => *span,
            TypeExprError::UnexpectedEnd { span, .. } => *span,
        }
    }
}

pub fn parse(source: &str) -> Result<TypeExpr, TypeExprError> {
    let mut parser = ExprParser { source, pos: 0 };
    let expr = parser.parse_union()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(expr),
        Some(found) => Err(parser.unexpected("end of type", found)),
    }
}

struct ExprParser<'src> {
    source: &'src str,
    pos: usize,
}

impl<'src> ExprParser<'src> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Consume `c` if it is the next non-blank character.
    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), TypeExprError> {
        if self.eat(c) {
            return Ok(());
        }
        match self.peek() {
            Some(found) => Err(self.unexpected(expected, found)),
            None => Err(self.end(expected)),
        }
    }

    fn unexpected(&self, expected: &'static str, found: char) -> TypeExprError {
        TypeExprError::Unexpected {
            expected,
            found,
            span: Span::new(self.pos, self.pos + found.len_utf8(), 0),
        }
    }

    fn end(&self, expected: &'static str) -> TypeExprError {
        TypeExprError::UnexpectedEnd {
            expected,
            span: Span::new(self.pos, self.pos, 0),
        }
    }

    fn parse_union(&mut self) -> Result<TypeExpr, TypeExprError> {
        let mut members = vec![self.parse_intersection()?];
        while self.eat('|') {
            members.push(self.parse_intersection()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Union(members)
        })
    }

    fn parse_intersection(&mut self) -> Result<TypeExpr, TypeExprError> {
        let mut members = vec![self.parse_prefix()?];
        while self.eat('&') {
            members.push(self.parse_prefix()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Intersection(members)
        })
    }

    fn parse_prefix(&mut self) -> Result<TypeExpr, TypeExprError> {
        if self.eat('&') {
            return Ok(TypeExpr::Reference(Box::new(self.parse_prefix()?)));
        }
        if self.eat('*') {
            return Ok(TypeExpr::Pointer(Box::new(self.parse_prefix()?)));
        }
        if self.eat('(') {
            let inner = self.parse_union()?;
            self.expect(')', "')'")?;
            return Ok(inner);
        }

        let name = self.parse_identifier()?;
        let wrap: Option<fn(Box<TypeExpr>) -> TypeExpr> = match name.as_str() {
            "mutable" => Some(TypeExpr::Mutable),
            "const" => Some(TypeExpr::Const),
            "readonly" => Some(TypeExpr::ReadOnly),
            "var" => Some(TypeExpr::Reassignable),
            _ => None,
        };
        if let Some(wrap) = wrap {
            return Ok(wrap(Box::new(self.parse_prefix()?)));
        }

        let mut args = Vec::new();
        if self.eat('<') {
            args.push(self.parse_union()?);
            while self.eat(',') {
                args.push(self.parse_union()?);
            }
            self.expect('>', "'>' or ','")?;
        }
        Ok(TypeExpr::Named { name, args })
    }

    fn parse_identifier(&mut self) -> Result<String, TypeExprError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '?' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return match self.peek() {
                Some(found) => Err(self.unexpected("a type name", found)),
                None => Err(self.end("a type name")),
            };
        }
        Ok(self.source[start..self.pos].to_string())
    }
}
