//! Lexer and precedence-climbing parser for the surface grammar (§6), producing an
//! [`ast::Formula`] scoped to a caller-supplied [`ContextId`].
//!
//! The lexer recognises every glyph of [`BaseSymbolSet`] directly, except `true`/`false`:
//! those share the identifier alphabet, so (matching `pycolite.parser.lexer.Lexer.t_LITERAL`,
//! which reclassifies an identifier token into a reserved one when its text matches) the
//! identifier regex always wins the lex and a post-lex step reclassifies `"true"`/`"false"`
//! text into their keyword tokens. Every other reserved word (`G`, `F`, `X`, `U`, `R`, `W`)
//! starts with an uppercase letter and the identifier regex only matches a lowercase start,
//! so no other reclassification is needed.

use logos::Logos;
use tracing::warn;

use crate::ast::{BinaryKind, Constant, Formula, UnaryKind};
use crate::error::{ContractError, ContractResult};
use crate::registry::{AttributeRegistry, ContextId};
use crate::types::Type;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
enum RawToken {
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("!")]
    Not,
    #[token("->")]
    Implies,
    #[token("<->")]
    Iff,
    #[token("=")]
    Equality,
    #[token("G")]
    Globally,
    #[token("F")]
    Eventually,
    #[token("X")]
    Next,
    #[token("U")]
    Until,
    #[token("R")]
    Release,
    #[token("W")]
    WeakUntil,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(">=")]
    Geq,
    #[token(">")]
    Ge,
    #[token("<=")]
    Leq,
    #[token("<")]
    Le,
    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[regex(r"[a-z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Number(i64),
}

/// A reclassified, position-tagged token ready for the parser.
#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    And,
    Or,
    Not,
    Implies,
    Iff,
    Equality,
    Globally,
    Eventually,
    Next,
    Until,
    Release,
    WeakUntil,
    LParen,
    RParen,
    Ge,
    Geq,
    Le,
    Leq,
    Add,
    Sub,
    Mul,
    Div,
    True,
    False,
    Literal(String),
    Constant(i64),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Literal(name) => write!(f, "identifier `{name}`"),
            TokenKind::Constant(value) => write!(f, "constant `{value}`"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Lexes `source` into reclassified tokens, logging and dropping any illegal character
/// (the specification treats this as a warning, not a failure).
fn lex(source: &str) -> Vec<TokenKind> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(RawToken::And) => tokens.push(TokenKind::And),
            Ok(RawToken::Or) => tokens.push(TokenKind::Or),
            Ok(RawToken::Not) => tokens.push(TokenKind::Not),
            Ok(RawToken::Implies) => tokens.push(TokenKind::Implies),
            Ok(RawToken::Iff) => tokens.push(TokenKind::Iff),
            Ok(RawToken::Equality) => tokens.push(TokenKind::Equality),
            Ok(RawToken::Globally) => tokens.push(TokenKind::Globally),
            Ok(RawToken::Eventually) => tokens.push(TokenKind::Eventually),
            Ok(RawToken::Next) => tokens.push(TokenKind::Next),
            Ok(RawToken::Until) => tokens.push(TokenKind::Until),
            Ok(RawToken::Release) => tokens.push(TokenKind::Release),
            Ok(RawToken::WeakUntil) => tokens.push(TokenKind::WeakUntil),
            Ok(RawToken::LParen) => tokens.push(TokenKind::LParen),
            Ok(RawToken::RParen) => tokens.push(TokenKind::RParen),
            Ok(RawToken::Geq) => tokens.push(TokenKind::Geq),
            Ok(RawToken::Ge) => tokens.push(TokenKind::Ge),
            Ok(RawToken::Leq) => tokens.push(TokenKind::Leq),
            Ok(RawToken::Le) => tokens.push(TokenKind::Le),
            Ok(RawToken::Add) => tokens.push(TokenKind::Add),
            Ok(RawToken::Sub) => tokens.push(TokenKind::Sub),
            Ok(RawToken::Mul) => tokens.push(TokenKind::Mul),
            Ok(RawToken::Div) => tokens.push(TokenKind::Div),
            Ok(RawToken::Number(value)) => tokens.push(TokenKind::Constant(value)),
            Ok(RawToken::Ident(text)) => tokens.push(match text.as_str() {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Literal(text),
            }),
            Err(()) => {
                warn!(slice = lexer.slice(), "ignoring illegal character");
            }
        }
    }
    tokens
}

/// Recursive-descent, precedence-climbing parser over [`TokenKind`], following the
/// specification's precedence table (§3) tier by tier from weakest to strongest.
pub struct Parser<'a> {
    tokens: Vec<TokenKind>,
    position: usize,
    registry: &'a AttributeRegistry,
    context: ContextId,
}

impl<'a> Parser<'a> {
    pub fn new(registry: &'a AttributeRegistry, context: ContextId) -> Self {
        Parser {
            tokens: Vec::new(),
            position: 0,
            registry,
            context,
        }
    }

    /// Parses `source` into a [`Formula`] scoped to this parser's context.
    pub fn parse(&mut self, source: &str) -> ContractResult<Formula> {
        self.tokens = lex(source);
        self.position = 0;
        let formula = self.parse_implication()?;
        if let Some(token) = self.peek() {
            return Err(ContractError::parse(token.to_string()));
        }
        Ok(formula)
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &TokenKind) -> ContractResult<()> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(ContractError::parse(token.to_string())),
            None => Err(ContractError::parse("end of input".to_string())),
        }
    }

    /// Tier 0 (weakest): `->`, left-associative.
    fn parse_implication(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_and_or()?;
        while matches!(self.peek(), Some(TokenKind::Implies)) {
            self.advance();
            let right = self.parse_and_or()?;
            left = Formula::binary(BinaryKind::Implies, left, right, true);
        }
        Ok(left)
    }

    /// Tier 1: `&`, `|`, left-associative, sharing one precedence tier.
    fn parse_and_or(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_until_release()?;
        while matches!(self.peek(), Some(TokenKind::And) | Some(TokenKind::Or)) {
            let kind = match self.advance().unwrap() {
                TokenKind::And => BinaryKind::And,
                TokenKind::Or => BinaryKind::Or,
                _ => unreachable!(),
            };
            let right = self.parse_until_release()?;
            left = Formula::binary(kind, left, right, true);
        }
        Ok(left)
    }

    /// Tier 2: `U`, `R`, `W`, left-associative. Only `U` has a construction; `R`/`W`
    /// are recognised tokens whose production is not implemented (§9 open question).
    fn parse_until_release(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_temporal_unary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Until) => {
                    self.advance();
                    let right = self.parse_temporal_unary()?;
                    left = Formula::binary(BinaryKind::Until, left, right, true);
                }
                Some(TokenKind::Release) => {
                    return Err(ContractError::NotImplemented {
                        feature: "release operator",
                    });
                }
                Some(TokenKind::WeakUntil) => {
                    return Err(ContractError::NotImplemented {
                        feature: "weak-until operator",
                    });
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// Tier 3/7: the unary prefix operators `G`, `F`, `X`, `!`. Right-associative, so each
    /// recurses into itself before falling through to the comparison tier.
    fn parse_temporal_unary(&mut self) -> ContractResult<Formula> {
        match self.peek() {
            Some(TokenKind::Globally) => {
                self.advance();
                Ok(Formula::globally(self.parse_temporal_unary()?))
            }
            Some(TokenKind::Eventually) => {
                self.advance();
                Ok(Formula::eventually(self.parse_temporal_unary()?))
            }
            Some(TokenKind::Next) => {
                self.advance();
                Ok(Formula::next(self.parse_temporal_unary()?))
            }
            Some(TokenKind::Not) => {
                self.advance();
                Ok(Formula::not(self.parse_temporal_unary()?))
            }
            _ => self.parse_comparison(),
        }
    }

    /// Tier 4: `>`, `>=`, `<`, `<=`, `=`, `<->`, left-associative, sharing one precedence
    /// tier (matching [`crate::symbols::OpKind::precedence`], which places
    /// `DoubleImplication` alongside the comparisons rather than with `Implication`).
    fn parse_comparison(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_additive()?;
        loop {
            let kind = match self.peek() {
                Some(TokenKind::Ge) => BinaryKind::Ge,
                Some(TokenKind::Geq) => BinaryKind::Geq,
                Some(TokenKind::Le) => BinaryKind::Le,
                Some(TokenKind::Leq) => BinaryKind::Leq,
                Some(TokenKind::Equality) => BinaryKind::Equality,
                Some(TokenKind::Iff) => BinaryKind::Iff,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Formula::binary(kind, left, right, true);
        }
        Ok(left)
    }

    /// Tier 5: `+`, `-`, left-associative.
    fn parse_additive(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let kind = match self.peek() {
                Some(TokenKind::Add) => BinaryKind::Add,
                Some(TokenKind::Sub) => BinaryKind::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Formula::binary(kind, left, right, true);
        }
        Ok(left)
    }

    /// Tier 6: `*`, `/`, left-associative.
    fn parse_multiplicative(&mut self) -> ContractResult<Formula> {
        let mut left = self.parse_unary_minus()?;
        loop {
            let kind = match self.peek() {
                Some(TokenKind::Mul) => BinaryKind::Mul,
                Some(TokenKind::Div) => BinaryKind::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_minus()?;
            left = Formula::binary(kind, left, right, true);
        }
        Ok(left)
    }

    /// `unary := integer | '-' integer | identifier | '-' identifier`: a leading `-` on an
    /// atom negates a constant in place rather than building a `Sub` node.
    fn parse_unary_minus(&mut self) -> ContractResult<Formula> {
        if matches!(self.peek(), Some(TokenKind::Sub)) {
            self.advance();
            return match self.advance() {
                Some(TokenKind::Constant(value)) => {
                    Ok(Formula::Constant(Constant::Int(-value)))
                }
                Some(TokenKind::Literal(name)) => {
                    let formula = self.literal_formula(&name);
                    Ok(Formula::unary(UnaryKind::Not, formula))
                }
                Some(token) => Err(ContractError::parse(token.to_string())),
                None => Err(ContractError::parse("end of input".to_string())),
            };
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> ContractResult<Formula> {
        match self.advance() {
            Some(TokenKind::True) => Ok(Formula::True),
            Some(TokenKind::False) => Ok(Formula::False),
            Some(TokenKind::Constant(value)) => Ok(Formula::Constant(Constant::Int(value))),
            Some(TokenKind::Literal(name)) => Ok(self.literal_formula(&name)),
            Some(TokenKind::LParen) => {
                let inner = self.parse_implication()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(ContractError::parse(token.to_string())),
            None => Err(ContractError::parse("end of input".to_string())),
        }
    }

    fn literal_formula(&self, name: &str) -> Formula {
        Formula::literal(crate::ast::Literal::new(
            self.registry,
            self.context,
            name,
            Type::bool(),
        ))
    }
}

/// Parses `source` against a fresh context drawn from `registry`.
pub fn parse(registry: &AttributeRegistry, source: &str) -> ContractResult<Formula> {
    let context = registry.new_context();
    Parser::new(registry, context).parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::BaseSymbolSet;

    fn parse_ok(source: &str) -> (Formula, AttributeRegistry) {
        let registry = AttributeRegistry::new();
        let formula = parse(&registry, source).expect("parse should succeed");
        (formula, registry)
    }

    #[test]
    fn parses_precedence_without_parens() {
        let (formula, _registry) = parse_ok("a & b | c");
        let text = crate::printer::print(
            &formula,
            &BaseSymbolSet,
            crate::printer::PrintOptions::default(),
        );
        assert_eq!(text, "a_0 & b_0 | c_0");
    }

    #[test]
    fn parses_parenthesised_grouping() {
        let (formula, _registry) = parse_ok("(a | b) & c");
        let text = crate::printer::print(
            &formula,
            &BaseSymbolSet,
            crate::printer::PrintOptions::default(),
        );
        assert_eq!(text, "a_0 | b_0 & c_0");
    }

    #[test]
    fn parses_globally_and_until() {
        let (formula, _registry) = parse_ok("G (a U b)");
        assert!(matches!(formula, Formula::Unary(UnaryKind::Globally, _)));
    }

    #[test]
    fn true_false_are_reclassified_not_literals() {
        let (formula, _registry) = parse_ok("true & false");
        assert!(matches!(formula, Formula::Binary(BinaryKind::And, _, _)));
    }

    #[test]
    fn release_is_not_implemented() {
        let registry = AttributeRegistry::new();
        let err = parse(&registry, "a R b").unwrap_err();
        assert!(matches!(err, ContractError::NotImplemented { .. }));
    }

    #[test]
    fn unexpected_token_is_a_parse_error() {
        let registry = AttributeRegistry::new();
        let err = parse(&registry, "a &").unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }

    #[test]
    fn illegal_character_is_dropped_with_a_warning() {
        let (formula, _registry) = parse_ok("a & ~ b");
        let text = crate::printer::print(
            &formula,
            &BaseSymbolSet,
            crate::printer::PrintOptions::default(),
        );
        assert_eq!(text, "a_0 & b_0");
    }

    #[test]
    fn iff_binds_at_the_comparison_tier_not_with_implies() {
        let (formula, _registry) = parse_ok("a & b <-> c");
        match formula {
            Formula::Binary(BinaryKind::Iff, left, _) => {
                assert!(matches!(*left, Formula::Binary(BinaryKind::And, _, _)));
            }
            other => panic!("expected a top-level Iff, got {other:?}"),
        }
    }
}
