//! Precedence-aware pretty printer (§4.4): renders a [`Formula`] into a chosen
//! [`SymbolSet`]'s concrete syntax, adding only the parentheses the precedence table
//! requires unless `ignore_precedence` is set.

use crate::ast::{Constant, Formula, UnaryKind};
use crate::symbols::SymbolSet;

/// Rendering options for [`print`].
#[derive(Clone, Copy)]
pub struct PrintOptions {
    /// Fully parenthesise every operand regardless of precedence. Used when emitting to
    /// model-checker front ends with less lenient parsers.
    pub ignore_precedence: bool,
    /// Print each literal's `base_name` instead of its unique name. User-facing
    /// diagnostics only; never safe to reparse, since base names collide across scopes.
    pub with_base_names: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            ignore_precedence: false,
            with_base_names: false,
        }
    }
}

/// `+∞` for precedence comparisons: a node outside the table never needs protecting.
fn index_of(precedence: Option<u8>) -> i32 {
    precedence.map(i32::from).unwrap_or(i32::MAX)
}

fn parenthesise(symbols: &dyn SymbolSet, text: String) -> String {
    format!("{}{}{}", symbols.lparen(), text, symbols.rparen())
}

pub fn print(formula: &Formula, symbols: &dyn SymbolSet, options: PrintOptions) -> String {
    match formula {
        Formula::True => symbols.true_().to_string(),
        Formula::False => symbols.false_().to_string(),
        Formula::Constant(Constant::Int(value)) => value.to_string(),
        Formula::Constant(Constant::Float(value)) => value.to_string(),
        Formula::Literal(literal) => {
            if options.with_base_names {
                literal.base_name()
            } else {
                literal.unique_name()
            }
        }
        Formula::Unary(kind, operand) => print_unary(*kind, operand, symbols, options),
        Formula::Binary(kind, left, right) => {
            print_binary(kind.op_kind(), left, right, symbols, options)
        }
    }
}

fn print_unary(
    kind: UnaryKind,
    operand: &Formula,
    symbols: &dyn SymbolSet,
    options: PrintOptions,
) -> String {
    let op = kind.op_kind();
    let op_index = op
        .precedence()
        .expect("unary operator kinds are always present in the precedence table");

    let operand_text = print(operand, symbols, options);
    let needs_parens = options.ignore_precedence || index_of(operand.precedence()) < op_index as i32;
    let operand_text = if needs_parens {
        parenthesise(symbols, operand_text)
    } else {
        operand_text
    };

    format!("{} {}", symbols.symbol(op), operand_text)
}

fn print_binary(
    op: crate::symbols::OpKind,
    left: &Formula,
    right: &Formula,
    symbols: &dyn SymbolSet,
    options: PrintOptions,
) -> String {
    let left_text = print(left, symbols, options);
    let right_text = print(right, symbols, options);

    let (paren_left, paren_right) = if options.ignore_precedence {
        (true, true)
    } else {
        let current = index_of(op.precedence());
        let left_index = index_of(left.precedence());
        let right_index = index_of(right.precedence());
        if op.right_associative() {
            (left_index <= current, right_index < current)
        } else {
            (left_index < current, right_index <= current)
        }
    };

    let left_text = if paren_left {
        parenthesise(symbols, left_text)
    } else {
        left_text
    };
    let right_text = if paren_right {
        parenthesise(symbols, right_text)
    } else {
        right_text
    };

    format!("{} {} {}", left_text, symbols.symbol(op), right_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryKind, Literal};
    use crate::registry::AttributeRegistry;
    use crate::symbols::BaseSymbolSet;
    use crate::types::Type;

    fn lit(registry: &AttributeRegistry, ctx: crate::registry::ContextId, base: &str) -> Formula {
        Formula::literal(Literal::new(registry, ctx, base, Type::bool()))
    }

    #[test]
    fn and_or_precedence_i4() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let b = lit(&registry, ctx, "b");
        let c = lit(&registry, ctx, "c");

        let f = Formula::binary(
            BinaryKind::And,
            Formula::binary(BinaryKind::Or, a, b, false),
            c,
            false,
        );
        let text = print(&f, &BaseSymbolSet, PrintOptions::default());
        assert_eq!(text, "a_0 | b_0 & c_0");
    }

    #[test]
    fn or_and_precedence_i4() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let b = lit(&registry, ctx, "b");
        let c = lit(&registry, ctx, "c");

        let f = Formula::binary(
            BinaryKind::Or,
            Formula::binary(BinaryKind::And, a, b, false),
            c,
            false,
        );
        let text = print(&f, &BaseSymbolSet, PrintOptions::default());
        assert_eq!(text, "a_0 & b_0 | c_0");
    }

    #[test]
    fn globally_and_i4() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let b = lit(&registry, ctx, "b");

        let f = Formula::globally(Formula::binary(BinaryKind::And, a, b, false));
        let text = print(&f, &BaseSymbolSet, PrintOptions::default());
        assert_eq!(text, "G (a_0 & b_0)");
    }

    #[test]
    fn ignore_precedence_fully_parenthesises() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let b = lit(&registry, ctx, "b");

        let f = Formula::binary(BinaryKind::And, a, b, false);
        let text = print(
            &f,
            &BaseSymbolSet,
            PrintOptions {
                ignore_precedence: true,
                with_base_names: false,
            },
        );
        assert_eq!(text, "(a_0) & (b_0)");
    }

    #[test]
    fn with_base_names_prints_base_not_unique_name() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let _a2 = lit(&registry, ctx, "a");

        let text = print(
            &a,
            &BaseSymbolSet,
            PrintOptions {
                ignore_precedence: false,
                with_base_names: true,
            },
        );
        assert_eq!(text, "a");
    }
}
