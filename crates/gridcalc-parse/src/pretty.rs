//! AST → formula text with canonical spelling: upper-case references,
//! no whitespace, and only the parentheses precedence requires. Function
//! names are kept as written since lookup is case-sensitive.

use gridcalc_common::Value;

use crate::parser::{ASTNode, ASTNodeType, ParserError, parse_with_locale};
use crate::tokenizer::operator_precedence;
use crate::Locale;

const PREFIX_PRECEDENCE: u8 = 7;

/// Render `ast` as formula text, including the leading `=`.
pub fn pretty_print(ast: &ASTNode, locale: &Locale) -> String {
    let mut out = String::from("=");
    write_node(ast, locale, &mut out);
    out
}

/// Parse and re-render `formula`.
pub fn canonical_formula(formula: &str, locale: &Locale) -> Result<String, ParserError> {
    let ast = parse_with_locale(formula, *locale)?;
    Ok(pretty_print(&ast, locale))
}

fn binary_precedence(node: &ASTNode) -> Option<u8> {
    match &node.node_type {
        ASTNodeType::BinaryOp { op, .. } => operator_precedence(op).map(|(p, _)| p),
        _ => None,
    }
}

fn is_prefix(node: &ASTNode) -> bool {
    matches!(&node.node_type, ASTNodeType::UnaryOp { op, .. } if op != "%")
}

fn write_wrapped(node: &ASTNode, wrap: bool, locale: &Locale, out: &mut String) {
    if wrap {
        out.push('(');
        write_node(node, locale, out);
        out.push(')');
    } else {
        write_node(node, locale, out);
    }
}

fn write_node(node: &ASTNode, locale: &Locale, out: &mut String) {
    match &node.node_type {
        ASTNodeType::Literal(value) => write_literal(value, locale, out),
        ASTNodeType::Reference { reference, .. } => out.push_str(&reference.to_string()),
        ASTNodeType::UnaryOp { op, expr } if op == "%" => {
            let wrap = binary_precedence(expr).is_some() || is_prefix(expr);
            write_wrapped(expr, wrap, locale, out);
            out.push('%');
        }
        ASTNodeType::UnaryOp { op, expr } => {
            out.push_str(op);
            let wrap = binary_precedence(expr).is_some_and(|p| p < PREFIX_PRECEDENCE);
            write_wrapped(expr, wrap, locale, out);
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            let prec = operator_precedence(op).map(|(p, _)| p).unwrap_or(0);
            let wrap_left = binary_precedence(left).is_some_and(|p| p < prec);
            let wrap_right = binary_precedence(right).is_some_and(|p| p <= prec);
            write_wrapped(left, wrap_left, locale, out);
            out.push_str(op);
            write_wrapped(right, wrap_right, locale, out);
        }
        ASTNodeType::Function { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(locale.argument_separator);
                }
                write_node(arg, locale, out);
            }
            out.push(')');
        }
    }
}

fn write_literal(value: &Value, locale: &Locale, out: &mut String) {
    match value {
        Value::Text(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\"\""));
            out.push('"');
        }
        other => out.push_str(&other.to_source_text(locale.decimal_separator)),
    }
}
