use crate::tokenizer::{Associativity, Token, TokenSubType, TokenType, TokenizerError};
use crate::{Locale, ReferenceType, Tokenizer};

use gridcalc_common::{CalcError, ErrorKind, Value};
use std::error::Error;
use std::fmt::{self, Display};

/// A custom error type for the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

impl From<ParserError> for CalcError {
    fn from(err: ParserError) -> Self {
        CalcError::syntax(err.to_string())
    }
}

/// The different types of AST nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(Value),
    /// Cell, range or name lookup. `original` is the reference exactly as
    /// written, kept so it can be re-resolved against the current workbook.
    Reference {
        original: String,
        reference: ReferenceType,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
}

impl Display for ASTNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNodeType::Literal(value) => write!(f, "Literal({value})"),
            ASTNodeType::Reference { reference, .. } => write!(f, "Reference({reference})"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "UnaryOp({op}, {expr})"),
            ASTNodeType::BinaryOp { op, left, right } => {
                write!(f, "BinaryOp({op}, {left}, {right})")
            }
            ASTNodeType::Function { name, args } => {
                write!(f, "Function({name}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A parsed formula element.
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub source_token: Option<Token>,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, source_token: Option<Token>) -> Self {
        ASTNode {
            node_type,
            source_token,
        }
    }

    /// Every reference node in evaluation order.
    pub fn get_dependencies(&self) -> Vec<&ReferenceType> {
        let mut dependencies = Vec::new();
        self.collect_dependencies(&mut dependencies);
        dependencies
    }

    pub fn get_dependency_strings(&self) -> Vec<String> {
        self.get_dependencies()
            .into_iter()
            .map(|dep| format!("{dep}"))
            .collect()
    }

    fn collect_dependencies<'a>(&'a self, dependencies: &mut Vec<&'a ReferenceType>) {
        match &self.node_type {
            ASTNodeType::Reference { reference, .. } => {
                dependencies.push(reference);
            }
            ASTNodeType::UnaryOp { expr, .. } => {
                expr.collect_dependencies(dependencies);
            }
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_dependencies(dependencies);
                right.collect_dependencies(dependencies);
            }
            ASTNodeType::Function { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(dependencies);
                }
            }
            ASTNodeType::Literal(_) => {}
        }
    }
}

impl Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_type)
    }
}

/// A parser for converting tokens into an AST.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    locale: Locale,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, locale: Locale) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.token_type != TokenType::Whitespace)
            .collect();
        Parser {
            tokens,
            position: 0,
            locale,
        }
    }

    /// Parse the tokens into an AST.
    pub fn parse(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(ParserError {
                message: "Empty formula".to_string(),
                position: None,
            });
        }

        if self.tokens[0].token_type == TokenType::Literal {
            let token = self.tokens[0].clone();
            return Ok(ASTNode::new(
                ASTNodeType::Literal(Value::Text(token.value.clone())),
                Some(token),
            ));
        }

        let ast = self.parse_expression()?;
        if self.position < self.tokens.len() {
            return Err(ParserError {
                message: format!(
                    "Unexpected token '{}'",
                    self.tokens[self.position].value
                ),
                position: Some(self.tokens[self.position].start),
            });
        }
        Ok(ast)
    }

    fn parse_expression(&mut self) -> Result<ASTNode, ParserError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParserError> {
        let mut left = self.parse_unary_op()?;

        while self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            if token.token_type != TokenType::OpInfix {
                break;
            }

            let (precedence, associativity) =
                token.get_precedence().unwrap_or((0, Associativity::Left));
            if precedence < min_precedence {
                break;
            }

            let op_token = self.tokens[self.position].clone();
            self.position += 1;

            let next_min_precedence = if associativity == Associativity::Left {
                precedence + 1
            } else {
                precedence
            };

            let right = self.parse_binary_op(next_min_precedence)?;
            left = ASTNode::new(
                ASTNodeType::BinaryOp {
                    op: op_token.value.clone(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(op_token),
            );
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParserError> {
        if self.position < self.tokens.len()
            && self.tokens[self.position].token_type == TokenType::OpPrefix
        {
            let op_token = self.tokens[self.position].clone();
            self.position += 1;
            let expr = self.parse_unary_op()?;
            return Ok(ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(op_token),
            ));
        }
        self.parse_postfix_op()
    }

    fn parse_postfix_op(&mut self) -> Result<ASTNode, ParserError> {
        let mut expr = self.parse_primary()?;

        while self.position < self.tokens.len()
            && self.tokens[self.position].token_type == TokenType::OpPostfix
        {
            let op_token = self.tokens[self.position].clone();
            self.position += 1;
            expr = ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(op_token),
            );
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParserError> {
        let Some(token) = self.tokens.get(self.position) else {
            return Err(ParserError {
                message: "Unexpected end of formula".to_string(),
                position: self.tokens.last().map(|t| t.end),
            });
        };

        match token.token_type {
            TokenType::Operand => {
                let operand_token = token.clone();
                self.position += 1;
                self.parse_operand(operand_token)
            }
            TokenType::Func if token.subtype == TokenSubType::Open => {
                let func_token = token.clone();
                self.position += 1;
                self.parse_function(func_token)
            }
            TokenType::Paren if token.subtype == TokenSubType::Open => {
                self.position += 1;
                let expr = self.parse_expression()?;
                match self.tokens.get(self.position) {
                    Some(t) if t.token_type == TokenType::Paren && t.subtype == TokenSubType::Close => {
                        self.position += 1;
                        Ok(expr)
                    }
                    other => Err(ParserError {
                        message: "Expected closing parenthesis".to_string(),
                        position: other.map(|t| t.start),
                    }),
                }
            }
            _ => Err(ParserError {
                message: format!("Unexpected token '{}'", token.value),
                position: Some(token.start),
            }),
        }
    }

    fn parse_operand(&mut self, token: Token) -> Result<ASTNode, ParserError> {
        match token.subtype {
            TokenSubType::Number => {
                let value = self
                    .locale
                    .parse_number(&token.value)
                    .ok_or_else(|| ParserError {
                        message: format!("Invalid number: {}", token.value),
                        position: Some(token.start),
                    })?;
                Ok(ASTNode::new(
                    ASTNodeType::Literal(Value::Number(value)),
                    Some(token),
                ))
            }
            TokenSubType::Text => {
                let mut text = token.value.clone();
                if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
                    text = text[1..text.len() - 1].replace("\"\"", "\"");
                }
                Ok(ASTNode::new(
                    ASTNodeType::Literal(Value::Text(text)),
                    Some(token),
                ))
            }
            TokenSubType::Logical => {
                let value = token.value.eq_ignore_ascii_case("TRUE");
                Ok(ASTNode::new(
                    ASTNodeType::Literal(Value::Boolean(value)),
                    Some(token),
                ))
            }
            TokenSubType::Error => {
                // `Sheet1!#REF!` keeps its qualifier in the token text
                let code = token
                    .value
                    .find('#')
                    .map(|i| &token.value[i..])
                    .unwrap_or(&token.value);
                let mut error = CalcError::from_error_string(code).ok_or_else(|| ParserError {
                    message: format!("Unknown error literal {}", token.value),
                    position: Some(token.start),
                })?;
                // Row and column deletes leave `#REF!` where a reference was.
                if error.kind == ErrorKind::InvalidReference {
                    error = error.with_message("reference no longer exists");
                }
                Ok(ASTNode::new(
                    ASTNodeType::Literal(Value::Error(error)),
                    Some(token),
                ))
            }
            TokenSubType::Range => {
                let reference =
                    ReferenceType::from_string(&token.value).map_err(|e| ParserError {
                        message: format!("Invalid reference '{}': {}", token.value, e),
                        position: Some(token.start),
                    })?;
                Ok(ASTNode::new(
                    ASTNodeType::Reference {
                        original: token.value.clone(),
                        reference,
                    },
                    Some(token),
                ))
            }
            _ => Err(ParserError {
                message: format!("Unexpected operand '{}'", token.value),
                position: Some(token.start),
            }),
        }
    }

    fn parse_function(&mut self, func_token: Token) -> Result<ASTNode, ParserError> {
        let name = func_token.value[..func_token.value.len() - 1].to_string();
        let args = self.parse_function_arguments()?;
        Ok(ASTNode::new(
            ASTNodeType::Function { name, args },
            Some(func_token),
        ))
    }

    fn at_arg_separator(&self) -> bool {
        self.tokens
            .get(self.position)
            .is_some_and(|t| t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg)
    }

    fn at_function_close(&self) -> bool {
        self.tokens
            .get(self.position)
            .is_some_and(|t| t.token_type == TokenType::Func && t.subtype == TokenSubType::Close)
    }

    /// Arguments up to the closing parenthesis. Omitted arguments (`F(1,,2)`)
    /// become empty literals.
    fn parse_function_arguments(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut args = Vec::new();

        if self.at_function_close() {
            self.position += 1;
            return Ok(args);
        }

        loop {
            if self.at_arg_separator() || self.at_function_close() {
                args.push(ASTNode::new(ASTNodeType::Literal(Value::Empty), None));
            } else {
                args.push(self.parse_expression()?);
            }

            if self.at_arg_separator() {
                self.position += 1;
                continue;
            }
            if self.at_function_close() {
                self.position += 1;
                return Ok(args);
            }
            return Err(ParserError {
                message: format!(
                    "Expected '{}' or ')' in function arguments",
                    self.locale.argument_separator
                ),
                position: self.tokens.get(self.position).map(|t| t.start),
            });
        }
    }
}

/// Parse with the invariant locale.
pub fn parse<T: AsRef<str>>(formula: T) -> Result<ASTNode, ParserError> {
    parse_with_locale(formula, Locale::invariant())
}

pub fn parse_with_locale<T: AsRef<str>>(formula: T, locale: Locale) -> Result<ASTNode, ParserError> {
    let tokens = Tokenizer::new_with_locale(formula.as_ref(), locale)?.items;
    Parser::new(tokens, locale).parse()
}
