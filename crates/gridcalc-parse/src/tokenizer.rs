use std::convert::TryFrom;
use std::error::Error;
use std::fmt::{self, Display};

use gridcalc_common::ALL_ERROR_KINDS;

use crate::Locale;

/// Characters that end an accumulated operand. The locale's argument
/// separator is checked separately.
const TOKEN_ENDERS: &str = ")} +-*/^&=><%\t\n\r";

const fn build_token_enders() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = TOKEN_ENDERS.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static TOKEN_ENDERS_TABLE: [bool; 256] = build_token_enders();

/// Represents operator associativity.
#[derive(Debug, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError: {}", self.message)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Whole cell content that does not start with `=`.
    Literal,
    Operand,
    Func,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
}

impl Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token with its byte span in the source formula.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

impl Token {
    pub fn new(value: String, token_type: TokenType, subtype: TokenSubType) -> Self {
        Token {
            value,
            token_type,
            subtype,
            start: 0,
            end: 0,
        }
    }

    pub fn new_with_span(
        value: String,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value,
            token_type,
            subtype,
            start,
            end,
        }
    }

    fn from_slice(
        source: &str,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value: source[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }

    pub fn get_precedence(&self) -> Option<(u8, Associativity)> {
        // For a prefix operator, use the 'u' key.
        let op = if self.token_type == TokenType::OpPrefix {
            "u"
        } else {
            self.value.as_str()
        };
        operator_precedence(op)
    }

    fn classify_operand(value: &str, locale: &Locale) -> TokenSubType {
        if value.starts_with('"') {
            TokenSubType::Text
        } else if value.starts_with('#') {
            TokenSubType::Error
        } else if value.eq_ignore_ascii_case("TRUE") || value.eq_ignore_ascii_case("FALSE") {
            TokenSubType::Logical
        } else if value.as_bytes().first().is_some_and(|b| b.is_ascii_digit())
            && locale.parse_number(value).is_some()
        {
            TokenSubType::Number
        } else {
            TokenSubType::Range
        }
    }

    fn make_operand_from_slice(source: &str, start: usize, end: usize, locale: &Locale) -> Self {
        let subtype = Self::classify_operand(&source[start..end], locale);
        Token::from_slice(source, TokenType::Operand, subtype, start, end)
    }
}

/// Binding strength and associativity of an operator symbol; `"u"` is the
/// unary prefix sign.
pub fn operator_precedence(op: &str) -> Option<(u8, Associativity)> {
    match op {
        "u" => Some((7, Associativity::Right)),
        "%" => Some((6, Associativity::Left)),
        "^" => Some((5, Associativity::Left)),
        "*" | "/" => Some((4, Associativity::Left)),
        "+" | "-" => Some((3, Associativity::Left)),
        "&" => Some((2, Associativity::Left)),
        "=" | "<" | ">" | "<=" | ">=" | "<>" => Some((1, Associativity::Left)),
        _ => None,
    }
}

/// A tokenizer for cell formulas.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
    token_stack: Vec<Token>,
    offset: usize,
    token_start: usize,
    token_end: usize,
    locale: Locale,
    arg_sep: u8,
}

impl Tokenizer {
    /// Tokenize with the invariant locale.
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        Self::new_with_locale(formula, Locale::invariant())
    }

    pub fn new_with_locale(formula: &str, locale: Locale) -> Result<Self, TokenizerError> {
        let arg_sep = if locale.argument_separator.is_ascii() {
            locale.argument_separator as u8
        } else {
            return Err(TokenizerError {
                message: format!(
                    "argument separator '{}' must be ASCII",
                    locale.argument_separator
                ),
                pos: 0,
            });
        };
        let mut tokenizer = Tokenizer {
            formula: formula.to_string(),
            items: Vec::with_capacity(formula.len() / 2),
            token_stack: Vec::with_capacity(16),
            offset: 0,
            token_start: 0,
            token_end: 0,
            locale,
            arg_sep,
        };
        tokenizer.parse()?;
        Ok(tokenizer)
    }

    #[inline]
    fn is_token_ender(&self, c: u8) -> bool {
        TOKEN_ENDERS_TABLE[c as usize] || c == self.arg_sep
    }

    #[inline]
    fn current_byte(&self) -> Option<u8> {
        self.formula.as_bytes().get(self.offset).copied()
    }

    #[inline]
    fn has_token(&self) -> bool {
        self.token_end > self.token_start
    }

    #[inline]
    fn start_token(&mut self) {
        self.token_start = self.offset;
        self.token_end = self.offset;
    }

    #[inline]
    fn extend_token(&mut self) {
        self.token_end = self.offset;
    }

    fn parse(&mut self) -> Result<(), TokenizerError> {
        if self.formula.is_empty() {
            return Ok(());
        }

        // Content that does not start with '=' is a single literal token
        if self.formula.as_bytes()[0] != b'=' {
            self.items.push(Token::new_with_span(
                self.formula.clone(),
                TokenType::Literal,
                TokenSubType::None,
                0,
                self.formula.len(),
            ));
            return Ok(());
        }

        self.offset = 1;
        self.start_token();

        while self.offset < self.formula.len() {
            if self.check_scientific_notation()? {
                continue;
            }

            let curr_byte = self.formula.as_bytes()[self.offset];

            if self.is_token_ender(curr_byte) && self.has_token() {
                self.save_token();
                self.start_token();
            }

            match curr_byte {
                b'"' | b'\'' => self.parse_string()?,
                b'#' => self.parse_error()?,
                b' ' | b'\n' | b'\t' | b'\r' => self.parse_whitespace()?,
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.parse_operator()?
                }
                b'(' => self.parse_opener()?,
                b')' => self.parse_closer()?,
                b if b == self.arg_sep => self.parse_separator()?,
                b'{' | b'}' => {
                    return Err(TokenizerError {
                        message: "array constants are not supported".to_string(),
                        pos: self.offset,
                    });
                }
                b'[' | b']' => {
                    return Err(TokenizerError {
                        message: "structured references are not supported".to_string(),
                        pos: self.offset,
                    });
                }
                _ => {
                    if !self.has_token() {
                        self.start_token();
                    }
                    self.offset += 1;
                    self.extend_token();
                }
            }
        }

        if self.has_token() {
            self.save_token();
        }

        if !self.token_stack.is_empty() {
            return Err(TokenizerError {
                message: "Unmatched opening parenthesis".to_string(),
                pos: self.offset,
            });
        }

        Ok(())
    }

    /// If the current token looks like a number in scientific notation,
    /// consume the '+' or '-' as part of the number.
    fn check_scientific_notation(&mut self) -> Result<bool, TokenizerError> {
        if let Some(curr_byte) = self.current_byte() {
            if (curr_byte == b'+' || curr_byte == b'-')
                && self.has_token()
                && self.is_scientific_notation_base()
            {
                self.offset += 1;
                self.extend_token();
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True when the accumulated token is the base of a scientific-notation
    /// number (`1.23E`, `9e`).
    fn is_scientific_notation_base(&self) -> bool {
        let token_slice = &self.formula.as_bytes()[self.token_start..self.token_end];
        if token_slice.len() < 2 {
            return false;
        }

        let last = token_slice[token_slice.len() - 1];
        if !(last == b'E' || last == b'e') {
            return false;
        }

        if !token_slice[0].is_ascii_digit() {
            return false;
        }

        let decimal = self.locale.decimal_separator;
        let mut dot_seen = false;
        for &ch in &token_slice[1..token_slice.len() - 1] {
            match ch {
                b'0'..=b'9' => {}
                c if !dot_seen && decimal.is_ascii() && c == decimal as u8 => dot_seen = true,
                _ => return false,
            }
        }
        true
    }

    fn save_token(&mut self) {
        if self.has_token() {
            let token = Token::make_operand_from_slice(
                &self.formula,
                self.token_start,
                self.token_end,
                &self.locale,
            );
            self.items.push(token);
        }
    }

    /// Double quotes delimit text literals. Single quotes delimit a sheet
    /// name or a named area and stay part of the surrounding operand.
    fn parse_string(&mut self) -> Result<(), TokenizerError> {
        let delim = self.formula.as_bytes()[self.offset];

        if self.has_token() {
            // `Sheet1:'My Sheet'` style continuations stay in one token
            if self.formula.as_bytes()[self.token_end - 1] != b':' {
                self.save_token();
                self.start_token();
            }
        }

        let string_start = self.offset;
        if !self.has_token() {
            self.token_start = self.offset;
        }
        self.offset += 1;

        while self.offset < self.formula.len() {
            if self.formula.as_bytes()[self.offset] == delim {
                self.offset += 1;
                if self.offset < self.formula.len() && self.formula.as_bytes()[self.offset] == delim
                {
                    self.offset += 1; // escaped quote
                } else {
                    if delim == b'"' {
                        let token = Token::make_operand_from_slice(
                            &self.formula,
                            string_start,
                            self.offset,
                            &self.locale,
                        );
                        self.items.push(token);
                        self.start_token();
                    } else {
                        self.token_end = self.offset;
                    }
                    return Ok(());
                }
            } else {
                self.offset += 1;
            }
        }

        Err(TokenizerError {
            message: "Reached end of formula while parsing string".to_string(),
            pos: self.offset,
        })
    }

    /// Error literal such as `#REF!`, optionally glued to a `Sheet!` prefix.
    fn parse_error(&mut self) -> Result<(), TokenizerError> {
        if self.has_token() && self.formula.as_bytes()[self.token_end - 1] != b'!' {
            self.save_token();
            self.start_token();
        }

        let error_start = if self.has_token() {
            self.token_start
        } else {
            self.offset
        };

        for kind in ALL_ERROR_KINDS {
            let code = kind.token().as_bytes();
            if self.offset + code.len() <= self.formula.len() {
                let slice = &self.formula.as_bytes()[self.offset..self.offset + code.len()];
                if slice.eq_ignore_ascii_case(code) {
                    let token = Token::from_slice(
                        &self.formula,
                        TokenType::Operand,
                        TokenSubType::Error,
                        error_start,
                        self.offset + code.len(),
                    );
                    self.items.push(token);
                    self.offset += code.len();
                    self.start_token();
                    return Ok(());
                }
            }
        }

        Err(TokenizerError {
            message: format!("Invalid error code at position {}", self.offset),
            pos: self.offset,
        })
    }

    fn parse_whitespace(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        let ws_start = self.offset;
        while self.offset < self.formula.len() {
            match self.formula.as_bytes()[self.offset] {
                b' ' | b'\n' | b'\t' | b'\r' => self.offset += 1,
                _ => break,
            }
        }

        self.items.push(Token::from_slice(
            &self.formula,
            TokenType::Whitespace,
            TokenSubType::None,
            ws_start,
            self.offset,
        ));
        self.start_token();
        Ok(())
    }

    fn parse_operator(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        if self.offset + 1 < self.formula.len() {
            let two_char = &self.formula.as_bytes()[self.offset..self.offset + 2];
            if two_char == b">=" || two_char == b"<=" || two_char == b"<>" {
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::OpInfix,
                    TokenSubType::None,
                    self.offset,
                    self.offset + 2,
                ));
                self.offset += 2;
                self.start_token();
                return Ok(());
            }
        }

        let curr_byte = self.formula.as_bytes()[self.offset];
        let token_type = match curr_byte {
            b'%' => TokenType::OpPostfix,
            b'+' | b'-' => {
                let prev = self
                    .items
                    .iter()
                    .rev()
                    .find(|t| t.token_type != TokenType::Whitespace);
                match prev {
                    Some(p)
                        if p.subtype == TokenSubType::Close
                            || p.token_type == TokenType::OpPostfix
                            || p.token_type == TokenType::Operand =>
                    {
                        TokenType::OpInfix
                    }
                    _ => TokenType::OpPrefix,
                }
            }
            _ => TokenType::OpInfix,
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            TokenSubType::None,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
        Ok(())
    }

    /// `(` either opens a group or, glued to a name, a function call.
    fn parse_opener(&mut self) -> Result<(), TokenizerError> {
        let token = if self.has_token() {
            Token::from_slice(
                &self.formula,
                TokenType::Func,
                TokenSubType::Open,
                self.token_start,
                self.offset + 1,
            )
        } else {
            Token::from_slice(
                &self.formula,
                TokenType::Paren,
                TokenSubType::Open,
                self.offset,
                self.offset + 1,
            )
        };

        self.items.push(token.clone());
        self.token_stack.push(token);
        self.offset += 1;
        self.start_token();
        Ok(())
    }

    fn parse_closer(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        let Some(open_token) = self.token_stack.pop() else {
            return Err(TokenizerError {
                message: format!("No matching opener for closer at position {}", self.offset),
                pos: self.offset,
            });
        };

        self.items.push(Token::from_slice(
            &self.formula,
            open_token.token_type,
            TokenSubType::Close,
            self.offset,
            self.offset + 1,
        ));

        self.offset += 1;
        self.start_token();
        Ok(())
    }

    /// Argument separators are only legal directly inside a function call.
    fn parse_separator(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        match self.token_stack.last() {
            Some(top) if top.token_type == TokenType::Func => {}
            _ => {
                return Err(TokenizerError {
                    message: format!(
                        "argument separator '{}' outside of a function call",
                        self.arg_sep as char
                    ),
                    pos: self.offset,
                });
            }
        }

        self.items.push(Token::from_slice(
            &self.formula,
            TokenType::Sep,
            TokenSubType::Arg,
            self.offset,
            self.offset + 1,
        ));

        self.offset += 1;
        self.start_token();
        Ok(())
    }

    /// Reconstruct the formula from the parsed tokens.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            "".to_string()
        } else if self.items[0].token_type == TokenType::Literal {
            self.items[0].value.clone()
        } else {
            let concatenated: String = self.items.iter().map(|t| t.value.as_str()).collect();
            format!("={concatenated}")
        }
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, TokenSubType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.subtype, t.value))
            .collect()
    }

    #[test]
    fn ranges_and_sheets_are_single_operands() {
        let toks = kinds("=SUM('My Sheet'!A1:B2)");
        assert_eq!(toks[0].0, TokenType::Func);
        assert_eq!(toks[0].2, "SUM(");
        assert_eq!(toks[1].1, TokenSubType::Range);
        assert_eq!(toks[1].2, "'My Sheet'!A1:B2");
        assert_eq!(toks[2].1, TokenSubType::Close);
    }

    #[test]
    fn spans_point_into_source() {
        let src = "=A1 + Sheet2!$B$3";
        let t = Tokenizer::new(src).unwrap();
        let refs: Vec<_> = t
            .items
            .iter()
            .filter(|t| t.subtype == TokenSubType::Range)
            .collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(&src[refs[1].start..refs[1].end], "Sheet2!$B$3");
        assert_eq!(t.render(), src);
    }

    #[test]
    fn prefix_and_infix_signs() {
        let toks = kinds("=-1-2");
        assert_eq!(toks[0].0, TokenType::OpPrefix);
        assert_eq!(toks[1].1, TokenSubType::Number);
        assert_eq!(toks[2].0, TokenType::OpInfix);
    }

    #[test]
    fn scientific_notation_keeps_sign() {
        let toks = kinds("=1.5E+3*2");
        assert_eq!(toks[0].2, "1.5E+3");
        assert_eq!(toks[0].1, TokenSubType::Number);
    }

    #[test]
    fn error_literals_use_engine_tokens() {
        let toks = kinds("=#REF!+#circ!");
        assert_eq!(toks[0].1, TokenSubType::Error);
        assert_eq!(toks[2].2, "#circ!");
        assert!(Tokenizer::new("=#DIV/0!").is_err());
    }

    #[test]
    fn comma_decimal_locale() {
        let t = Tokenizer::new_with_locale("=ROUND(1,25;1)", Locale::comma_decimal()).unwrap();
        let values: Vec<_> = t.items.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["ROUND(", "1,25", ";", "1", ")"]);
        assert_eq!(t.items[1].subtype, TokenSubType::Number);
    }

    #[test]
    fn separator_outside_function_is_rejected() {
        assert!(Tokenizer::new("=(1,2)").is_err());
        assert!(Tokenizer::new("={1,2}").is_err());
        assert!(Tokenizer::new("=SUM(1").is_err());
        assert!(Tokenizer::new("=1)").is_err());
    }

    #[test]
    fn literal_content() {
        let toks = kinds("hello");
        assert_eq!(toks, vec![(TokenType::Literal, TokenSubType::None, "hello".to_string())]);
    }
}
