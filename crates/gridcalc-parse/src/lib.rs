pub mod locale;
pub mod parser;
pub mod pretty;
pub mod reference;
pub mod tokenizer;
pub mod types;

pub use locale::Locale;
pub use parser::{ASTNode, ASTNodeType, Parser, ParserError, parse, parse_with_locale};
pub use pretty::{canonical_formula, pretty_print};
pub use reference::{ReferenceType, quote_sheet_name};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
pub use types::ParsingError;

// Re-export common types
pub use gridcalc_common::{Address, CalcError, ErrorKind, Rect, Value};
