//! Cell-level error values.
//!
//! - **`ErrorKind`**   : the closed set of error categories a cell can hold
//! - **`ErrorOrigin`** : the cell where an error was first produced
//! - **`CalcError`**   : kind + optional message + optional origin
//!
//! Errors never abort a recalculation pass. They are stored as the value of
//! the cell that produced them and travel to readers as
//! [`ErrorKind::ReferencedCell`], keeping the root message and origin.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Every error category a cell can hold.
///
/// `Display` renders the stable token shown in place of a value; the same
/// tokens are accepted as error literals inside formula text.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Formula text could not be parsed.
    Syntax,
    /// A reference names an unknown sheet, an unknown name or an address
    /// outside the grid.
    InvalidReference,
    /// A referenced cell holds an error.
    ReferencedCell,
    /// Re-entrant evaluation within one pass.
    Circular,
    UnknownFunction,
    InvalidArgumentCount,
    InvalidArgumentType,
    /// Mathematically undefined result (division by zero, sqrt of a negative, ...).
    Domain,
}

/// All kinds, in token-table order.
pub const ALL_ERROR_KINDS: [ErrorKind; 8] = [
    ErrorKind::Syntax,
    ErrorKind::InvalidReference,
    ErrorKind::ReferencedCell,
    ErrorKind::Circular,
    ErrorKind::UnknownFunction,
    ErrorKind::InvalidArgumentCount,
    ErrorKind::InvalidArgumentType,
    ErrorKind::Domain,
];

impl ErrorKind {
    pub const fn token(self) -> &'static str {
        match self {
            Self::Syntax => "#SYNTAX!",
            Self::InvalidReference => "#REF!",
            Self::ReferencedCell => "#ERRCELL!",
            Self::Circular => "#CIRC!",
            Self::UnknownFunction => "#NAME?",
            Self::InvalidArgumentCount => "#ARGS!",
            Self::InvalidArgumentType => "#VALUE!",
            Self::Domain => "#NUM!",
        }
    }

    /// Case-insensitive token lookup. Returns `None` for unknown tokens.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        ALL_ERROR_KINDS
            .iter()
            .copied()
            .find(|kind| kind.token().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Location of the cell that first produced an error.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorOrigin {
    pub sheet: Option<String>,
    pub col: u32,
    pub row: u32,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = crate::Address::new(self.col, self.row);
        match &self.sheet {
            Some(sheet) => write!(f, "{sheet}!{addr}"),
            None => write!(f, "{addr}"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalcError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub origin: Option<ErrorOrigin>,
}

impl From<ErrorKind> for CalcError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            origin: None,
        }
    }
}

impl CalcError {
    pub fn new(kind: ErrorKind) -> Self {
        kind.into()
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn with_origin(mut self, sheet: Option<String>, col: u32, row: u32) -> Self {
        self.origin = Some(ErrorOrigin { sheet, col, row });
        self
    }

    pub fn syntax<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Syntax).with_message(msg)
    }

    pub fn reference<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidReference).with_message(msg)
    }

    pub fn circular() -> Self {
        Self::new(ErrorKind::Circular).with_message("circular reference")
    }

    pub fn unknown_function(name: &str) -> Self {
        Self::new(ErrorKind::UnknownFunction).with_message(format!("unknown function {name}"))
    }

    pub fn arg_count(name: &str, expected: &str, got: usize) -> Self {
        Self::new(ErrorKind::InvalidArgumentCount)
            .with_message(format!("{name} expects {expected} argument(s), got {got}"))
    }

    pub fn arg_type<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidArgumentType).with_message(msg)
    }

    pub fn domain<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Domain).with_message(msg)
    }

    /// Builds the error a reader sees when it reads the error cell at
    /// `sheet!(col,row)`.
    ///
    /// The root diagnosis survives any number of hops: an already
    /// propagated error keeps its message and origin, a root error is
    /// folded into the message and its cell becomes the origin.
    pub fn propagated(&self, sheet: Option<&str>, col: u32, row: u32) -> Self {
        if self.kind == ErrorKind::ReferencedCell {
            return self.clone();
        }
        let message = match &self.message {
            Some(msg) => format!("{}: {msg}", self.kind),
            None => self.kind.token().to_string(),
        };
        let origin = self.origin.clone().unwrap_or(ErrorOrigin {
            sheet: sheet.map(str::to_string),
            col,
            row,
        });
        Self {
            kind: ErrorKind::ReferencedCell,
            message: Some(message),
            origin: Some(origin),
        }
    }

    pub fn from_error_string(s: &str) -> Option<Self> {
        ErrorKind::parse(s).map(Self::new)
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(ref origin) = self.origin {
            write!(f, " [origin: {origin}]")?;
        }
        Ok(())
    }
}

impl Error for CalcError {}

impl PartialEq<str> for CalcError {
    fn eq(&self, other: &str) -> bool {
        self.kind.token() == other
    }
}

impl PartialEq<&str> for CalcError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.token() == *other
    }
}
