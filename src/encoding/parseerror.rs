use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[non_exhaustive]
pub enum ParseError {
    InvalidMagic,
    UnsupportedProtocolVersion,
    UnknownTypeTag,
    UnknownUpdateType,
    UnknownCommitType,
    UnknownPrimitiveType,
    UnknownField,
    InvalidLength,
    UnexpectedEOF,
    // TODO: Consider carrying the Utf8Error once something actually needs the position.
    InvalidUTF8,
    InvalidIdentifier,
    InvalidAddress,
    InvalidContent,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParseError {:?}", self)
    }
}

impl Error for ParseError {}
