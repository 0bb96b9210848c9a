use std::error::Error;
use std::fmt::{Display, Formatter};
use crate::{Address, Identifier};
use crate::encoding::ParseError;
use crate::pointer::PointerType;

/// Broken structure found at the end of a transaction or by an explicit check. These are bugs in
/// whatever produced the data, so they are reported and never repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IntegrityError {
    DanglingPointer { pointer: Address, target: Address },
    TypeMismatch { pointer: Address, target: Address, pointer_type: PointerType },
    MissingMandatoryPointer(Address),
    MissingMandatoryTarget(Address),
    /// The edge index disagrees with the pointer fields.
    EdgeIndex(Address),
}

impl Display for IntegrityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::DanglingPointer { pointer, target } =>
                write!(f, "pointer {} targets missing {}", pointer, target),
            IntegrityError::TypeMismatch { pointer, target, pointer_type } =>
                write!(f, "{} does not accept {} pointer {}", target, pointer_type.name(), pointer),
            IntegrityError::MissingMandatoryPointer(addr) =>
                write!(f, "mandatory pointer {} is empty", addr),
            IntegrityError::MissingMandatoryTarget(addr) =>
                write!(f, "{} requires at least one incoming pointer", addr),
            IntegrityError::EdgeIndex(addr) =>
                write!(f, "edge index out of sync at {}", addr),
        }
    }
}

impl Error for IntegrityError {}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    NotInTransaction,
    AlreadyInTransaction,
    DuplicateIdentifier(Identifier),
    UnknownBox(Identifier),
    UnknownField(Address),
    /// The field exists but isn't of the kind (or primitive type) the write expected.
    FieldTypeMismatch(Address),
    SelfReference(Address),
    /// Deleting the box would violate a [`DeletePolicy::Reject`](crate::DeletePolicy::Reject) edge.
    DeleteRejected { target: Address, pointer: Address },
    /// Raw unstaging of a box which still has incoming pointers.
    HasIncomingEdges(Identifier),
    Integrity(IntegrityError),
    Parse(ParseError),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::Integrity(err) => write!(f, "Integrity error: {}", err),
            GraphError::Parse(err) => Display::fmt(err, f),
            GraphError::DeleteRejected { target, pointer } =>
                write!(f, "Cannot delete {}: still referenced by {}", target, pointer),
            other => write!(f, "GraphError {:?}", other),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GraphError::Integrity(err) => Some(err),
            GraphError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IntegrityError> for GraphError {
    fn from(err: IntegrityError) -> Self {
        GraphError::Integrity(err)
    }
}

impl From<ParseError> for GraphError {
    fn from(err: ParseError) -> Self {
        GraphError::Parse(err)
    }
}
