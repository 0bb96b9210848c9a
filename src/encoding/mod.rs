//! Binary encoding shared by graph snapshots, sub-graph bundles and the commit log.
//!
//! Everything is fixed width and little-endian. Strings and byte blobs carry an int32 length
//! prefix. Counts are int32 as well, except field counts and field keys which are int16.

pub(crate) mod bufparser;
pub(crate) mod tools;
pub mod parseerror;

pub use parseerror::ParseError;
