//! A transactional document graph for music projects.
//!
//! A document is a set of typed boxes (tracks, regions, devices, the timeline and so on). Each box
//! has a fixed set of fields, declared in [`schema`]. Fields are either primitive values or
//! pointers to other boxes (or to fields inside them), and the graph keeps an index of every
//! pointer in both directions.
//!
//! The core pieces are:
//!
//! 1. The [`BoxGraph`], which owns every box. All writes happen inside a transaction, and a
//!    transaction either commits completely or leaves no trace.
//! 2. [`Editing`], which wraps a graph with undo / redo.
//! 3. A [`Project`], which is a graph with a fixed skeleton of mandatory boxes, and a binary
//!    snapshot format.
//!
//! On top of that there's [`subgraph`] for copying a box with everything it owns between graphs,
//! and [`sync_log`] for streaming every committed transaction into an append-only, hash chained
//! log.
//!
//! ## Example
//!
//! ```
//! use box_graph::{Address, BoxKind, Identifier, Project};
//! use box_graph::schema::{audio_unit, track};
//!
//! let mut project = Project::new().unwrap();
//! let unit = project.boxes().master_unit;
//! let t1 = Identifier::random();
//!
//! project.editing_mut().modify(|e| {
//!     e.graph_mut().create_box(BoxKind::Track, t1, |b| {
//!         b.set_pointer(&[track::TRACKS], Some(Address::new(unit, &[audio_unit::TRACKS])))?;
//!         Ok(())
//!     })
//! }).unwrap();
//! assert_eq!(project.graph().incoming(&Address::new(unit, &[audio_unit::TRACKS])).len(), 1);
//!
//! project.editing_mut().undo().unwrap();
//! assert!(project.graph().find_box(t1).is_none());
//! ```
//!
//! ## Rules
//!
//! Every non-empty pointer must resolve to a box or field which accepts its [`PointerType`]. This
//! is checked when a transaction ends. Some pointers are mandatory, and some targets require at
//! least one incoming pointer. Those rules are checked at the end of every [`Editing`] transaction
//! (and by [`BoxGraph::end_transaction_checked`]).
//!
//! Deleting a box with [`BoxGraph::delete_box`] applies each incoming pointer type's
//! [`DeletePolicy`]: the referring box is deleted as well, the pointer is emptied, or the deletion
//! is refused.
//!
//! ## Identifiers
//!
//! Boxes are identified by a 16 byte [`Identifier`]. Most are random. Boxes which stand for some
//! external content (audio files) use an identifier derived from a hash of that content, so the
//! same file always gets the same box. Sub-graph import uses that to avoid duplicating them.

pub use address::{Address, FieldKey, FieldKeys};
pub use dispatchers::{HubEvent, Propagation, Subscription};
pub use editing::Editing;
pub use encoding::ParseError;
pub use field::{Field, FieldKind, FieldSpec, ObjectField, PointerField, PrimitiveField};
pub use graph::{BoxGraph, Dependencies, GraphError, GraphStats, IntegrityError};
pub use identifier::Identifier;
pub use pointer::{DeletePolicy, PointerRules, PointerType};
pub use primitive::{PrimitiveDefault, PrimitiveType, PrimitiveValue};
pub use project::{Project, ProjectBoxes, ProjectError};
pub use schema::BoxKind;
pub use updates::{decode_updates, encode_updates, Update};
pub use vertex::{Resolved, Vertex};

mod address;
mod dispatchers;
mod editing;
mod encoding;
mod field;
mod graph;
mod identifier;
mod pointer;
mod primitive;
mod updates;
mod vertex;

pub mod project;
pub mod schema;
pub mod subgraph;
pub mod sync_log;
