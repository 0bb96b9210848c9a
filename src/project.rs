//! A project is a box graph with a fixed skeleton of mandatory boxes, plus the editing history.
//!
//! Snapshot format:
//!
//! ```text
//! int32 magic            0x4F50454E
//! int32 format version   2
//! int32 chunk length
//! bytes graph chunk      (BoxGraph::to_bytes)
//! 5x identifier          root, user interface, master bus, master unit, timeline
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use crate::{Address, BoxGraph, BoxKind, Editing, Identifier};
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_i32, push_len_prefixed};
use crate::graph::{GraphError, IntegrityError};
use crate::schema::{audio_bus, audio_unit, root, user_interface};

pub const MAGIC: i32 = 0x4F50454E;
pub const FORMAT_VERSION: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProjectError {
    InvalidMagic { expected: i32, actual: i32 },
    VersionMismatch { expected: i32, actual: i32 },
    /// One of the mandatory boxes isn't in the graph.
    MissingBox { name: &'static str, id: Identifier },
    WrongKind { name: &'static str, id: Identifier, expected: BoxKind, actual: BoxKind },
    Graph(GraphError),
}

impl Display for ProjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::InvalidMagic { expected, actual } =>
                write!(f, "Not a project file (magic {:#x}, expected {:#x})", actual, expected),
            ProjectError::VersionMismatch { expected, actual } =>
                write!(f, "Unsupported project version {} (expected {})", actual, expected),
            ProjectError::MissingBox { name, id } =>
                write!(f, "Mandatory {} box {} is missing", name, id),
            ProjectError::WrongKind { name, id, expected, actual } =>
                write!(f, "Mandatory {} box {} is a {} (expected {})", name, id, actual.name(), expected.name()),
            ProjectError::Graph(err) => Display::fmt(err, f),
        }
    }
}

impl Error for ProjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProjectError::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GraphError> for ProjectError {
    fn from(err: GraphError) -> Self {
        ProjectError::Graph(err)
    }
}

impl From<ParseError> for ProjectError {
    fn from(err: ParseError) -> Self {
        ProjectError::Graph(GraphError::Parse(err))
    }
}

impl From<IntegrityError> for ProjectError {
    fn from(err: IntegrityError) -> Self {
        ProjectError::Graph(GraphError::Integrity(err))
    }
}

/// Identifiers of the boxes every project has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectBoxes {
    pub root: Identifier,
    pub user_interface: Identifier,
    pub master_bus: Identifier,
    pub master_unit: Identifier,
    pub timeline: Identifier,
}

impl ProjectBoxes {
    pub fn random() -> Self {
        ProjectBoxes {
            root: Identifier::random(),
            user_interface: Identifier::random(),
            master_bus: Identifier::random(),
            master_unit: Identifier::random(),
            timeline: Identifier::random(),
        }
    }

    fn expected(&self) -> [(&'static str, Identifier, BoxKind); 5] {
        [
            ("root", self.root, BoxKind::Root),
            ("user interface", self.user_interface, BoxKind::UserInterface),
            ("master bus", self.master_bus, BoxKind::AudioBus),
            ("master unit", self.master_unit, BoxKind::AudioUnit),
            ("timeline", self.timeline, BoxKind::Timeline),
        ]
    }

    fn write(&self, into: &mut Vec<u8>) {
        for (_, id, _) in self.expected() {
            id.write(into);
        }
    }

    fn read(parser: &mut BufParser) -> Result<Self, ParseError> {
        Ok(ProjectBoxes {
            root: Identifier::read(parser)?,
            user_interface: Identifier::read(parser)?,
            master_bus: Identifier::read(parser)?,
            master_unit: Identifier::read(parser)?,
            timeline: Identifier::read(parser)?,
        })
    }

    fn check(&self, graph: &BoxGraph) -> Result<(), ProjectError> {
        for (name, id, expected) in self.expected() {
            let vertex = graph.find_box(id).ok_or(ProjectError::MissingBox { name, id })?;
            if vertex.kind() != expected {
                return Err(ProjectError::WrongKind { name, id, expected, actual: vertex.kind() });
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Project {
    editing: Editing,
    boxes: ProjectBoxes,
}

impl Project {
    /// A new empty project with freshly generated identifiers.
    pub fn new() -> Result<Self, GraphError> {
        Self::with_boxes(ProjectBoxes::random())
    }

    /// A new empty project using the given identifiers for the mandatory boxes.
    pub fn with_boxes(boxes: ProjectBoxes) -> Result<Self, GraphError> {
        let created = SystemTime::now().duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
            .to_string();

        let mut graph = BoxGraph::new();
        graph.begin_transaction()?;
        if let Err(err) = build_skeleton(&mut graph, &boxes, &created) {
            graph.abort_transaction()?;
            return Err(err);
        }
        graph.end_transaction_checked()?;

        info!(root = %boxes.root, "created project");
        Ok(Project { editing: Editing::new(graph), boxes })
    }

    pub fn boxes(&self) -> &ProjectBoxes {
        &self.boxes
    }

    pub fn graph(&self) -> &BoxGraph {
        self.editing.graph()
    }

    pub fn editing(&self) -> &Editing {
        &self.editing
    }

    pub fn editing_mut(&mut self) -> &mut Editing {
        &mut self.editing
    }

    pub fn bpm(&self) -> f32 {
        self.graph().find_box(self.boxes.timeline)
            .and_then(|v| v.primitive(&[crate::schema::timeline::BPM]))
            .and_then(|v| v.as_f32())
            .unwrap_or(120.0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_i32(&mut out, MAGIC);
        push_i32(&mut out, FORMAT_VERSION);
        push_len_prefixed(&mut out, &self.graph().to_bytes());
        self.boxes.write(&mut out);
        out
    }

    /// Load a snapshot. The graph is checked for dangling pointers and unmet requirements, and all
    /// five mandatory boxes must be present with the right kind. History starts out empty.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProjectError> {
        let mut parser = BufParser(bytes);
        let magic = parser.next_i32_le()?;
        if magic != MAGIC {
            return Err(ProjectError::InvalidMagic { expected: MAGIC, actual: magic });
        }
        let version = parser.next_i32_le()?;
        if version != FORMAT_VERSION {
            return Err(ProjectError::VersionMismatch { expected: FORMAT_VERSION, actual: version });
        }
        let graph = BoxGraph::from_bytes(parser.next_len_prefixed()?)?;
        let boxes = ProjectBoxes::read(&mut parser)?;
        parser.expect_empty()?;

        boxes.check(&graph)?;
        graph.validate_requirements()?;
        info!(root = %boxes.root, stats = %graph.stats(), "loaded project");
        Ok(Project { editing: Editing::new(graph), boxes })
    }

    /// An independent project with the same content. Subscriptions and history aren't copied.
    pub fn copy(&self) -> Result<Self, ProjectError> {
        Self::from_bytes(&self.to_bytes())
    }
}

fn build_skeleton(graph: &mut BoxGraph, boxes: &ProjectBoxes, created: &str) -> Result<(), GraphError> {
    graph.create_box(BoxKind::Timeline, boxes.timeline, |_| Ok(()))?;
    graph.create_box(BoxKind::Root, boxes.root, |b| {
        b.set_primitive(&[root::CREATED], created.into())?;
        b.set_pointer(&[root::TIMELINE], Some(Address::box_of(boxes.timeline)))?;
        Ok(())
    })?;
    graph.create_box(BoxKind::UserInterface, boxes.user_interface, |b| {
        b.set_pointer(&[user_interface::ROOT], Some(Address::new(boxes.root, &[root::USERS]))).map(drop)
    })?;
    graph.create_box(BoxKind::AudioUnit, boxes.master_unit, |b| {
        b.set_pointer(&[audio_unit::COLLECTION], Some(Address::new(boxes.root, &[root::AUDIO_UNITS]))).map(drop)
    })?;
    graph.create_box(BoxKind::AudioBus, boxes.master_bus, |b| {
        b.set_primitive(&[audio_bus::LABEL], "Output".into())?;
        b.set_pointer(&[audio_bus::OUTPUT], Some(Address::new(boxes.master_unit, &[audio_unit::INPUT])))?;
        Ok(())
    })?;
    Ok(())
}
