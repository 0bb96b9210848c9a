/// The kind of an edge. A pointer field has exactly one type, and a target declares which types
/// it accepts in its [`PointerRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointerType {
    /// An audio unit registering itself with the project root.
    AudioUnits = 0,
    /// An instrument device living inside an audio unit.
    InstrumentHost = 1,
    /// An audio effect living inside an audio unit.
    AudioEffectHost = 2,
    /// Signal routing. Routing may form loops.
    AudioOutput = 3,
    Tracks = 4,
    RegionCollection = 5,
    /// A note region owning its event collection.
    NoteEvents = 6,
    NoteEventCollection = 7,
    AudioFile = 8,
    Timeline = 9,
    MarkerTrack = 10,
    UserInterface = 11,
}

/// What happens to a pointer of some type when the box it targets is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// The box holding the pointer is deleted too.
    Cascade,
    /// The pointer is emptied.
    Clear,
    /// The deletion fails.
    Reject,
}

impl PointerType {
    pub const ALL: [PointerType; 12] = [
        PointerType::AudioUnits, PointerType::InstrumentHost, PointerType::AudioEffectHost,
        PointerType::AudioOutput, PointerType::Tracks, PointerType::RegionCollection,
        PointerType::NoteEvents, PointerType::NoteEventCollection, PointerType::AudioFile,
        PointerType::Timeline, PointerType::MarkerTrack, PointerType::UserInterface,
    ];

    pub fn delete_policy(self) -> DeletePolicy {
        match self {
            PointerType::AudioOutput => DeletePolicy::Clear,
            PointerType::AudioFile | PointerType::Timeline => DeletePolicy::Reject,
            PointerType::AudioUnits
            | PointerType::InstrumentHost
            | PointerType::AudioEffectHost
            | PointerType::Tracks
            | PointerType::RegionCollection
            | PointerType::NoteEvents
            | PointerType::NoteEventCollection
            | PointerType::MarkerTrack
            | PointerType::UserInterface => DeletePolicy::Cascade,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PointerType::AudioUnits => "audio-units",
            PointerType::InstrumentHost => "instrument-host",
            PointerType::AudioEffectHost => "audio-effect-host",
            PointerType::AudioOutput => "audio-output",
            PointerType::Tracks => "tracks",
            PointerType::RegionCollection => "regions-collection",
            PointerType::NoteEvents => "note-events",
            PointerType::NoteEventCollection => "note-event-collection",
            PointerType::AudioFile => "audio-file",
            PointerType::Timeline => "timeline",
            PointerType::MarkerTrack => "marker-track",
            PointerType::UserInterface => "user-interface",
        }
    }
}

/// Declares which pointer types may target a box or field, and whether at least one incoming
/// pointer is required at the end of every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerRules {
    pub accepts: &'static [PointerType],
    pub mandatory: bool,
}

impl PointerRules {
    pub const NONE: PointerRules = PointerRules { accepts: &[], mandatory: false };

    pub const fn accepting(accepts: &'static [PointerType]) -> Self {
        PointerRules { accepts, mandatory: false }
    }

    pub const fn mandatory(accepts: &'static [PointerType]) -> Self {
        PointerRules { accepts, mandatory: true }
    }

    pub fn accepts(&self, ty: PointerType) -> bool {
        self.accepts.contains(&ty)
    }
}
