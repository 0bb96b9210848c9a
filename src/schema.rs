//! The closed set of box kinds making up a project, and their field layouts.
//!
//! Field keys are part of the file format. Never renumber them; add new keys at the end.

use crate::field::{FieldKind, FieldSpec};
use crate::pointer::{PointerRules, PointerType};
use crate::primitive::PrimitiveDefault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoxKind {
    Root,
    UserInterface,
    Timeline,
    AudioBus,
    AudioUnit,
    Track,
    NoteRegion,
    AudioRegion,
    NoteEventCollection,
    NoteEvent,
    AudioFile,
    TapeDevice,
    DelayDevice,
    Marker,
}

const fn primitive(key: i16, name: &'static str, default: PrimitiveDefault) -> FieldSpec {
    FieldSpec { key, name, kind: FieldKind::Primitive(default) }
}

const fn pointer(key: i16, name: &'static str, pointer_type: PointerType, mandatory: bool) -> FieldSpec {
    FieldSpec { key, name, kind: FieldKind::Pointer { pointer_type, mandatory } }
}

const fn hook(key: i16, name: &'static str, rules: PointerRules) -> FieldSpec {
    FieldSpec { key, name, kind: FieldKind::Hook(rules) }
}

const fn object(key: i16, name: &'static str, fields: &'static [FieldSpec]) -> FieldSpec {
    FieldSpec { key, name, kind: FieldKind::Object(fields) }
}

use PrimitiveDefault::{Boolean, Float32, Int32, String};

pub mod root {
    use super::*;
    pub const CREATED: i16 = 1;
    pub const AUDIO_UNITS: i16 = 2;
    pub const TIMELINE: i16 = 3;
    pub const USERS: i16 = 4;

    pub(super) static FIELDS: [FieldSpec; 4] = [
        primitive(CREATED, "created", String("")),
        hook(AUDIO_UNITS, "audio-units", PointerRules::accepting(&[PointerType::AudioUnits])),
        pointer(TIMELINE, "timeline", PointerType::Timeline, true),
        hook(USERS, "users", PointerRules::accepting(&[PointerType::UserInterface])),
    ];
}

pub mod user_interface {
    use super::*;
    pub const ROOT: i16 = 1;

    pub(super) static FIELDS: [FieldSpec; 1] = [
        pointer(ROOT, "root", PointerType::UserInterface, true),
    ];
}

pub mod timeline {
    use super::*;
    pub const BPM: i16 = 1;
    pub const SIGNATURE: i16 = 2;
    pub const MARKERS: i16 = 3;
    pub const LOOP_AREA: i16 = 4;

    pub mod signature {
        pub const NOMINATOR: i16 = 1;
        pub const DENOMINATOR: i16 = 2;
    }

    pub mod loop_area {
        pub const ENABLED: i16 = 1;
        pub const FROM: i16 = 2;
        pub const TO: i16 = 3;
    }

    static SIGNATURE_FIELDS: [FieldSpec; 2] = [
        primitive(signature::NOMINATOR, "nominator", Int32(4)),
        primitive(signature::DENOMINATOR, "denominator", Int32(4)),
    ];

    static LOOP_AREA_FIELDS: [FieldSpec; 3] = [
        primitive(loop_area::ENABLED, "enabled", Boolean(true)),
        primitive(loop_area::FROM, "from", Int32(0)),
        primitive(loop_area::TO, "to", Int32(15360)),
    ];

    pub(super) static FIELDS: [FieldSpec; 4] = [
        primitive(BPM, "bpm", Float32(120.0)),
        object(SIGNATURE, "signature", &SIGNATURE_FIELDS),
        hook(MARKERS, "markers", PointerRules::accepting(&[PointerType::MarkerTrack])),
        object(LOOP_AREA, "loop-area", &LOOP_AREA_FIELDS),
    ];
}

pub mod audio_bus {
    use super::*;
    pub const INPUT: i16 = 1;
    pub const OUTPUT: i16 = 2;
    pub const LABEL: i16 = 3;
    pub const ENABLED: i16 = 4;

    pub(super) static FIELDS: [FieldSpec; 4] = [
        hook(INPUT, "input", PointerRules::accepting(&[PointerType::AudioOutput])),
        pointer(OUTPUT, "output", PointerType::AudioOutput, false),
        primitive(LABEL, "label", String("")),
        primitive(ENABLED, "enabled", Boolean(true)),
    ];
}

pub mod audio_unit {
    use super::*;
    pub const COLLECTION: i16 = 1;
    pub const INDEX: i16 = 2;
    pub const VOLUME: i16 = 3;
    pub const PANNING: i16 = 4;
    pub const MUTE: i16 = 5;
    pub const SOLO: i16 = 6;
    pub const INPUT: i16 = 7;
    pub const OUTPUT: i16 = 8;
    pub const TRACKS: i16 = 9;
    pub const AUDIO_EFFECTS: i16 = 10;

    pub(super) static FIELDS: [FieldSpec; 10] = [
        pointer(COLLECTION, "collection", PointerType::AudioUnits, true),
        primitive(INDEX, "index", Int32(0)),
        primitive(VOLUME, "volume", Float32(0.0)),
        primitive(PANNING, "panning", Float32(0.0)),
        primitive(MUTE, "mute", Boolean(false)),
        primitive(SOLO, "solo", Boolean(false)),
        hook(INPUT, "input", PointerRules::accepting(&[PointerType::InstrumentHost, PointerType::AudioOutput])),
        pointer(OUTPUT, "output", PointerType::AudioOutput, false),
        hook(TRACKS, "tracks", PointerRules::accepting(&[PointerType::Tracks])),
        hook(AUDIO_EFFECTS, "audio-effects", PointerRules::accepting(&[PointerType::AudioEffectHost])),
    ];
}

pub mod track {
    use super::*;
    pub const TRACKS: i16 = 1;
    pub const REGIONS: i16 = 2;
    pub const INDEX: i16 = 3;
    pub const ENABLED: i16 = 4;
    pub const TYPE: i16 = 5;

    pub(super) static FIELDS: [FieldSpec; 5] = [
        pointer(TRACKS, "tracks", PointerType::Tracks, true),
        hook(REGIONS, "regions", PointerRules::accepting(&[PointerType::RegionCollection])),
        primitive(INDEX, "index", Int32(0)),
        primitive(ENABLED, "enabled", Boolean(true)),
        primitive(TYPE, "type", Int32(0)),
    ];
}

pub mod note_region {
    use super::*;
    pub const REGIONS: i16 = 1;
    pub const EVENTS: i16 = 2;
    pub const POSITION: i16 = 3;
    pub const DURATION: i16 = 4;
    pub const LABEL: i16 = 5;
    pub const HUE: i16 = 6;
    pub const MUTE: i16 = 7;

    pub(super) static FIELDS: [FieldSpec; 7] = [
        pointer(REGIONS, "regions", PointerType::RegionCollection, true),
        pointer(EVENTS, "events", PointerType::NoteEvents, true),
        primitive(POSITION, "position", Int32(0)),
        primitive(DURATION, "duration", Int32(0)),
        primitive(LABEL, "label", String("")),
        primitive(HUE, "hue", Int32(0)),
        primitive(MUTE, "mute", Boolean(false)),
    ];
}

pub mod audio_region {
    use super::*;
    pub const REGIONS: i16 = 1;
    pub const FILE: i16 = 2;
    pub const POSITION: i16 = 3;
    pub const DURATION: i16 = 4;
    pub const LABEL: i16 = 5;
    pub const GAIN: i16 = 6;

    pub(super) static FIELDS: [FieldSpec; 6] = [
        pointer(REGIONS, "regions", PointerType::RegionCollection, true),
        pointer(FILE, "file", PointerType::AudioFile, true),
        primitive(POSITION, "position", Int32(0)),
        primitive(DURATION, "duration", Int32(0)),
        primitive(LABEL, "label", String("")),
        primitive(GAIN, "gain", Float32(0.0)),
    ];
}

pub mod note_event_collection {
    use super::*;
    pub const EVENTS: i16 = 1;

    pub(super) static FIELDS: [FieldSpec; 1] = [
        hook(EVENTS, "events", PointerRules::accepting(&[PointerType::NoteEventCollection])),
    ];
}

pub mod note_event {
    use super::*;
    pub const EVENTS: i16 = 1;
    pub const POSITION: i16 = 2;
    pub const DURATION: i16 = 3;
    pub const PITCH: i16 = 4;
    pub const VELOCITY: i16 = 5;

    pub(super) static FIELDS: [FieldSpec; 5] = [
        pointer(EVENTS, "events", PointerType::NoteEventCollection, true),
        primitive(POSITION, "position", Int32(0)),
        primitive(DURATION, "duration", Int32(240)),
        primitive(PITCH, "pitch", Int32(60)),
        primitive(VELOCITY, "velocity", Float32(1.0)),
    ];
}

pub mod audio_file {
    use super::*;
    pub const FILE_NAME: i16 = 1;
    pub const START_IN_SECONDS: i16 = 2;
    pub const END_IN_SECONDS: i16 = 3;

    pub(super) static FIELDS: [FieldSpec; 3] = [
        primitive(FILE_NAME, "file-name", String("")),
        primitive(START_IN_SECONDS, "start-in-seconds", Float32(0.0)),
        primitive(END_IN_SECONDS, "end-in-seconds", Float32(0.0)),
    ];
}

pub mod tape_device {
    use super::*;
    pub const HOST: i16 = 1;
    pub const LABEL: i16 = 2;
    pub const ENABLED: i16 = 3;
    pub const MINIMIZED: i16 = 4;
    pub const SAMPLE: i16 = 5;
    pub const FLUTTER: i16 = 6;

    pub(super) static FIELDS: [FieldSpec; 6] = [
        pointer(HOST, "host", PointerType::InstrumentHost, true),
        primitive(LABEL, "label", String("Tape")),
        primitive(ENABLED, "enabled", Boolean(true)),
        primitive(MINIMIZED, "minimized", Boolean(false)),
        pointer(SAMPLE, "sample", PointerType::AudioFile, false),
        primitive(FLUTTER, "flutter", Float32(0.0)),
    ];
}

pub mod delay_device {
    use super::*;
    pub const HOST: i16 = 1;
    pub const INDEX: i16 = 2;
    pub const LABEL: i16 = 3;
    pub const DELAY: i16 = 4;
    pub const FEEDBACK: i16 = 5;
    pub const CROSS: i16 = 6;

    pub(super) static FIELDS: [FieldSpec; 6] = [
        pointer(HOST, "host", PointerType::AudioEffectHost, true),
        primitive(INDEX, "index", Int32(0)),
        primitive(LABEL, "label", String("Delay")),
        primitive(DELAY, "delay", Float32(4.0)),
        primitive(FEEDBACK, "feedback", Float32(0.5)),
        primitive(CROSS, "cross", Float32(0.0)),
    ];
}

pub mod marker {
    use super::*;
    pub const TRACK: i16 = 1;
    pub const POSITION: i16 = 2;
    pub const LABEL: i16 = 3;
    pub const PLAYS: i16 = 4;
    pub const HUE: i16 = 5;

    pub(super) static FIELDS: [FieldSpec; 5] = [
        pointer(TRACK, "track", PointerType::MarkerTrack, true),
        primitive(POSITION, "position", Int32(0)),
        primitive(LABEL, "label", String("")),
        primitive(PLAYS, "plays", Int32(1)),
        primitive(HUE, "hue", Int32(0)),
    ];
}

impl BoxKind {
    pub const ALL: [BoxKind; 14] = [
        BoxKind::Root, BoxKind::UserInterface, BoxKind::Timeline, BoxKind::AudioBus,
        BoxKind::AudioUnit, BoxKind::Track, BoxKind::NoteRegion, BoxKind::AudioRegion,
        BoxKind::NoteEventCollection, BoxKind::NoteEvent, BoxKind::AudioFile,
        BoxKind::TapeDevice, BoxKind::DelayDevice, BoxKind::Marker,
    ];

    /// The type tag written to snapshots, bundles and the commit log.
    pub fn name(self) -> &'static str {
        match self {
            BoxKind::Root => "RootBox",
            BoxKind::UserInterface => "UserInterfaceBox",
            BoxKind::Timeline => "TimelineBox",
            BoxKind::AudioBus => "AudioBusBox",
            BoxKind::AudioUnit => "AudioUnitBox",
            BoxKind::Track => "TrackBox",
            BoxKind::NoteRegion => "NoteRegionBox",
            BoxKind::AudioRegion => "AudioRegionBox",
            BoxKind::NoteEventCollection => "NoteEventCollectionBox",
            BoxKind::NoteEvent => "NoteEventBox",
            BoxKind::AudioFile => "AudioFileBox",
            BoxKind::TapeDevice => "TapeDeviceBox",
            BoxKind::DelayDevice => "DelayDeviceBox",
            BoxKind::Marker => "MarkerBox",
        }
    }

    pub fn from_name(name: &str) -> Option<BoxKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            BoxKind::Root => &root::FIELDS,
            BoxKind::UserInterface => &user_interface::FIELDS,
            BoxKind::Timeline => &timeline::FIELDS,
            BoxKind::AudioBus => &audio_bus::FIELDS,
            BoxKind::AudioUnit => &audio_unit::FIELDS,
            BoxKind::Track => &track::FIELDS,
            BoxKind::NoteRegion => &note_region::FIELDS,
            BoxKind::AudioRegion => &audio_region::FIELDS,
            BoxKind::NoteEventCollection => &note_event_collection::FIELDS,
            BoxKind::NoteEvent => &note_event::FIELDS,
            BoxKind::AudioFile => &audio_file::FIELDS,
            BoxKind::TapeDevice => &tape_device::FIELDS,
            BoxKind::DelayDevice => &delay_device::FIELDS,
            BoxKind::Marker => &marker::FIELDS,
        }
    }

    /// Rules for pointers targeting the box itself (as opposed to one of its hooks).
    pub fn rules(self) -> PointerRules {
        match self {
            BoxKind::Timeline => PointerRules::mandatory(&[PointerType::Timeline]),
            BoxKind::NoteEventCollection => PointerRules::mandatory(&[PointerType::NoteEvents]),
            BoxKind::AudioFile => PointerRules::mandatory(&[PointerType::AudioFile]),
            _ => PointerRules::NONE,
        }
    }

    /// Content addressed boxes keep their identifier on export, so importing the same asset twice
    /// yields a single box.
    pub fn is_content_addressed(self) -> bool {
        matches!(self, BoxKind::AudioFile)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use super::*;

    fn check_keys(specs: &'static [FieldSpec]) {
        let mut keys = HashSet::new();
        for spec in specs {
            assert!(keys.insert(spec.key), "duplicate key {} ({})", spec.key, spec.name);
            if let FieldKind::Object(inner) = spec.kind { check_keys(inner); }
        }
    }

    #[test]
    fn layouts_have_unique_keys() {
        for kind in BoxKind::ALL {
            check_keys(kind.fields());
        }
    }

    #[test]
    fn names_round_trip() {
        for kind in BoxKind::ALL {
            assert_eq!(BoxKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(BoxKind::from_name("NopeBox"), None);
    }
}
