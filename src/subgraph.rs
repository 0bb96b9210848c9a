//! Copy a box and everything it owns out of one graph and into another (or the same) graph.
//!
//! ```text
//! string      "box-graph:bundle"
//! int32       format version (1)
//! identifier  root
//! string      root type tag
//! int32       root payload length, payload
//! int32       dependency count
//! repeated    identifier, type tag, int32 payload length, payload
//! ```
//!
//! Payloads are the box settings. Every box gets a fresh identifier on export and again on
//! import, so a bundle can be pasted any number of times. Content addressed boxes (audio files)
//! keep their identifier, and the importer skips them if the graph already has them. They're
//! always exported along with the boxes using them, even when other boxes use them too.
//!
//! Pointers leaving the exported set (for a device, its host unit) are written empty. The caller
//! wires them up again inside the importing transaction, before it commits.

use std::collections::{BTreeMap, BTreeSet};
use rand::RngCore;
use tracing::debug;
use crate::{BoxGraph, BoxKind, Identifier};
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_i32, push_len, push_len_prefixed, push_str};
use crate::graph::GraphError;
use crate::vertex::Vertex;

pub const BUNDLE_HEADER: &str = "box-graph:bundle";
pub const BUNDLE_VERSION: i32 = 1;

type Mapping = BTreeMap<Identifier, Identifier>;

fn assign_ids<R: RngCore>(entries: impl Iterator<Item=(Identifier, BoxKind)>, rng: &mut R) -> Mapping {
    entries.map(|(id, kind)| {
        let new_id = if kind.is_content_addressed() { id } else { Identifier::random_from(rng) };
        (id, new_id)
    }).collect()
}

/// Point every pointer in `vertex` through the mapping. Targets outside the mapping are emptied
/// when `drop_outside` is set, otherwise left alone.
fn remap_pointers(vertex: &mut Vertex, mapping: &Mapping, drop_outside: bool) -> Result<(), GraphError> {
    let pointers: Vec<_> = vertex.pointers().into_iter()
        .filter_map(|(pointer, p)| p.target().map(|t| (pointer, t.clone())))
        .collect();
    for (pointer, target) in pointers {
        let new_target = match mapping.get(&target.id()) {
            Some(new_id) => Some(target.move_to(*new_id)),
            None if drop_outside => None,
            None => Some(target),
        };
        vertex.set_pointer(pointer.field_keys(), new_target)?;
    }
    Ok(())
}

/// Export `id` and its [dependencies](BoxGraph::dependencies_of) as a bundle.
pub fn export(graph: &BoxGraph, id: Identifier) -> Result<Vec<u8>, GraphError> {
    export_with_rng(graph, id, &mut rand::thread_rng())
}

pub fn export_with_rng<R: RngCore>(graph: &BoxGraph, id: Identifier, rng: &mut R) -> Result<Vec<u8>, GraphError> {
    let root = graph.find_box(id).ok_or(GraphError::UnknownBox(id))?;
    let mut dependencies = graph.dependencies_of(id).boxes;

    // Content addressed targets come along even when they're shared. Their identifier doesn't
    // change, and the importer skips the ones it already has.
    let mut included: BTreeSet<Identifier> = dependencies.iter().copied().collect();
    included.insert(id);
    for owner in std::iter::once(id).chain(dependencies.clone()) {
        for (_, target) in graph.outgoing_of_box(owner) {
            let shared = graph.find_box(target.id()).map_or(false, |v| v.kind().is_content_addressed());
            if shared && included.insert(target.id()) {
                dependencies.push(target.id());
            }
        }
    }

    let mut vertices = vec![root];
    for dep in dependencies.iter() {
        vertices.push(graph.find_box(*dep).ok_or(GraphError::UnknownBox(*dep))?);
    }
    let mapping = assign_ids(vertices.iter().map(|v| (v.id(), v.kind())), rng);

    let write_entry = |out: &mut Vec<u8>, vertex: &Vertex| -> Result<(), GraphError> {
        let mut copy = vertex.clone();
        remap_pointers(&mut copy, &mapping, true)?;
        mapping[&vertex.id()].write(out);
        push_str(out, vertex.kind().name());
        push_len_prefixed(out, &copy.settings());
        Ok(())
    };

    let mut out = Vec::new();
    push_str(&mut out, BUNDLE_HEADER);
    push_i32(&mut out, BUNDLE_VERSION);
    write_entry(&mut out, root)?;
    push_len(&mut out, dependencies.len());
    for vertex in vertices.iter().skip(1) {
        write_entry(&mut out, vertex)?;
    }

    debug!(root = %id, boxes = vertices.len(), size = out.len(), "exported bundle");
    Ok(out)
}

struct Entry<'a> {
    id: Identifier,
    kind: BoxKind,
    settings: &'a [u8],
}

fn read_entry<'a>(parser: &mut BufParser<'a>) -> Result<Entry<'a>, ParseError> {
    let id = Identifier::read(parser)?;
    let kind = BoxKind::from_name(parser.next_str()?).ok_or(ParseError::UnknownTypeTag)?;
    let settings = parser.next_len_prefixed()?;
    Ok(Entry { id, kind, settings })
}

fn read_bundle(bytes: &[u8]) -> Result<Vec<Entry<'_>>, ParseError> {
    let mut parser = BufParser(bytes);
    if parser.next_str()? != BUNDLE_HEADER { return Err(ParseError::InvalidMagic); }
    if parser.next_i32_le()? != BUNDLE_VERSION { return Err(ParseError::UnsupportedProtocolVersion); }

    let mut entries = vec![read_entry(&mut parser)?];
    let count = parser.next_count()?;
    for _ in 0..count {
        entries.push(read_entry(&mut parser)?);
    }
    parser.expect_empty()?;
    Ok(entries)
}

/// Import a bundle into the graph's open transaction and return the new root identifier.
///
/// Nothing is checked until the transaction ends, which is when the caller has had the chance to
/// wire up the pointers the export dropped.
pub fn import(graph: &mut BoxGraph, bytes: &[u8]) -> Result<Identifier, GraphError> {
    import_with_rng(graph, bytes, &mut rand::thread_rng())
}

pub fn import_with_rng<R: RngCore>(graph: &mut BoxGraph, bytes: &[u8], rng: &mut R) -> Result<Identifier, GraphError> {
    if !graph.in_transaction() { return Err(GraphError::NotInTransaction); }
    let entries = read_bundle(bytes)?;
    let mapping = assign_ids(entries.iter().map(|e| (e.id, e.kind)), rng);

    let mut created = 0;
    for entry in entries.iter() {
        let new_id = mapping[&entry.id];
        if entry.kind.is_content_addressed() && graph.find_box(new_id).is_some() {
            continue;
        }
        graph.create_box(entry.kind, new_id, |vertex| {
            vertex.read_settings(entry.settings)?;
            remap_pointers(vertex, &mapping, false)
        })?;
        created += 1;
    }

    let root = mapping[&entries[0].id];
    debug!(%root, boxes = entries.len(), created, "imported bundle");
    Ok(root)
}

#[cfg(test)]
mod test {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use super::*;
    use crate::Address;
    use crate::schema::*;

    fn id(n: u32) -> Identifier { Identifier::from_int(n) }

    fn file_id() -> Identifier { Identifier::from_content(b"loop.wav") }

    // unit(1) <- tape(2) -> file, unit(1) <- track(3) <- note region(4) -> collection(5) <- events(6, 7)
    fn source() -> BoxGraph {
        let mut graph = BoxGraph::new();
        graph.begin_transaction().unwrap();
        graph.create_box(BoxKind::AudioUnit, id(1), |_| Ok(())).unwrap();
        graph.create_box(BoxKind::AudioFile, file_id(), |b| {
            b.set_primitive(&[audio_file::FILE_NAME], "loop.wav".into()).map(drop)
        }).unwrap();
        graph.create_box(BoxKind::TapeDevice, id(2), |b| {
            b.set_pointer(&[tape_device::HOST], Some(Address::new(id(1), &[audio_unit::INPUT])))?;
            b.set_pointer(&[tape_device::SAMPLE], Some(Address::box_of(file_id())))?;
            b.set_primitive(&[tape_device::FLUTTER], 0.3f32.into())?;
            Ok(())
        }).unwrap();
        graph.create_box(BoxKind::Track, id(3), |b| {
            b.set_pointer(&[track::TRACKS], Some(Address::new(id(1), &[audio_unit::TRACKS]))).map(drop)
        }).unwrap();
        graph.create_box(BoxKind::NoteEventCollection, id(5), |_| Ok(())).unwrap();
        graph.create_box(BoxKind::NoteRegion, id(4), |b| {
            b.set_pointer(&[note_region::REGIONS], Some(Address::new(id(3), &[track::REGIONS])))?;
            b.set_pointer(&[note_region::EVENTS], Some(Address::box_of(id(5))))?;
            Ok(())
        }).unwrap();
        for (n, pitch) in [(6, 60), (7, 64)] {
            graph.create_box(BoxKind::NoteEvent, id(n), |b| {
                b.set_pointer(&[note_event::EVENTS], Some(Address::new(id(5), &[note_event_collection::EVENTS])))?;
                b.set_primitive(&[note_event::PITCH], pitch.into())?;
                Ok(())
            }).unwrap();
        }
        graph.end_transaction().unwrap();
        graph
    }

    fn count_kind(graph: &BoxGraph, kind: BoxKind) -> usize {
        graph.boxes().filter(|v| v.kind() == kind).count()
    }

    #[test]
    fn tape_round_trip_keeps_the_file() {
        let graph = source();
        let mut rng = SmallRng::seed_from_u64(1);
        let bundle = export_with_rng(&graph, id(2), &mut rng).unwrap();

        let mut dest = BoxGraph::new();
        dest.begin_transaction().unwrap();
        dest.create_box(BoxKind::AudioUnit, id(100), |_| Ok(())).unwrap();
        let tape = import_with_rng(&mut dest, &bundle, &mut rng).unwrap();
        assert_ne!(tape, id(2));
        // The host was outside the bundle.
        assert_eq!(dest.find_box(tape).unwrap().pointer_target(&[tape_device::HOST]), None);
        dest.refer(&Address::new(tape, &[tape_device::HOST]), Address::new(id(100), &[audio_unit::INPUT])).unwrap();
        dest.end_transaction().unwrap();

        let copy = dest.find_box(tape).unwrap();
        assert_eq!(copy.pointer_target(&[tape_device::SAMPLE]), Some(&Address::box_of(file_id())));
        assert_eq!(copy.primitive(&[tape_device::FLUTTER]), graph.find_box(id(2)).unwrap().primitive(&[tape_device::FLUTTER]));
        assert_eq!(dest.find_box(file_id()).unwrap().primitive(&[audio_file::FILE_NAME]).unwrap().as_str(), Some("loop.wav"));
        dest.verify_pointers().unwrap();
    }

    #[test]
    fn pasting_twice_shares_the_file() {
        let mut graph = source();
        let bundle = export(&graph, id(2)).unwrap();

        graph.begin_transaction().unwrap();
        let a = import(&mut graph, &bundle).unwrap();
        let b = import(&mut graph, &bundle).unwrap();
        for tape in [a, b] {
            graph.refer(&Address::new(tape, &[tape_device::HOST]), Address::new(id(1), &[audio_unit::INPUT])).unwrap();
        }
        graph.end_transaction().unwrap();

        assert_ne!(a, b);
        assert_eq!(count_kind(&graph, BoxKind::TapeDevice), 3);
        assert_eq!(count_kind(&graph, BoxKind::AudioFile), 1);
        assert_eq!(graph.incoming(&Address::box_of(file_id())).len(), 3);
    }

    #[test]
    fn track_bundle_is_isomorphic() {
        let graph = source();
        let bundle = export(&graph, id(3)).unwrap();

        let mut dest = BoxGraph::new();
        dest.begin_transaction().unwrap();
        let track = import(&mut dest, &bundle).unwrap();
        dest.end_transaction().unwrap();

        assert_eq!(dest.len(), 5);
        for kind in [BoxKind::Track, BoxKind::NoteRegion, BoxKind::NoteEventCollection, BoxKind::NoteEvent] {
            assert_eq!(count_kind(&dest, kind), count_kind(&graph, kind));
        }
        let regions = dest.incoming(&Address::new(track, &[track::REGIONS]));
        assert_eq!(regions.len(), 1);
        let region = dest.find_box(regions[0].id()).unwrap();
        let collection = region.pointer_target(&[note_region::EVENTS]).unwrap().id();
        assert_eq!(dest.incoming(&Address::new(collection, &[note_event_collection::EVENTS])).len(), 2);
        // None of the source identifiers made it across.
        assert!(dest.boxes().all(|v| graph.find_box(v.id()).is_none()));
        dest.verify_pointers().unwrap();
    }

    #[test]
    fn shared_files_come_along() {
        let mut graph = source();
        graph.begin_transaction().unwrap();
        graph.create_box(BoxKind::AudioRegion, id(8), |b| {
            b.set_pointer(&[audio_region::REGIONS], Some(Address::new(id(3), &[track::REGIONS])))?;
            b.set_pointer(&[audio_region::FILE], Some(Address::box_of(file_id())))?;
            Ok(())
        }).unwrap();
        graph.end_transaction().unwrap();
        // The tape uses the file too, so the track doesn't own it.
        assert!(!graph.dependencies_of(id(3)).boxes.contains(&file_id()));

        let bundle = export(&graph, id(3)).unwrap();
        let mut dest = BoxGraph::new();
        dest.begin_transaction().unwrap();
        import(&mut dest, &bundle).unwrap();
        dest.end_transaction_checked().unwrap_err();
        assert!(dest.is_empty());

        // Wire the track to a unit and it all checks out.
        dest.begin_transaction().unwrap();
        let track = import(&mut dest, &bundle).unwrap();
        dest.create_box(BoxKind::AudioUnit, id(100), |_| Ok(())).unwrap();
        dest.refer(&Address::new(track, &[track::TRACKS]), Address::new(id(100), &[audio_unit::TRACKS])).unwrap();
        dest.end_transaction().unwrap();
        assert_eq!(dest.len(), 7);
        assert_eq!(dest.incoming(&Address::box_of(file_id())).len(), 1);
        dest.verify_pointers().unwrap();
    }

    #[test]
    fn import_needs_a_transaction() {
        let graph = source();
        let bundle = export(&graph, id(4)).unwrap();
        let mut dest = BoxGraph::new();
        assert_eq!(import(&mut dest, &bundle), Err(GraphError::NotInTransaction));
    }

    #[test]
    fn rejects_other_data() {
        let mut graph = BoxGraph::new();
        graph.begin_transaction().unwrap();
        assert_eq!(import(&mut graph, &[0xff; 3]).unwrap_err(), GraphError::Parse(ParseError::UnexpectedEOF));

        let mut bundle = export(&source(), id(2)).unwrap();
        bundle[4] = b'X';
        assert_eq!(import(&mut graph, &bundle).unwrap_err(), GraphError::Parse(ParseError::InvalidMagic));
        assert!(graph.is_empty());
    }

    #[test]
    fn export_unknown_box() {
        assert_eq!(export(&BoxGraph::new(), id(1)), Err(GraphError::UnknownBox(id(1))));
    }
}
