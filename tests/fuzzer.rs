use rand::prelude::*;
use box_graph::*;
use box_graph::schema::*;
use box_graph::subgraph;
use box_graph::sync_log::{MemorySink, ReadOptions, SyncLogReader, SyncLogWriter};

fn ids_of(graph: &BoxGraph, kind: BoxKind) -> Vec<Identifier> {
    graph.boxes().filter(|v| v.kind() == kind).map(|v| v.id()).collect()
}

fn skeleton(boxes: &ProjectBoxes) -> [Identifier; 5] {
    [boxes.root, boxes.user_interface, boxes.master_bus, boxes.master_unit, boxes.timeline]
}

fn sample_file(graph: &mut BoxGraph, rng: &mut SmallRng) -> Result<Identifier, GraphError> {
    let name = format!("sample-{}.wav", rng.gen_range(0..3));
    let id = Identifier::from_content(name.as_bytes());
    if graph.find_box(id).is_none() {
        graph.create_box(BoxKind::AudioFile, id, |b| {
            b.set_primitive(&[audio_file::FILE_NAME], name.as_str().into()).map(drop)
        })?;
    }
    Ok(id)
}

fn make_random_change(graph: &mut BoxGraph, boxes: &ProjectBoxes, rng: &mut SmallRng) -> Result<(), GraphError> {
    let units = ids_of(graph, BoxKind::AudioUnit);
    let tracks = ids_of(graph, BoxKind::Track);
    let unit = *units.choose(rng).unwrap();

    match rng.gen_range(0..12) {
        0 => {
            let output = if rng.gen_bool(0.5) {
                Address::new(boxes.master_bus, &[audio_bus::INPUT])
            } else {
                Address::new(unit, &[audio_unit::INPUT])
            };
            let index = units.len() as i32;
            graph.create_box(BoxKind::AudioUnit, Identifier::random_from(rng), |b| {
                b.set_pointer(&[audio_unit::COLLECTION], Some(Address::new(boxes.root, &[root::AUDIO_UNITS])))?;
                b.set_pointer(&[audio_unit::OUTPUT], Some(output))?;
                b.set_primitive(&[audio_unit::INDEX], index.into())?;
                Ok(())
            })?;
        }
        1 => {
            graph.create_box(BoxKind::Track, Identifier::random_from(rng), |b| {
                b.set_pointer(&[track::TRACKS], Some(Address::new(unit, &[audio_unit::TRACKS]))).map(drop)
            })?;
        }
        2 => {
            let Some(track) = tracks.choose(rng).copied() else { return Ok(()) };
            let collection = Identifier::random_from(rng);
            graph.create_box(BoxKind::NoteEventCollection, collection, |_| Ok(()))?;
            let position = rng.gen_range(0..10000i32);
            graph.create_box(BoxKind::NoteRegion, Identifier::random_from(rng), |b| {
                b.set_pointer(&[note_region::REGIONS], Some(Address::new(track, &[track::REGIONS])))?;
                b.set_pointer(&[note_region::EVENTS], Some(Address::box_of(collection)))?;
                b.set_primitive(&[note_region::POSITION], position.into())?;
                Ok(())
            })?;
        }
        3 => {
            let Some(track) = tracks.choose(rng).copied() else { return Ok(()) };
            let file = sample_file(graph, rng)?;
            graph.create_box(BoxKind::AudioRegion, Identifier::random_from(rng), |b| {
                b.set_pointer(&[audio_region::REGIONS], Some(Address::new(track, &[track::REGIONS])))?;
                b.set_pointer(&[audio_region::FILE], Some(Address::box_of(file)))?;
                Ok(())
            })?;
        }
        4 => {
            let Some(collection) = ids_of(graph, BoxKind::NoteEventCollection).choose(rng).copied() else { return Ok(()) };
            for _ in 0..rng.gen_range(1..4) {
                let pitch = rng.gen_range(0..128i32);
                graph.create_box(BoxKind::NoteEvent, Identifier::random_from(rng), |b| {
                    b.set_pointer(&[note_event::EVENTS], Some(Address::new(collection, &[note_event_collection::EVENTS])))?;
                    b.set_primitive(&[note_event::PITCH], pitch.into())?;
                    Ok(())
                })?;
            }
        }
        5 => {
            let sample = if rng.gen_bool(0.5) { Some(sample_file(graph, rng)?) } else { None };
            graph.create_box(BoxKind::TapeDevice, Identifier::random_from(rng), |b| {
                b.set_pointer(&[tape_device::HOST], Some(Address::new(unit, &[audio_unit::INPUT])))?;
                b.set_pointer(&[tape_device::SAMPLE], sample.map(Address::box_of))?;
                Ok(())
            })?;
        }
        6 => {
            graph.create_box(BoxKind::DelayDevice, Identifier::random_from(rng), |b| {
                b.set_pointer(&[delay_device::HOST], Some(Address::new(unit, &[audio_unit::AUDIO_EFFECTS]))).map(drop)
            })?;
        }
        7 => {
            match rng.gen_range(0..4) {
                0 => graph.set_primitive(&Address::new(boxes.timeline, &[timeline::BPM]), rng.gen_range(60.0f32..200.0).into())?,
                1 => graph.set_primitive(&Address::new(unit, &[audio_unit::VOLUME]), rng.gen_range(-12.0f32..6.0).into())?,
                2 => if let Some(track) = tracks.choose(rng) {
                    graph.set_primitive(&Address::new(*track, &[track::INDEX]), rng.gen_range(0..16i32).into())?;
                },
                _ => if let Some(event) = ids_of(graph, BoxKind::NoteEvent).choose(rng) {
                    graph.reset(&Address::new(*event, &[note_event::PITCH]))?;
                },
            }
        }
        8 => {
            let Some(track) = tracks.choose(rng).copied() else { return Ok(()) };
            graph.refer(&Address::new(track, &[track::TRACKS]), Address::new(unit, &[audio_unit::TRACKS]))?;
        }
        9 => {
            // Can orphan a file, which the commit refuses.
            let Some(tape) = ids_of(graph, BoxKind::TapeDevice).choose(rng).copied() else { return Ok(()) };
            graph.defer(&Address::new(tape, &[tape_device::SAMPLE]))?;
        }
        _ => {
            let fixed = skeleton(boxes);
            let candidates: Vec<Identifier> = graph.boxes()
                .map(|v| v.id())
                .filter(|id| !fixed.contains(id))
                .collect();
            let Some(id) = candidates.choose(rng).copied() else { return Ok(()) };
            graph.delete_box(id)?;
        }
    }
    Ok(())
}

fn check_project(project: &Project) {
    let graph = project.graph();
    graph.verify_pointers().unwrap();
    graph.validate_requirements().unwrap();
    for id in skeleton(project.boxes()) {
        assert!(graph.find_box(id).is_some());
    }
}

#[test]
fn random_edits_with_undo() {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut project = Project::new().unwrap();
    let boxes = *project.boxes();

    for i in 0..1000 {
        let before = project.to_bytes();

        match rng.gen_range(0..10) {
            0 => { project.editing_mut().undo().unwrap(); }
            1 => { project.editing_mut().redo().unwrap(); }
            2 => {
                let result: Result<(), GraphError> = project.editing_mut().modify(|e| {
                    make_random_change(e.graph_mut(), &boxes, &mut rng)?;
                    Err(GraphError::NotInTransaction)
                });
                assert!(result.is_err());
                assert_eq!(project.to_bytes(), before);
            }
            _ => {
                let mark = rng.gen_bool(0.8);
                let result = project.editing_mut().modify_with(mark, |e| {
                    make_random_change(e.graph_mut(), &boxes, &mut rng)
                });
                if result.is_err() {
                    assert_eq!(project.to_bytes(), before);
                }
            }
        }

        check_project(&project);
        if i % 50 == 0 {
            let copy = project.copy().unwrap();
            assert_eq!(copy.to_bytes(), project.to_bytes());
        }
    }

    // Unwinding everything gets back to the skeleton.
    while project.editing_mut().undo().unwrap() {}
    assert_eq!(project.graph().len(), 5);
    check_project(&project);
    project.graph().debug_boxes();
}

#[test]
fn replaying_the_log_matches() {
    for seed in 0..5 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut project = Project::new().unwrap();
        let boxes = *project.boxes();
        let sink = MemorySink::new();
        let writer = SyncLogWriter::attach(&mut project, sink.clone(), None).unwrap();

        for _ in 0..200 {
            match rng.gen_range(0..6) {
                0 => { project.editing_mut().undo().unwrap(); }
                1 => { project.editing_mut().redo().unwrap(); }
                _ => {
                    let _ = project.editing_mut().modify(|e| {
                        make_random_change(e.graph_mut(), &boxes, &mut rng)
                    });
                }
            }
        }

        writer.flush().unwrap();
        let unwrapped = SyncLogReader::unwrap(&sink.bytes(), ReadOptions::default()).unwrap();
        assert_eq!(unwrapped.commit_count, writer.commit_count());
        assert_eq!(unwrapped.last_commit, writer.last_commit());
        assert_eq!(unwrapped.project.to_bytes(), project.to_bytes());
        writer.detach(&mut project).unwrap();
    }
}

#[test]
fn random_copy_and_paste() {
    let mut rng = SmallRng::seed_from_u64(21);
    let mut project = Project::new().unwrap();
    let boxes = *project.boxes();

    for _ in 0..300 {
        let _ = project.editing_mut().modify(|e| {
            make_random_change(e.graph_mut(), &boxes, &mut rng)
        });
    }

    let kinds = [BoxKind::AudioUnit, BoxKind::Track, BoxKind::TapeDevice, BoxKind::DelayDevice];
    for _ in 0..30 {
        let kind = *kinds.choose(&mut rng).unwrap();
        let candidates = ids_of(project.graph(), kind);
        let Some(id) = candidates.into_iter().filter(|id| *id != boxes.master_unit).choose(&mut rng) else { continue };

        let bundle = subgraph::export_with_rng(project.graph(), id, &mut rng).unwrap();
        let before = project.graph().len();
        let owned = project.graph().dependencies_of(id).boxes.len();

        let mut dest = project.copy().unwrap();
        let pasted = dest.editing_mut().modify(|e| -> Result<Identifier, GraphError> {
            let graph = e.graph_mut();
            let pasted = subgraph::import_with_rng(graph, &bundle, &mut rng)?;
            // Put back whatever pointed outside the bundle.
            match kind {
                BoxKind::AudioUnit => graph.refer(&Address::new(pasted, &[audio_unit::COLLECTION]), Address::new(boxes.root, &[root::AUDIO_UNITS]))?,
                BoxKind::Track => graph.refer(&Address::new(pasted, &[track::TRACKS]), Address::new(boxes.master_unit, &[audio_unit::TRACKS]))?,
                BoxKind::TapeDevice => graph.refer(&Address::new(pasted, &[tape_device::HOST]), Address::new(boxes.master_unit, &[audio_unit::INPUT]))?,
                _ => graph.refer(&Address::new(pasted, &[delay_device::HOST]), Address::new(boxes.master_unit, &[audio_unit::AUDIO_EFFECTS]))?,
            }
            Ok(pasted)
        }).unwrap();

        check_project(&dest);
        assert!(project.graph().find_box(pasted).is_none());
        // Files are shared, everything else is copied.
        let files = |p: &Project| ids_of(p.graph(), BoxKind::AudioFile).len();
        assert_eq!(files(&dest), files(&project));
        let pasted_files = project.graph().dependencies_of(id).boxes.iter()
            .filter(|d| project.graph().find_box(**d).unwrap().kind() == BoxKind::AudioFile)
            .count();
        assert_eq!(dest.graph().len(), before + 1 + owned - pasted_files);
        // The pasted boxes now share those files with the originals.
        assert_eq!(dest.graph().dependencies_of(pasted).boxes.len(), owned - pasted_files);

        // Pasted into the project it came from, the copy is deleted along with what it owns.
        dest.editing_mut().modify(|e| e.graph_mut().delete_box(pasted).map(drop)).unwrap();
        assert_eq!(dest.graph().len(), before);
        check_project(&dest);
    }
}
