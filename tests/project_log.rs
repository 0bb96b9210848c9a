use std::fs::{self, OpenOptions};
use std::io::Write;
use box_graph::*;
use box_graph::schema::{audio_unit, timeline, track};
use box_graph::sync_log::{CommitType, FileSinkOptions, ReadOptions, SyncLogError, SyncLogFile, SyncLogReader, SyncLogWriter};

fn add_tracks(project: &mut Project, count: usize) {
    let unit = project.boxes().master_unit;
    for _ in 0..count {
        project.editing_mut().modify(|e| {
            e.graph_mut().create_box(BoxKind::Track, Identifier::random(), |b| {
                b.set_pointer(&[track::TRACKS], Some(Address::new(unit, &[audio_unit::TRACKS]))).map(drop)
            }).map(drop)
        }).unwrap();
    }
}

fn track_count(project: &Project) -> usize {
    project.graph().incoming(&Address::new(project.boxes().master_unit, &[audio_unit::TRACKS])).len()
}

#[test]
fn log_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");

    // First session: a fresh log.
    let mut project = Project::new().unwrap();
    let file = SyncLogFile::open(&path).unwrap();
    assert!(file.is_empty());
    let writer = SyncLogWriter::attach(&mut project, file.sink(FileSinkOptions::default()).unwrap(), None).unwrap();
    add_tracks(&mut project, 3);
    let (last, count) = writer.detach(&mut project).unwrap();
    assert_eq!(count, 4);

    // Detached, so this isn't logged.
    add_tracks(&mut project, 1);

    // Second session picks up where the file ends.
    let file = SyncLogFile::open(&path).unwrap();
    assert_eq!(file.truncated_at(), None);
    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.commit_count, count);
    assert_eq!(unwrapped.last_commit, last);
    assert_eq!(track_count(&unwrapped.project), 3);

    let mut project = unwrapped.project;
    let sink = file.sink(FileSinkOptions::default().sync_each_block(false)).unwrap();
    let writer = SyncLogWriter::attach(&mut project, sink, Some((unwrapped.last_commit, unwrapped.commit_count))).unwrap();
    add_tracks(&mut project, 2);
    project.editing_mut().undo().unwrap();
    let (last, count) = writer.detach(&mut project).unwrap();
    // Open, two edits and an undo.
    assert_eq!(count, 4 + 4);
    assert_eq!(last.commit_type, CommitType::Updates);

    let file = SyncLogFile::open(&path).unwrap();
    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.commit_count, count);
    assert_eq!(track_count(&unwrapped.project), 4);
    assert_eq!(unwrapped.project.to_bytes(), project.to_bytes());
}

#[test]
fn torn_tail_is_cut_off() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");

    let mut project = Project::new().unwrap();
    let writer = SyncLogWriter::attach(&mut project, SyncLogFile::open(&path).unwrap().sink(FileSinkOptions::default()).unwrap(), None).unwrap();
    add_tracks(&mut project, 2);
    let (_, count) = writer.detach(&mut project).unwrap();
    let intact_len = fs::metadata(&path).unwrap().len();

    // Half a block header, as if the process died mid-write.
    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&[0x12, 0x34, 0x56]).unwrap();
    drop(f);

    let file = SyncLogFile::open(&path).unwrap();
    assert_eq!(file.truncated_at(), Some(intact_len));
    assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
    assert_eq!(fs::metadata(dir.path().join("project.log.backup")).unwrap().len(), intact_len + 3);

    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.commit_count, count);
    assert_eq!(unwrapped.project.to_bytes(), project.to_bytes());

    // And the log carries on cleanly after the cut.
    let mut project = unwrapped.project;
    let writer = SyncLogWriter::attach(&mut project, file.sink(FileSinkOptions::default()).unwrap(),
        Some((unwrapped.last_commit, unwrapped.commit_count))).unwrap();
    let timeline = project.boxes().timeline;
    project.editing_mut().modify(|e| {
        e.graph_mut().set_primitive(&Address::new(timeline, &[timeline::BPM]), 90.0f32.into())
    }).unwrap();
    writer.detach(&mut project).unwrap();

    let file = SyncLogFile::open(&path).unwrap();
    assert_eq!(file.truncated_at(), None);
    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.project.bpm(), 90.0);
}

#[test]
fn checkpoints_replace_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");

    let mut project = Project::new().unwrap();
    let file = SyncLogFile::open(&path).unwrap();
    let writer = SyncLogWriter::attach(&mut project, file.sink(FileSinkOptions::default()).unwrap(), None).unwrap();
    add_tracks(&mut project, 2);

    // A different project entirely, written as a new version.
    let mut other = Project::new().unwrap();
    add_tracks(&mut other, 5);
    writer.checkpoint(&other).unwrap();
    writer.detach(&mut project).unwrap();

    let file = SyncLogFile::open(&path).unwrap();
    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.last_commit.commit_type, CommitType::NewVersion);
    assert_eq!(unwrapped.project.boxes(), other.boxes());
    assert_eq!(track_count(&unwrapped.project), 5);
}

#[test]
fn damage_inside_the_log_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");

    let mut project = Project::new().unwrap();
    let writer = SyncLogWriter::attach(&mut project, SyncLogFile::open(&path).unwrap().sink(FileSinkOptions::default()).unwrap(), None).unwrap();
    add_tracks(&mut project, 5);
    writer.detach(&mut project).unwrap();

    // Flip a byte inside the Init snapshot. Every commit after it is intact.
    let mut contents = fs::read(&path).unwrap();
    contents[40] ^= 0x01;
    fs::write(&path, &contents).unwrap();

    assert!(matches!(SyncLogFile::open(&path), Err(SyncLogError::ChecksumMismatch { offset: 0 })));
    assert_eq!(fs::read(&path).unwrap(), contents);
    assert!(!dir.path().join("project.log.backup").exists());
}

#[test]
fn attaching_mid_gesture_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");
    let mut project = Project::new().unwrap();
    let timeline = project.boxes().timeline;

    project.editing_mut().begin_modification().unwrap();
    project.editing_mut().graph_mut().set_primitive(&Address::new(timeline, &[timeline::BPM]), 90.0f32.into()).unwrap();
    let sink = SyncLogFile::open(&path).unwrap().sink(FileSinkOptions::default()).unwrap();
    assert!(matches!(SyncLogWriter::attach(&mut project, sink, None),
                     Err(SyncLogError::Graph(GraphError::AlreadyInTransaction))));
    project.editing_mut().revert().unwrap();

    // Once it's reverted the log starts from the committed state.
    let sink = SyncLogFile::open(&path).unwrap().sink(FileSinkOptions::default()).unwrap();
    let writer = SyncLogWriter::attach(&mut project, sink, None).unwrap();
    writer.detach(&mut project).unwrap();
    let unwrapped = SyncLogReader::unwrap(SyncLogFile::open(&path).unwrap().bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.project.bpm(), 120.0);
}

#[test]
fn dropped_writer_leaves_a_resumable_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.log");
    let mut project = Project::new().unwrap();

    let writer = SyncLogWriter::attach(&mut project, SyncLogFile::open(&path).unwrap().sink(FileSinkOptions::default()).unwrap(), None).unwrap();
    add_tracks(&mut project, 2);
    drop(writer);
    let len = fs::metadata(&path).unwrap().len();

    // Not logged any more.
    add_tracks(&mut project, 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), len);

    let file = SyncLogFile::open(&path).unwrap();
    let unwrapped = SyncLogReader::unwrap(file.bytes(), ReadOptions::default()).unwrap();
    assert_eq!(unwrapped.commit_count, 3);
    assert_eq!(track_count(&unwrapped.project), 2);
}
