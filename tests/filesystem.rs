//! Integration tests driving `FileSystem` through its public surface
//! only, the way an external caller of this crate would.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use memfs_core::channel::OpenMode;
use memfs_core::config::Configuration;
use memfs_core::filesystem::CreateKind;
use memfs_core::{Error, FileSystem};

#[test]
fn sparse_write_past_the_end_zero_fills_the_gap() {
    let fs = FileSystem::unix();
    let path = fs.path("/sparse.bin");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();
    let channel = fs.open(&path, OpenMode::READ | OpenMode::WRITE, false).unwrap();

    channel.set_position(6).unwrap();
    channel.write(b"end").unwrap();
    assert_eq!(channel.size().unwrap(), 9);

    channel.set_position(0).unwrap();
    let mut buf = [0u8; 9];
    channel.read(&mut buf).unwrap();
    assert_eq!(&buf, b"\0\0\0\0\0\0end");
}

#[test]
fn symlink_loop_is_reported_instead_of_overflowing_the_stack() {
    let fs = FileSystem::unix();
    let a = fs.path("/loop-a");
    let b = fs.path("/loop-b");
    fs.service().create_file(&a, CreateKind::SymbolicLink(b.clone())).unwrap();
    fs.service().create_file(&b, CreateKind::SymbolicLink(a.clone())).unwrap();

    let err = fs.service().to_real_path(&a);
    assert_eq!(err, Err(Error::TooManySymbolicLinks));
}

#[test]
fn case_insensitive_lookup_finds_a_differently_cased_path() {
    let fs = FileSystem::new(Configuration::windows());
    let path = fs.path("C:\\Work\\Notes.txt");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();

    let same_file_different_case = fs.path("C:\\work\\notes.TXT");
    assert!(fs.service().exists(&same_file_different_case));
    assert!(fs.service().is_same_file(&path, &same_file_different_case).unwrap());
}

#[test]
fn to_real_path_recovers_the_stored_casing_on_a_case_insensitive_filesystem() {
    let fs = FileSystem::new(Configuration::windows());
    let path = fs.path("C:\\Work\\Notes.txt");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();

    let typed_differently = fs.path("C:\\work\\notes.TXT");
    let real = fs.service().to_real_path(&typed_differently).unwrap();
    assert_eq!(fs.service().path_service().to_string(&real), "C:\\Work\\Notes.txt");
}

#[test]
fn directory_listing_is_ordered_by_displayed_name() {
    let fs = FileSystem::unix();
    fs.service().create_file(&fs.path("/dir"), CreateKind::Directory).unwrap();
    for name in ["banana", "Apple", "cherry"] {
        fs.service().create_file(&fs.path(&format!("/dir/{name}")), CreateKind::Regular).unwrap();
    }

    let stream = fs.service().list_directory(&fs.path("/dir")).unwrap();
    let names: Vec<String> = stream.collect_remaining().into_iter().map(|e| e.name.display().to_string()).collect();
    assert_eq!(names, vec!["Apple".to_string(), "banana".to_string(), "cherry".to_string()]);
}

#[test]
fn concurrent_appends_from_independent_channels_never_lose_a_chunk() {
    // Each thread opens its own channel on the same path, so the race
    // this guards against is in the shared `ByteStore`, not serialized
    // away by a single channel's own I/O lock.
    let fs = Arc::new(FileSystem::unix());
    let path = fs.path("/appended.txt");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let fs = Arc::clone(&fs);
        let path = path.clone();
        handles.push(thread::spawn(move || {
            let channel = fs.open(&path, OpenMode::WRITE | OpenMode::APPEND, false).unwrap();
            channel.write(b"0123456789").unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let reader = fs.open(&path, OpenMode::READ, false).unwrap();
    assert_eq!(reader.size().unwrap(), 16 * 10);
}

#[test]
fn moving_a_directory_into_its_own_subdirectory_is_rejected() {
    let fs = FileSystem::unix();
    let parent = fs.path("/parent");
    fs.service().create_file(&parent, CreateKind::Directory).unwrap();
    let child = fs.path("/parent/child");
    fs.service().create_file(&child, CreateKind::Directory).unwrap();

    let destination = fs.path("/parent/child/parent");
    let err = fs.service().move_within(&parent, &destination, false);
    assert!(err.is_err());
    assert!(fs.service().exists(&parent));
    assert!(fs.service().exists(&child));
}

#[test]
fn cross_filesystem_move_copies_bytes_then_removes_the_source() {
    let source_fs = FileSystem::unix();
    let dest_fs = FileSystem::unix();

    let source_path = source_fs.path("/report.txt");
    source_fs.service().create_file(&source_path, CreateKind::Regular).unwrap();
    {
        let channel = source_fs.open(&source_path, OpenMode::READ | OpenMode::WRITE, false).unwrap();
        channel.write(b"quarterly numbers").unwrap();
    }

    let dest_path = dest_fs.path("/archive/report.txt");
    dest_fs.service().create_file(&dest_fs.path("/archive"), CreateKind::Directory).unwrap();

    source_fs.service().move_across(&source_path, dest_fs.service(), &dest_path, false).unwrap();

    assert!(!source_fs.service().exists(&source_path));
    assert!(dest_fs.service().exists(&dest_path));

    let channel = dest_fs.open(&dest_path, OpenMode::READ, false).unwrap();
    let mut buf = [0u8; "quarterly numbers".len()];
    channel.read(&mut buf).unwrap();
    assert_eq!(&buf, b"quarterly numbers");
}

#[test]
fn concurrent_writers_through_independent_channels_never_corrupt_byte_count() {
    let fs = Arc::new(FileSystem::unix());
    let path = fs.path("/shared.txt");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fs = Arc::clone(&fs);
        let path = path.clone();
        handles.push(thread::spawn(move || {
            let channel = fs.open(&path, OpenMode::WRITE | OpenMode::APPEND, false).unwrap();
            channel.write(b"chunk-").unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let channel = fs.open(&path, OpenMode::READ, false).unwrap();
    assert_eq!(channel.size().unwrap(), 8 * "chunk-".len() as u64);
}

#[test]
fn watch_service_reports_create_and_delete_under_the_watched_root() {
    let fs = FileSystem::unix();
    let watch = fs.watch_service(Duration::from_millis(5));
    let key = watch.register(fs.service().root()).unwrap();

    let child = fs.path("/new-child.txt");
    fs.service().create_file(&child, CreateKind::Regular).unwrap();

    let ready = watch.take().unwrap();
    assert!(Arc::ptr_eq(&ready, &key));
    let events = ready.poll_events();
    assert!(events.iter().any(|e| e.kind == memfs_core::watch::EventKind::Create));
    ready.reset();

    fs.service().delete(&child).unwrap();
    let ready = watch.take().unwrap();
    let events = ready.poll_events();
    assert!(events.iter().any(|e| e.kind == memfs_core::watch::EventKind::Delete));

    fs.close().unwrap();
}

#[test]
fn hard_linked_paths_observe_the_same_writes() {
    let fs = FileSystem::unix();
    let original = fs.path("/original.txt");
    fs.service().create_file(&original, CreateKind::Regular).unwrap();

    let linked = fs.path("/linked.txt");
    fs.service().link(&original, &linked).unwrap();

    let writer = fs.open(&original, OpenMode::READ | OpenMode::WRITE, false).unwrap();
    writer.write(b"shared").unwrap();
    drop(writer);

    let reader = fs.open(&linked, OpenMode::READ, false).unwrap();
    let mut buf = [0u8; 6];
    reader.read(&mut buf).unwrap();
    assert_eq!(&buf, b"shared");
}

#[test]
fn deleting_a_file_with_an_open_channel_keeps_its_bytes_until_close() {
    let fs = FileSystem::unix();
    let path = fs.path("/ephemeral.txt");
    fs.service().create_file(&path, CreateKind::Regular).unwrap();
    let channel = fs.open(&path, OpenMode::READ | OpenMode::WRITE, false).unwrap();
    channel.write(b"still alive").unwrap();

    fs.service().delete(&path).unwrap();
    assert!(!fs.service().exists(&path));

    channel.set_position(0).unwrap();
    let mut buf = [0u8; "still alive".len()];
    channel.read(&mut buf).unwrap();
    assert_eq!(&buf, b"still alive");
}
