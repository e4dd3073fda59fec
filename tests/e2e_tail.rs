// rolltail - tests/e2e_tail.rs
//
// End-to-end tests for the file and directory tailers.
//
// These tests exercise the real filesystem and real change notifications:
// files are appended to, truncated, renamed and created in a temp directory
// while a tailer is running, and the emitted line stream is checked for
// exact content and order (no duplicates, no omissions).

use rolltail::app::dir_tail::DirTailer;
use rolltail::app::lifecycle::CancelToken;
use rolltail::app::runner::{self, RunOutcome};
use rolltail::app::stream::{StreamEvent, TailStreams, Tailer};
use rolltail::app::tail::FileTailer;
use rolltail::core::model::{ExtensionSet, SeekPolicy, Selection, TailConfig};
use rolltail::util::error::TailError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

const WAIT: Duration = Duration::from_secs(10);

fn test_config() -> TailConfig {
    TailConfig {
        settle_interval: Duration::from_millis(300),
        shutdown_timeout: Duration::from_secs(5),
        cancel_check_interval: Duration::from_millis(20),
    }
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open for append");
    f.write_all(text.as_bytes()).expect("append");
    f.sync_all().expect("sync");
}

/// Collect exactly `n` lines, failing on a terminal error or timeout.
fn next_lines(streams: &TailStreams, n: usize) -> Vec<String> {
    let deadline = Instant::now() + WAIT;
    let mut lines = Vec::new();
    while lines.len() < n {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {n} lines, got {lines:?}"
        );
        match streams.poll(Duration::from_millis(50)) {
            StreamEvent::Line(l) => lines.push(l),
            StreamEvent::Idle => {}
            StreamEvent::Error(e) => panic!("unexpected error after {lines:?}: {e}"),
            StreamEvent::Closed => panic!("stream closed after {lines:?}"),
        }
    }
    lines
}

/// Assert nothing arrives for a short while.
fn assert_quiet(streams: &TailStreams) {
    match streams.poll(Duration::from_millis(400)) {
        StreamEvent::Idle => {}
        other => panic!("expected no output, got {other:?}"),
    }
}

fn wait_for_error(streams: &TailStreams) -> TailError {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        match streams.poll(Duration::from_millis(50)) {
            StreamEvent::Error(e) => return e,
            StreamEvent::Closed => panic!("stream closed without an error"),
            StreamEvent::Line(_) | StreamEvent::Idle => {}
        }
    }
    panic!("timed out waiting for a terminal error");
}

/// Drain the streams until both close, failing on an error or timeout.
/// Returns how many lines were drained on the way.
fn drain_until_closed(streams: &TailStreams) -> usize {
    let deadline = Instant::now() + WAIT;
    let mut drained = 0;
    loop {
        assert!(Instant::now() < deadline, "streams did not close");
        match streams.poll(Duration::from_millis(50)) {
            StreamEvent::Closed => return drained,
            StreamEvent::Error(e) => panic!("unexpected error: {e}"),
            StreamEvent::Line(_) => drained += 1,
            StreamEvent::Idle => {}
        }
    }
}

/// Append a numbered line to `path` every millisecond until the returned
/// flag is cleared.
fn spawn_busy_writer(path: &Path) -> (Arc<AtomicBool>, std::thread::JoinHandle<()>) {
    let running = Arc::new(AtomicBool::new(true));
    let handle = {
        let running = Arc::clone(&running);
        let path = path.to_path_buf();
        std::thread::spawn(move || {
            let mut i = 0u64;
            while running.load(Ordering::SeqCst) {
                append(&path, &format!("busy {i}\n"));
                i += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };
    (running, handle)
}

fn started_file_tailer(path: &Path) -> (FileTailer, TailStreams) {
    let mut tailer = FileTailer::new(path, test_config());
    let streams = tailer.take_streams().expect("streams");
    tailer.start().expect("start");
    (tailer, streams)
}

// =============================================================================
// FileTailer E2E
// =============================================================================

/// Only lines written after start are emitted, each exactly once.
#[test]
fn e2e_file_incremental_writes_without_duplicates() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "existing 1\nexisting 2\n").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);

    let expected: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
    for chunk in expected.chunks(7) {
        append(&path, &(chunk.join("\n") + "\n"));
    }

    assert_eq!(next_lines(&streams, expected.len()), expected);
    assert_quiet(&streams);
    tailer.stop().expect("stop");
}

/// A line split across writes is emitted once, whole.
#[test]
fn e2e_file_partial_line_is_completed() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);

    append(&path, "hel");
    assert_quiet(&streams);
    append(&path, "lo world\r\nnext\n");

    assert_eq!(next_lines(&streams, 2), vec!["hello world", "next"]);
    tailer.stop().expect("stop");
}

/// Truncation in place restarts from the beginning of the file.
#[test]
fn e2e_file_truncate_then_append() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);

    append(&path, "a fairly long first line\nanother long second line\n");
    assert_eq!(next_lines(&streams, 2).len(), 2);

    OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("open")
        .set_len(0)
        .expect("truncate");
    append(&path, "fresh\n");

    assert_eq!(next_lines(&streams, 1), vec!["fresh"]);
    assert_quiet(&streams);
    tailer.stop().expect("stop");
}

/// Rename-aside rotation: lines from the old file and the new file arrive in
/// order, nothing lost and nothing repeated.
#[test]
fn e2e_file_follows_rename_rotation() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);

    append(&path, "a\nb\n");
    assert_eq!(next_lines(&streams, 2), vec!["a", "b"]);

    fs::rename(&path, tmp.path().join("app.log.1")).expect("rotate");
    append(&path, "c\n");
    append(&path, "d\n");

    assert_eq!(next_lines(&streams, 2), vec!["c", "d"]);

    append(&path, "e\n");
    assert_eq!(next_lines(&streams, 1), vec!["e"]);
    tailer.stop().expect("stop");
}

/// Rotation with no replacement file is fatal once the settle interval passes.
#[test]
fn e2e_file_rotated_without_replacement_is_fatal() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);
    fs::rename(&path, tmp.path().join("app.log.1")).expect("rotate");

    let err = wait_for_error(&streams);
    assert!(matches!(err, TailError::Open { .. }), "{err}");
    tailer.stop().expect("stop");
}

/// Explicit start-of-file seek emits existing content first.
#[test]
fn e2e_file_seek_start_reads_existing_content() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "one\ntwo\n").expect("write");

    let mut tailer = FileTailer::new(&path, test_config())
        .with_seek(SeekPolicy::Start(0))
        .with_immediate_read();
    let streams = tailer.take_streams().expect("streams");
    tailer.start().expect("start");

    assert_eq!(next_lines(&streams, 2), vec!["one", "two"]);
    tailer.stop().expect("stop");
}

/// Stopping while a writer is busy returns within the timeout and closes
/// both streams.
#[test]
fn e2e_file_stop_while_writing() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_file_tailer(&path);
    let (running, writer) = spawn_busy_writer(&path);

    std::thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    tailer.stop().expect("stop");
    assert!(started.elapsed() < test_config().shutdown_timeout);

    running.store(false, Ordering::SeqCst);
    writer.join().expect("writer");

    drain_until_closed(&streams);
}

// =============================================================================
// DirTailer E2E
// =============================================================================

fn started_dir_tailer(dir: &Path) -> (DirTailer, TailStreams) {
    let mut tailer = DirTailer::new(dir, ExtensionSet::default(), test_config());
    let streams = tailer.take_streams().expect("streams");
    tailer.start().expect("start");
    (tailer, streams)
}

/// The newest-named file is followed, and a newer file replaces it and is
/// read from its first byte.
#[test]
fn e2e_dir_selects_last_file_and_swaps_on_create() {
    let tmp = TempDir::new().expect("tmpdir");
    let old = tmp.path().join("app-2024-01-01.log");
    fs::write(&old, "history\n").expect("write");
    fs::write(tmp.path().join("zzz.txt"), "ignored\n").expect("write");

    let (mut tailer, streams) = started_dir_tailer(tmp.path());

    append(&old, "one\n");
    assert_eq!(next_lines(&streams, 1), vec!["one"]);

    let new = tmp.path().join("app-2024-01-02.log");
    fs::write(&new, "first\nsecond\n").expect("write");
    assert_eq!(next_lines(&streams, 2), vec!["first", "second"]);

    append(&new, "third\n");
    assert_eq!(next_lines(&streams, 1), vec!["third"]);

    // The previous file is no longer followed.
    append(&old, "stale\n");
    assert_quiet(&streams);

    tailer.stop().expect("stop");
}

/// A directory with no matching file idles until one appears.
#[test]
fn e2e_dir_starts_empty_then_follows_first_file() {
    let tmp = TempDir::new().expect("tmpdir");
    let (mut tailer, streams) = started_dir_tailer(tmp.path());
    assert_quiet(&streams);

    let path = tmp.path().join("app.log");
    fs::write(&path, "hello\n").expect("write");
    assert_eq!(next_lines(&streams, 1), vec!["hello"]);

    tailer.stop().expect("stop");
}

/// Creating a file that sorts before the active one does not restart it.
#[test]
fn e2e_dir_ignores_older_candidate() {
    let tmp = TempDir::new().expect("tmpdir");
    let active = tmp.path().join("b.log");
    fs::write(&active, "").expect("write");

    let (mut tailer, streams) = started_dir_tailer(tmp.path());

    fs::write(tmp.path().join("a.log"), "nope\n").expect("write");
    fs::write(tmp.path().join("c.txt"), "nope\n").expect("write");
    append(&active, "more\n");

    assert_eq!(next_lines(&streams, 1), vec!["more"]);
    assert_quiet(&streams);
    tailer.stop().expect("stop");
}

/// Removing the watched directory is fatal.
#[test]
fn e2e_dir_removed_is_fatal() {
    let tmp = TempDir::new().expect("tmpdir");
    let dir = tmp.path().join("logs");
    fs::create_dir(&dir).expect("mkdir");

    let (mut tailer, streams) = started_dir_tailer(&dir);
    fs::remove_dir(&dir).expect("rmdir");

    let err = wait_for_error(&streams);
    assert!(
        matches!(err, TailError::DirectoryChanged { .. }),
        "expected DirectoryChanged, got {err}"
    );
    tailer.stop().expect("stop");
}

/// Renaming the watched directory is fatal.
#[test]
fn e2e_dir_renamed_is_fatal() {
    let tmp = TempDir::new().expect("tmpdir");
    let dir = tmp.path().join("logs");
    fs::create_dir(&dir).expect("mkdir");

    let (mut tailer, streams) = started_dir_tailer(&dir);
    fs::rename(&dir, tmp.path().join("logs.old")).expect("rename dir");

    let err = wait_for_error(&streams);
    assert!(
        matches!(err, TailError::DirectoryChanged { change: "renamed", .. }),
        "expected DirectoryChanged(renamed), got {err}"
    );
    tailer.stop().expect("stop");
}

/// Rotating the active file in place (rename aside, recreate the same name)
/// is followed by the file tailer; the create for the active name does not
/// restart it, so every line arrives exactly once.
#[test]
fn e2e_dir_in_place_rotation_of_active_file() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_dir_tailer(tmp.path());

    append(&path, "a\nb\n");
    assert_eq!(next_lines(&streams, 2), vec!["a", "b"]);

    fs::rename(&path, tmp.path().join("app.log.1")).expect("rotate");
    append(&path, "c\n");
    append(&path, "d\n");

    assert_eq!(next_lines(&streams, 2), vec!["c", "d"]);
    assert_quiet(&streams);
    tailer.stop().expect("stop");
}

/// A failure in the active file tailer reaches the directory tailer's error
/// stream once, after the lines already read, and then both streams close.
#[test]
fn e2e_dir_child_error_is_forwarded_once() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_dir_tailer(tmp.path());

    append(&path, "a\n");
    assert_eq!(next_lines(&streams, 1), vec!["a"]);

    // No replacement: the reopen after the settle interval fails.
    fs::rename(&path, tmp.path().join("app.log.1")).expect("rotate");

    let err = wait_for_error(&streams);
    assert!(matches!(err, TailError::Open { .. }), "{err}");
    assert_eq!(drain_until_closed(&streams), 0);
    tailer.stop().expect("stop");
}

/// Stopping a directory tailer whose active file is being written returns
/// within the timeout and closes both streams.
#[test]
fn e2e_dir_stop_while_writing() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let (mut tailer, streams) = started_dir_tailer(tmp.path());
    let (running, writer) = spawn_busy_writer(&path);

    std::thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    tailer.stop().expect("stop");
    assert!(started.elapsed() < test_config().shutdown_timeout);

    running.store(false, Ordering::SeqCst);
    writer.join().expect("writer");

    drain_until_closed(&streams);
}

// =============================================================================
// Runner E2E
// =============================================================================

/// The runner forwards lines and ends with `Cancelled` when its token fires.
#[test]
fn e2e_runner_forwards_lines_until_cancelled() {
    let tmp = TempDir::new().expect("tmpdir");
    let path = tmp.path().join("app.log");
    fs::write(&path, "").expect("write");

    let cancel = CancelToken::new();
    let writer = {
        let cancel = cancel.clone();
        let path = path.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            append(&path, "x\ny\n");
            std::thread::sleep(Duration::from_millis(500));
            cancel.cancel();
        })
    };

    let mut seen = Vec::new();
    let outcome = runner::run(
        &Selection::File(path.clone()),
        test_config(),
        &cancel,
        |line| seen.push(line),
    )
    .expect("run");
    writer.join().expect("writer");

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(seen, vec!["x", "y"]);
}
