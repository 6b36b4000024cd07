mod common;

use common::{drain, test_bus, wait_for, MemoryFtp};
use fs2::FileExt;
use ftp_relay::{
    Credential, ErrorKind, EventBus, FtpEndpoint, LockWaitPolicy, MonitorOptions,
    TransferController, TransferEventPayload, TransferOptions,
};
use std::fs::{self, File};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn controller(ftp: &MemoryFtp, bus: &EventBus) -> Arc<TransferController> {
    Arc::new(
        TransferController::new(
            FtpEndpoint::new("cams.local", 21),
            Credential::new("uploader", "pw"),
            Arc::new(ftp.clone()),
            bus.clone(),
            TransferOptions::default(),
        )
        .unwrap(),
    )
}

fn fast_options() -> MonitorOptions {
    MonitorOptions {
        lock_wait: LockWaitPolicy::new(Duration::from_millis(20), 250),
        ..MonitorOptions::default()
    }
}

#[test]
fn test_created_image_is_uploaded_to_destination() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());

    let monitor = controller
        .monitor_folder(watch_dir.path(), "incoming", fast_options(), CancellationToken::new())
        .unwrap();
    assert!(monitor.is_running());
    assert_eq!(monitor.target().destination_path, "incoming");

    let data = vec![42u8; 6000];
    fs::write(watch_dir.path().join("IMG_0001.jpg"), &data).unwrap();

    assert!(wait_for(Duration::from_secs(10), || {
        ftp.file("incoming/IMG_0001.jpg").as_deref() == Some(data.as_slice())
    }));
    monitor.stop();
}

#[test]
fn test_non_matching_files_are_ignored() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());

    let monitor = controller
        .monitor_folder(watch_dir.path(), "", fast_options(), CancellationToken::new())
        .unwrap();

    fs::write(watch_dir.path().join("notes.txt"), b"not an image").unwrap();
    fs::create_dir(watch_dir.path().join("album.jpg")).unwrap();
    fs::write(watch_dir.path().join("after.jpg"), b"image").unwrap();

    // Events are handled in order, so once after.jpg is up the others were seen
    assert!(wait_for(Duration::from_secs(10), || ftp.file("after.jpg").is_some()));
    assert!(ftp.file("notes.txt").is_none());
    assert!(ftp.file("album.jpg").is_none());
    assert_eq!(ftp.connections().len(), 1);
    monitor.stop();
}

#[test]
fn test_locked_file_uploads_only_after_release() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());
    let options = MonitorOptions {
        lock_wait: LockWaitPolicy::new(Duration::from_millis(200), 50),
        ..MonitorOptions::default()
    };

    let monitor = controller
        .monitor_folder(watch_dir.path(), "", options, CancellationToken::new())
        .unwrap();

    // Hold the file exclusively for 500ms while "writing" it
    let path = watch_dir.path().join("busy.jpg");
    let mut writer = File::create(&path).unwrap();
    writer.lock_exclusive().unwrap();
    writer.write_all(&[7u8; 3000]).unwrap();
    writer.flush().unwrap();

    let released_at = Arc::new(Mutex::new(None));
    let released = Arc::clone(&released_at);
    let holder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        FileExt::unlock(&writer).unwrap();
        drop(writer);
        *released.lock().unwrap() = Some(Instant::now());
    });

    assert!(wait_for(Duration::from_secs(10), || ftp.file("busy.jpg").map(|d| d.len()) == Some(3000)));
    holder.join().unwrap();

    let released_at = released_at.lock().unwrap().expect("holder finished");
    let connections = ftp.connections();
    assert_eq!(connections.len(), 1);
    assert!(connections[0].at >= released_at);
    monitor.stop();
}

#[test]
fn test_lock_timeout_is_published_as_failure() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let bus = test_bus();
    let mut rx = bus.subscribe();
    let controller = controller(&ftp, &bus);
    let options = MonitorOptions {
        lock_wait: LockWaitPolicy::new(Duration::from_millis(10), 3),
        ..MonitorOptions::default()
    };

    let monitor = controller
        .monitor_folder(watch_dir.path(), "", options, CancellationToken::new())
        .unwrap();

    let path = watch_dir.path().join("stuck.jpg");
    let writer = File::create(&path).unwrap();
    writer.lock_exclusive().unwrap();

    let mut events = Vec::new();
    assert!(wait_for(Duration::from_secs(10), || {
        events.extend(drain(&mut rx));
        events.iter().any(|e| e.is_terminal())
    }));

    let failure = events.iter().find(|e| e.is_terminal()).unwrap();
    assert_eq!(failure.file_name, "stuck.jpg");
    assert!(matches!(
        failure.payload,
        TransferEventPayload::Failed {
            kind: ErrorKind::LockTimeout,
            ..
        }
    ));
    assert!(ftp.connections().is_empty());
    assert!(monitor.is_running());

    FileExt::unlock(&writer).unwrap();
    monitor.stop();
}

#[test]
fn test_stopped_monitor_uploads_nothing() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());
    let cancel = CancellationToken::new();

    let monitor = controller
        .monitor_folder(watch_dir.path(), "", fast_options(), cancel.clone())
        .unwrap();
    monitor.stop();
    assert!(!cancel.is_cancelled());

    fs::write(watch_dir.path().join("late.jpg"), b"late").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(ftp.file("late.jpg").is_none());
}

#[test]
fn test_cancel_token_stops_worker() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());
    let cancel = CancellationToken::new();

    let monitor = controller
        .monitor_folder(watch_dir.path(), "", fast_options(), cancel.clone())
        .unwrap();
    cancel.cancel();

    assert!(wait_for(Duration::from_secs(2), || !monitor.is_running()));
}

#[test]
fn test_missing_folder_is_rejected() {
    let watch_dir = tempdir().unwrap();
    let ftp = MemoryFtp::new();
    let controller = controller(&ftp, &test_bus());

    let err = controller
        .monitor_folder(
            &watch_dir.path().join("absent"),
            "",
            MonitorOptions::default(),
            CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
