//! The writer as the target of its own `tracing` diagnostics, behind
//! `tracing_appender::non_blocking`. Installs a global subscriber, so this
//! file holds a single test.

use {
    levelroll::{RotatingWriterBuilder, RotationSize},
    std::{
        fs,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    },
    tempfile::TempDir,
    tracing_subscriber::util::SubscriberInitExt,
};

#[test]
fn persistent_failure_does_not_feed_itself() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let appender = RotatingWriterBuilder::new(logs.join("app.log"))
        .max_bytes(RotationSize::Bytes(1))
        .backup_count(1)
        .on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let (non_blocking, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .finish()
        .try_init()
        .unwrap();

    tracing::info!("service started");
    thread::sleep(Duration::from_millis(200));
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    // The log directory turns into a plain file: every rename and reopen fails.
    fs::remove_dir_all(&logs).unwrap();
    fs::write(&logs, "").unwrap();

    tracing::info!("one more event");
    thread::sleep(Duration::from_millis(300));
    let settled = seen.load(Ordering::SeqCst);
    assert!(settled >= 1, "the failure must reach the observer");

    thread::sleep(Duration::from_millis(500));
    let later = seen.load(Ordering::SeqCst);
    assert_eq!(settled, later, "failures kept coming without new events");
    assert!(later < 16, "{later} failures from two events");
}
