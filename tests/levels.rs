use {
    levelroll::{debug, error, info, warn, Level, LevelLogger, LoggerConfig, RotationSize},
    std::{
        fs,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
    },
    tempfile::TempDir,
};

fn text(buffer: &Mutex<Vec<u8>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}

#[test]
fn warn_level_gates_every_sink() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let stdout = Arc::new(Mutex::new(Vec::<u8>::new()));
    let stderr = Arc::new(Mutex::new(Vec::<u8>::new()));
    let logger = LevelLogger::with_sinks(
        LoggerConfig::new(Level::Warn).path(&path),
        stdout.clone(),
        stderr.clone(),
    )
    .unwrap();

    debug!(logger, "debug line");
    info!(logger, "info line");
    assert!(text(&stdout).is_empty());
    assert!(text(&stderr).is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    warn!(logger, "warn line");
    error!(logger, "error line");
    logger.stop().unwrap();

    let file = fs::read_to_string(&path).unwrap();
    assert!(file.contains("WARNING: ") && file.contains("warn line"));
    assert!(file.contains("ERROR: ") && file.contains("error line"));
    assert!(text(&stdout).contains("warn line"));
    assert!(text(&stderr).contains("error line"));
    assert!(!file.contains("debug line") && !file.contains("info line"));
}

#[test]
fn every_line_has_label_and_timestamp() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let logger = LevelLogger::with_sinks(
        LoggerConfig::new(Level::Debug).path(&path),
        Arc::new(Mutex::new(Vec::<u8>::new())),
        Arc::new(Mutex::new(Vec::<u8>::new())),
    )
    .unwrap();

    debug!(logger, "one");
    info!(logger, "two");
    warn!(logger, "three");
    error!(logger, "four");
    logger.stop().unwrap();

    let pattern = regex::Regex::new(r"^(DEBUG|INFO|WARNING|ERROR): \d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2} ").unwrap();
    let file = fs::read_to_string(&path).unwrap();
    assert_eq!(file.lines().count(), 4);
    assert!(file.lines().all(|line| pattern.is_match(line)), "{file}");
}

#[test]
fn shared_logger_across_threads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let logger = Arc::new(
        LevelLogger::with_sinks(
            LoggerConfig::new(Level::Info)
                .path(&path)
                .max_bytes(RotationSize::KB(2))
                .backup_count(100),
            Arc::new(Mutex::new(Vec::<u8>::new())),
            Arc::new(Mutex::new(Vec::<u8>::new())),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..100 {
                    info!(logger, "worker {t} step {i}");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    logger.stop().unwrap();

    let writer = logger.file_writer().unwrap();
    let mut files = writer.backup_files().unwrap();
    files.push(path.clone());
    let total: usize = files
        .iter()
        .map(|file| fs::read_to_string(file).unwrap().lines().filter(|l| l.starts_with("INFO: ")).count())
        .sum();
    assert_eq!(total, 400);
}

#[cfg(unix)]
#[test]
fn observer_sees_absorbed_file_failures() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    // A non-empty directory in the `.1` slot makes every rotation fail.
    let slot = dir.path().join("app.log.1");
    fs::create_dir(&slot).unwrap();
    fs::write(slot.join("keep"), "").unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let logger = LevelLogger::with_sinks(
        LoggerConfig::new(Level::Info)
            .path(&path)
            .max_bytes(RotationSize::Bytes(1))
            .backup_count(1)
            .on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        Arc::new(Mutex::new(Vec::<u8>::new())),
        Arc::new(Mutex::new(Vec::<u8>::new())),
    )
    .unwrap();

    info!(logger, "first");
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    // The failed rename is reported, the line still lands in the active file.
    info!(logger, "second");
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    logger.stop().unwrap();

    let file = fs::read_to_string(&path).unwrap();
    assert!(file.contains("first") && file.contains("second"));

    // A stopped writer drops lines without reporting them.
    info!(logger, "dropped");
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
