use {
    crate::LogError,
    regex::Regex,
    std::{
        ffi::OsString,
        fmt,
        fs::{self, Permissions},
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex, MutexGuard, PoisonError,
        },
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Default rotation threshold: 10 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of rotated backups kept next to the active file.
pub const DEFAULT_BACKUP_COUNT: usize = 10;

/// Defines size thresholds for rotating log files in various units.
///
/// When the active log file reaches the specified size, the next write
/// rotates it before appending. This enum provides multiple size units to
/// make configuration more intuitive:
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
///
/// # Examples
/// ```
/// use levelroll::{RotatingWriterBuilder, RotationSize};
///
/// let dir = std::env::temp_dir().join("levelroll-doc-size");
///
/// // Rotate when the file reaches 100 MB, keeping five backups
/// let writer = RotatingWriterBuilder::new(dir.join("large.log"))
///     .max_bytes(RotationSize::MB(100))
///     .backup_count(5)
///     .build()
///     .unwrap();
/// assert_eq!(writer.max_bytes(), 100 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the threshold in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

impl Default for RotationSize {
    fn default() -> Self {
        RotationSize::Bytes(DEFAULT_MAX_BYTES)
    }
}

/// Callback receiving I/O failures that the writer absorbs while logging.
///
/// Rename failures in the backup chain, failures to reopen the active file
/// after a rotation and failed appends never reach the code that logged the
/// line. An observer is the hook for counting or surfacing them.
pub type ErrorObserver = Arc<dyn Fn(&LogError) + Send + Sync>;

/// Static configuration of a rotating writer.
#[derive(Clone)]
struct RollerMeta {
    /// The path of the active log file.
    path: PathBuf,
    /// Size at which the active file is rotated before the next write.
    max_bytes: u64,
    /// Number of numbered backups to keep. Zero disables rotation entirely.
    backup_count: usize,
    /// The file permissions to set on newly created log files (Unix-like
    /// systems only), in octal notation (e.g., 0o644 for rw-r--r--).
    file_mode: Option<u32>,
}

impl RollerMeta {
    fn new(path: &Path) -> Self {
        RollerMeta {
            path: path.to_path_buf(),
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            file_mode: None,
        }
    }

    /// Path of the `index`-th backup, e.g. `app.log.2`.
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    /// Directory holding the active file and its backups.
    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Create the parent directory of the log file if it doesn't exist.
    /// A directory that already exists is not an error.
    fn ensure_parent_dir(&self) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| LogError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
        }
        Ok(())
    }

    /// Open the active log file in append mode, creating it if needed.
    ///
    /// If the open fails, the parent directory is (re)created and the open is
    /// retried once, which covers a log directory removed while the process
    /// was running.
    fn create_log_file(&self) -> Result<fs::File, LogError> {
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);

        let mut create_log_file_res = open_options.open(&self.path);
        if create_log_file_res.is_err() {
            self.ensure_parent_dir()?;
            create_log_file_res = open_options.open(&self.path);
        }

        let log_file =
            create_log_file_res.map_err(|err| LogError::CreateFileFailed(self.path.clone(), err.to_string()))?;

        self.set_permissions(&self.path)?;

        Ok(log_file)
    }

    /// Set the permissions for a file based on the configured file mode.
    ///
    /// Only has an effect when a file mode has been configured and the
    /// process runs on a Unix-like operating system. Elsewhere a warning is
    /// emitted and the file keeps its default permissions.
    fn set_permissions(&self, path: &Path) -> Result<(), LogError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                let perms = Permissions::from_mode(mode);
                fs::set_permissions(path, perms).map_err(|err| LogError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = mode;
                tracing::warn!(
                    target: "levelroll",
                    path = %path.display(),
                    "setting file permissions is not supported on non-Unix platforms"
                );
            }
        }
        Ok(())
    }

    /// Shift the backup chain up by one and move the active file to `.1`.
    ///
    /// Renames run from the highest index down so that no backup is
    /// overwritten before it has been moved. The backup at `backup_count` is
    /// replaced by its predecessor. Missing sources are expected while the
    /// chain is still filling up and are skipped; any other failure is
    /// recorded and the shift carries on with the next slot.
    fn shift_backups(&self, failures: &mut Vec<LogError>) {
        for idx in (1..self.backup_count).rev() {
            Self::rename_if_exists(&self.backup_path(idx), &self.backup_path(idx + 1), failures);
        }
        Self::rename_if_exists(&self.path, &self.backup_path(1), failures);
    }

    fn rename_if_exists(from: &Path, to: &Path, failures: &mut Vec<LogError>) {
        match fs::rename(from, to) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => failures.push(LogError::RenameFileError {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                error: err.to_string(),
            }),
        }
    }
}

/// Mutable half of the writer, only ever touched under the writer's lock.
struct RollerState {
    /// The open active file. `None` after `close()` or when reopening after
    /// a rotation failed.
    file: Option<fs::File>,
    /// Set by `close()`; a closed writer never reopens its file.
    closed: bool,
}

/// Failures of one locked operation, reported after unlocking.
#[derive(Default)]
struct Outcome {
    failures: Vec<LogError>,
}

impl RollerState {
    /// Check the size of the active file, rotate if needed, then append.
    fn append(&mut self, meta: &RollerMeta, buf: &[u8], outcome: &mut Outcome) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other(LogError::WriterClosed(meta.path.clone())));
        }
        if self.file.is_none() {
            if let Err(err) = self.reopen(meta) {
                outcome.failures.push(err);
            }
        }

        // A failed stat skips the rotation check rather than the write.
        let size = self.file.as_ref().and_then(|f| f.metadata().ok()).map(|m| m.len());
        if let Some(size) = size {
            if meta.backup_count > 0 && size >= meta.max_bytes {
                if let Err(err) = self.rotate(meta, outcome) {
                    outcome.failures.push(err);
                }
            }
        }

        match self.file.as_mut() {
            Some(file) => file.write_all(buf).inspect_err(|err| {
                outcome.failures.push(LogError::WriteFileError {
                    path: meta.path.clone(),
                    error: err.to_string(),
                })
            }),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("log file '{}' is not open", meta.path.display()),
            )),
        }
    }

    /// Sync and close the active file, shift the backup chain and reopen a
    /// fresh file. Only the reopen failure is returned; sync and rename
    /// failures go to `outcome`.
    fn rotate(&mut self, meta: &RollerMeta, outcome: &mut Outcome) -> Result<(), LogError> {
        if let Some(file) = self.file.take() {
            if let Err(err) = file.sync_all() {
                outcome.failures.push(LogError::FileIOError(err));
            }
        }
        meta.shift_backups(&mut outcome.failures);
        self.reopen(meta)
    }

    fn reopen(&mut self, meta: &RollerMeta) -> Result<(), LogError> {
        self.file = Some(meta.create_log_file()?);
        Ok(())
    }
}

/// A log file that rotates itself into numbered backups once it grows past
/// a size threshold.
///
/// The active file lives at `path`; rotated files are `path.1` (newest)
/// through `path.backup_count` (oldest). Every write stats the open file and,
/// if it has reached `max_bytes`, rotates once before appending. The check,
/// the rotation and the append form one critical section, so a writer can be
/// shared between threads (directly, through `Arc`, or as the file member of
/// a [`LevelLogger`](crate::LevelLogger)).
///
/// With `backup_count == 0` no rotation happens at all and the active file
/// grows past the threshold.
pub struct RotatingWriter {
    meta: RollerMeta,
    state: Mutex<RollerState>,
    observer: Option<ErrorObserver>,
    /// Set once a failure has been logged through `tracing`; cleared by the
    /// next append that completes without any failure.
    warned: AtomicBool,
}

impl fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("path", &self.meta.path)
            .field("max_bytes", &self.meta.max_bytes)
            .field("backup_count", &self.meta.backup_count)
            .field("file_mode", &self.meta.file_mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RotatingWriter {
    /// Open (or create) `path` for appending, rotating at `max_bytes` and
    /// keeping `backup_count` numbered backups.
    ///
    /// # Errors
    /// * [`LogError::InvalidMaxBytes`] if `max_bytes` is zero.
    /// * [`LogError::CreateDirectoryFailed`] or [`LogError::CreateFileFailed`]
    ///   if the parent directory or the file cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, max_bytes: u64, backup_count: usize) -> Result<Self, LogError> {
        RotatingWriterBuilder::new(path)
            .max_bytes(RotationSize::Bytes(max_bytes))
            .backup_count(backup_count)
            .build()
    }

    /// The path of the active log file.
    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    /// The rotation threshold in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.meta.max_bytes
    }

    /// The number of backups kept.
    pub fn backup_count(&self) -> usize {
        self.meta.backup_count
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append `buf` to the active file as one unit, rotating first if the
    /// file has reached the threshold.
    ///
    /// At most one rotation happens per call, whatever the size of `buf` or
    /// of the freshly reopened file.
    ///
    /// # Errors
    /// Returns the write error, or an error if the writer has been closed or
    /// the active file could not be reopened after a rotation. Rename
    /// failures in the backup chain do not fail the write.
    pub fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut outcome = Outcome::default();
        let result = self.lock().append(&self.meta, buf, &mut outcome);
        if result.is_ok() && outcome.failures.is_empty() {
            self.warned.store(false, Ordering::Release);
        }
        self.report(outcome);
        result
    }

    /// Rotate now, regardless of the size of the active file.
    ///
    /// Does nothing when `backup_count` is zero.
    ///
    /// # Errors
    /// [`LogError::WriterClosed`] after [`close`](Self::close), or the error
    /// raised while reopening the fresh active file.
    pub fn rotate(&self) -> Result<(), LogError> {
        let mut outcome = Outcome::default();
        let result = {
            let mut state = self.lock();
            if state.closed {
                Err(LogError::WriterClosed(self.meta.path.clone()))
            } else if self.meta.backup_count == 0 {
                Ok(())
            } else {
                state.rotate(&self.meta, &mut outcome)
            }
        };
        self.report(outcome);
        result
    }

    /// Commit the active file to stable storage.
    ///
    /// Succeeds without doing anything when no file is open.
    pub fn sync(&self) -> io::Result<()> {
        match self.lock().file.as_ref() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }

    /// Commit the active file to stable storage and close it. Later writes
    /// fail and no rotation happens.
    ///
    /// The writer is closed even when the final sync fails; that error is
    /// returned. Closing an already closed writer is a no-op.
    pub fn close(&self) -> Result<(), LogError> {
        let mut state = self.lock();
        state.closed = true;
        match state.file.take() {
            Some(file) => file.sync_all().map_err(LogError::FileIOError),
            None => Ok(()),
        }
    }

    /// List the backups that currently exist, newest (`.1`) first.
    pub fn backup_files(&self) -> Result<Vec<PathBuf>, LogError> {
        let filename = self
            .meta
            .path
            .file_name()
            .ok_or_else(|| LogError::InternalError(format!("'{}' has no file name", self.meta.path.display())))?
            .to_string_lossy()
            .to_string();
        let file_pattern = Regex::new(&format!(r"^{}\.(\d+)$", regex::escape(&filename)))
            .map_err(|err| LogError::InternalError(err.to_string()))?;

        let files = fs::read_dir(self.meta.directory()).map_err(LogError::FileIOError)?;

        let mut backups = Vec::new();
        for file in files.flatten() {
            if !file.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let index = file
                .file_name()
                .to_str()
                .and_then(|name| file_pattern.captures(name))
                .and_then(|caps| caps[1].parse::<usize>().ok());
            if let Some(index) = index.filter(|i| *i >= 1) {
                backups.push(index);
            }
        }

        backups.sort_unstable();
        Ok(backups.into_iter().map(|index| self.meta.backup_path(index)).collect())
    }

    fn lock(&self) -> MutexGuard<'_, RollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand absorbed failures to the observer. Runs outside the lock.
    ///
    /// Only the first run of failures after a clean append is logged through
    /// `tracing`. A subscriber that writes back into this writer, possibly
    /// from another thread as `tracing_appender::non_blocking` does, would
    /// otherwise feed each failure back as a new one.
    fn report(&self, outcome: Outcome) {
        if outcome.failures.is_empty() {
            return;
        }
        if !self.warned.swap(true, Ordering::AcqRel) {
            for err in &outcome.failures {
                tracing::warn!(
                    target: "levelroll",
                    path = %self.meta.path.display(),
                    error = %err,
                    "log file failure absorbed"
                );
            }
        }
        if let Some(observer) = &self.observer {
            for err in &outcome.failures {
                observer(err);
            }
        }
    }
}

impl io::Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

/// Provides a fluent interface for configuring [`RotatingWriter`]s.
///
/// # Default Configuration
///
/// * Rotate at 10 MiB
/// * Keep 10 backups
/// * Standard file permissions
/// * No error observer
///
/// # Examples
///
/// ```rust
/// use {
///     levelroll::{RotatingWriterBuilder, RotationSize},
///     std::io::Write,
/// };
///
/// let dir = std::env::temp_dir().join("levelroll-doc-builder");
/// let mut writer = RotatingWriterBuilder::new(dir.join("app.log"))
///     .max_bytes(RotationSize::KB(256))
///     .backup_count(3)
///     .on_error(|err| eprintln!("log file trouble: {err}"))
///     .build()
///     .unwrap();
///
/// writeln!(writer, "service started").unwrap();
/// ```
pub struct RotatingWriterBuilder {
    meta: RollerMeta,
    observer: Option<ErrorObserver>,
}

impl RotatingWriterBuilder {
    /// Create a new builder for the log file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RotatingWriterBuilder {
            meta: RollerMeta::new(path.as_ref()),
            observer: None,
        }
    }

    /// Set the size at which the active file is rotated.
    pub fn max_bytes(self, max_bytes: RotationSize) -> Self {
        Self {
            meta: RollerMeta {
                max_bytes: max_bytes.bytes(),
                ..self.meta
            },
            ..self
        }
    }

    /// Set the number of backups to keep. Zero disables rotation.
    pub fn backup_count(self, backup_count: usize) -> Self {
        Self {
            meta: RollerMeta { backup_count, ..self.meta },
            ..self
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    /// For example, 0o644 for rw-r--r-- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: RollerMeta {
                file_mode: Some(mode),
                ..self.meta
            },
            ..self
        }
    }

    /// Install an observer for failures absorbed while writing.
    pub fn observer(self, observer: ErrorObserver) -> Self {
        Self {
            observer: Some(observer),
            ..self
        }
    }

    /// Install a closure as the observer for failures absorbed while writing.
    pub fn on_error<F>(self, observer: F) -> Self
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        self.observer(Arc::new(observer))
    }

    /// Build the writer, creating the parent directory and opening the
    /// active file for appending.
    pub fn build(self) -> Result<RotatingWriter, LogError> {
        if self.meta.max_bytes == 0 {
            return Err(LogError::InvalidMaxBytes(self.meta.max_bytes));
        }
        self.meta.ensure_parent_dir()?;
        let file = self.meta.create_log_file()?;

        Ok(RotatingWriter {
            meta: self.meta,
            state: Mutex::new(RollerState {
                file: Some(file),
                closed: false,
            }),
            observer: self.observer,
            warned: AtomicBool::new(false),
        })
    }
}
