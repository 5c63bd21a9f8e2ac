use {
    crate::{
        sink::{Console, FanOut, Sink},
        ErrorObserver, LogError, RotatingWriter, RotatingWriterBuilder, RotationSize, DEFAULT_BACKUP_COUNT,
    },
    chrono::{FixedOffset, Local, Utc},
    std::{
        fmt::{self, Write as _},
        panic::Location,
        path::{Path, PathBuf},
        process,
        str::FromStr,
        sync::Arc,
    },
};

/// Exit status of the process after a fatal log call.
pub const FATAL_EXIT_CODE: i32 = 255;

/// Exit status of [`LevelLogger::start`] when the log file cannot be opened.
pub const STARTUP_FAILURE_EXIT_CODE: i32 = 1;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Log severities, ordered from least to most severe.
///
/// A logger configured with a minimum level emits every severity at or
/// above it. [`Level::Fatal`] is always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Every level, least severe first.
    pub const ALL: [Level; 5] = [Level::Debug, Level::Info, Level::Warn, Level::Error, Level::Fatal];

    /// The label that starts each line of this severity.
    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Console stream for this severity: errors go to stderr.
    fn console(self) -> Console {
        match self {
            Level::Debug | Level::Info | Level::Warn => Console::Stdout,
            Level::Error | Level::Fatal => Console::Stderr,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

/// Specifies the time zone used for the timestamp of each log line.
///
/// # Examples
/// ```
/// use levelroll::TimeZone;
/// use chrono::FixedOffset;
///
/// // Use UTC time for global deployments
/// let utc = TimeZone::UTC;
///
/// // Use local system time zone (changes with system settings)
/// let local = TimeZone::Local;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8 for China)
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub enum TimeZone {
    /// Use UTC time zone. Best for consistent timing in distributed systems
    /// or when deploying across multiple regions.
    UTC,
    /// Use the system's local time zone.
    #[default]
    Local,
    /// Use a fixed time zone offset, regardless of where the application
    /// runs.
    Fix(FixedOffset),
}

impl TimeZone {
    fn timestamp(&self) -> String {
        match self {
            TimeZone::UTC => Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            TimeZone::Local => Local::now().format(TIMESTAMP_FORMAT).to_string(),
            TimeZone::Fix(offset) => Utc::now().with_timezone(offset).format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Configuration of a [`LevelLogger`].
///
/// # Default Configuration
///
/// * Minimum level [`Level::Info`]
/// * Console only, no log file
/// * Rotate at 10 MiB, keep 10 backups (once a path is set)
/// * Local time zone
/// * Call-site location on every line
#[derive(Clone)]
pub struct LoggerConfig {
    /// Lowest severity that is emitted.
    pub level: Level,
    /// Log file; `None` keeps output on the console only.
    pub path: Option<PathBuf>,
    /// Size at which the log file is rotated.
    pub max_bytes: RotationSize,
    /// Number of rotated files to keep; zero disables rotation.
    pub backup_count: usize,
    /// Time zone of line timestamps.
    pub time_zone: TimeZone,
    /// Whether lines carry the `file:line` of the call site.
    pub with_location: bool,
    /// Unix permission bits of created log files.
    pub file_mode: Option<u32>,
    /// Receives file failures that logging calls absorb.
    pub error_observer: Option<ErrorObserver>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: Level::Info,
            path: None,
            max_bytes: RotationSize::default(),
            backup_count: DEFAULT_BACKUP_COUNT,
            time_zone: TimeZone::default(),
            with_location: true,
            file_mode: None,
            error_observer: None,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("level", &self.level)
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .field("time_zone", &self.time_zone)
            .field("with_location", &self.with_location)
            .field("file_mode", &self.file_mode)
            .field("error_observer", &self.error_observer.is_some())
            .finish()
    }
}

impl LoggerConfig {
    pub fn new(level: Level) -> Self {
        LoggerConfig {
            level,
            ..Default::default()
        }
    }

    /// Also write to the log file at `path`. An empty path disables file
    /// output.
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        let path = path.as_ref();
        Self {
            path: (!path.as_os_str().is_empty()).then(|| path.to_path_buf()),
            ..self
        }
    }

    pub fn max_bytes(self, max_bytes: RotationSize) -> Self {
        Self { max_bytes, ..self }
    }

    pub fn backup_count(self, backup_count: usize) -> Self {
        Self { backup_count, ..self }
    }

    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self { time_zone, ..self }
    }

    pub fn with_location(self, with_location: bool) -> Self {
        Self { with_location, ..self }
    }

    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            file_mode: Some(mode),
            ..self
        }
    }

    pub fn on_error<F>(self, observer: F) -> Self
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        Self {
            error_observer: Some(Arc::new(observer)),
            ..self
        }
    }

    fn build_writer(&self, path: &Path) -> Result<RotatingWriter, LogError> {
        let mut builder = RotatingWriterBuilder::new(path)
            .max_bytes(self.max_bytes)
            .backup_count(self.backup_count);
        if let Some(mode) = self.file_mode {
            builder = builder.file_mode(mode);
        }
        if let Some(observer) = &self.error_observer {
            builder = builder.observer(Arc::clone(observer));
        }
        builder.build()
    }
}

/// A leveled logger writing to the console and, optionally, to a rotating
/// log file.
///
/// Each severity has its own [`FanOut`], chosen once at construction:
/// severities below the configured level discard their input, the others
/// write to the console (stdout for debug/info/warn, stderr for error/fatal)
/// and, when a path is configured, to the shared [`RotatingWriter`] as well.
///
/// Logging calls never fail. Write errors are absorbed, so a full disk can
/// stop lines from reaching the file but never stops the caller.
///
/// The logger is `Send + Sync`; share one instance per process through an
/// `Arc`.
pub struct LevelLogger {
    level: Level,
    channels: [FanOut; 5],
    file: Option<Arc<RotatingWriter>>,
    time_zone: TimeZone,
    with_location: bool,
}

impl fmt::Debug for LevelLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelLogger")
            .field("level", &self.level)
            .field("channels", &self.channels)
            .field("file", &self.file)
            .field("time_zone", &self.time_zone)
            .field("with_location", &self.with_location)
            .finish()
    }
}

impl LevelLogger {
    /// Build a logger writing to the process's stdout and stderr.
    ///
    /// # Errors
    /// Any error raised while creating the rotating log file.
    pub fn new(config: LoggerConfig) -> Result<Self, LogError> {
        Self::with_sinks(config, Arc::new(Console::Stdout), Arc::new(Console::Stderr))
    }

    /// Build a logger whose console output goes to the given sinks instead of
    /// the standard streams.
    pub fn with_sinks(config: LoggerConfig, stdout: Arc<dyn Sink>, stderr: Arc<dyn Sink>) -> Result<Self, LogError> {
        let file = match &config.path {
            Some(path) => Some(Arc::new(config.build_writer(path)?)),
            None => None,
        };

        let channels = Level::ALL.map(|severity| {
            if severity < config.level {
                return FanOut::discard();
            }
            let console = match severity.console() {
                Console::Stdout => Arc::clone(&stdout),
                Console::Stderr => Arc::clone(&stderr),
            };
            let mut members: Vec<Arc<dyn Sink>> = Vec::with_capacity(2);
            if let Some(file) = &file {
                members.push(Arc::clone(file) as Arc<dyn Sink>);
            }
            members.push(console);
            FanOut::new(members)
        });

        Ok(LevelLogger {
            level: config.level,
            channels,
            file,
            time_zone: config.time_zone,
            with_location: config.with_location,
        })
    }

    /// Like [`new`](Self::new), but a log file that cannot be opened ends
    /// the process with [`STARTUP_FAILURE_EXIT_CODE`].
    pub fn start(config: LoggerConfig) -> Self {
        match Self::new(config) {
            Ok(logger) => logger,
            Err(err) => {
                eprintln!("unable to create rotating log file: {err}");
                process::exit(STARTUP_FAILURE_EXIT_CODE)
            }
        }
    }

    /// The configured minimum level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether lines of `level` go anywhere.
    pub fn enabled(&self, level: Level) -> bool {
        !self.channel(level).is_discard()
    }

    /// The rotating writer behind the file output, if one is configured.
    pub fn file_writer(&self) -> Option<&Arc<RotatingWriter>> {
        self.file.as_ref()
    }

    #[track_caller]
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let channel = self.channel(level);
        if channel.is_discard() {
            return;
        }
        let line = self.format_line(level, args, Location::caller());
        let _ = channel.write_bytes(line.as_bytes());
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args)
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    /// Log an error value on the error channel.
    #[track_caller]
    pub fn error<E: fmt::Display + ?Sized>(&self, err: &E) {
        self.log(Level::Error, format_args!("{err}"))
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }

    /// Log `msg` on the fatal channel, flush it to stable storage and exit
    /// the process with [`FATAL_EXIT_CODE`].
    #[track_caller]
    pub fn fatal<M: fmt::Display + ?Sized>(&self, msg: &M) -> ! {
        self.fatalf(format_args!("{msg}"))
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> ! {
        self.log(Level::Fatal, args);
        let _ = self.channel(Level::Fatal).sync();
        process::exit(FATAL_EXIT_CODE)
    }

    /// Commit the log file to stable storage. Best-effort.
    pub fn sync(&self) {
        if let Some(file) = &self.file {
            let _ = file.sync();
        }
    }

    /// Sync and close the log file. Lines logged afterwards only reach the
    /// console.
    ///
    /// A failed final sync is returned; the file is closed either way.
    /// Stopping twice is a no-op.
    pub fn stop(&self) -> Result<(), LogError> {
        match &self.file {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }

    fn channel(&self, level: Level) -> &FanOut {
        &self.channels[level as usize]
    }

    fn format_line(&self, level: Level, args: fmt::Arguments<'_>, location: &Location<'_>) -> String {
        let mut line = String::with_capacity(64);
        let _ = write!(line, "{}: {}", level.label(), self.time_zone.timestamp());
        if self.with_location {
            let file = Path::new(location.file())
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(location.file());
            let _ = write!(line, " {}:{}:", file, location.line());
        }
        let _ = write!(line, " {args}");
        if !line.ends_with('\n') {
            line.push('\n');
        }
        line
    }
}
