use {
    crate::RotatingWriter,
    std::{
        fmt,
        io::{self, Write as _},
        sync::{Arc, Mutex, PoisonError},
    },
};

/// A destination for formatted log lines.
///
/// Implementations take `&self` so one sink can be shared by several
/// severity channels and by concurrent callers. Each call carries one whole
/// line.
pub trait Sink: Send + Sync {
    /// Write all of `buf`.
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()>;

    /// Push buffered data down to the device. Best-effort.
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// The process's standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    Stderr,
}

impl Sink for Console {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Console::Stdout => io::stdout().lock().write_all(buf),
            Console::Stderr => io::stderr().lock().write_all(buf),
        }
    }

    fn sync(&self) -> io::Result<()> {
        match self {
            Console::Stdout => io::stdout().flush(),
            Console::Stderr => io::stderr().flush(),
        }
    }
}

impl Sink for RotatingWriter {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        self.append(buf)
    }

    fn sync(&self) -> io::Result<()> {
        RotatingWriter::sync(self)
    }
}

/// In-memory capture, handy for tests and for embedding log output.
impl Sink for Mutex<Vec<u8>> {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        self.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(())
    }
}

/// Forwards every write to a fixed, ordered list of member sinks.
///
/// A failing member does not stop the remaining members from receiving the
/// write; the first error is returned once all members have been tried. A
/// fan-out without members discards everything.
#[derive(Clone, Default)]
pub struct FanOut {
    members: Vec<Arc<dyn Sink>>,
}

impl FanOut {
    pub fn new(members: Vec<Arc<dyn Sink>>) -> Self {
        FanOut { members }
    }

    /// A fan-out that drops every write.
    pub fn discard() -> Self {
        FanOut::default()
    }

    /// Whether the fan-out has no members and drops every write.
    pub fn is_discard(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut").field("members", &self.members.len()).finish()
    }
}

impl Sink for FanOut {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        let mut first_err = None;
        for member in &self.members {
            if let Err(err) = member.write_bytes(buf) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn sync(&self) -> io::Result<()> {
        let mut first_err = None;
        for member in &self.members {
            if let Err(err) = member.sync() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    struct Broken(io::ErrorKind);

    impl Sink for Broken {
        fn write_bytes(&self, _buf: &[u8]) -> io::Result<()> {
            Err(io::Error::new(self.0, "broken sink"))
        }

        fn sync(&self) -> io::Result<()> {
            Err(io::Error::new(self.0, "broken sink"))
        }
    }

    fn contents(buffer: &Mutex<Vec<u8>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn forwards_to_every_member_in_order() {
        let first = Arc::new(Mutex::new(Vec::<u8>::new()));
        let second = Arc::new(Mutex::new(Vec::<u8>::new()));
        let fan_out = FanOut::new(vec![first.clone() as Arc<dyn Sink>, second.clone() as Arc<dyn Sink>]);

        fan_out.write_bytes(b"hello\n").unwrap();
        fan_out.write_bytes(b"world\n").unwrap();
        assert_eq!(contents(&first), "hello\nworld\n");
        assert_eq!(contents(&second), "hello\nworld\n");
        assert!(!fan_out.is_discard());
    }

    #[test]
    fn failing_member_does_not_short_circuit() {
        let after = Arc::new(Mutex::new(Vec::<u8>::new()));
        let fan_out = FanOut::new(vec![
            Arc::new(Broken(io::ErrorKind::PermissionDenied)) as Arc<dyn Sink>,
            Arc::new(Broken(io::ErrorKind::BrokenPipe)),
            after.clone(),
        ]);

        let err = fan_out.write_bytes(b"line\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(contents(&after), "line\n");

        let err = fan_out.sync().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn discard_accepts_everything() {
        let fan_out = FanOut::discard();
        assert!(fan_out.is_discard());
        fan_out.write_bytes(b"nowhere\n").unwrap();
        fan_out.sync().unwrap();
    }

    #[test]
    fn rotating_writer_as_member() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let file = Arc::new(RotatingWriter::new(&path, 1024, 1).unwrap());
        let console = Arc::new(Mutex::new(Vec::<u8>::new()));
        let fan_out = FanOut::new(vec![file.clone() as Arc<dyn Sink>, console.clone() as Arc<dyn Sink>]);

        fan_out.write_bytes(b"both\n").unwrap();
        fan_out.sync().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "both\n");
        assert_eq!(contents(&console), "both\n");

        // A closed file member fails, the console still gets the line.
        file.close().unwrap();
        assert!(fan_out.write_bytes(b"console only\n").is_err());
        assert_eq!(contents(&console), "both\nconsole only\n");
    }
}
