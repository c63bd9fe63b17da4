//! Byte sources for resource loading.
//!
//! Reads are cooperative: an [`IoQueue`] collects requests and performs at
//! most `max_reads` of them each time it is pumped, so file loading spreads
//! across ticks the same way asynchronous resource creation does.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_core::alloc::HashMap;
use ember_core::profiling::profile_function;
use parking_lot::Mutex;

use crate::error::{ResourceError, ResourceResult};

/// Immutable, cheaply clonable block of resource data.
#[derive(Clone)]
pub struct Stream {
    bytes: Arc<[u8]>,
    location: Option<Arc<str>>,
}

impl Stream {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            location: None,
        }
    }

    /// Tag the stream with the location it was read from.
    pub fn with_location(mut self, location: impl AsRef<str>) -> Self {
        self.location = Some(Arc::from(location.as_ref()));
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl From<Vec<u8>> for Stream {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static [u8]> for Stream {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("len", &self.bytes.len())
            .field("location", &self.location)
            .finish()
    }
}

/// Trait for loading bytes from various sources.
pub trait BytesReader: Send + Sync {
    /// Read all bytes stored at `location`.
    fn read_bytes(&self, location: &str) -> ResourceResult<Vec<u8>>;

    /// Check if `location` exists.
    fn exists(&self, location: &str) -> bool;
}

/// Reads files relative to a base directory.
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    /// Create a new file reader with a base path.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, location: &str) -> PathBuf {
        let location = location.strip_prefix("file://").unwrap_or(location);
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl BytesReader for FileReader {
    fn read_bytes(&self, location: &str) -> ResourceResult<Vec<u8>> {
        let full_path = self.resolve_path(location);
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound {
                    location: full_path.display().to_string(),
                }
            } else {
                ResourceError::Io {
                    path: full_path.clone(),
                    source: e,
                }
            }
        })
    }

    fn exists(&self, location: &str) -> bool {
        self.resolve_path(location).exists()
    }
}

/// In-memory bytes reader for tests and embedded data.
#[derive(Default)]
pub struct MemoryReader {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes for a location.
    pub fn insert(&mut self, location: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) {
        self.files.insert(location.as_ref().to_string(), bytes.into());
    }

    /// Builder-style [`MemoryReader::insert`].
    pub fn with(mut self, location: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(location, bytes);
        self
    }

    pub fn remove(&mut self, location: impl AsRef<str>) -> bool {
        self.files.remove(location.as_ref()).is_some()
    }
}

impl BytesReader for MemoryReader {
    fn read_bytes(&self, location: &str) -> ResourceResult<Vec<u8>> {
        self.files
            .get(location)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| ResourceError::NotFound {
                location: location.to_string(),
            })
    }

    fn exists(&self, location: &str) -> bool {
        self.files.contains_key(location)
    }
}

/// Ticket for a queued read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoTicket(u64);

/// IO queue shared between loaders and whoever pumps it.
pub type SharedIoQueue = Arc<Mutex<IoQueue>>;

/// Cooperative read queue.
///
/// # Example
///
/// ```
/// use ember_resource::{IoQueue, MemoryReader};
///
/// let mut queue = IoQueue::new(MemoryReader::new().with("a.bin", vec![1, 2, 3]));
/// let ticket = queue.request("a.bin");
/// assert!(!queue.is_done(ticket));
///
/// queue.pump(4);
/// let stream = queue.take(ticket).unwrap().unwrap();
/// assert_eq!(stream.bytes(), &[1, 2, 3]);
/// ```
pub struct IoQueue {
    reader: Box<dyn BytesReader>,
    pending: VecDeque<(IoTicket, String)>,
    completed: HashMap<IoTicket, ResourceResult<Stream>>,
    next_ticket: u64,
}

impl IoQueue {
    pub fn new(reader: impl BytesReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            pending: VecDeque::new(),
            completed: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Wrap a new queue for sharing.
    pub fn shared(reader: impl BytesReader + 'static) -> SharedIoQueue {
        Arc::new(Mutex::new(Self::new(reader)))
    }

    /// Queue a read of `location`.
    pub fn request(&mut self, location: impl Into<String>) -> IoTicket {
        let ticket = IoTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending.push_back((ticket, location.into()));
        ticket
    }

    /// Perform up to `max_reads` queued reads. Returns how many ran.
    pub fn pump(&mut self, max_reads: usize) -> usize {
        profile_function!();
        let mut reads = 0;
        while reads < max_reads {
            let Some((ticket, location)) = self.pending.pop_front() else {
                break;
            };
            let result = self
                .reader
                .read_bytes(&location)
                .map(|bytes| Stream::new(bytes).with_location(&location));
            if let Err(e) = &result {
                tracing::debug!("Read of '{}' failed: {}", location, e);
            }
            self.completed.insert(ticket, result);
            reads += 1;
        }
        reads
    }

    /// True once the read behind `ticket` finished.
    pub fn is_done(&self, ticket: IoTicket) -> bool {
        self.completed.contains_key(&ticket)
    }

    /// Take the result of a finished read.
    pub fn take(&mut self, ticket: IoTicket) -> Option<ResourceResult<Stream>> {
        self.completed.remove(&ticket)
    }

    /// Forget a request, finished or not.
    pub fn cancel(&mut self, ticket: IoTicket) {
        self.pending.retain(|(t, _)| *t != ticket);
        self.completed.remove(&ticket);
    }

    /// Number of reads waiting to be performed.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of finished reads nobody has taken yet.
    pub fn num_completed(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reader() {
        let mut reader = MemoryReader::new();
        reader.insert("a", vec![1u8, 2]);
        assert!(reader.exists("a"));
        assert_eq!(reader.read_bytes("a").unwrap(), vec![1, 2]);
        assert!(matches!(reader.read_bytes("b"), Err(ResourceError::NotFound { .. })));
        assert!(reader.remove("a"));
        assert!(!reader.exists("a"));
    }

    #[test]
    fn test_file_reader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), [7u8, 8, 9]).unwrap();

        let reader = FileReader::new(dir.path());
        assert!(reader.exists("data.bin"));
        assert_eq!(reader.read_bytes("data.bin").unwrap(), vec![7, 8, 9]);
        assert_eq!(reader.read_bytes("file://data.bin").unwrap(), vec![7, 8, 9]);
        assert!(matches!(
            reader.read_bytes("missing.bin"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_queue_pump_is_bounded() {
        let reader = MemoryReader::new().with("a", vec![1u8]).with("b", vec![2u8]);
        let mut queue = IoQueue::new(reader);
        let a = queue.request("a");
        let b = queue.request("b");

        assert_eq!(queue.pump(1), 1);
        assert!(queue.is_done(a));
        assert!(!queue.is_done(b));
        assert_eq!(queue.num_pending(), 1);

        assert_eq!(queue.pump(8), 1);
        assert!(queue.is_done(b));
        assert_eq!(queue.take(b).unwrap().unwrap().location(), Some("b"));
        assert_eq!(queue.num_completed(), 1);
    }

    #[test]
    fn test_queue_failure_and_cancel() {
        let mut queue = IoQueue::new(MemoryReader::new());
        let missing = queue.request("missing");
        let dropped = queue.request("dropped");
        queue.cancel(dropped);
        assert_eq!(queue.pump(8), 1);
        assert!(queue.take(missing).unwrap().is_err());
        assert!(queue.take(dropped).is_none());
    }
}
