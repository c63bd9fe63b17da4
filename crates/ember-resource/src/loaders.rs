//! Generic loaders built on a [`StreamDecoder`].
//!
//! - [`DataLoader`] decodes data handed to `create_with_data` synchronously.
//! - [`FileLoader`] reads the resource location through an [`IoQueue`] and
//!   decodes once the read finished, spreading the load across updates.
//!
//! [`IoQueue`]: crate::IoQueue

use ember_core::alloc::HashMap;

use crate::error::ResourceResult;
use crate::factory::{LoadStatus, Loader};
use crate::id::Id;
use crate::io::{IoTicket, SharedIoQueue, Stream};
use crate::resource::{Resource, ResourceKind, ResourceSetup};
use crate::state::ResourceState;

/// Turns raw bytes into the payload of a resource kind.
pub trait StreamDecoder<K: ResourceKind>: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this decoder understands resources described by `setup`.
    fn accepts(&self, setup: &K::Setup) -> bool;

    /// Decode `stream` into a payload for `res`.
    fn decode(&mut self, res: &Resource<K>, stream: &Stream) -> ResourceResult<K::Payload>;

    /// Release a payload produced by [`decode`](StreamDecoder::decode).
    fn release(&mut self, payload: K::Payload) {
        drop(payload);
    }
}

/// Loader for resources created from in-memory data.
pub struct DataLoader<K: ResourceKind, D: StreamDecoder<K>> {
    decoder: D,
    name: String,
    _marker: std::marker::PhantomData<fn() -> K>,
}

impl<K: ResourceKind, D: StreamDecoder<K>> DataLoader<K, D> {
    pub fn new(decoder: D) -> Self {
        let name = format!("data/{}", decoder.name());
        Self {
            decoder,
            name,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

impl<K: ResourceKind, D: StreamDecoder<K>> Loader<K> for DataLoader<K, D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, res: &Resource<K>, data: Option<&Stream>) -> bool {
        data.is_some() && self.decoder.accepts(res.setup())
    }

    fn load(&mut self, res: &Resource<K>, data: Option<&Stream>) -> ResourceResult<LoadStatus<K::Payload>> {
        let Some(stream) = data else {
            return Err(crate::ResourceError::loader(res.location(), "no data supplied"));
        };
        self.decoder.decode(res, stream).map(LoadStatus::Ready)
    }

    fn unload(&mut self, _res: &Resource<K>, payload: Option<K::Payload>) {
        if let Some(payload) = payload {
            self.decoder.release(payload);
        }
    }
}

/// Loader reading resource data through a shared IO queue.
///
/// The first `load` queues a read of the resource location and parks the
/// resource. Once the queue finished the read, the pool calls `load` again
/// and the bytes are decoded.
pub struct FileLoader<K: ResourceKind, D: StreamDecoder<K>> {
    io: SharedIoQueue,
    decoder: D,
    name: String,
    tickets: HashMap<Id, IoTicket>,
    _marker: std::marker::PhantomData<fn() -> K>,
}

impl<K: ResourceKind, D: StreamDecoder<K>> FileLoader<K, D> {
    pub fn new(io: SharedIoQueue, decoder: D) -> Self {
        let name = format!("file/{}", decoder.name());
        Self {
            io,
            decoder,
            name,
            tickets: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Number of reads this loader is waiting for.
    pub fn num_in_flight(&self) -> usize {
        self.tickets.len()
    }
}

impl<K: ResourceKind, D: StreamDecoder<K>> Loader<K> for FileLoader<K, D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, res: &Resource<K>, data: Option<&Stream>) -> bool {
        data.is_none() && res.setup().locator().has_location() && self.decoder.accepts(res.setup())
    }

    fn load(&mut self, res: &Resource<K>, _data: Option<&Stream>) -> ResourceResult<LoadStatus<K::Payload>> {
        if res.state() == ResourceState::Setup {
            let ticket = self.io.lock().request(res.location());
            self.tickets.insert(res.id(), ticket);
            tracing::trace!("Queued read of '{}' for {}", res.location(), res.id());
            return Ok(LoadStatus::Pending);
        }

        let Some(ticket) = self.tickets.remove(&res.id()) else {
            return Err(crate::ResourceError::loader(res.location(), "no read in flight"));
        };
        let result = self.io.lock().take(ticket);
        match result {
            Some(Ok(stream)) => self.decoder.decode(res, &stream).map(LoadStatus::Ready),
            Some(Err(e)) => Err(e),
            None => Err(crate::ResourceError::Cancelled {
                location: res.location().to_string(),
            }),
        }
    }

    fn is_ready(&self, res: &Resource<K>) -> bool {
        match self.tickets.get(&res.id()) {
            Some(ticket) => self.io.lock().is_done(*ticket),
            None => true,
        }
    }

    fn unload(&mut self, res: &Resource<K>, payload: Option<K::Payload>) {
        if let Some(ticket) = self.tickets.remove(&res.id()) {
            self.io.lock().cancel(ticket);
            tracing::debug!("Dropped in-flight read of '{}'", res.location());
        }
        if let Some(payload) = payload {
            self.decoder.release(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{LoaderFactory, ResourceFactory};
    use crate::io::{IoQueue, MemoryReader};
    use crate::slot::ResourceSlot;
    use crate::slot::tests::{Blob, BlobSetup};
    use crate::{ResourceError, ResourceResult};

    struct Utf8Decoder;

    impl StreamDecoder<Blob> for Utf8Decoder {
        fn name(&self) -> &str {
            "utf8"
        }

        fn accepts(&self, setup: &BlobSetup) -> bool {
            setup.locator().location().ends_with(".txt")
        }

        fn decode(&mut self, _res: &Resource<Blob>, stream: &Stream) -> ResourceResult<String> {
            String::from_utf8(stream.bytes().to_vec()).map_err(|e| ResourceError::invalid_data(e.to_string()))
        }
    }

    fn factory(io: &SharedIoQueue) -> LoaderFactory<Blob> {
        LoaderFactory::new()
            .with_loader(DataLoader::new(Utf8Decoder))
            .with_loader(FileLoader::new(io.clone(), Utf8Decoder))
    }

    #[test]
    fn test_data_loader_is_sync() {
        let io = IoQueue::shared(MemoryReader::new());
        let mut factory = factory(&io);
        let mut slot = ResourceSlot::<Blob>::new();
        slot.assign(
            &mut factory,
            Id::new(0, 0, 1),
            BlobSetup::new("hello.txt"),
            Some(Stream::from(b"hi".to_vec())),
        );
        assert!(slot.is_valid());
        assert_eq!(slot.resource().payload().map(String::as_str), Some("hi"));
        assert_eq!(slot.resource().loader_index(), Some(0));
    }

    #[test]
    fn test_file_loader_waits_for_io() {
        let io = IoQueue::shared(MemoryReader::new().with("hello.txt", b"hello".to_vec()));
        let mut factory = factory(&io);
        let mut slot = ResourceSlot::<Blob>::new();
        slot.assign(&mut factory, Id::new(0, 0, 1), BlobSetup::new("hello.txt"), None);
        assert!(slot.is_pending());
        assert_eq!(slot.resource().loader_index(), Some(1));
        assert!(!slot.ready_for_validate(&factory));

        io.lock().pump(1);
        assert!(slot.ready_for_validate(&factory));
        slot.validate(&mut factory);
        assert_eq!(slot.resource().payload().map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_file_loader_missing_file_fails() {
        let io = IoQueue::shared(MemoryReader::new());
        let mut factory = factory(&io);
        let mut slot = ResourceSlot::<Blob>::new();
        slot.assign(&mut factory, Id::new(0, 0, 1), BlobSetup::new("gone.txt"), None);
        io.lock().pump(1);
        slot.validate(&mut factory);
        assert!(matches!(
            slot.resource().failure(),
            Some(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unassign_cancels_read() {
        let io = IoQueue::shared(MemoryReader::new().with("a.txt", b"a".to_vec()));
        let mut factory = factory(&io);
        let mut slot = ResourceSlot::<Blob>::new();
        slot.assign(&mut factory, Id::new(0, 0, 1), BlobSetup::new("a.txt"), None);
        assert_eq!(io.lock().num_pending(), 1);

        slot.unassign(&mut factory);
        assert_eq!(io.lock().num_pending(), 0);
        assert!(!factory.needs_setup_resource(slot.resource()));
    }

    #[test]
    fn test_unsupported_location_has_no_loader() {
        let io = IoQueue::shared(MemoryReader::new());
        let mut factory = factory(&io);
        let mut slot = ResourceSlot::<Blob>::new();
        slot.assign(&mut factory, Id::new(0, 0, 1), BlobSetup::new("image.png"), None);
        assert!(matches!(slot.resource().failure(), Some(ResourceError::NoLoader { .. })));
    }
}
