//! Local application state: registered prefixes and expressed Interests.

use bytes::Bytes;
use log::debug;
use rust_tinyndn_common::{Data, Error, Interest, Name, RemoveStatus, Result};

/// Called with an Interest (decoded and raw) under a registered prefix.
///
/// Returning encoded Data answers it on the spot; returning `None` leaves
/// the Interest pending until the application calls `put_data`.
pub type InterestHandler = Box<dyn FnMut(&Interest, &[u8]) -> Option<Bytes>>;

/// Called with the Data (decoded and raw) answering an expressed Interest.
pub type DataHandler = Box<dyn FnMut(&Data, &[u8])>;

/// Called with the Interest name when an expressed Interest expires.
pub type TimeoutHandler = Box<dyn FnMut(&Name)>;

struct LocalPrefix {
    prefix: Name,
    handler: InterestHandler,
}

/// Prefixes the local application listens on.
pub struct LocalPrefixes {
    entries: Vec<LocalPrefix>,
    capacity: usize,
}

impl std::fmt::Debug for LocalPrefixes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.prefix))
            .finish()
    }
}

impl LocalPrefixes {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register `handler` for `prefix`, replacing an earlier handler for it.
    pub fn register(&mut self, prefix: Name, handler: InterestHandler) -> Result<()> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.prefix == prefix) {
            entry.handler = handler;
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::LocalPrefixTableFull);
        }
        debug!("[App] registered {}", prefix);
        self.entries.push(LocalPrefix { prefix, handler });
        Ok(())
    }

    pub fn unregister(&mut self, prefix: &Name) -> RemoveStatus {
        let before = self.entries.len();
        self.entries.retain(|e| &e.prefix != prefix);
        if self.entries.len() == before {
            RemoveStatus::NoEffect
        } else {
            debug!("[App] unregistered {}", prefix);
            RemoveStatus::Removed
        }
    }

    pub fn contains(&self, prefix: &Name) -> bool {
        self.entries.iter().any(|e| &e.prefix == prefix)
    }

    /// Handler of the longest registered prefix of `name`.
    pub fn lookup_mut(&mut self, name: &Name) -> Option<&mut InterestHandler> {
        self.entries
            .iter_mut()
            .filter(|e| e.prefix.is_prefix_of(name))
            .max_by_key(|e| e.prefix.len())
            .map(|e| &mut e.handler)
    }
}

/// Handle of an expressed Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

pub struct PendingRequest {
    id: RequestId,
    name: Name,
    can_be_prefix: bool,
    pub on_data: DataHandler,
    pub on_timeout: TimeoutHandler,
}

impl PendingRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    fn is_satisfied_by(&self, data_name: &Name) -> bool {
        if self.can_be_prefix {
            self.name.is_prefix_of(data_name)
        } else {
            &self.name == data_name
        }
    }
}

/// Interests the local application is waiting on.
#[derive(Default)]
pub struct PendingRequests {
    requests: Vec<PendingRequest>,
    next_id: u64,
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.requests.iter().map(|r| (r.id, &r.name)))
            .finish()
    }
}

impl PendingRequests {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn insert(
        &mut self,
        interest: &Interest,
        on_data: DataHandler,
        on_timeout: TimeoutHandler,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.requests.push(PendingRequest {
            id,
            name: interest.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            on_data,
            on_timeout,
        });
        id
    }

    pub fn remove(&mut self, id: RequestId) -> Option<PendingRequest> {
        let index = self.requests.iter().position(|r| r.id == id)?;
        Some(self.requests.remove(index))
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.iter().any(|r| r.id == id)
    }

    /// Take every request answered by Data named `data_name`, oldest first.
    pub fn take_satisfied(&mut self, data_name: &Name) -> Vec<PendingRequest> {
        self.take_where(|r| r.is_satisfied_by(data_name))
    }

    /// Take every request for exactly `name` with the given CanBePrefix,
    /// oldest first.
    pub fn take_named(&mut self, name: &Name, can_be_prefix: bool) -> Vec<PendingRequest> {
        self.take_where(|r| &r.name == name && r.can_be_prefix == can_be_prefix)
    }

    fn take_where(&mut self, mut pred: impl FnMut(&PendingRequest) -> bool) -> Vec<PendingRequest> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.requests.len() {
            if pred(&self.requests[i]) {
                taken.push(self.requests.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn handler(tag: &'static str) -> InterestHandler {
        Box::new(move |_, _| Some(Bytes::from_static(tag.as_bytes())))
    }

    #[test]
    fn test_longest_registration_wins() {
        let mut prefixes = LocalPrefixes::new(4);
        prefixes.register(name("/a"), handler("short")).unwrap();
        prefixes.register(name("/a/b"), handler("long")).unwrap();

        let interest = Interest::new(name("/a/b/c"));
        let handler = prefixes.lookup_mut(&interest.name).unwrap();
        assert_eq!(handler(&interest, &[]).unwrap(), Bytes::from_static(b"long"));

        let interest = Interest::new(name("/a/x"));
        let handler = prefixes.lookup_mut(&interest.name).unwrap();
        assert_eq!(handler(&interest, &[]).unwrap(), Bytes::from_static(b"short"));

        assert!(prefixes.lookup_mut(&name("/b")).is_none());
    }

    #[test]
    fn test_register_limit_and_unregister() {
        let mut prefixes = LocalPrefixes::new(1);
        prefixes.register(name("/a"), handler("a")).unwrap();
        prefixes.register(name("/a"), handler("again")).unwrap();
        assert!(matches!(
            prefixes.register(name("/b"), handler("b")),
            Err(Error::LocalPrefixTableFull)
        ));
        assert_eq!(prefixes.unregister(&name("/b")), RemoveStatus::NoEffect);
        assert_eq!(prefixes.unregister(&name("/a")), RemoveStatus::Removed);
        assert!(prefixes.is_empty());
    }

    #[test]
    fn test_requests_taken_by_data_name() {
        let mut requests = PendingRequests::default();
        let exact = Interest::new(name("/a/b"));
        let prefix = Interest::new(name("/a")).with_can_be_prefix(true);
        let other = Interest::new(name("/a"));
        requests.insert(&exact, Box::new(|_, _| {}), Box::new(|_| {}));
        requests.insert(&prefix, Box::new(|_, _| {}), Box::new(|_| {}));
        let kept = requests.insert(&other, Box::new(|_, _| {}), Box::new(|_| {}));

        let taken = requests.take_satisfied(&name("/a/b"));
        assert_eq!(taken.len(), 2);
        assert_eq!(requests.len(), 1);
        assert!(requests.contains(kept));

        assert!(requests.take_named(&name("/a"), true).is_empty());
        assert_eq!(requests.take_named(&name("/a"), false).len(), 1);
        assert!(requests.is_empty());
    }
}
