//! Faces and the face table.
//!
//! A face is anything that can put bytes on a link. The forwarder never
//! waits on a face: `send` is fire-and-forget. Face 0 is reserved for the
//! local application API and has no [`Face`] object behind it.

use log::{debug, info};
use rust_tinyndn_common::{Error, FaceId, FaceType, Name, Result};

/// Face id of the local application.
pub const APP_FACE: FaceId = FaceId(0);

/// An outgoing link.
pub trait Face {
    /// Emit one encoded packet.
    fn send(&mut self, packet: &[u8]) -> Result<()>;

    fn face_type(&self) -> FaceType {
        FaceType::NetDevice
    }

    /// An Interest that arrived on this face expired without Data.
    fn on_timeout(&mut self, _name: &Name) {}
}

enum FaceSlot {
    Free,
    App,
    Remote(Box<dyn Face>),
}

/// Bounded table of faces indexed by [`FaceId`].
pub struct FaceTable {
    slots: Vec<FaceSlot>,
}

impl std::fmt::Debug for FaceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceTable")
            .field("capacity", &self.slots.len())
            .field("faces", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

impl FaceTable {
    /// Create a table with `capacity` slots, the first taken by the app face.
    pub fn new(capacity: usize) -> Self {
        let mut slots: Vec<FaceSlot> = (0..capacity.max(1)).map(|_| FaceSlot::Free).collect();
        slots[0] = FaceSlot::App;
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of registered faces, app face included.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s, FaceSlot::Free))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a face, returning its id.
    pub fn add(&mut self, face: Box<dyn Face>) -> Result<FaceId> {
        let slot = self
            .slots
            .iter()
            .position(|s| matches!(s, FaceSlot::Free))
            .ok_or(Error::FaceTableFull)?;
        let id = FaceId(slot as u16);
        info!("[FaceTable] added {} ({:?})", id, face.face_type());
        self.slots[slot] = FaceSlot::Remote(face);
        Ok(id)
    }

    /// Unregister a face and hand it back.
    pub fn remove(&mut self, id: FaceId) -> Result<Box<dyn Face>> {
        let slot = self
            .slots
            .get_mut(usize::from(id.0))
            .ok_or(Error::UnknownFace(id.0))?;
        if !matches!(slot, FaceSlot::Remote(_)) {
            return Err(Error::UnknownFace(id.0));
        }
        match std::mem::replace(slot, FaceSlot::Free) {
            FaceSlot::Remote(face) => {
                debug!("[FaceTable] removed {}", id);
                Ok(face)
            }
            other => {
                *slot = other;
                Err(Error::UnknownFace(id.0))
            }
        }
    }

    pub fn contains(&self, id: FaceId) -> bool {
        matches!(
            self.slots.get(usize::from(id.0)),
            Some(FaceSlot::App) | Some(FaceSlot::Remote(_))
        )
    }

    pub fn is_app(&self, id: FaceId) -> bool {
        matches!(self.slots.get(usize::from(id.0)), Some(FaceSlot::App))
    }

    pub fn face_type(&self, id: FaceId) -> Option<FaceType> {
        match self.slots.get(usize::from(id.0))? {
            FaceSlot::App => Some(FaceType::App),
            FaceSlot::Remote(face) => Some(face.face_type()),
            FaceSlot::Free => None,
        }
    }

    /// The link behind a non-app face.
    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut (dyn Face + 'static)> {
        match self.slots.get_mut(usize::from(id.0))? {
            FaceSlot::Remote(face) => Some(face.as_mut()),
            _ => None,
        }
    }

    /// Send on a non-app face.
    pub fn send(&mut self, id: FaceId, packet: &[u8]) -> Result<()> {
        self.get_mut(id)
            .ok_or(Error::UnknownFace(id.0))?
            .send(packet)
    }

    /// Ids of all registered faces, app face first.
    pub fn ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !matches!(s, FaceSlot::Free))
            .map(|(i, _)| FaceId(i as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Sink(Rc<RefCell<Vec<Vec<u8>>>>);

    impl Face for Sink {
        fn send(&mut self, packet: &[u8]) -> Result<()> {
            self.0.borrow_mut().push(packet.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_app_face_is_reserved() {
        let table = FaceTable::new(4);
        assert!(table.is_app(APP_FACE));
        assert_eq!(table.face_type(APP_FACE), Some(FaceType::App));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_add_send_remove() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut table = FaceTable::new(2);
        let id = table.add(Box::new(Sink(sent.clone()))).unwrap();
        assert_eq!(id, FaceId(1));
        assert!(matches!(
            table.add(Box::new(Sink(sent.clone()))),
            Err(Error::FaceTableFull)
        ));

        table.send(id, b"abc").unwrap();
        assert_eq!(sent.borrow().len(), 1);

        assert!(table.remove(id).is_ok());
        assert!(!table.contains(id));
        assert!(matches!(table.send(id, b"x"), Err(Error::UnknownFace(1))));
        assert!(matches!(table.remove(APP_FACE), Err(Error::UnknownFace(0))));
    }
}
