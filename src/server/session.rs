use std::sync::Mutex;

use crate::fs::bitmap::Bitmap;
use crate::fs::error::{FsError, Resource, Result};
use crate::fs::sync;

/// A mounted client and the handles it opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub client: String,
    pub handles: Vec<usize>,
}

/// Fixed table of mounted clients indexed by session id.
#[derive(Debug)]
pub struct SessionTable {
    bitmap: Mutex<Bitmap>,
    slots: Box<[Mutex<Option<Session>>]>,
}

impl SessionTable {
    pub fn new(max_sessions: usize) -> Self {
        let slots = (0..max_sessions)
            .map(|_| Mutex::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            bitmap: Mutex::new(Bitmap::new(max_sessions)),
            slots,
        }
    }

    pub fn admit(&self, client: &str) -> Result<usize> {
        let id = sync::lock(&self.bitmap, "session bitmap")
            .alloc()
            .ok_or(FsError::Exhausted(Resource::Sessions))?;
        *sync::lock(&self.slots[id], "session") = Some(Session {
            client: client.to_string(),
            handles: Vec::new(),
        });
        log::info!("session {id} mounted by {client:?}");
        Ok(id)
    }

    /// Removes the session, handing back the handles it still had open.
    pub fn evict(&self, id: usize) -> Result<Session> {
        let session = self
            .slot(id)?
            .take()
            .ok_or(FsError::InvalidHandle(id))?;
        sync::lock(&self.bitmap, "session bitmap").free(id);
        log::info!("session {id} ({:?}) unmounted", session.client);
        Ok(session)
    }

    /// Runs `f` on a mounted session while holding its slot.
    pub fn with_session<T>(&self, id: usize, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let mut slot = self.slot(id)?;
        let session = slot.as_mut().ok_or(FsError::InvalidHandle(id))?;
        Ok(f(session))
    }

    pub fn is_mounted(&self, id: usize) -> bool {
        self.with_session(id, |_| ()).is_ok()
    }

    pub fn mounted_count(&self) -> usize {
        sync::lock(&self.bitmap, "session bitmap").taken_count()
    }

    fn slot(&self, id: usize) -> Result<std::sync::MutexGuard<'_, Option<Session>>> {
        let slot = self.slots.get(id).ok_or(FsError::InvalidHandle(id))?;
        Ok(sync::lock(slot, "session"))
    }
}
