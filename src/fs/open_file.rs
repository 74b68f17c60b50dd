use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::fs::bitmap::Bitmap;
use crate::fs::error::{FsError, Result};
use crate::fs::sync;

/// An open file: which inode it refers to and where its cursor sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub inumber: usize,
    pub offset: usize,
}

#[derive(Debug)]
struct TableState {
    bitmap: Bitmap,
    /// Set once shutdown starts waiting for the last close.
    draining: bool,
}

/// Fixed table of open files indexed by handle.
///
/// The bitmap mutex only covers slot allocation. Each entry has its own
/// reader/writer lock guarding the cursor; an entry holding `None` is a
/// free slot (or one being closed right now).
#[derive(Debug)]
pub struct OpenFileTable {
    state: Mutex<TableState>,
    all_closed: Condvar,
    entries: Box<[RwLock<Option<OpenFile>>]>,
}

impl OpenFileTable {
    pub fn new(max_open_files: usize) -> Self {
        let entries = (0..max_open_files)
            .map(|_| RwLock::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            state: Mutex::new(TableState {
                bitmap: Bitmap::new(max_open_files),
                draining: false,
            }),
            all_closed: Condvar::new(),
            entries,
        }
    }

    /// Stores a new open file in the lowest free slot and returns its handle.
    pub fn add(&self, inumber: usize, offset: usize) -> Result<usize> {
        let handle = {
            let mut state = sync::lock(&self.state, "open file table");
            if state.draining {
                return Err(FsError::ShuttingDown);
            }
            state.bitmap.alloc().ok_or(FsError::TooManyOpenFiles)?
        };
        *sync::write(&self.entries[handle], "open file") = Some(OpenFile { inumber, offset });
        log::debug!("handle {handle} -> inode {inumber} at offset {offset}");
        Ok(handle)
    }

    /// Frees `handle`. Waits for any read or write in flight on it.
    pub fn remove(&self, handle: usize) -> Result<OpenFile> {
        let slot = self
            .entries
            .get(handle)
            .ok_or(FsError::InvalidHandle(handle))?;
        let mut entry = sync::write(slot, "open file");
        let file = entry.take().ok_or(FsError::InvalidHandle(handle))?;

        let mut state = sync::lock(&self.state, "open file table");
        state.bitmap.free(handle);
        if state.bitmap.taken_count() == 0 {
            self.all_closed.notify_all();
        }
        log::debug!("closed handle {handle}");
        Ok(file)
    }

    pub fn read(&self, handle: usize) -> Result<RwLockReadGuard<'_, Option<OpenFile>>> {
        let slot = self
            .entries
            .get(handle)
            .ok_or(FsError::InvalidHandle(handle))?;
        Ok(sync::read(slot, "open file"))
    }

    pub fn write(&self, handle: usize) -> Result<RwLockWriteGuard<'_, Option<OpenFile>>> {
        let slot = self
            .entries
            .get(handle)
            .ok_or(FsError::InvalidHandle(handle))?;
        Ok(sync::write(slot, "open file"))
    }

    pub fn open_count(&self) -> usize {
        sync::lock(&self.state, "open file table").bitmap.taken_count()
    }

    /// Refuses new opens from now on and blocks until every handle is closed.
    pub fn drain(&self) {
        let mut state = sync::lock(&self.state, "open file table");
        state.draining = true;
        while state.bitmap.taken_count() > 0 {
            log::debug!("waiting for {} open files", state.bitmap.taken_count());
            state = sync::wait(&self.all_closed, state, "open file table");
        }
    }
}
