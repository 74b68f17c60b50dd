//! Lock acquisition helpers.
//!
//! A poisoned lock means some thread panicked halfway through mutating
//! shared tables, so nothing in memory can be trusted anymore. Every helper
//! here aborts the process in that case instead of handing out the guard.
//!
//! Lock order, outermost first:
//! 1. open-file table bitmap
//! 2. open-file entry
//! 3. inode
//! 4. block pool bitmap, inode bitmap, directory
//! 5. individual block storage
//!
//! Levels 1 and 4 are only ever held for a single bitmap operation and the
//! table lock in level 1 may also be taken briefly while holding an entry
//! lock, since it never waits on anything else while held.

use std::sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cold]
fn poisoned(what: &str) -> ! {
    log::error!("{what} lock poisoned, in-memory state is no longer consistent");
    std::process::abort()
}

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|_| poisoned(what))
}

pub(crate) fn read<'a, T>(rw: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    rw.read().unwrap_or_else(|_| poisoned(what))
}

pub(crate) fn write<'a, T>(rw: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    rw.write().unwrap_or_else(|_| poisoned(what))
}

pub(crate) fn wait<'a, T>(
    cond: &Condvar,
    guard: MutexGuard<'a, T>,
    what: &str,
) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(|_| poisoned(what))
}
