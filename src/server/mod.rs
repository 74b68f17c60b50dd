//! Request dispatch for clients talking to one shared file system.
//!
//! The transport is left to the embedder: it hands every request frame to
//! [`Server::handle_frame`] and sends the returned bytes back.

pub mod protocol;
pub mod session;

use crate::disk::BLOCK_SIZE;
use crate::fs::config::MAX_SESSIONS;
use crate::fs::error::{FsError, Result};
use crate::fs::{FileSystem, OpenFlags};

use protocol::{Request, Response};
use session::SessionTable;

fn index(raw: i32) -> Result<usize> {
    // negative ids never name a slot
    usize::try_from(raw).map_err(|_| FsError::InvalidHandle(usize::MAX))
}

pub struct Server<'fs> {
    fs: &'fs FileSystem,
    sessions: SessionTable,
}

impl<'fs> Server<'fs> {
    pub fn new(fs: &'fs FileSystem) -> Self {
        Self::with_capacity(fs, MAX_SESSIONS)
    }

    pub fn with_capacity(fs: &'fs FileSystem, max_sessions: usize) -> Self {
        Self {
            fs,
            sessions: SessionTable::new(max_sessions),
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Decodes one request frame, runs it and encodes the response.
    /// Malformed frames get the failure code like any other failed request.
    pub fn handle_frame(&self, frame: &[u8]) -> Vec<u8> {
        match Request::decode(frame) {
            Ok(request) => self.dispatch(request).encode(),
            Err(e) => {
                log::warn!("dropping malformed request: {e}");
                Response::failure().encode()
            }
        }
    }

    pub fn dispatch(&self, request: Request) -> Response {
        let op = request.op_code();
        match self.execute(request) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{op:?} failed: {e}");
                Response::failure()
            }
        }
    }

    fn execute(&self, request: Request) -> Result<Response> {
        match request {
            Request::Mount { client } => {
                let id = self.sessions.admit(&client.as_str())?;
                Ok(Response::ok(id as i32))
            }
            Request::Unmount { session_id } => {
                let session = self.sessions.evict(index(session_id)?)?;
                for handle in session.handles {
                    // the client may have closed it without telling us
                    if let Err(e) = self.fs.close(handle) {
                        log::debug!("unmount: handle {handle} already gone: {e}");
                    }
                }
                Ok(Response::ok(0))
            }
            Request::Open {
                session_id,
                path,
                flags,
            } => {
                let id = self.mounted(session_id)?;
                let flags = OpenFlags::from_bits_truncate(flags as u32);
                let handle = self.fs.open(&path.as_str(), flags)?;
                if let Err(e) = self.sessions.with_session(id, |s| s.handles.push(handle)) {
                    // unmounted while the open was running
                    self.fs.close(handle)?;
                    return Err(e);
                }
                Ok(Response::ok(handle as i32))
            }
            Request::Close { session_id, handle } => {
                let id = self.mounted(session_id)?;
                let handle = index(handle)?;
                // Only the session that opened a handle may close it.
                let owned = self.sessions.with_session(id, |s| {
                    match s.handles.iter().position(|&h| h == handle) {
                        Some(pos) => {
                            s.handles.swap_remove(pos);
                            true
                        }
                        None => false,
                    }
                })?;
                if !owned {
                    return Err(FsError::InvalidHandle(handle));
                }
                self.fs.close(handle)?;
                Ok(Response::ok(0))
            }
            Request::Write {
                session_id,
                handle,
                data,
            } => {
                self.mounted(session_id)?;
                let written = self.fs.write(index(handle)?, &data)?;
                Ok(Response::ok(written as i32))
            }
            Request::Read {
                session_id,
                handle,
                len,
            } => {
                self.mounted(session_id)?;
                // one block per response
                let len = usize::try_from(len).unwrap_or(usize::MAX).min(BLOCK_SIZE);
                let data = self.fs.read(index(handle)?, len)?;
                Ok(Response::with_data(data))
            }
            Request::ShutdownAfterAllClosed { session_id } => {
                // The caller's own handles count too: it must close them first.
                self.mounted(session_id)?;
                self.fs.destroy_after_all_closed()?;
                Ok(Response::ok(0))
            }
        }
    }

    fn mounted(&self, session_id: i32) -> Result<usize> {
        let id = index(session_id)?;
        if !self.sessions.is_mounted(id) {
            return Err(FsError::InvalidHandle(id));
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::protocol::{PathName, FAILURE};
    use super::*;
    use crate::fs::config::FsParams;

    fn open(server: &Server, session_id: i32, path: &str, flags: OpenFlags) -> i32 {
        server
            .dispatch(Request::Open {
                session_id,
                path: PathName::new(path).unwrap(),
                flags: flags.bits() as i32,
            })
            .result
    }

    #[test]
    fn requests_need_a_mounted_session() {
        let fs = FileSystem::init(FsParams::default()).unwrap();
        let server = Server::new(&fs);

        assert_eq!(open(&server, 0, "/f", OpenFlags::CREATE), FAILURE);
        assert_eq!(open(&server, -3, "/f", OpenFlags::CREATE), FAILURE);

        let mount = server.dispatch(Request::Mount {
            client: PathName::new("/tmp/client").unwrap(),
        });
        assert_eq!(mount.result, 0);
        assert!(open(&server, 0, "/f", OpenFlags::CREATE) >= 0);
    }

    #[test]
    fn unmount_closes_leftover_handles() {
        let fs = FileSystem::init(FsParams::default()).unwrap();
        let server = Server::new(&fs);
        let id = server
            .dispatch(Request::Mount {
                client: PathName::new("c").unwrap(),
            })
            .result;

        let h1 = open(&server, id, "/a", OpenFlags::CREATE);
        let h2 = open(&server, id, "/b", OpenFlags::CREATE);
        assert!(h1 >= 0 && h2 >= 0);
        let closed = server.dispatch(Request::Close {
            session_id: id,
            handle: h1,
        });
        assert_eq!(closed.result, 0);
        assert_eq!(fs.usage().open_files, 1);

        let unmount = server.dispatch(Request::Unmount { session_id: id });
        assert_eq!(unmount.result, 0);
        assert_eq!(fs.usage().open_files, 0);
        assert_eq!(server.sessions().mounted_count(), 0);
    }

    #[test]
    fn frames_round_trip_through_the_dispatcher() {
        let fs = FileSystem::init(FsParams::default()).unwrap();
        let server = Server::new(&fs);
        let call = |request: Request| {
            let frame = server.handle_frame(&request.encode().unwrap());
            Response::decode(&frame).unwrap()
        };

        let id = call(Request::Mount {
            client: PathName::new("pipe").unwrap(),
        })
        .result;
        let handle = call(Request::Open {
            session_id: id,
            path: PathName::new("/hello").unwrap(),
            flags: OpenFlags::CREATE.bits() as i32,
        })
        .result;
        let written = call(Request::Write {
            session_id: id,
            handle,
            data: b"hi there".to_vec(),
        });
        assert_eq!(written.result, 8);

        let reader = call(Request::Open {
            session_id: id,
            path: PathName::new("/hello").unwrap(),
            flags: 0,
        })
        .result;
        let read = call(Request::Read {
            session_id: id,
            handle: reader,
            len: 100,
        });
        assert_eq!(read.result, 8);
        assert_eq!(read.data, b"hi there");

        let garbage = Response::decode(&server.handle_frame(&[99])).unwrap();
        assert_eq!(garbage.result, FAILURE);
    }
}
