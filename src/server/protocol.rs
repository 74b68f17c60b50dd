//! Fixed-layout request/response frames for driving the file system from
//! another process.
//!
//! A request is one opcode byte followed by fixed-width little-endian
//! fields:
//!
//! ```text
//! MOUNT     | op | client name [40]                         |
//! UNMOUNT   | op | session i32                              |
//! OPEN      | op | session i32 | path [40] | flags i32      |
//! CLOSE     | op | session i32 | handle i32               |
//! WRITE     | op | session i32 | handle i32 | len u64 | data[len] |
//! READ      | op | session i32 | handle i32 | len u64     |
//! SHUTDOWN  | op | session i32                              |
//! ```
//!
//! A response is an `i32` result, followed by the data for reads.

use bincode::Options;
use thiserror::Error;

use crate::disk::BLOCK_SIZE;
use crate::fs::codec;

pub use crate::fs::codec::PathName;

/// Result code reported for any failed request.
pub const FAILURE: i32 = -1;

/// Largest frame a request can take: a write carrying one full block.
pub const MAX_REQUEST_SIZE: usize = 1 + 4 + 4 + 8 + BLOCK_SIZE;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown operation code {0}")]
    UnknownOpCode(u8),
    #[error("write payload of {0} bytes exceeds one block")]
    PayloadTooLarge(usize),
    #[error("response frame shorter than its result code")]
    TruncatedResponse,
    #[error("malformed frame: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Mount = 1,
    Unmount = 2,
    Open = 3,
    Close = 4,
    Write = 5,
    Read = 6,
    ShutdownAfterAllClosed = 7,
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => OpCode::Mount,
            2 => OpCode::Unmount,
            3 => OpCode::Open,
            4 => OpCode::Close,
            5 => OpCode::Write,
            6 => OpCode::Read,
            7 => OpCode::ShutdownAfterAllClosed,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Mount { client: PathName },
    Unmount { session_id: i32 },
    Open { session_id: i32, path: PathName, flags: i32 },
    Close { session_id: i32, handle: i32 },
    Write { session_id: i32, handle: i32, data: Vec<u8> },
    Read { session_id: i32, handle: i32, len: u64 },
    ShutdownAfterAllClosed { session_id: i32 },
}

fn frame_options() -> impl Options {
    codec::options()
        .with_limit(MAX_REQUEST_SIZE as u64)
        .reject_trailing_bytes()
}

impl Request {
    pub fn op_code(&self) -> OpCode {
        match self {
            Request::Mount { .. } => OpCode::Mount,
            Request::Unmount { .. } => OpCode::Unmount,
            Request::Open { .. } => OpCode::Open,
            Request::Close { .. } => OpCode::Close,
            Request::Write { .. } => OpCode::Write,
            Request::Read { .. } => OpCode::Read,
            Request::ShutdownAfterAllClosed { .. } => OpCode::ShutdownAfterAllClosed,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let opts = frame_options();
        let body = match self {
            Request::Mount { client } => opts.serialize(client)?,
            Request::Unmount { session_id } | Request::ShutdownAfterAllClosed { session_id } => {
                opts.serialize(session_id)?
            }
            Request::Open {
                session_id,
                path,
                flags,
            } => opts.serialize(&(session_id, path, flags))?,
            Request::Close { session_id, handle } => opts.serialize(&(session_id, handle))?,
            Request::Write {
                session_id,
                handle,
                data,
            } => {
                if data.len() > BLOCK_SIZE {
                    return Err(ProtocolError::PayloadTooLarge(data.len()));
                }
                opts.serialize(&(session_id, handle, data))?
            }
            Request::Read {
                session_id,
                handle,
                len,
            } => opts.serialize(&(session_id, handle, len))?,
        };

        let mut frame = Vec::with_capacity(1 + body.len());
        frame.push(self.op_code() as u8);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let (&op, body) = frame.split_first().ok_or(ProtocolError::Empty)?;
        let opts = frame_options();
        Ok(match OpCode::try_from(op)? {
            OpCode::Mount => Request::Mount {
                client: opts.deserialize(body)?,
            },
            OpCode::Unmount => Request::Unmount {
                session_id: opts.deserialize(body)?,
            },
            OpCode::Open => {
                let (session_id, path, flags) = opts.deserialize(body)?;
                Request::Open {
                    session_id,
                    path,
                    flags,
                }
            }
            OpCode::Close => {
                let (session_id, handle) = opts.deserialize(body)?;
                Request::Close { session_id, handle }
            }
            OpCode::Write => {
                let (session_id, handle, data): (i32, i32, Vec<u8>) = opts.deserialize(body)?;
                if data.len() > BLOCK_SIZE {
                    return Err(ProtocolError::PayloadTooLarge(data.len()));
                }
                Request::Write {
                    session_id,
                    handle,
                    data,
                }
            }
            OpCode::Read => {
                let (session_id, handle, len) = opts.deserialize(body)?;
                Request::Read {
                    session_id,
                    handle,
                    len,
                }
            }
            OpCode::ShutdownAfterAllClosed => Request::ShutdownAfterAllClosed {
                session_id: opts.deserialize(body)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub result: i32,
    pub data: Vec<u8>,
}

impl Response {
    pub fn ok(result: i32) -> Self {
        Self {
            result,
            data: Vec::new(),
        }
    }

    pub fn failure() -> Self {
        Self::ok(FAILURE)
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            result: data.len() as i32,
            data,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(4 + self.data.len());
        frame.extend_from_slice(&self.result.to_le_bytes());
        frame.extend_from_slice(&self.data);
        frame
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < 4 {
            return Err(ProtocolError::TruncatedResponse);
        }
        let (code, data) = frame.split_at(4);
        let mut raw = [0u8; 4];
        raw.copy_from_slice(code);
        Ok(Self {
            result: i32::from_le_bytes(raw),
            data: data.to_vec(),
        })
    }
}
