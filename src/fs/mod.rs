pub mod addressing;
pub mod bitmap;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode_table;
pub mod open_file;
pub(crate) mod sync;

use std::path::Path;

use bitflags::bitflags;

use crate::{
    disk::{BlockPool, BLOCK_SIZE},
    fs::{
        config::{FsParams, MAX_FILE_SIZE, ROOT_DIR_INUM},
        directory::Directory,
        error::{FsError, Result},
        inode_table::{Inode, InodeKind, InodeTable},
        open_file::OpenFileTable,
    },
};

bitflags! {
    /// How `open` treats the target file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Create the file if it does not exist.
        const CREATE = 0b001;
        /// Discard existing content.
        const TRUNCATE = 0b010;
        /// Start the cursor at the end of the file.
        const APPEND = 0b100;
    }
}

/// Metadata of one file, as reported by `stat` and `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub inumber: usize,
    pub kind: InodeKind,
    pub size: usize,
}

/// Free and total capacity of every fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub free_blocks: usize,
    pub total_blocks: usize,
    pub free_inodes: usize,
    pub total_inodes: usize,
    pub open_files: usize,
    pub max_open_files: usize,
}

/// The whole file system: block pool, inode table, root directory and
/// open file table, all shareable between threads by reference.
#[derive(Debug)]
pub struct FileSystem {
    params: FsParams,
    pool: BlockPool,
    inodes: InodeTable,
    directory: Directory,
    open_files: OpenFileTable,
}

/// Returns the directory entry name for `path`: a non-empty name right
/// after the leading `/`, with no further separators.
fn file_name(path: &str) -> Result<&str> {
    match path.strip_prefix('/') {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        _ => Err(FsError::InvalidPath(path.to_string())),
    }
}

impl FileSystem {
    pub fn init(params: FsParams) -> Result<Self> {
        params.validate()?;
        let fs = Self {
            params,
            pool: BlockPool::new(params.data_blocks),
            inodes: InodeTable::new(params.inode_table_size),
            directory: Directory::new(),
            open_files: OpenFileTable::new(params.max_open_files),
        };

        let root = fs.inodes.create(InodeKind::Directory, &fs.pool)?;
        debug_assert_eq!(root, ROOT_DIR_INUM);
        log::debug!(
            "initialized file system: {} blocks, {} inodes, {} open files",
            params.data_blocks,
            params.inode_table_size,
            params.max_open_files
        );
        Ok(fs)
    }

    pub fn params(&self) -> FsParams {
        self.params
    }

    /// Tears the file system down. Handles still open are simply dropped.
    pub fn destroy(self) {
        let open = self.open_files.open_count();
        if open > 0 {
            log::warn!("destroying file system with {open} open files");
        }
        log::debug!("file system destroyed");
    }

    /// Blocks until every open file has been closed, refusing new opens in
    /// the meantime.
    pub fn destroy_after_all_closed(&self) -> Result<()> {
        log::debug!("shutdown requested, draining open files");
        self.open_files.drain();
        log::debug!("all files closed, file system shut down");
        Ok(())
    }

    /// Inode number behind `path`.
    pub fn lookup(&self, path: &str) -> Result<usize> {
        let name = file_name(path)?;
        let inumber = self
            .directory
            .find(&self.inodes, &self.pool, ROOT_DIR_INUM, name)?;
        // The entry may be racing a delete of its inode.
        if !self.inodes.read(inumber)?.kind.is_live() {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(inumber)
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<usize> {
        let name = file_name(path)?;

        let (inumber, offset) = match self
            .directory
            .find(&self.inodes, &self.pool, ROOT_DIR_INUM, name)
        {
            Ok(inumber) => {
                let mut inode = self.inodes.write(inumber)?;
                // deleted while we were looking it up
                if inode.kind != InodeKind::File {
                    return Err(FsError::NotFound(path.to_string()));
                }
                if flags.contains(OpenFlags::TRUNCATE) && inode.size > 0 {
                    addressing::release_all(&mut inode, &self.pool)?;
                    inode.size = 0;
                    log::debug!("truncated inode {inumber}");
                }
                let offset = if flags.contains(OpenFlags::APPEND) {
                    inode.size
                } else {
                    0
                };
                (inumber, offset)
            }
            Err(FsError::NotFound(_)) if flags.contains(OpenFlags::CREATE) => {
                let inumber = self.inodes.create(InodeKind::File, &self.pool)?;
                if let Err(e) =
                    self.directory
                        .add_entry(&self.inodes, &self.pool, ROOT_DIR_INUM, inumber, name)
                {
                    log::warn!("could not link {path:?} ({e}), rolling back inode {inumber}");
                    if let Err(rollback) = self.delete_inode(inumber) {
                        log::warn!("rollback of inode {inumber} failed: {rollback}");
                    }
                    return Err(e);
                }
                (inumber, 0)
            }
            Err(e) => return Err(e),
        };

        // A file created here stays created even if no handle is left for it.
        self.open_files.add(inumber, offset)
    }

    pub fn close(&self, handle: usize) -> Result<()> {
        self.open_files.remove(handle).map(|_| ())
    }

    /// Writes `data` at the handle's cursor and advances it.
    ///
    /// Writes are clamped to `MAX_FILE_SIZE`. When the block pool runs dry
    /// halfway, whatever fit in the blocks that could be allocated is kept
    /// and reported; an error only comes back if nothing was written.
    pub fn write(&self, handle: usize, data: &[u8]) -> Result<usize> {
        let mut entry = self.open_files.write(handle)?;
        let file = entry.as_mut().ok_or(FsError::InvalidHandle(handle))?;

        let mut inode = self.inodes.write(file.inumber)?;
        if inode.kind != InodeKind::File {
            return Err(FsError::NotFound(format!("inode {}", file.inumber)));
        }

        if data.is_empty() {
            return Ok(0);
        }
        let to_write = data.len().min(MAX_FILE_SIZE.saturating_sub(file.offset));
        if to_write == 0 {
            return Err(FsError::SizeLimitExceeded);
        }

        let written = self.write_at(&mut inode, file.offset, &data[..to_write])?;
        file.offset += written;
        log::trace!(
            "handle {handle}: wrote {written} bytes, inode {} now {} bytes",
            file.inumber,
            inode.size
        );
        Ok(written)
    }

    fn write_at(&self, inode: &mut Inode, offset: usize, data: &[u8]) -> Result<usize> {
        let end = offset + data.len();
        let last_block = (end - 1) / BLOCK_SIZE;

        // Blocks are allocated left to right. A cursor past the end of the
        // file (another handle truncated it) gets the gap filled with fresh,
        // zeroed blocks so no holes appear.
        let mut allocated = inode.blocks_allocated();
        let mut failure = None;
        while allocated <= last_block {
            if let Err(e) = addressing::ensure_allocated(inode, &self.pool, allocated) {
                failure = Some(e);
                break;
            }
            allocated += 1;
        }

        let writable_end = end.min(allocated * BLOCK_SIZE);
        let written = writable_end.saturating_sub(offset);

        let mut pos = offset;
        while pos < writable_end {
            let in_block = pos % BLOCK_SIZE;
            let n = (BLOCK_SIZE - in_block).min(writable_end - pos);
            let block = addressing::resolve(inode, &self.pool, pos / BLOCK_SIZE)?
                .ok_or(FsError::InvalidBlock(crate::disk::UNALLOCATED))?;
            let src = pos - offset;
            self.pool.block_mut(block)?[in_block..in_block + n]
                .copy_from_slice(&data[src..src + n]);
            pos += n;
        }

        if written > 0 {
            inode.size = inode.size.max(offset + written);
        }

        match failure {
            None => Ok(written),
            Some(e) => {
                // Give back whatever this call allocated but could not use.
                addressing::release_from(inode, &self.pool, inode.blocks_allocated())?;
                if written > 0 {
                    log::warn!("short write of {written} of {} bytes: {e}", data.len());
                    Ok(written)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Reads up to `max_len` bytes from the handle's cursor and advances it.
    pub fn read(&self, handle: usize, max_len: usize) -> Result<Vec<u8>> {
        let mut entry = self.open_files.write(handle)?;
        let file = entry.as_mut().ok_or(FsError::InvalidHandle(handle))?;

        let inode = self.inodes.read(file.inumber)?;
        if inode.kind != InodeKind::File {
            return Err(FsError::NotFound(format!("inode {}", file.inumber)));
        }

        let to_read = max_len.min(inode.size.saturating_sub(file.offset));
        let mut buf = vec![0u8; to_read];
        self.read_at(&inode, file.offset, &mut buf)?;
        file.offset += to_read;
        Ok(buf)
    }

    /// `read` into a caller-provided buffer, returning the byte count.
    pub fn read_into(&self, handle: usize, buf: &mut [u8]) -> Result<usize> {
        let data = self.read(handle, buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn read_at(&self, inode: &Inode, offset: usize, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len();
        let mut pos = offset;
        while pos < end {
            let in_block = pos % BLOCK_SIZE;
            let n = (BLOCK_SIZE - in_block).min(end - pos);
            let block = addressing::resolve(inode, &self.pool, pos / BLOCK_SIZE)?
                .ok_or(FsError::InvalidBlock(crate::disk::UNALLOCATED))?;
            let dst = pos - offset;
            buf[dst..dst + n].copy_from_slice(&self.pool.block(block)?[in_block..in_block + n]);
            pos += n;
        }
        Ok(())
    }

    /// Copies the whole file at `source_path` into a host file, creating or
    /// replacing it.
    pub fn copy_to_external(&self, source_path: &str, dest_path: impl AsRef<Path>) -> Result<usize> {
        let handle = self.open(source_path, OpenFlags::empty())?;
        let copied = self
            .read(handle, MAX_FILE_SIZE)
            .and_then(|data| {
                std::fs::write(dest_path.as_ref(), &data)?;
                Ok(data.len())
            });
        self.close(handle)?;
        let copied = copied?;
        log::debug!(
            "exported {copied} bytes from {source_path:?} to {:?}",
            dest_path.as_ref()
        );
        Ok(copied)
    }

    pub fn stat(&self, path: &str) -> Result<FileStat> {
        let name = file_name(path)?;
        let inumber = self.lookup(path)?;
        let inode = self.inodes.read(inumber)?;
        Ok(FileStat {
            name: name.to_string(),
            inumber,
            kind: inode.kind,
            size: inode.size,
        })
    }

    /// Every live file in the root directory, in directory slot order.
    pub fn list(&self) -> Result<Vec<FileStat>> {
        let entries = self
            .directory
            .entries(&self.inodes, &self.pool, ROOT_DIR_INUM)?;
        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let inode = self.inodes.read(entry.inumber)?;
            if inode.kind.is_live() {
                files.push(FileStat {
                    name: entry.name,
                    inumber: entry.inumber,
                    kind: inode.kind,
                    size: inode.size,
                });
            }
        }
        Ok(files)
    }

    pub fn usage(&self) -> Usage {
        Usage {
            free_blocks: self.pool.free_count(),
            total_blocks: self.pool.total(),
            free_inodes: self.inodes.free_count(),
            total_inodes: self.inodes.total(),
            open_files: self.open_files.open_count(),
            max_open_files: self.params.max_open_files,
        }
    }

    /// Deletes an inode and scrubs the directory entries naming it.
    pub(crate) fn delete_inode(&self, inumber: usize) -> Result<()> {
        self.directory
            .clear_entry(&self.inodes, &self.pool, ROOT_DIR_INUM, inumber)?;
        self.inodes.delete(inumber, &self.pool)
    }
}
