use flatfs::{FileSystem, FsParams};

use crate::shell::start_shell;

mod shell;

/// Reads a table capacity override such as `FLATFS_INODES=128`.
fn env_override(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("ignoring {name}={raw:?}, expected a number");
            default
        }),
        Err(_) => default,
    }
}

fn main() {
    env_logger::init();

    let defaults = FsParams::default();
    let params = FsParams {
        data_blocks: env_override("FLATFS_DATA_BLOCKS", defaults.data_blocks),
        inode_table_size: env_override("FLATFS_INODES", defaults.inode_table_size),
        max_open_files: env_override("FLATFS_OPEN_FILES", defaults.max_open_files),
    };

    let fs = match FileSystem::init(params) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("flatfs: {e}");
            std::process::exit(1);
        }
    };

    start_shell(&fs);
    fs.destroy();
}
