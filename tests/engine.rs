use flatfs::disk::BLOCK_SIZE;
use flatfs::fs::config::MAX_FILE_SIZE;
use flatfs::fs::error::Resource;
use flatfs::fs::inode_table::InodeKind;
use flatfs::{FileSystem, FsError, FsParams, OpenFlags};

fn fs_with(data_blocks: usize, inode_table_size: usize, max_open_files: usize) -> FileSystem {
    FileSystem::init(FsParams {
        data_blocks,
        inode_table_size,
        max_open_files,
    })
    .unwrap()
}

fn read_all(fs: &FileSystem, path: &str) -> Vec<u8> {
    let fd = fs.open(path, OpenFlags::empty()).unwrap();
    let data = fs.read(fd, MAX_FILE_SIZE).unwrap();
    fs.close(fd).unwrap();
    data
}

#[test]
fn write_then_read_back() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/f1", OpenFlags::CREATE).unwrap();
    assert_eq!(fs.write(fd, b"AAA!").unwrap(), 4);
    fs.close(fd).unwrap();

    let fd = fs.open("/f1", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(fs.read_into(fd, &mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], b"AAA!");
    // cursor sits at the end now
    assert_eq!(fs.read_into(fd, &mut buf).unwrap(), 0);
}

#[test]
fn open_missing_file_without_create_fails() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    assert!(matches!(
        fs.open("/nope", OpenFlags::empty()),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(fs.lookup("/nope"), Err(FsError::NotFound(_))));
    assert_eq!(fs.usage().free_inodes, FsParams::default().inode_table_size - 1);
}

#[test]
fn truncate_discards_content() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/t", OpenFlags::CREATE).unwrap();
    fs.write(fd, &vec![1u8; 3 * BLOCK_SIZE]).unwrap();
    fs.close(fd).unwrap();
    let free = fs.usage().free_blocks;

    let fd = fs.open("/t", OpenFlags::TRUNCATE).unwrap();
    assert_eq!(fs.stat("/t").unwrap().size, 0);
    assert_eq!(fs.usage().free_blocks, free + 3);
    assert!(fs.read(fd, 100).unwrap().is_empty());
}

#[test]
fn append_starts_at_the_end() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/log", OpenFlags::CREATE).unwrap();
    fs.write(fd, b"first;").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("/log", OpenFlags::APPEND).unwrap();
    fs.write(fd, b"second;").unwrap();
    fs.close(fd).unwrap();

    assert_eq!(read_all(&fs, "/log"), b"first;second;");
}

#[test]
fn writes_stop_at_the_maximum_file_size() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/big", OpenFlags::CREATE).unwrap();

    let data: Vec<u8> = (0..MAX_FILE_SIZE + 77).map(|i| (i % 251) as u8).collect();
    assert_eq!(fs.write(fd, &data).unwrap(), MAX_FILE_SIZE);
    assert!(matches!(fs.write(fd, b"x"), Err(FsError::SizeLimitExceeded)));

    let stat = fs.stat("/big").unwrap();
    assert_eq!(stat.size, MAX_FILE_SIZE);
    assert_eq!(stat.kind, InodeKind::File);
    assert_eq!(read_all(&fs, "/big"), &data[..MAX_FILE_SIZE]);
}

#[test]
fn data_crossing_into_the_indirect_block_reads_back() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/mid", OpenFlags::CREATE).unwrap();

    // odd-sized writes so copies straddle block boundaries
    let mut expected = Vec::new();
    for round in 0..40u8 {
        let chunk = vec![round; 333];
        assert_eq!(fs.write(fd, &chunk).unwrap(), chunk.len());
        expected.extend_from_slice(&chunk);
    }
    assert!(expected.len() > 10 * BLOCK_SIZE);
    assert_eq!(read_all(&fs, "/mid"), expected);
}

#[test]
fn handles_keep_independent_cursors() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/shared", OpenFlags::CREATE).unwrap();
    fs.write(fd, b"0123456789").unwrap();

    let a = fs.open("/shared", OpenFlags::empty()).unwrap();
    let b = fs.open("/shared", OpenFlags::empty()).unwrap();
    assert_ne!(a, b);

    assert_eq!(fs.read(a, 4).unwrap(), b"0123");
    assert_eq!(fs.read(b, 2).unwrap(), b"01");
    assert_eq!(fs.read(a, 4).unwrap(), b"4567");

    fs.close(a).unwrap();
    assert!(matches!(fs.read(a, 1), Err(FsError::InvalidHandle(_))));
    assert_eq!(fs.read(b, 3).unwrap(), b"234");
}

#[test]
fn reading_after_another_handle_truncated_returns_nothing() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/r", OpenFlags::CREATE).unwrap();
    fs.write(fd, b"some bytes").unwrap();

    let reader = fs.open("/r", OpenFlags::empty()).unwrap();
    fs.read(reader, 4).unwrap();
    fs.open("/r", OpenFlags::TRUNCATE).unwrap();

    assert!(fs.read(reader, 100).unwrap().is_empty());
}

#[test]
fn inode_table_runs_out_of_inodes() {
    // root plus three files
    let fs = fs_with(64, 4, 8);
    for name in ["/a", "/b", "/c"] {
        fs.open(name, OpenFlags::CREATE).unwrap();
    }
    assert!(matches!(
        fs.open("/d", OpenFlags::CREATE),
        Err(FsError::Exhausted(Resource::Inodes))
    ));
    assert_eq!(fs.list().unwrap().len(), 3);
}

#[test]
fn open_file_table_exhaustion_and_reuse() {
    let fs = fs_with(64, 8, 3);
    let handles: Vec<usize> = (0..3)
        .map(|_| fs.open("/x", OpenFlags::CREATE).unwrap())
        .collect();
    assert_eq!(handles, vec![0, 1, 2]);
    assert!(matches!(
        fs.open("/x", OpenFlags::empty()),
        Err(FsError::TooManyOpenFiles)
    ));

    fs.close(1).unwrap();
    assert_eq!(fs.open("/x", OpenFlags::empty()).unwrap(), 1);
    assert!(matches!(fs.close(1000), Err(FsError::InvalidHandle(1000))));
}

#[test]
fn list_and_stat_report_live_files() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    for (name, len) in [("/one", 1usize), ("/two", 2000)] {
        let fd = fs.open(name, OpenFlags::CREATE).unwrap();
        fs.write(fd, &vec![b'z'; len]).unwrap();
        fs.close(fd).unwrap();
    }

    let listed = fs.list().unwrap();
    let names: Vec<&str> = listed.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two"]);
    assert_eq!(listed[1].size, 2000);

    let stat = fs.stat("/one").unwrap();
    assert_eq!(stat.inumber, fs.lookup("/one").unwrap());
    assert_eq!(stat.size, 1);
}

#[test]
fn invalid_params_are_rejected() {
    for params in [
        FsParams {
            data_blocks: 0,
            ..FsParams::default()
        },
        FsParams {
            inode_table_size: 0,
            ..FsParams::default()
        },
        FsParams {
            max_open_files: 0,
            ..FsParams::default()
        },
    ] {
        assert!(matches!(
            FileSystem::init(params),
            Err(FsError::InvalidParams(_))
        ));
    }
}

#[test]
fn copy_to_external_writes_host_file() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/export", OpenFlags::CREATE).unwrap();
    let content: Vec<u8> = (0..5000u32).map(|i| (i % 97) as u8).collect();
    fs.write(fd, &content).unwrap();
    fs.close(fd).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.bin");
    std::fs::write(&dest, b"stale contents that are longer than nothing").unwrap();

    assert_eq!(fs.copy_to_external("/export", &dest).unwrap(), content.len());
    assert_eq!(std::fs::read(&dest).unwrap(), content);
    assert_eq!(fs.usage().open_files, 0);
}

#[test]
fn copy_to_external_reports_missing_source_and_bad_destination() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        fs.copy_to_external("/missing", dir.path().join("x")),
        Err(FsError::NotFound(_))
    ));

    fs.open("/src", OpenFlags::CREATE).unwrap();
    let open_before = fs.usage().open_files;
    assert!(matches!(
        fs.copy_to_external("/src", dir.path().join("no/such/dir/file")),
        Err(FsError::Io(_))
    ));
    assert_eq!(fs.usage().open_files, open_before);
}
