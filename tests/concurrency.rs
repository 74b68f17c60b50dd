use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use flatfs::fs::config::MAX_FILE_SIZE;
use flatfs::{FileSystem, FsError, FsParams, OpenFlags};

const THREADS: usize = 8;
const WRITES_PER_THREAD: usize = 50;

fn record(thread: usize, seq: usize) -> String {
    format!("t{thread:02}-{seq:04};")
}

#[test]
fn concurrent_writes_on_one_handle_never_interleave() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/shared", OpenFlags::CREATE).unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                for seq in 0..WRITES_PER_THREAD {
                    let rec = record(t, seq);
                    assert_eq!(fs.write(fd, rec.as_bytes()).unwrap(), rec.len());
                }
            });
        }
    });

    let rec_len = record(0, 0).len();
    let reader = fs.open("/shared", OpenFlags::empty()).unwrap();
    let data = fs.read(reader, MAX_FILE_SIZE).unwrap();
    assert_eq!(data.len(), THREADS * WRITES_PER_THREAD * rec_len);

    let mut next_seq = [0usize; THREADS];
    for chunk in data.chunks(rec_len) {
        let text = std::str::from_utf8(chunk).unwrap();
        let t: usize = text[1..3].parse().unwrap();
        let seq: usize = text[4..8].parse().unwrap();
        // each thread's records land whole and in its own program order
        assert_eq!(text, record(t, seq));
        assert_eq!(seq, next_seq[t]);
        next_seq[t] += 1;
    }
    assert!(next_seq.iter().all(|&n| n == WRITES_PER_THREAD));
}

#[test]
fn threads_with_their_own_files_do_not_disturb_each_other() {
    let fs = FileSystem::init(FsParams::default()).unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let path = format!("/file{t}");
                let payload = vec![t as u8; 3000 + t * 100];
                let fd = fs.open(&path, OpenFlags::CREATE).unwrap();
                assert_eq!(fs.write(fd, &payload).unwrap(), payload.len());
                fs.close(fd).unwrap();

                let fd = fs.open(&path, OpenFlags::empty()).unwrap();
                assert_eq!(fs.read(fd, MAX_FILE_SIZE).unwrap(), payload);
                fs.close(fd).unwrap();
            });
        }
    });

    assert_eq!(fs.list().unwrap().len(), THREADS);
    assert_eq!(fs.usage().open_files, 0);
}

#[test]
fn racing_readers_and_truncating_writers_stay_consistent() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/churn", OpenFlags::CREATE).unwrap();
    fs.close(fd).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            let fs = &fs;
            s.spawn(move || {
                for _ in 0..25 {
                    let fd = fs.open("/churn", OpenFlags::TRUNCATE).unwrap();
                    fs.write(fd, &[b'w'; 2500]).unwrap();
                    fs.close(fd).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let fs = &fs;
            s.spawn(move || {
                for _ in 0..25 {
                    let fd = fs.open("/churn", OpenFlags::empty()).unwrap();
                    let data = fs.read(fd, MAX_FILE_SIZE).unwrap();
                    // zero-filled gaps may show up, anything else may not
                    assert!(data.iter().all(|&b| b == b'w' || b == 0));
                    fs.close(fd).unwrap();
                }
            });
        }
    });

    let size = fs.stat("/churn").unwrap().size;
    let blocks_used = fs.usage().total_blocks - fs.usage().free_blocks;
    // root directory block plus whatever the file holds
    assert_eq!(blocks_used, 1 + size.div_ceil(1024));
}

#[test]
fn destroy_after_all_closed_waits_for_last_handle() {
    let fs = FileSystem::init(FsParams::default()).unwrap();
    let fd = fs.open("/busy", OpenFlags::CREATE).unwrap();
    let closed = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(50));
            closed.store(true, Ordering::SeqCst);
            fs.close(fd).unwrap();
        });

        fs.destroy_after_all_closed().unwrap();
        assert!(closed.load(Ordering::SeqCst));
    });

    assert!(matches!(
        fs.open("/busy", OpenFlags::empty()),
        Err(FsError::ShuttingDown)
    ));
    fs.destroy();
}
