//! Mount-and-verify state machine against an in-memory fake volume.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

use sdmount_core::{
    DirEntry, DirStream, Error, FileHandle, MountDescriptor, MountSequencer, MountState,
    OpenMode, Severity, ShortWritePolicy, SmokeConfig, Volume, VolumePath,
};

#[derive(Default)]
struct FakeVolume {
    /// Mount calls that fail before one succeeds.
    mount_failures: u32,
    mount_calls: u32,
    mounted: bool,
    fail_open_dir: bool,
    fail_create: bool,
    fail_open_read: bool,
    /// Bytes a file takes before it stops accepting data.
    write_limit: Option<usize>,
    /// Bytes accepted per write call.
    write_chunk: Option<usize>,
    dirs: Vec<String>,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    unlink_calls: RefCell<Vec<String>>,
}

impl FakeVolume {
    fn with_file(self, name: &str, content: &[u8]) -> Self {
        self.files
            .borrow_mut()
            .insert(name.to_string(), content.to_vec());
        self
    }

    fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    fn check(&self) -> io::Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "not mounted"))
        }
    }
}

struct FakeDir {
    entries: std::vec::IntoIter<DirEntry>,
}

impl DirStream for FakeDir {
    fn read_next(&mut self) -> io::Result<DirEntry> {
        Ok(self.entries.next().unwrap_or_else(DirEntry::end))
    }
}

/// Write handle that commits to the volume when dropped.
struct FakeWriter<'a> {
    files: &'a RefCell<BTreeMap<String, Vec<u8>>>,
    name: String,
    buf: Vec<u8>,
    limit: Option<usize>,
    chunk: Option<usize>,
}

impl Write for FakeWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self
            .limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.buf.len()));
        let n = room
            .min(self.chunk.unwrap_or(usize::MAX))
            .min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeWriter<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "write-only"))
    }
}

impl Drop for FakeWriter<'_> {
    fn drop(&mut self) {
        self.files
            .borrow_mut()
            .insert(self.name.clone(), std::mem::take(&mut self.buf));
    }
}

impl Volume for FakeVolume {
    fn mount(&mut self, _descriptor: &MountDescriptor) -> io::Result<()> {
        self.mount_calls += 1;
        if self.mount_failures > 0 {
            self.mount_failures -= 1;
            return Err(io::Error::other("no FAT signature"));
        }
        self.mounted = true;
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn open_dir<'a>(&'a self, _path: &VolumePath) -> io::Result<Box<dyn DirStream + 'a>> {
        self.check()?;
        if self.fail_open_dir {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no dir"));
        }
        let mut entries: Vec<DirEntry> = self.dirs.iter().map(DirEntry::directory).collect();
        entries.extend(
            self.files
                .borrow()
                .iter()
                .map(|(name, data)| DirEntry::file(name.clone(), data.len() as u64)),
        );
        Ok(Box::new(FakeDir {
            entries: entries.into_iter(),
        }))
    }

    fn open<'a>(
        &'a self,
        path: &VolumePath,
        mode: OpenMode,
    ) -> io::Result<Box<dyn FileHandle + 'a>> {
        self.check()?;
        let name = path.relative();
        match mode {
            OpenMode::Read => {
                if self.fail_open_read {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
                }
                let data = self
                    .file(&name)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no file"))?;
                Ok(Box::new(Cursor::new(data)))
            }
            OpenMode::CreateWrite => {
                if self.fail_create {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
                }
                Ok(Box::new(FakeWriter {
                    files: &self.files,
                    name,
                    buf: Vec::new(),
                    limit: self.write_limit,
                    chunk: self.write_chunk,
                }))
            }
        }
    }

    fn unlink(&self, path: &VolumePath) -> io::Result<()> {
        self.check()?;
        self.unlink_calls.borrow_mut().push(path.relative());
        self.files
            .borrow_mut()
            .remove(&path.relative())
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no file"))
    }
}

fn sequencer(volume: FakeVolume, config: SmokeConfig) -> MountSequencer<FakeVolume> {
    let descriptor = config.descriptor();
    MountSequencer::new(volume, descriptor, config)
}

#[test]
fn full_sequence_on_empty_volume() {
    let mut seq = sequencer(FakeVolume::default(), SmokeConfig::default());
    let report = seq.mount_and_verify().unwrap();

    assert_eq!(report.state, MountState::ReadVerified);
    assert_eq!(report.mount_attempts, 1);
    assert_eq!(report.entries, Some(vec![]));
    assert_eq!(report.bytes_written, 13);
    assert_eq!(report.lines, Some(vec!["hello world!".to_string()]));
    assert_eq!(
        seq.volume().file("test_data.txt"),
        Some(b"hello world!\n".to_vec())
    );
}

#[test]
fn mount_retry_succeeds() {
    let volume = FakeVolume {
        mount_failures: 1,
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    seq.mount().unwrap();
    assert_eq!(seq.state(), MountState::Mounted);
    assert_eq!(seq.mount_attempts(), 2);
    assert_eq!(seq.volume().mount_calls, 2);
}

#[test]
fn listing_runs_after_retried_mount() {
    let volume = FakeVolume {
        mount_failures: 1,
        dirs: vec!["LOGS".to_string()],
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let report = seq.mount_and_verify().unwrap();
    assert_eq!(report.mount_attempts, 2);
    assert_eq!(report.entries, Some(vec![DirEntry::directory("LOGS")]));
}

#[test]
fn mount_fails_twice_and_stops() {
    let volume = FakeVolume {
        mount_failures: 5,
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let err = seq.mount_and_verify().unwrap_err();

    assert!(matches!(err, Error::Mount { attempts: 2, .. }));
    assert_eq!(err.severity(), Severity::Fatal);
    assert_eq!(err.exit_code(), -1);
    assert_eq!(seq.state(), MountState::MountFailed);
    assert_eq!(seq.volume().mount_calls, 2);
    assert!(seq.volume().unlink_calls.borrow().is_empty());
}

#[test]
fn listing_failure_is_not_fatal() {
    let volume = FakeVolume {
        fail_open_dir: true,
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let report = seq.mount_and_verify().unwrap();
    assert_eq!(report.entries, None);
    assert_eq!(report.state, MountState::ReadVerified);
}

#[test]
fn listing_classifies_entries() {
    let volume = FakeVolume {
        dirs: vec!["A".to_string(), "B".to_string()],
        ..FakeVolume::default()
    }
    .with_file("notes.txt", b"12345");
    let config = SmokeConfig {
        read_test: false,
        ..SmokeConfig::default()
    };
    let mut seq = sequencer(volume, config);
    let report = seq.mount_and_verify().unwrap();
    assert_eq!(
        report.entries,
        Some(vec![
            DirEntry::directory("A"),
            DirEntry::directory("B"),
            DirEntry::file("notes.txt", 5),
        ])
    );
}

#[test]
fn write_test_replaces_existing_file() {
    let volume = FakeVolume::default().with_file("test_data.txt", b"stale content that is longer\n");
    let mut seq = sequencer(volume, SmokeConfig::default());
    let report = seq.mount_and_verify().unwrap();

    assert_eq!(report.lines, Some(vec!["hello world!".to_string()]));
    assert_eq!(
        seq.volume().unlink_calls.borrow().as_slice(),
        &["test_data.txt".to_string()]
    );
}

#[test]
fn read_test_disabled_stops_at_write_verified() {
    let config = SmokeConfig {
        read_test: false,
        ..SmokeConfig::default()
    };
    let mut seq = sequencer(FakeVolume::default(), config);
    let report = seq.mount_and_verify().unwrap();
    assert_eq!(report.state, MountState::WriteVerified);
    assert_eq!(report.lines, None);
}

#[test]
fn create_failure_is_degraded() {
    let volume = FakeVolume {
        fail_create: true,
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let err = seq.mount_and_verify().unwrap_err();

    assert!(matches!(err, Error::FileCreate { .. }));
    assert_eq!(err.severity(), Severity::Degraded);
    assert_eq!(err.exit_code(), -2);
    assert_eq!(seq.state(), MountState::Listed);
}

#[test]
fn short_write_is_an_error_by_default() {
    let volume = FakeVolume {
        write_limit: Some(5),
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let err = seq.mount_and_verify().unwrap_err();

    match err {
        Error::ShortWrite {
            expected, written, ..
        } => {
            assert_eq!(expected, 13);
            assert_eq!(written, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(seq.state(), MountState::Listed);
}

#[test]
fn short_write_can_be_tolerated() {
    let volume = FakeVolume {
        write_limit: Some(5),
        ..FakeVolume::default()
    };
    let config = SmokeConfig {
        short_write: ShortWritePolicy::Warn,
        ..SmokeConfig::default()
    };
    let mut seq = sequencer(volume, config);
    let report = seq.mount_and_verify().unwrap();

    assert_eq!(report.bytes_written, 5);
    // "hello" has no newline, so nothing is reported
    assert_eq!(report.lines, Some(vec![]));
    assert_eq!(seq.volume().file("test_data.txt"), Some(b"hello".to_vec()));
}

#[test]
fn foreign_test_file_is_rejected_before_mounting() {
    let config = SmokeConfig {
        test_file: "/USB:/test_data.txt".to_string(),
        ..SmokeConfig::default()
    };
    let mut seq = sequencer(FakeVolume::default(), config);
    let err = seq.mount_and_verify().unwrap_err();
    assert!(matches!(err, Error::Path(_)));
    assert_eq!(seq.volume().mount_calls, 0);
    assert_eq!(seq.state(), MountState::Unmounted);
}

#[test]
fn read_open_failure_stops_after_write() {
    let volume = FakeVolume {
        fail_open_read: true,
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let err = seq.mount_and_verify().unwrap_err();

    assert!(matches!(err, Error::FileOpen { ref path, .. } if path == "/SD:/test_data.txt"));
    assert_eq!(err.severity(), Severity::Degraded);
    assert_eq!(err.exit_code(), -1);
    assert_eq!(seq.state(), MountState::WriteVerified);
    assert_eq!(
        seq.volume().file("test_data.txt"),
        Some(b"hello world!\n".to_vec())
    );
}

#[test]
fn chunked_writes_are_not_short() {
    let volume = FakeVolume {
        write_chunk: Some(3),
        ..FakeVolume::default()
    };
    let mut seq = sequencer(volume, SmokeConfig::default());
    let report = seq.mount_and_verify().unwrap();
    assert_eq!(report.bytes_written, 13);
    assert_eq!(report.state, MountState::ReadVerified);
}
