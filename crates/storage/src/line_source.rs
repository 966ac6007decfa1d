use crate::error::StorageError;
use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use tracing::debug;

/// Pull-based line stream over some backend. Lines keep their terminators;
/// the final line of a stream may lack one. Resources are released on drop.
pub trait ReadableLineSource: Send {
    /// Next line, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>, StorageError>;
}

/// Classify a line-read failure: undecodable text is a format mismatch,
/// everything else stays an I/O error.
fn map_read_err(err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::InvalidData {
        StorageError::Decode(err.to_string())
    } else {
        StorageError::Io(err)
    }
}

/// Line source over any buffered reader: plain files, HTTP bodies, and
/// gzip decompressors all end up here.
pub struct BufferedLineSource<R: BufRead + Send> {
    reader: R,
}

impl<R: BufRead + Send> BufferedLineSource<R> {
    pub fn new(reader: R) -> Self {
        BufferedLineSource { reader }
    }
}

impl<R: BufRead + Send> ReadableLineSource for BufferedLineSource<R> {
    fn next_line(&mut self) -> Result<Option<String>, StorageError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(err) => Err(map_read_err(err)),
        }
    }
}

const ARCHIVE_CHANNEL_DEPTH: usize = 256;

/// Line source that merges every regular file inside a tar archive into
/// one logical stream, in archive member order.
///
/// Tar entries borrow the archive they come from, so the archive is walked
/// on a dedicated thread that feeds lines through a bounded channel. The
/// thread stops as soon as the receiving side is dropped.
pub struct ArchiveLineSource {
    rx: Receiver<Result<String, StorageError>>,
}

impl ArchiveLineSource {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = sync_channel(ARCHIVE_CHANNEL_DEPTH);
        thread::spawn(move || {
            let mut archive = tar::Archive::new(reader);
            walk_archive(&mut archive, &tx);
        });
        ArchiveLineSource { rx }
    }
}

fn walk_archive<R: Read>(
    archive: &mut tar::Archive<R>,
    tx: &SyncSender<Result<String, StorageError>>,
) {
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(err) => {
            let _ = tx.send(Err(StorageError::Archive(err.to_string())));
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let _ = tx.send(Err(StorageError::Archive(err.to_string())));
                return;
            }
        };
        if !entry.header().entry_type().is_file() {
            continue;
        }
        debug!(member = ?entry.path().ok(), "Merging archive member");
        let mut reader = BufReader::new(entry);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        // Receiver is gone, stop decompressing.
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(map_read_err(err)));
                    return;
                }
            }
        }
    }
}

impl ReadableLineSource for ArchiveLineSource {
    fn next_line(&mut self) -> Result<Option<String>, StorageError> {
        match self.rx.recv() {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(err)) => Err(err),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(source: &mut dyn ReadableLineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_buffered_lines_keep_terminators() {
        let mut source = BufferedLineSource::new(Cursor::new(">s1\nACGT\nTT"));
        let lines = collect(&mut source);
        assert_eq!(lines, vec![">s1\n", "ACGT\n", "TT"]);
    }

    #[test]
    fn test_buffered_empty_input() {
        let mut source = BufferedLineSource::new(Cursor::new(""));
        assert!(source.next_line().unwrap().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let mut source = BufferedLineSource::new(Cursor::new(&[0xff, 0xfe, 0x0a][..]));
        match source.next_line() {
            Err(StorageError::Decode(_)) => {}
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_archive_merges_members_in_order() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(9);
        header.set_cksum();
        builder
            .append_data(&mut header, "a.fa", Cursor::new(">s1\nACGT\n"))
            .unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(7);
        header.set_cksum();
        builder
            .append_data(&mut header, "b.fa", Cursor::new(">s2\nTT\n"))
            .unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut source = ArchiveLineSource::new(Cursor::new(bytes));
        let lines = collect(&mut source);
        assert_eq!(lines, vec![">s1\n", "ACGT\n", ">s2\n", "TT\n"]);
    }

    #[test]
    fn test_not_a_tar_file_is_archive_error() {
        let mut source = ArchiveLineSource::new(Cursor::new(vec![1u8; 4096]));
        match source.next_line() {
            Err(StorageError::Archive(_)) => {}
            other => panic!("expected archive error, got {other:?}"),
        }
    }
}
