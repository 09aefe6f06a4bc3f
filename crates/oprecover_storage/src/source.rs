//! Sequential byte sources.
//!
//! A [`ByteSource`] is the only thing the versioned reader knows how to
//! consume. Sources are blocking and byte oriented; they impose no framing
//! of their own and do no buffering beyond what the underlying handle does.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// A sequential, blocking byte source.
///
/// # Contract
///
/// - `read_exact` either fills the whole buffer or fails; a failed read
///   caused by exhaustion reports [`StorageError::ReadPastEnd`]
/// - `skip` advances by at most `n` bytes and returns how many were skipped
/// - `available` is the number of bytes that can still be read
/// - after `close`, every operation fails with [`StorageError::Closed`]
pub trait ByteSource {
    /// Fills `buf` completely from the source.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `buf.len()` bytes remain, or on I/O failure.
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()>;

    /// Skips up to `n` bytes, returning the number actually skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the source is closed.
    fn skip(&mut self, n: u64) -> StorageResult<u64>;

    /// Returns the number of bytes remaining.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is closed.
    fn available(&self) -> StorageResult<u64>;

    /// Closes the source, releasing any underlying handle.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the handle fails.
    fn close(&mut self) -> StorageResult<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        (**self).read_exact(buf)
    }

    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        (**self).skip(n)
    }

    fn available(&self) -> StorageResult<u64> {
        (**self).available()
    }

    fn close(&mut self) -> StorageResult<()> {
        (**self).close()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        (**self).read_exact(buf)
    }

    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        (**self).skip(n)
    }

    fn available(&self) -> StorageResult<u64> {
        (**self).available()
    }

    fn close(&mut self) -> StorageResult<()> {
        (**self).close()
    }
}

/// A byte source over owned in-memory bytes.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Bytes,
    pos: usize,
    closed: bool,
}

impl SliceSource {
    /// Creates a source positioned at the start of `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            closed: false,
        }
    }

    /// Returns the current read position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl ByteSource for SliceSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let remaining = self.data.len() - self.pos;
        if buf.len() > remaining {
            return Err(StorageError::ReadPastEnd {
                offset: self.pos as u64,
                len: buf.len(),
                size: self.data.len() as u64,
            });
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        self.ensure_open()?;
        let remaining = (self.data.len() - self.pos) as u64;
        let skipped = n.min(remaining);
        self.pos += skipped as usize;
        Ok(skipped)
    }

    fn available(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        Ok((self.data.len() - self.pos) as u64)
    }

    fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// A buffered sequential source over a file.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    len: u64,
    pos: u64,
}

impl FileSource {
    /// Opens `path` for sequential reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(BufReader::new(file)),
            len,
            pos: 0,
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&mut self) -> StorageResult<&mut BufReader<File>> {
        self.reader.as_mut().ok_or(StorageError::Closed)
    }
}

impl ByteSource for FileSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        let (pos, len) = (self.pos, self.len);
        if pos + buf.len() as u64 > len {
            return Err(StorageError::ReadPastEnd {
                offset: pos,
                len: buf.len(),
                size: len,
            });
        }
        self.reader()?.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        let skipped = n.min(self.len - self.pos);
        let offset = i64::try_from(skipped).map_err(|_| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("skip of {skipped} bytes is too large"),
            ))
        })?;
        self.reader()?.seek_relative(offset)?;
        self.pos += skipped;
        Ok(skipped)
    }

    fn available(&self) -> StorageResult<u64> {
        if self.reader.is_none() {
            return Err(StorageError::Closed);
        }
        Ok(self.len - self.pos)
    }

    fn close(&mut self) -> StorageResult<()> {
        self.reader = None;
        Ok(())
    }
}

/// A sequential view over a [`StorageBackend`].
///
/// Each read is a `read_at` against the backend, so the backend's own
/// buffering is the only buffering.
#[derive(Debug)]
pub struct BackendSource<B: StorageBackend> {
    backend: B,
    offset: u64,
    end: u64,
    closed: bool,
}

impl<B: StorageBackend> BackendSource<B> {
    /// Creates a source covering the whole backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: B) -> StorageResult<Self> {
        let end = backend.size()?;
        Ok(Self::with_range(backend, 0, end))
    }

    /// Creates a source covering `start..end` of the backend.
    pub fn with_range(backend: B, start: u64, end: u64) -> Self {
        Self {
            backend,
            offset: start,
            end: end.max(start),
            closed: false,
        }
    }

    /// Returns the backend offset of the next byte to be read.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the source, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

impl<B: StorageBackend> ByteSource for BackendSource<B> {
    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        if self.offset + buf.len() as u64 > self.end {
            return Err(StorageError::ReadPastEnd {
                offset: self.offset,
                len: buf.len(),
                size: self.end,
            });
        }
        let data = self.backend.read_at(self.offset, buf.len())?;
        buf.copy_from_slice(&data);
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let skipped = n.min(self.end - self.offset);
        self.offset += skipped;
        Ok(skipped)
    }

    fn available(&self) -> StorageResult<u64> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(self.end - self.offset)
    }

    fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn slice_reads_in_order() {
        let mut source = SliceSource::new(b"abcdef".to_vec());
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ab");
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
        assert_eq!(source.available().unwrap(), 2);
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn slice_exhaustion_consumes_nothing() {
        let mut source = SliceSource::new(b"abc".to_vec());
        let mut buf = [0u8; 4];
        let err = source.read_exact(&mut buf).unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(source.available().unwrap(), 3);
    }

    #[test]
    fn slice_skip_is_bounded() {
        let mut source = SliceSource::new(b"abc".to_vec());
        assert_eq!(source.skip(2).unwrap(), 2);
        assert_eq!(source.skip(10).unwrap(), 1);
        assert_eq!(source.available().unwrap(), 0);
    }

    #[test]
    fn closed_slice_fails() {
        let mut source = SliceSource::new(b"abc".to_vec());
        source.close().unwrap();
        assert!(matches!(source.available(), Err(StorageError::Closed)));
        let mut buf = [0u8; 1];
        assert!(matches!(
            source.read_exact(&mut buf),
            Err(StorageError::Closed)
        ));
    }

    #[test]
    fn file_source_reads_and_skips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        File::create(&path)
            .unwrap()
            .write_all(b"0123456789")
            .unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.available().unwrap(), 10);

        let mut buf = [0u8; 3];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"012");
        assert_eq!(source.skip(4).unwrap(), 4);
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"789");

        let mut one = [0u8; 1];
        assert!(source.read_exact(&mut one).unwrap_err().is_exhausted());

        source.close().unwrap();
        assert!(matches!(source.available(), Err(StorageError::Closed)));
    }

    #[test]
    fn backend_source_respects_range() {
        let backend = InMemoryBackend::with_data(b"headerBODYtrailer".to_vec());
        let mut source = BackendSource::with_range(backend, 6, 10);

        assert_eq!(source.available().unwrap(), 4);
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"BODY");
        assert_eq!(source.offset(), 10);

        let mut one = [0u8; 1];
        assert!(source.read_exact(&mut one).unwrap_err().is_exhausted());
    }

    #[test]
    fn boxed_source_delegates() {
        let mut source: Box<dyn ByteSource> = Box::new(SliceSource::new(b"xy".to_vec()));
        let mut buf = [0u8; 1];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(source.available().unwrap(), 1);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Read(usize),
        Skip(u64),
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..16).prop_map(Step::Read),
            (0u64..16).prop_map(Step::Skip),
        ]
    }

    /// Applies `steps`, recording what each one observed.
    fn trace<S: ByteSource>(source: &mut S, steps: &[Step]) -> Vec<(Option<Vec<u8>>, u64)> {
        steps
            .iter()
            .map(|step| {
                let read = match step {
                    Step::Read(n) => {
                        let mut buf = vec![0u8; *n];
                        source.read_exact(&mut buf).ok().map(|()| buf)
                    }
                    Step::Skip(n) => Some(source.skip(*n).unwrap().to_be_bytes().to_vec()),
                };
                (read, source.available().unwrap())
            })
            .collect()
    }

    proptest! {
        #[test]
        fn sources_agree(
            data in proptest::collection::vec(any::<u8>(), 0..64),
            steps in proptest::collection::vec(step_strategy(), 0..16),
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("data.bin");
            File::create(&path).unwrap().write_all(&data).unwrap();

            let slice = trace(&mut SliceSource::new(data.clone()), &steps);
            let file = trace(&mut FileSource::open(&path).unwrap(), &steps);
            let backend = trace(
                &mut BackendSource::new(InMemoryBackend::with_data(data)).unwrap(),
                &steps,
            );

            prop_assert_eq!(&slice, &file);
            prop_assert_eq!(&slice, &backend);
        }
    }
}
