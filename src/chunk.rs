use std::io::{ErrorKind, Read};

use memchr::{memchr_iter, memrchr};

use crate::error::{Error, Result};

/// A run of whole records. Ends with a `\n` unless it is the final tail of
/// an input that lacks one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk(Vec<u8>);

impl RawChunk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lines without their `\n`. Blank lines come out as empty slices.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        let body = self.0.strip_suffix(b"\n").unwrap_or(&self.0);
        body.split(|&b| b == b'\n')
    }
}

impl From<Vec<u8>> for RawChunk {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Re-splits a byte stream into chunks that never cut a record in half.
///
/// Each call reads one block of `block_size` bytes and appends it to the
/// remainder left over from the previous call. Everything up to and including
/// the last `\n` is emitted; the bytes after it are carried forward. A block
/// without any separator keeps growing the remainder.
///
/// With `max_record_len` set, any record longer than the limit (not counting
/// its `\n`) fails the read, whichever block it lands in, so the verdict does
/// not depend on `block_size`.
pub struct ChunkReader<R> {
    inner: R,
    block_size: usize,
    max_record_len: Option<usize>,
    remainder: Vec<u8>,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, block_size: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            max_record_len: None,
            remainder: Vec::new(),
            finished: false,
        }
    }

    pub fn with_max_record_len(mut self, limit: Option<usize>) -> Self {
        self.max_record_len = limit;
        self
    }

    /// Returns the next chunk, or `None` once the input is exhausted. After
    /// an error the reader is finished.
    pub fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        if self.finished {
            return Ok(None);
        }
        let chunk = self.read_chunk();
        if chunk.is_err() {
            self.finished = true;
        }
        chunk
    }

    fn read_chunk(&mut self) -> Result<Option<RawChunk>> {
        loop {
            let scanned = self.remainder.len();
            let read = self.fill_block()?;
            if read == 0 {
                self.finished = true;
                if self.remainder.is_empty() {
                    return Ok(None);
                }
                let chunk = std::mem::take(&mut self.remainder);
                self.check_records(&chunk)?;
                return Ok(Some(RawChunk(chunk)));
            }

            // The old remainder holds no separator, so only the new block
            // needs scanning.
            if let Some(pos) = memrchr(b'\n', &self.remainder[scanned..]) {
                let tail = self.remainder.split_off(scanned + pos + 1);
                let chunk = std::mem::replace(&mut self.remainder, tail);
                self.check_records(&chunk)?;
                return Ok(Some(RawChunk(chunk)));
            }

            // An unterminated remainder is the start of one record.

            if let Some(limit) = self.max_record_len {
                if self.remainder.len() > limit {
                    return Err(Error::OversizedRecord { limit });
                }
            }
        }
    }

    fn check_records(&self, bytes: &[u8]) -> Result<()> {
        let Some(limit) = self.max_record_len else {
            return Ok(());
        };
        let mut start = 0;
        for end in memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len())) {
            if end - start > limit {
                return Err(Error::OversizedRecord { limit });
            }
            start = end + 1;
        }
        Ok(())
    }

    /// Reads at most one block onto the end of the remainder.
    fn fill_block(&mut self) -> Result<usize> {
        let start = self.remainder.len();
        self.remainder.resize(start + self.block_size, 0);
        let read = loop {
            match self.inner.read(&mut self.remainder[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.remainder.truncate(start);
                    return Err(e.into());
                }
            }
        };
        self.remainder.truncate(start + read);
        Ok(read)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
