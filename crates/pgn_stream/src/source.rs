use std::io::{self, Read};

pub const CHUNK_SIZE_BYTES: usize = 8192;

/// A sequential supplier of byte chunks.
///
/// `Ok(None)` marks the end of the stream. Chunks may be empty.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<&[u8]>>;
}

/// Reads fixed-size chunks from any [`Read`] (a file, a response body, stdin).
pub struct ReaderSource<R: Read> {
    reader: R,
    buffer: Box<[u8]>,
    done: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE_BYTES)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buffer: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ChunkSource for ReaderSource<R> {
    fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        if self.done {
            return Ok(None);
        }
        let n = loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(&self.buffer[..n]))
    }
}

/// Serves chunks from an iterator, e.g. a list prepared in memory.
pub struct ChunkIter<I> {
    chunks: I,
    current: Vec<u8>,
}

impl<I> ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    pub fn new(chunks: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            chunks: chunks.into_iter(),
            current: Vec::new(),
        }
    }
}

impl<I> ChunkSource for ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        match self.chunks.next() {
            Some(chunk) => {
                self.current = chunk;
                Ok(Some(&self.current))
            }
            None => Ok(None),
        }
    }
}

#[cfg(feature = "tokio")]
mod tokio_source {
    use std::io;

    use tokio::io::{AsyncRead, AsyncReadExt};

    use super::CHUNK_SIZE_BYTES;

    /// Async counterpart of [`ReaderSource`](super::ReaderSource).
    pub struct AsyncReaderSource<R: AsyncRead + Unpin> {
        reader: R,
        buffer: Box<[u8]>,
        done: bool,
    }

    impl<R: AsyncRead + Unpin> AsyncReaderSource<R> {
        pub fn new(reader: R) -> Self {
            Self::with_chunk_size(reader, CHUNK_SIZE_BYTES)
        }

        pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
            Self {
                reader,
                buffer: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
                done: false,
            }
        }

        pub async fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
            if self.done {
                return Ok(None);
            }
            let n = loop {
                match self.reader.read(&mut self.buffer).await {
                    Ok(n) => break n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            };
            if n == 0 {
                self.done = true;
                return Ok(None);
            }
            Ok(Some(&self.buffer[..n]))
        }
    }
}

#[cfg(feature = "tokio")]
pub use tokio_source::AsyncReaderSource;
