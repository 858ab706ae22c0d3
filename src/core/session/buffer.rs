use bytes::{Bytes, BytesMut};

/// Default upstream chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Re-slices arbitrary client frames into fixed-size upstream chunks.
///
/// After every `append` the buffered remainder is shorter than `chunk_size`.
#[derive(Debug)]
pub struct AudioChunker {
    buffer: BytesMut,
    chunk_size: usize,
}

impl AudioChunker {
    /// Create a chunker. A zero chunk size is raised to one byte.
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            buffer: BytesMut::with_capacity(chunk_size * 2),
            chunk_size,
        }
    }

    /// Append a frame and return every complete chunk, oldest first.
    pub fn append(&mut self, frame: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(frame);

        let mut chunks = Vec::with_capacity(self.buffer.len() / self.chunk_size);
        while self.buffer.len() >= self.chunk_size {
            chunks.push(self.buffer.split_to(self.chunk_size).freeze());
        }
        chunks
    }

    /// Take the non-empty remainder, leaving the buffer empty.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for AudioChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}
