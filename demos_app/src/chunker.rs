/// Regroups an arbitrarily sliced sample stream into fixed-size chunks.
pub struct Chunker {
    chunk_size: usize,
    pending: Vec<i16>,
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Self {
        Chunker {
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
        }
    }

    /// Appends samples and hands every completed chunk to `on_chunk`.
    pub fn push(&mut self, samples: &[i16], mut on_chunk: impl FnMut(&[i16])) {
        self.pending.extend_from_slice(samples);
        let complete = self.pending.len() / self.chunk_size * self.chunk_size;
        for chunk in self.pending[..complete].chunks_exact(self.chunk_size) {
            on_chunk(chunk);
        }
        self.pending.drain(..complete);
    }

    /// Samples waiting for a full chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
