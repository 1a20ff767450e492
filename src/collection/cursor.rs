use bson::Document;

/// Documents returned by a find, handed out in order.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    docs: Vec<Document>,
    pos: usize,
    batch_size: Option<u32>,
}

impl Cursor {
    #[must_use]
    pub const fn new(docs: Vec<Document>, batch_size: Option<u32>) -> Self {
        Self { docs, pos: 0, batch_size }
    }

    pub fn advance(&mut self) -> Option<Document> {
        let d = self.docs.get(self.pos)?.clone();
        self.pos += 1;
        Some(d)
    }

    /// Next batch of at most `batch_size` documents (all remaining when unset).
    pub fn next_batch(&mut self) -> Vec<Document> {
        let remaining = self.docs.len().saturating_sub(self.pos);
        let n = self.batch_size.map_or(remaining, |b| (b as usize).min(remaining).max(1));
        let out = self.docs[self.pos..self.pos + n.min(remaining)].to_vec();
        self.pos += out.len();
        out
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.docs.len().saturating_sub(self.pos)
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        if self.pos == 0 {
            return std::mem::take(&mut self.docs);
        }
        self.docs.split_off(self.pos)
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
