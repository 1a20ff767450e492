use bson::{Bson, Document};

/// How `$push` sorts the array after inserting.
#[derive(Debug, Clone, PartialEq)]
pub enum PushSort {
    /// `1` or `-1` over the elements themselves.
    Direction(i32),
    /// Sort embedded documents by the given fields.
    Fields(Document),
}

/// `$position`, `$slice` and `$sort` modifiers for `$push`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushOptions {
    position: Option<i32>,
    slice: Option<i32>,
    sort: Option<PushSort>,
}

impl PushOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at this index; negative values count from the end.
    #[must_use]
    pub const fn position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Keep only the first `n` elements (the last `-n` when negative).
    #[must_use]
    pub const fn slice(mut self, slice: i32) -> Self {
        self.slice = Some(slice);
        self
    }

    #[must_use]
    pub fn sort_ascending(mut self) -> Self {
        self.sort = Some(PushSort::Direction(1));
        self
    }

    #[must_use]
    pub fn sort_descending(mut self) -> Self {
        self.sort = Some(PushSort::Direction(-1));
        self
    }

    #[must_use]
    pub fn sort_by(mut self, fields: Document) -> Self {
        self.sort = Some(PushSort::Fields(fields));
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position.is_none() && self.slice.is_none() && self.sort.is_none()
    }

    /// Adds the modifiers next to `$each`.
    pub(crate) fn write_to(&self, each: &mut Document) {
        if let Some(p) = self.position {
            each.insert("$position", p);
        }
        if let Some(s) = self.slice {
            each.insert("$slice", s);
        }
        match &self.sort {
            Some(PushSort::Direction(d)) => {
                each.insert("$sort", *d);
            }
            Some(PushSort::Fields(f)) => {
                each.insert("$sort", Bson::Document(f.clone()));
            }
            None => {}
        }
    }
}
