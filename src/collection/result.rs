use bson::Bson;

/// Outcome of an update or replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Id of the document inserted by an upsert.
    pub upserted_id: Option<Bson>,
}

impl UpdateResult {
    /// Existing documents the update matched, changed or not. Zero for an
    /// upsert that inserted.
    #[must_use]
    pub const fn updated_count(&self) -> u64 {
        if self.upserted_id.is_some() { 0 } else { self.matched_count }
    }

    #[must_use]
    pub const fn inserted_count(&self) -> u64 {
        if self.upserted_id.is_some() { 1 } else { 0 }
    }

    /// True when at least one existing document matched.
    #[must_use]
    pub const fn updated_existing(&self) -> bool {
        self.matched_count > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}
