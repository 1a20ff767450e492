use bson::{Document, doc};
use serde::{Deserialize, Serialize};

/// How many nodes must acknowledge a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Acknowledgment {
    Nodes(u32),
    /// `"majority"` or a replica-set tag.
    Custom(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConcern {
    pub w: Option<Acknowledgment>,
    pub journal: Option<bool>,
    pub w_timeout_ms: Option<u64>,
}

impl WriteConcern {
    #[must_use]
    pub fn acknowledged() -> Self {
        Self { w: Some(Acknowledgment::Nodes(1)), ..Self::default() }
    }

    #[must_use]
    pub fn majority() -> Self {
        Self { w: Some(Acknowledgment::Custom("majority".into())), ..Self::default() }
    }

    #[must_use]
    pub fn unacknowledged() -> Self {
        Self { w: Some(Acknowledgment::Nodes(0)), ..Self::default() }
    }

    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        !matches!(self.w, Some(Acknowledgment::Nodes(0)))
    }
}

/// String comparison rules, passed through to the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collation {
    pub locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_level: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_ordering: Option<bool>,
}

impl Collation {
    #[must_use]
    pub fn locale(locale: impl Into<String>) -> Self {
        Self { locale: locale.into(), strength: None, case_level: None, numeric_ordering: None }
    }

    #[must_use]
    pub const fn strength(mut self, strength: u8) -> Self {
        self.strength = Some(strength);
        self
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut d = doc! { "locale": self.locale.clone() };
        if let Some(s) = self.strength {
            d.insert("strength", i32::from(s));
        }
        if let Some(c) = self.case_level {
            d.insert("caseLevel", c);
        }
        if let Some(n) = self.numeric_ordering {
            d.insert("numericOrdering", n);
        }
        d
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub batch_size: Option<u32>,
    pub collation: Option<Collation>,
    pub max_time_ms: Option<u64>,
}

/// Options for counting; independent of any limit/skip on the query itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub max_time_ms: Option<u64>,
    pub collation: Option<Collation>,
}

impl CountOptions {
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn max_time_ms(mut self, ms: u64) -> Self {
        self.max_time_ms = Some(ms);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOptions {
    pub write_concern: Option<WriteConcern>,
    pub bypass_document_validation: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub multi: bool,
    pub collation: Option<Collation>,
    pub write_concern: Option<WriteConcern>,
    pub bypass_document_validation: bool,
}

impl UpdateOptions {
    #[must_use]
    pub const fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    #[must_use]
    pub const fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    #[must_use]
    pub fn write_concern(mut self, wc: WriteConcern) -> Self {
        self.write_concern = Some(wc);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOptions {
    pub multi: bool,
    pub collation: Option<Collation>,
    pub write_concern: Option<WriteConcern>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self { multi: true, collation: None, write_concern: None }
    }
}

impl DeleteOptions {
    #[must_use]
    pub const fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    pub upsert: bool,
    /// Return the document as it is after the modification.
    pub return_new: bool,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub max_time_ms: Option<u64>,
    pub write_concern: Option<WriteConcern>,
}

impl FindAndModifyOptions {
    #[must_use]
    pub const fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    #[must_use]
    pub const fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = return_new;
        self
    }
}

/// What a find-and-modify does to the single matched document.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    Update(Document),
    Replace(Document),
    Remove,
}
