use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle metadata carried by every persisted aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful write
    pub version: i32,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Metadata for a record created at a known instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Move `updated_at` forward and bump the version.
    ///
    /// `updated_at` never goes backwards, even if the wall clock does.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
        self.version += 1;
    }
}

impl Default for EntityMetadata {
    fn default() -> Self {
        Self::new()
    }
}
