use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    /// `YYYYMMDD_xxxxxxxx`; doubles as upload folder name and vector namespace.
    pub name: String,
    /// RFC 3339 UTC with microseconds, so text order is time order.
    pub created_at: String,
}

/// A stored vector row of the local index.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub chunk_id: String,
    pub content: String,
    pub metadata: String,
    pub embedding: Vec<f32>,
}
