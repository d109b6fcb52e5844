//! Episode identity.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A selected dataset/time-range handle.
///
/// At most one episode is active per page session; panels read it through the
/// session controller, never mutate it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Episode {
    /// Experiment category the episode belongs to.
    pub category: String,
    /// Episode identifier within the category.
    pub id: String,
}

impl Episode {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
        }
    }
}
