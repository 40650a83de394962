use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one ingested table of one source system. All watermark,
/// lease and scheduling decisions are scoped to this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableKey {
    pub source_system: String,
    pub table_name: String,
}

impl TableKey {
    pub fn new(source_system: &str, table_name: &str) -> Self {
        TableKey {
            source_system: source_system.to_string(),
            table_name: table_name.to_string(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source_system, self.table_name)
    }
}
