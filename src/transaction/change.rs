// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Writes made inside a transaction are recorded as Changes and only reach
// the world state when the whole write set commits.
//
// ============================================================================

use serde::{Deserialize, Serialize};

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl Change {
    pub fn key(&self) -> &str {
        match self {
            Change::Put { key, .. } => key,
            Change::Delete { key } => key,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Change::Delete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_key() {
        let put = Change::Put {
            key: "asset/a1".to_string(),
            value: vec![1],
        };
        assert_eq!(put.key(), "asset/a1");
        assert!(!put.is_delete());

        let delete = Change::Delete {
            key: "owner/o1".to_string(),
        };
        assert_eq!(delete.key(), "owner/o1");
        assert!(delete.is_delete());
    }
}
