//! Approver identity lookup used when rolling up approver performance.

use std::collections::HashMap;

pub trait ApproverDirectory: Send + Sync {
    /// Display name for an approver, `None` when unknown.
    fn display_name(&self, approver_id: &str) -> Option<String>;
}

/// Fixed id → name table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    names: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }
}

impl ApproverDirectory for StaticDirectory {
    fn display_name(&self, approver_id: &str) -> Option<String> {
        self.names.get(approver_id).cloned()
    }
}

/// Parse `id=Name,id2=Other Name` pairs. Malformed entries are skipped.
pub fn parse_names(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (id, name) = pair.split_once('=')?;
            let (id, name) = (id.trim(), name.trim());
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_skips_malformed_pairs() {
        let names = parse_names("A1=Priya Shah, A2 = Tom Ellis,broken,=nobody,A3=");
        assert_eq!(names.len(), 2);
        assert_eq!(names["A1"], "Priya Shah");
        assert_eq!(names["A2"], "Tom Ellis");
    }

    #[test]
    fn test_static_directory_lookup() {
        let dir = StaticDirectory::new(parse_names("A1=Priya Shah"));
        assert_eq!(dir.display_name("A1").as_deref(), Some("Priya Shah"));
        assert!(dir.display_name("A2").is_none());
    }
}
