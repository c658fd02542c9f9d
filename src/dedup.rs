// src/dedup.rs
use crate::types::CertificateRecord;
use std::collections::HashSet;

/// Tracks which names have already been emitted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `name` is observed.
    pub fn observe(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Unique names in order of first appearance.
pub fn dedup_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut dedup = Deduplicator::new();
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            dedup.observe(name).then(|| name.to_string())
        })
        .collect()
}

/// Unique subdomain names carried by a list of records, first appearance wins.
pub fn extract_subdomains(records: &[CertificateRecord]) -> Vec<String> {
    dedup_names(records.iter().flat_map(CertificateRecord::names))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_order() {
        let records = vec![
            CertificateRecord::from_name("sub.example.com"),
            CertificateRecord::from_name("sub.example.com"),
            CertificateRecord::from_name("other.example.com"),
        ];

        assert_eq!(
            extract_subdomains(&records),
            vec!["sub.example.com", "other.example.com"]
        );
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let inputs = vec![
            vec![],
            vec!["a"],
            vec!["a", "a", "a"],
            vec!["b", "a", "b", "c", "a"],
        ];

        for input in inputs {
            let unique = dedup_names(&input);
            assert!(unique.len() <= input.len());

            let distinct: HashSet<&str> = input.iter().copied().collect();
            assert_eq!(unique.len(), distinct.len());
        }

        assert_eq!(dedup_names(["b", "a", "b", "c", "a"]), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_multi_line_name_values() {
        let records = vec![
            CertificateRecord::from_name("a.example.com\nb.example.com"),
            CertificateRecord::from_name("b.example.com\n\n c.example.com "),
        ];

        assert_eq!(
            extract_subdomains(&records),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }

    #[test]
    fn test_observe() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.is_empty());
        assert!(dedup.observe("x.example.com"));
        assert!(!dedup.observe("x.example.com"));
        assert_eq!(dedup.len(), 1);
    }
}
