//! Content fingerprinting and new/duplicate partitioning.
//!
//! A fingerprint is the lowercase hex SHA-256 of the trimmed prompt text.
//! It is the only identity a case has: title, author, and source repository
//! play no part. Every code path that needs an identity goes through
//! [`fingerprint`].

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::models::{CaseRecord, NewRecord};

/// Fingerprint a prompt body. Invariant to leading/trailing whitespace only.
pub fn fingerprint(prompt_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt_text.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// The fingerprints known to exist, plus those accepted earlier in this run.
#[derive(Debug, Default, Clone)]
pub struct FingerprintSet {
    known: HashSet<String>,
}

/// Result of partitioning one source's drafts.
#[derive(Debug, Default)]
pub struct Partition {
    pub new: Vec<NewRecord>,
    pub duplicates: usize,
}

impl FingerprintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.known.contains(fingerprint)
    }

    /// Returns `true` if the fingerprint was not already present.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        self.known.insert(fingerprint)
    }

    /// Split drafts into new records and a duplicate count.
    ///
    /// Accepted fingerprints are added to the set immediately, so a prompt
    /// repeated within `drafts`, or already accepted from another source
    /// this run, counts as a duplicate.
    pub fn partition(&mut self, drafts: Vec<CaseRecord>) -> Partition {
        let mut out = Partition::default();
        for record in drafts {
            let fp = fingerprint(&record.prompt_text);
            if self.insert(fp.clone()) {
                out.new.push(NewRecord {
                    fingerprint: fp,
                    record,
                });
            } else {
                out.duplicates += 1;
            }
        }
        out
    }
}

impl FromIterator<String> for FingerprintSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            known: iter.into_iter().collect(),
        }
    }
}

impl Extend<String> for FingerprintSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.known.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(prompt: &str) -> CaseRecord {
        CaseRecord {
            title: "title".to_string(),
            prompt_text: prompt.to_string(),
            author: None,
            author_url: None,
            source_repo: "acme/prompts".to_string(),
            source_url: "https://github.com/acme/prompts".to_string(),
            reference_image_url: None,
            result_image_url: Some("https://x/r.png".to_string()),
            tags: vec![],
            category: "General".to_string(),
            reference_required: false,
            reference_note: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn fingerprint_ignores_surrounding_whitespace() {
        assert_eq!(
            fingerprint("a red fox in the snow"),
            fingerprint("  a red fox in the snow\n\t")
        );
    }

    #[test]
    fn fingerprint_is_sensitive_to_body_changes() {
        assert_ne!(
            fingerprint("a red fox in the snow"),
            fingerprint("a red fox in the snaw")
        );
        assert_ne!(
            fingerprint("a red fox in the snow"),
            fingerprint("a red fox  in the snow")
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint("abc");
        assert_eq!(fp.len(), 64);
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn partition_against_known_set() {
        let mut set: FingerprintSet = [fingerprint("known prompt body")].into_iter().collect();
        let part = set.partition(vec![draft("known prompt body"), draft("fresh prompt body")]);
        assert_eq!(part.duplicates, 1);
        assert_eq!(part.new.len(), 1);
        assert_eq!(part.new[0].record.prompt_text, "fresh prompt body");
        assert!(set.contains(&fingerprint("fresh prompt body")));
    }

    #[test]
    fn accepted_records_collapse_later_repeats() {
        let mut set = FingerprintSet::new();
        let first = set.partition(vec![draft("shared prompt"), draft(" shared prompt ")]);
        assert_eq!(first.new.len(), 1);
        assert_eq!(first.duplicates, 1);

        let second = set.partition(vec![draft("shared prompt")]);
        assert!(second.new.is_empty());
        assert_eq!(second.duplicates, 1);
        assert_eq!(set.len(), 1);
    }
}
