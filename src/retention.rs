//! Retention policy: which tags are old and excess enough to delete
//!
//! The policy is pure. Tags must be sorted newest first with [`sort_newest_first`]; the
//! `min_keep` newest are always retained and every older tag is selected iff it was created
//! before `now - max_age`.

use crate::model::TagCandidate;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

/// Never considered for deletion, whatever the pattern says
pub const LATEST_TAG: &str = "latest";

/// Name filter applied during discovery, before the policy sees any tag
#[derive(Debug, Clone)]
pub struct TagFilter {
    pattern: Regex,
}

impl TagFilter {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn matches(&self, name: &str) -> bool {
        name != LATEST_TAG && self.pattern.is_match(name)
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Stable sort by creation time, newest first. Equal timestamps keep discovery order.
pub fn sort_newest_first(tags: &mut [TagCandidate]) {
    tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Always at least 1 once configuration is validated
    pub min_keep: usize,
    pub max_age: TimeDelta,
}

impl RetentionPolicy {
    pub fn new(min_keep: usize, max_age: TimeDelta) -> Self {
        Self { min_keep, max_age }
    }

    /// Tags created strictly before this instant are old enough to delete.
    /// An age reaching past the earliest representable instant selects nothing.
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Select deletions from a newest-first list, oldest selection first.
    pub fn select(&self, newest_first: &[TagCandidate], now: DateTime<Utc>) -> Vec<TagCandidate> {
        select_for_deletion(newest_first, self.min_keep, self.threshold(now))
    }
}

/// Walk from the oldest tag towards the newest, stopping at the `min_keep` boundary.
pub fn select_for_deletion(
    newest_first: &[TagCandidate],
    min_keep: usize,
    threshold: DateTime<Utc>,
) -> Vec<TagCandidate> {
    newest_first
        .iter()
        .enumerate()
        .rev()
        .take_while(|(index, _)| *index >= min_keep)
        .filter(|(_, tag)| tag.created_at < threshold)
        .map(|(_, tag)| tag.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn aged(name: &str, days_old: i64) -> TagCandidate {
        TagCandidate::new(name, now() - TimeDelta::days(days_old))
    }

    fn names(tags: &[TagCandidate]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_filter_excludes_latest_and_non_matching() {
        let filter = TagFilter::new(Regex::new("^[0-9A-Fa-f]+$").unwrap());
        assert!(filter.matches("abc123"));
        assert!(!filter.matches("latest"));
        assert!(!filter.matches("v1.2.3"));

        let permissive = TagFilter::new(Regex::new("^[a-z]+$").unwrap());
        assert!(!permissive.matches("latest"));
        assert!(permissive.matches("stable"));
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut tags = vec![
            aged("a", 10),
            aged("b", 5),
            aged("c", 10),
            aged("d", 5),
            aged("e", 1),
        ];
        sort_newest_first(&mut tags);
        assert_eq!(names(&tags), vec!["e", "b", "d", "a", "c"]);
    }

    #[test]
    fn test_newest_min_keep_never_selected() {
        for len in 0..8 {
            for min_keep in 1..10 {
                let mut tags: Vec<_> = (0..len).map(|i| aged(&format!("t{}", i), 100 + i)).collect();
                sort_newest_first(&mut tags);
                let selected = select_for_deletion(&tags, min_keep, now());
                let kept = &tags[..min_keep.min(tags.len())];

                for tag in kept {
                    assert!(!selected.contains(tag), "len={} min_keep={}", len, min_keep);
                }
                assert_eq!(selected.len(), tags.len().saturating_sub(min_keep));
            }
        }
    }

    #[test]
    fn test_selection_past_boundary_is_age_only() {
        let policy = RetentionPolicy::new(2, TimeDelta::days(15));
        let mut tags = vec![
            aged("n0", 0),
            aged("n1", 1),
            aged("young", 3),
            aged("old", 20),
            aged("edge", 15),
            aged("ancient", 400),
        ];
        sort_newest_first(&mut tags);

        let selected = policy.select(&tags, now());
        assert_eq!(names(&selected), vec!["ancient", "old"]);

        let threshold = policy.threshold(now());
        for tag in &tags[2..] {
            assert_eq!(selected.contains(tag), tag.created_at < threshold);
        }
    }

    #[test]
    fn test_unrepresentable_age_selects_nothing() {
        let policy = RetentionPolicy::new(1, TimeDelta::weeks(100_000_000));
        assert_eq!(policy.threshold(now()), DateTime::<Utc>::MIN_UTC);

        let mut tags = vec![aged("a", 1), aged("b", 100_000), aged("c", 36_500_000)];
        sort_newest_first(&mut tags);
        assert!(policy.select(&tags, now()).is_empty());
    }

    #[test]
    fn test_fewer_tags_than_min_keep() {
        let tags = vec![aged("a", 100), aged("b", 200)];
        assert!(select_for_deletion(&tags, 3, now()).is_empty());
    }

    #[test]
    fn test_five_old_tags_keep_three() {
        let mut tags: Vec<_> = (123..=127)
            .map(|n| aged(&format!("abc{}", n), 200 - n as i64))
            .collect();
        sort_newest_first(&mut tags);

        let policy = RetentionPolicy::new(3, TimeDelta::days(15));
        let selected = policy.select(&tags, now());
        assert_eq!(names(&selected), vec!["abc123", "abc124"]);
    }
}
