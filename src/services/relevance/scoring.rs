//! Relevance scoring
//!
//! Pure functions behind the relevance engine. Nothing here touches the
//! database or the caches, so every rule can be tested in isolation.

use crate::models::{ArticleVersionTag, TagPair, TagUsage};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};

/// Recency-gated popularity of a tag.
///
/// Zero when the tag was never used or its last use is older than `window`.
/// Otherwise the usage count divided by one plus the window length in hours.
pub fn trending_score(usage: &TagUsage, now: DateTime<Utc>, window: Duration) -> f64 {
    let Some(last_used) = usage.last_used else {
        return 0.0;
    };
    // An end past the representable range never expires
    let expired = last_used
        .checked_add_signed(window)
        .map_or(false, |expires| expires < now);
    if usage.count <= 0 || expired {
        return 0.0;
    }
    usage.count as f64 / window.num_hours().saturating_add(1) as f64
}

/// Every unordered pair of distinct tags in `tags`
pub fn tag_pairs(tags: &[String]) -> Vec<TagPair> {
    let distinct: Vec<&String> = tags.iter().collect::<BTreeSet<_>>().into_iter().collect();

    let mut pairs = Vec::with_capacity(distinct.len() * distinct.len().saturating_sub(1) / 2);
    for (i, a) in distinct.iter().enumerate() {
        for b in &distinct[i + 1..] {
            pairs.push(TagPair::new(a.as_str(), b.as_str()));
        }
    }
    pairs
}

/// Count, per tag pair, how many versions carry both tags.
///
/// Associations are grouped by version. At most `max_tags_per_version`
/// distinct tags of each version take part, in ascending name order.
pub fn pair_frequencies(
    associations: &[ArticleVersionTag],
    max_tags_per_version: usize,
) -> HashMap<TagPair, i64> {
    let mut by_version: HashMap<i64, BTreeSet<&str>> = HashMap::new();
    for association in associations {
        by_version
            .entry(association.article_version_id)
            .or_default()
            .insert(association.tag_name.as_str());
    }

    let mut frequencies = HashMap::new();
    for (version_id, tags) in by_version {
        if tags.len() > max_tags_per_version {
            tracing::debug!(
                version_id,
                tags = tags.len(),
                limit = max_tags_per_version,
                "Truncating tag set for pair counting"
            );
        }
        let tags: Vec<String> = tags
            .into_iter()
            .take(max_tags_per_version)
            .map(str::to_string)
            .collect();

        for pair in tag_pairs(&tags) {
            *frequencies.entry(pair).or_insert(0) += 1;
        }
    }
    frequencies
}

/// How topically related a set of tags is.
///
/// The mean over all tag pairs of `co_occurrence / sqrt(freq_a * freq_b)`.
/// Pairs where either tag has no usage are left out of the mean, so a
/// brand-new tag does not pull the score down. Fewer than two tags, or no
/// pair left, score zero. The result is rounded to four decimals.
pub fn relationship_score(
    tags: &[String],
    usage: &HashMap<String, TagUsage>,
    pair_frequency: &HashMap<TagPair, i64>,
) -> f64 {
    let pairs = tag_pairs(tags);
    if pairs.is_empty() {
        return 0.0;
    }

    let count_of = |name: &str| usage.get(name).map_or(0, |u| u.count);

    let mut total = 0.0;
    let mut scored = 0usize;
    for pair in &pairs {
        let freq_a = count_of(pair.first());
        let freq_b = count_of(pair.second());
        if freq_a == 0 || freq_b == 0 {
            continue;
        }
        let co_occurrence = pair_frequency.get(pair).copied().unwrap_or(0);
        total += co_occurrence as f64 / ((freq_a * freq_b) as f64).sqrt();
        scored += 1;
    }

    if scored == 0 {
        return 0.0;
    }
    round_score(total / scored as f64)
}

/// Round to four decimal places
pub fn round_score(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn usage(count: i64, last_used: Option<DateTime<Utc>>) -> TagUsage {
        TagUsage {
            count,
            last_used,
            trending_score: 0.0,
        }
    }

    fn usage_map(entries: &[(&str, i64)]) -> HashMap<String, TagUsage> {
        entries
            .iter()
            .map(|(name, count)| (name.to_string(), usage(*count, Some(Utc::now()))))
            .collect()
    }

    #[test]
    fn test_trending_score_window_boundary() {
        let now = Utc::now();
        let window = Duration::hours(24);

        let stale = usage(5, Some(now - Duration::hours(24) - Duration::seconds(1)));
        assert_eq!(trending_score(&stale, now, window), 0.0);

        let fresh = usage(5, Some(now - Duration::hours(23) - Duration::minutes(59)));
        assert_eq!(trending_score(&fresh, now, window), 5.0 / 25.0);

        let exact = usage(5, Some(now - Duration::hours(24)));
        assert!(trending_score(&exact, now, window) > 0.0);
    }

    #[test]
    fn test_trending_score_unused_tag() {
        let now = Utc::now();
        let window = Duration::hours(24);

        assert_eq!(trending_score(&usage(0, Some(now)), now, window), 0.0);
        assert_eq!(trending_score(&usage(3, None), now, window), 0.0);
        assert_eq!(trending_score(&TagUsage::default(), now, window), 0.0);
    }

    #[test]
    fn test_trending_score_huge_window() {
        let now = Utc::now();
        let window = Duration::milliseconds(i64::MAX);

        let score = trending_score(&usage(4, Some(now - Duration::days(365))), now, window);
        assert!(score > 0.0);
        assert!(score.is_finite());
    }

    #[test]
    fn test_tag_pairs_are_distinct_and_unordered() {
        let pairs = tag_pairs(&strings(&["go", "cms", "go", "api"]));
        assert_eq!(
            pairs,
            vec![
                TagPair::new("api", "cms"),
                TagPair::new("api", "go"),
                TagPair::new("cms", "go"),
            ]
        );

        assert!(tag_pairs(&strings(&["solo"])).is_empty());
        assert!(tag_pairs(&[]).is_empty());
    }

    #[test]
    fn test_pair_frequencies_group_by_version() {
        let associations = vec![
            ArticleVersionTag::new("go", 1),
            ArticleVersionTag::new("cms", 1),
            ArticleVersionTag::new("go", 2),
            ArticleVersionTag::new("api", 2),
        ];
        let frequencies = pair_frequencies(&associations, 64);

        assert_eq!(frequencies.get(&TagPair::new("go", "cms")), Some(&1));
        assert_eq!(frequencies.get(&TagPair::new("go", "api")), Some(&1));
        assert_eq!(frequencies.get(&TagPair::new("cms", "api")), None);
        assert_eq!(frequencies.len(), 2);
    }

    #[test]
    fn test_pair_frequencies_truncates_large_tag_sets() {
        let associations: Vec<ArticleVersionTag> = ["a", "b", "c", "d"]
            .iter()
            .map(|t| ArticleVersionTag::new(*t, 7))
            .collect();
        let frequencies = pair_frequencies(&associations, 2);

        assert_eq!(frequencies.len(), 1);
        assert_eq!(frequencies.get(&TagPair::new("a", "b")), Some(&1));
    }

    #[test]
    fn test_relationship_score_needs_two_tags() {
        let usage = usage_map(&[("go", 3)]);
        let pairs = HashMap::new();

        assert_eq!(relationship_score(&[], &usage, &pairs), 0.0);
        assert_eq!(relationship_score(&strings(&["go"]), &usage, &pairs), 0.0);
        assert_eq!(relationship_score(&strings(&["go", "go"]), &usage, &pairs), 0.0);
    }

    #[test]
    fn test_relationship_score_skips_unused_tags() {
        let usage = usage_map(&[("a", 0), ("b", 0)]);
        let mut pairs = HashMap::new();
        pairs.insert(TagPair::new("a", "b"), 4);

        assert_eq!(relationship_score(&strings(&["a", "b"]), &usage, &pairs), 0.0);
        assert_eq!(
            relationship_score(&strings(&["x", "y"]), &HashMap::new(), &pairs),
            0.0
        );
    }

    #[test]
    fn test_relationship_score_equal_frequencies() {
        let usage = usage_map(&[("a", 4), ("b", 4)]);
        let mut pairs = HashMap::new();
        pairs.insert(TagPair::new("b", "a"), 3);

        assert_eq!(relationship_score(&strings(&["a", "b"]), &usage, &pairs), 0.75);
    }

    #[test]
    fn test_relationship_score_means_over_scored_pairs() {
        // (go, cms) = 1 / sqrt(2 * 1), (go, new) and (cms, new) are skipped
        let usage = usage_map(&[("go", 2), ("cms", 1)]);
        let mut pairs = HashMap::new();
        pairs.insert(TagPair::new("go", "cms"), 1);

        let score = relationship_score(&strings(&["go", "cms", "new"]), &usage, &pairs);
        assert_eq!(score, 0.7071);
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123_456), 0.1235);
        assert_eq!(round_score(1.0 / 3.0), 0.3333);
        assert_eq!(round_score(0.0), 0.0);
    }
}
