//! Groups occurrences by canonical key and elects one representative per group.

use crate::extractor::{self, LinkOccurrence};
use crate::summary;
use std::collections::HashMap;

/// Picks the representative of a duplicate group.
pub trait SelectionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `select` looks at summaries, so they must be extracted first.
    fn needs_summaries(&self) -> bool {
        false
    }

    /// Index into `members` (never empty, in extraction order) of the winner.
    fn select(&self, members: &[&LinkOccurrence]) -> usize;
}

/// Lowest id wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOccurrence;

impl SelectionPolicy for FirstOccurrence {
    fn name(&self) -> &'static str {
        "first"
    }

    fn select(&self, _members: &[&LinkOccurrence]) -> usize {
        0
    }
}

/// Longest non-empty summary wins; ties and all-empty groups fall back to the
/// lowest id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RichestSummary;

impl RichestSummary {
    fn richness(occurrence: &LinkOccurrence) -> (bool, usize) {
        if occurrence.summary.trim().is_empty() {
            (false, 0)
        } else {
            (true, occurrence.summary.chars().count())
        }
    }
}

impl SelectionPolicy for RichestSummary {
    fn name(&self) -> &'static str {
        "richest"
    }

    fn needs_summaries(&self) -> bool {
        true
    }

    fn select(&self, members: &[&LinkOccurrence]) -> usize {
        let mut best = 0;
        for (idx, member) in members.iter().enumerate().skip(1) {
            if Self::richness(member) > Self::richness(members[best]) {
                best = idx;
            }
        }
        best
    }
}

/// All occurrences sharing one canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub canonical_key: String,
    /// Occurrence ids in extraction order.
    pub members: Vec<usize>,
    pub selected: usize,
}

/// An occurrence together with its group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub occurrence: LinkOccurrence,
    /// Ids of the other members of its group; empty for singletons.
    pub duplicates: Vec<usize>,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub links: Vec<ResolvedLink>,
    pub groups: Vec<DuplicateGroup>,
}

impl Resolution {
    /// The deduplicated view: one representative per group, in document order.
    pub fn selected(&self) -> impl Iterator<Item = &ResolvedLink> {
        self.links.iter().filter(|link| link.selected)
    }
}

/// Partition `occurrences` by canonical key and mark one member of each group.
pub fn resolve(occurrences: Vec<LinkOccurrence>, policy: &dyn SelectionPolicy) -> Resolution {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<Vec<&LinkOccurrence>> = Vec::new();
    for occurrence in &occurrences {
        let slot = *index
            .entry(occurrence.canonical_key.as_str())
            .or_insert_with(|| {
                grouped.push(Vec::new());
                grouped.len() - 1
            });
        grouped[slot].push(occurrence);
    }

    let groups: Vec<DuplicateGroup> = grouped
        .iter()
        .map(|members| {
            let pick = policy.select(members);
            let winner = members.get(pick).unwrap_or(&members[0]);
            DuplicateGroup {
                canonical_key: winner.canonical_key.clone(),
                members: members.iter().map(|m| m.id).collect(),
                selected: winner.id,
            }
        })
        .collect();

    let by_key: HashMap<&str, &DuplicateGroup> = groups
        .iter()
        .map(|group| (group.canonical_key.as_str(), group))
        .collect();

    let links = occurrences
        .iter()
        .map(|occurrence| {
            let group = by_key[occurrence.canonical_key.as_str()];
            let duplicates = if group.members.len() > 1 {
                group
                    .members
                    .iter()
                    .copied()
                    .filter(|id| *id != occurrence.id)
                    .collect()
            } else {
                Vec::new()
            };
            ResolvedLink {
                occurrence: occurrence.clone(),
                duplicates,
                selected: group.selected == occurrence.id,
            }
        })
        .collect();

    Resolution { links, groups }
}

/// Run the whole first stage over one document: extract, canonicalize,
/// attach summaries when the policy wants them, then resolve duplicates.
pub fn analyze(text: &str, policy: &dyn SelectionPolicy) -> Resolution {
    let mut occurrences = extractor::extract(text);
    for occurrence in &mut occurrences {
        occurrence.canonicalize();
    }
    if policy.needs_summaries() {
        summary::attach_summaries(text, &mut occurrences);
    }
    resolve(occurrences, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(id: usize, key: &str, summary: &str) -> LinkOccurrence {
        LinkOccurrence {
            id,
            original_form: format!("https://{key}"),
            start: id * 10,
            end: id * 10 + 5,
            canonical_key: key.to_string(),
            summary: summary.to_string(),
            bytes: id * 10..id * 10 + 6,
        }
    }

    #[test]
    fn equal_keys_share_a_group_and_distinct_keys_do_not() {
        let resolution = resolve(
            vec![
                occurrence(1, "a.com", ""),
                occurrence(2, "b.com", ""),
                occurrence(3, "a.com", ""),
                occurrence(4, "c.com", ""),
            ],
            &FirstOccurrence,
        );

        assert_eq!(resolution.groups.len(), 3);
        let a = resolution.groups.iter().find(|g| g.canonical_key == "a.com").unwrap();
        assert_eq!(a.members, vec![1, 3]);
        assert_eq!(a.selected, 1);

        assert_eq!(resolution.links[0].duplicates, vec![3]);
        assert_eq!(resolution.links[2].duplicates, vec![1]);
        assert!(resolution.links[1].duplicates.is_empty());
    }

    #[test]
    fn every_group_has_exactly_one_selected_member() {
        let occurrences = vec![
            occurrence(1, "a.com", "short"),
            occurrence(2, "a.com", "much longer blurb"),
            occurrence(3, "b.com", ""),
            occurrence(4, "a.com", ""),
        ];
        for policy in [&FirstOccurrence as &dyn SelectionPolicy, &RichestSummary] {
            let resolution = resolve(occurrences.clone(), policy);
            for group in &resolution.groups {
                let selected = resolution
                    .links
                    .iter()
                    .filter(|l| l.occurrence.canonical_key == group.canonical_key && l.selected)
                    .count();
                assert_eq!(selected, 1, "{} / {}", policy.name(), group.canonical_key);
            }
            assert_eq!(resolution.selected().count(), 2);
        }
    }

    #[test]
    fn richest_summary_prefers_longest_then_lowest_id() {
        let a = occurrence(1, "a.com", "short");
        let b = occurrence(2, "a.com", "much longer blurb");
        let c = occurrence(3, "a.com", "much longer blurb");
        assert_eq!(RichestSummary.select(&[&a, &b, &c]), 1);

        let empty1 = occurrence(4, "a.com", "");
        let empty2 = occurrence(5, "a.com", "   ");
        assert_eq!(RichestSummary.select(&[&empty1, &empty2]), 0);

        let blank_but_long = occurrence(6, "a.com", "          ");
        let tiny = occurrence(7, "a.com", "x");
        assert_eq!(RichestSummary.select(&[&blank_but_long, &tiny]), 1);
    }

    #[test]
    fn analyze_groups_the_reference_scenario() {
        let text = "See [guide](https://WWW.Example.com/Doc/) and also https://example.com/doc";
        let resolution = analyze(text, &FirstOccurrence);

        assert_eq!(resolution.links.len(), 2);
        assert_eq!(resolution.groups.len(), 1);
        assert_eq!(resolution.groups[0].canonical_key, "example.com/doc");
        assert_eq!(resolution.groups[0].members, vec![1, 2]);
        assert!(resolution.links.iter().all(|l| l.occurrence.summary.is_empty()));
    }

    #[test]
    fn analyze_with_summaries_picks_the_described_link() {
        let text = "https://example.com/doc\n\nhttps://other.org/x\n\n\
                    [Doc](https://www.example.com/doc/) The product manual, with install steps.";
        let resolution = analyze(text, &RichestSummary);
        let picked: Vec<usize> = resolution.selected().map(|l| l.occurrence.id).collect();
        assert_eq!(picked, vec![2, 3]);
    }
}
