//! Node classification and the dashboard view-model.
//!
//! [`ViewModel::build`] turns one batch of validated telemetry into the
//! presentation model: every node gets block/cemented percentages relative to
//! the network maxima, a version label and a [`Category`]. Nodes are split
//! into two partitions, each sorted by cemented percentage (highest first),
//! and the distinct version labels are counted for the version filter.
//!
//! The view-model is rebuilt from scratch on every fetch. Filtering by version
//! ([`ViewModel::filter_by_version`]) only borrows from an existing view-model.

use std::collections::BTreeMap;

use serde::Serialize;

use super::metric::NodeMetric;

/// Cemented percentage below which a node is still bootstrapping.
pub const BOOTSTRAP_THRESHOLD: f64 = 95.0;

/// Which section of the dashboard a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Still catching up: cemented percentage below [`BOOTSTRAP_THRESHOLD`].
    Bootstrapping,
    /// Everything else.
    Other,
}

impl Category {
    /// Classify a cemented percentage.
    pub fn from_cemented_percentage(percentage: f64) -> Self {
        if percentage < BOOTSTRAP_THRESHOLD {
            Category::Bootstrapping
        } else {
            Category::Other
        }
    }

    /// Section heading used by the UI.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Bootstrapping => "Bootstrapping Nodes",
            Category::Other => "Other Nodes",
        }
    }
}

/// A node annotated with its derived display values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedNode {
    pub metric: NodeMetric,
    pub block_percentage: f64,
    pub cemented_percentage: f64,
    pub category: Category,
    pub version_label: String,
}

impl ClassifiedNode {
    fn classify(metric: &NodeMetric, max_block_count: u64, max_cemented_count: u64) -> Self {
        let block_percentage = percentage(metric.block_count, max_block_count);
        let cemented_percentage = percentage(metric.cemented_count, max_cemented_count);
        Self {
            metric: metric.clone(),
            block_percentage,
            cemented_percentage,
            category: Category::from_cemented_percentage(cemented_percentage),
            version_label: metric.version.label(),
        }
    }
}

/// Number of nodes running one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionCount {
    pub label: String,
    pub count: usize,
}

/// Network-wide maxima supplied by the server, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maxima {
    pub block_count: Option<u64>,
    pub cemented_count: Option<u64>,
}

/// The categorized, sorted presentation model for one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewModel {
    /// Nodes below the bootstrap threshold, highest cemented percentage first.
    pub bootstrapping: Vec<ClassifiedNode>,
    /// All other nodes, highest cemented percentage first.
    pub other: Vec<ClassifiedNode>,
    /// Distinct version labels with node counts, label descending (string order).
    pub version_counts: Vec<VersionCount>,
    pub max_block_count: u64,
    pub max_cemented_count: u64,
}

impl ViewModel {
    /// Build the view-model, computing maxima from the input.
    pub fn build(metrics: &[NodeMetric]) -> Self {
        Self::build_with_maxima(metrics, Maxima::default())
    }

    /// Build the view-model using server-supplied maxima where present.
    ///
    /// A supplied maximum smaller than an observed count is raised to that
    /// count, so percentages never exceed 100.
    pub fn build_with_maxima(metrics: &[NodeMetric], maxima: Maxima) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let observed_blocks = metrics.iter().map(|m| m.block_count).max().unwrap_or(0);
        let observed_cemented = metrics.iter().map(|m| m.cemented_count).max().unwrap_or(0);
        let max_block_count = maxima.block_count.map_or(observed_blocks, |m| m.max(observed_blocks));
        let max_cemented_count =
            maxima.cemented_count.map_or(observed_cemented, |m| m.max(observed_cemented));

        let mut bootstrapping = Vec::new();
        let mut other = Vec::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        for metric in metrics {
            let node = ClassifiedNode::classify(metric, max_block_count, max_cemented_count);
            *counts.entry(node.version_label.clone()).or_default() += 1;
            match node.category {
                Category::Bootstrapping => bootstrapping.push(node),
                Category::Other => other.push(node),
            }
        }

        sort_by_cemented(&mut bootstrapping);
        sort_by_cemented(&mut other);

        // Plain string order, reversed: "10.0.0" lands before "2.0.0".
        let version_counts = counts
            .into_iter()
            .rev()
            .map(|(label, count)| VersionCount { label, count })
            .collect();

        Self {
            bootstrapping,
            other,
            version_counts,
            max_block_count,
            max_cemented_count,
        }
    }

    /// Total number of classified nodes.
    pub fn node_count(&self) -> usize {
        self.bootstrapping.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// All nodes in display order: bootstrapping first, then other.
    pub fn nodes(&self) -> impl Iterator<Item = &ClassifiedNode> {
        self.bootstrapping.iter().chain(self.other.iter())
    }

    /// Look up a node by id.
    pub fn find(&self, node_id: &str) -> Option<&ClassifiedNode> {
        self.nodes().find(|n| n.metric.node_id == node_id)
    }

    /// Restrict both partitions to one version label.
    ///
    /// `None` or an empty string means "show all".
    pub fn filter_by_version(&self, selected: Option<&str>) -> FilteredView<'_> {
        let selected = selected.filter(|v| !v.is_empty());
        let keep = |node: &&ClassifiedNode| selected.is_none_or(|v| node.version_label == v);

        FilteredView {
            version: selected.map(str::to_string),
            bootstrapping: self.bootstrapping.iter().filter(keep).collect(),
            other: self.other.iter().filter(keep).collect(),
        }
    }
}

/// A version-filtered view over an existing [`ViewModel`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredView<'a> {
    /// The active version filter, `None` when showing all.
    pub version: Option<String>,
    pub bootstrapping: Vec<&'a ClassifiedNode>,
    pub other: Vec<&'a ClassifiedNode>,
}

impl<'a> FilteredView<'a> {
    pub fn bootstrapping_count(&self) -> usize {
        self.bootstrapping.len()
    }

    pub fn other_count(&self) -> usize {
        self.other.len()
    }

    pub fn len(&self) -> usize {
        self.bootstrapping.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible nodes in display order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a ClassifiedNode> + '_ {
        self.bootstrapping.iter().chain(self.other.iter()).copied()
    }

    /// Node at a display position.
    pub fn get(&self, index: usize) -> Option<&'a ClassifiedNode> {
        if index < self.bootstrapping.len() {
            self.bootstrapping.get(index).copied()
        } else {
            self.other.get(index - self.bootstrapping.len()).copied()
        }
    }
}

/// `count / max * 100` rounded to two decimals; zero when `max` is zero.
///
/// Rounds half away from zero, which for these non-negative values is
/// half-up.
pub fn percentage(count: u64, max: u64) -> f64 {
    if max == 0 {
        return 0.0;
    }
    round2(count as f64 / max as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stable sort, highest cemented percentage first.
fn sort_by_cemented(nodes: &mut [ClassifiedNode]) {
    nodes.sort_by(|a, b| b.cemented_percentage.total_cmp(&a.cemented_percentage));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NodeVersion;

    fn node(id: &str, blocks: u64, cemented: u64, version: NodeVersion) -> NodeMetric {
        NodeMetric::new(id, "::ffff:10.0.0.1", blocks, cemented, version)
    }

    fn release(major: u32) -> NodeVersion {
        NodeVersion::new(major, 0, 0, 0)
    }

    fn sample() -> Vec<NodeMetric> {
        vec![
            node("a", 100, 50, release(2)),
            node("b", 200, 196, release(2)),
            node("c", 150, 190, release(10)),
            node("d", 180, 100, NodeVersion::new(2, 0, 0, 4)),
            node("e", 199, 196, release(10)),
            node("f", 10, 0, release(1)),
        ]
    }

    #[test]
    fn test_worked_example() {
        let vm = ViewModel::build(&[node("1", 100, 50, release(1)), node("2", 200, 196, release(1))]);
        assert_eq!(vm.max_block_count, 200);
        assert_eq!(vm.max_cemented_count, 196);

        assert_eq!(vm.bootstrapping.len(), 1);
        let first = &vm.bootstrapping[0];
        assert_eq!(first.metric.node_id, "1");
        assert_eq!(first.block_percentage, 50.0);
        assert_eq!(first.cemented_percentage, 25.51);
        assert_eq!(first.category, Category::Bootstrapping);

        assert_eq!(vm.other.len(), 1);
        let second = &vm.other[0];
        assert_eq!(second.block_percentage, 100.0);
        assert_eq!(second.cemented_percentage, 100.0);
        assert_eq!(second.category, Category::Other);
    }

    #[test]
    fn test_empty_input() {
        let vm = ViewModel::build(&[]);
        assert!(vm.bootstrapping.is_empty());
        assert!(vm.other.is_empty());
        assert!(vm.version_counts.is_empty());
        assert!(vm.is_empty());
    }

    #[test]
    fn test_zero_counts_yield_zero_percent() {
        let vm = ViewModel::build(&[node("a", 0, 0, release(1)), node("b", 0, 0, release(1))]);
        for n in vm.nodes() {
            assert_eq!(n.block_percentage, 0.0);
            assert_eq!(n.cemented_percentage, 0.0);
            assert_eq!(n.category, Category::Bootstrapping);
        }
        assert_eq!(vm.node_count(), 2);
    }

    #[test]
    fn test_percentages_in_range_and_partition_complete() {
        let metrics = sample();
        let vm = ViewModel::build(&metrics);
        assert_eq!(vm.bootstrapping.len() + vm.other.len(), metrics.len());
        for n in vm.nodes() {
            assert!((0.0..=100.0).contains(&n.cemented_percentage));
            assert!((0.0..=100.0).contains(&n.block_percentage));
        }
        for m in &metrics {
            assert_eq!(vm.nodes().filter(|n| n.metric.node_id == m.node_id).count(), 1);
        }
    }

    #[test]
    fn test_partitions_sorted_descending() {
        let vm = ViewModel::build(&sample());
        for partition in [&vm.bootstrapping, &vm.other] {
            for pair in partition.windows(2) {
                assert!(pair[0].cemented_percentage >= pair[1].cemented_percentage);
            }
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let vm = ViewModel::build(&sample());
        let other: Vec<&str> = vm.other.iter().map(|n| n.metric.node_id.as_str()).collect();
        // b and e are both at 100%, c at 96.94%
        assert_eq!(other, vec!["b", "e", "c"]);
    }

    #[test]
    fn test_threshold_boundary() {
        let vm = ViewModel::build(&[node("edge", 100, 95, release(1)), node("max", 100, 100, release(1))]);
        assert_eq!(vm.find("edge").unwrap().category, Category::Other);

        let vm = ViewModel::build(&[node("below", 100, 9_499, release(1)), node("max", 100, 10_000, release(1))]);
        let below = vm.find("below").unwrap();
        assert_eq!(below.cemented_percentage, 94.99);
        assert_eq!(below.category, Category::Bootstrapping);
    }

    #[test]
    fn test_version_counts_lexicographic_descending() {
        let vm = ViewModel::build(&sample());
        let labels: Vec<(&str, usize)> =
            vm.version_counts.iter().map(|v| (v.label.as_str(), v.count)).collect();
        assert_eq!(
            labels,
            vec![("2.0.0_DB4", 1), ("2.0.0", 2), ("10.0.0", 2), ("1.0.0", 1)]
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let metrics = sample();
        assert_eq!(ViewModel::build(&metrics), ViewModel::build(&metrics));
    }

    #[test]
    fn test_server_maxima() {
        let metrics = [node("a", 50, 50, release(1))];
        let vm = ViewModel::build_with_maxima(
            &metrics,
            Maxima {
                block_count: Some(200),
                cemented_count: Some(100),
            },
        );
        assert_eq!(vm.bootstrapping[0].block_percentage, 25.0);
        assert_eq!(vm.bootstrapping[0].cemented_percentage, 50.0);

        // A stale server maximum never pushes a node above 100%
        let vm = ViewModel::build_with_maxima(
            &metrics,
            Maxima {
                block_count: Some(10),
                cemented_count: None,
            },
        );
        assert_eq!(vm.max_block_count, 50);
        assert_eq!(vm.other[0].block_percentage, 100.0);
    }

    #[test]
    fn test_filter_show_all() {
        let vm = ViewModel::build(&sample());
        for selected in [None, Some("")] {
            let view = vm.filter_by_version(selected);
            assert_eq!(view.bootstrapping_count(), vm.bootstrapping.len());
            assert_eq!(view.other_count(), vm.other.len());
            assert!(view.version.is_none());
        }
    }

    #[test]
    fn test_filter_by_version() {
        let vm = ViewModel::build(&sample());
        let view = vm.filter_by_version(Some("10.0.0"));
        assert_eq!(view.version.as_deref(), Some("10.0.0"));
        assert!(view.nodes().all(|n| n.version_label == "10.0.0"));
        assert_eq!(view.len(), 2);
        assert_eq!(view.bootstrapping_count(), 0);

        let view = vm.filter_by_version(Some("9.9.9"));
        assert!(view.is_empty());
    }

    #[test]
    fn test_filtered_view_get() {
        let vm = ViewModel::build(&sample());
        let view = vm.filter_by_version(None);
        let ordered: Vec<&str> = view.nodes().map(|n| n.metric.node_id.as_str()).collect();
        for (i, id) in ordered.iter().enumerate() {
            assert_eq!(view.get(i).unwrap().metric.node_id, *id);
        }
        assert!(view.get(ordered.len()).is_none());
    }
}
