//! Cluster-capped selection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::model::CandidateRecord;

/// Keeps at most `max_per_cluster` candidates per `cluster_id`.
#[derive(Debug, Clone, Copy)]
pub struct ClusterSelector {
    max_per_cluster: usize,
}

impl ClusterSelector {
    pub fn new(max_per_cluster: usize) -> Self {
        Self { max_per_cluster }
    }

    /// Within each cluster order by (resolution ascending, id ascending) and
    /// keep the first K. Null resolutions sort last; records without a
    /// cluster id are not selectable.
    pub fn select(&self, records: &[CandidateRecord]) -> BTreeSet<String> {
        let mut clusters: BTreeMap<&str, Vec<&CandidateRecord>> = BTreeMap::new();
        let mut unclustered = 0usize;
        for rec in records {
            match rec.cluster_id.as_deref() {
                Some(cluster) => clusters.entry(cluster).or_default().push(rec),
                None => unclustered += 1,
            }
        }
        if unclustered > 0 {
            log::warn!("{unclustered} candidates have no cluster_id and are skipped");
        }

        let mut selected = BTreeSet::new();
        for members in clusters.values_mut() {
            members.sort_by(|a, b| quality_order(a, b));
            selected.extend(
                members
                    .iter()
                    .take(self.max_per_cluster)
                    .map(|rec| rec.id.clone()),
            );
        }
        log::debug!(
            "selected {} of {} candidates across {} clusters",
            selected.len(),
            records.len(),
            clusters.len()
        );
        selected
    }
}

/// Lower resolution first, then identifier.
fn quality_order(a: &CandidateRecord, b: &CandidateRecord) -> Ordering {
    let by_resolution = match (a.resolution, b.resolution) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_resolution.then_with(|| a.id.cmp(&b.id))
}
