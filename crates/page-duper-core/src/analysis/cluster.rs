use crate::config::ClusterMode;
use crate::hasher::FuzzyHasher;
use crate::storage::models::PageRecord;
use crate::storage::Database;
use ahash::AHashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Pages whose hashes matched, keyed by the first-seen hash of the group.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub key: String,
    pub records: Vec<PageRecord>,
}

/// Load every distinct hash from the store and group similar ones.
///
/// Every unordered pair of distinct hashes is compared once, so the cost is
/// O(|H|²) comparisons for |H| distinct hashes. That is the dominant cost of
/// the whole pipeline and grows quadratically with the corpus.
pub fn find_similar_pages(
    db: &Database,
    hasher: &dyn FuzzyHasher,
    threshold: u32,
    mode: ClusterMode,
) -> Result<Vec<Cluster>, crate::Error> {
    let hashes = db.distinct_hashes()?;
    info!(
        "Comparing {} distinct page hashes (threshold={}, mode={})...",
        hashes.len(),
        threshold,
        mode
    );

    let mut records_by_hash: AHashMap<String, Vec<PageRecord>> =
        AHashMap::with_capacity(hashes.len());
    for hash in &hashes {
        records_by_hash.insert(hash.clone(), db.records_for_hash(hash)?);
    }

    let start = Instant::now();
    let clusters = cluster_hashes(&hashes, &records_by_hash, hasher, threshold, mode);
    debug!(
        "Clustering completed in {:.2}s: {} clusters",
        start.elapsed().as_secs_f64(),
        clusters.len()
    );
    Ok(clusters)
}

/// Group `hashes` (first-seen order) into clusters of at least two records.
///
/// A hash stored for two or more pages matches itself whenever
/// `compare(h, h) >= threshold`, so byte-identical pages cluster together
/// without a second distinct hash. Thresholds above 100 match nothing.
pub fn cluster_hashes(
    hashes: &[String],
    records_by_hash: &AHashMap<String, Vec<PageRecord>>,
    hasher: &dyn FuzzyHasher,
    threshold: u32,
    mode: ClusterMode,
) -> Vec<Cluster> {
    let record_count = |i: usize| records_by_hash.get(&hashes[i]).map_or(0, Vec::len);
    let self_match =
        |i: usize| record_count(i) >= 2 && hasher.compare(&hashes[i], &hashes[i]) >= threshold;

    let groups = match mode {
        ClusterMode::Transitive => transitive_groups(hashes, hasher, threshold, self_match),
        ClusterMode::FirstMatch => first_match_groups(hashes, hasher, threshold, self_match),
    };

    groups
        .into_iter()
        .filter_map(|members| {
            let records: Vec<PageRecord> = members
                .iter()
                .filter_map(|&i| records_by_hash.get(&hashes[i]))
                .flatten()
                .cloned()
                .collect();
            if records.len() < 2 {
                return None;
            }
            Some(Cluster {
                key: hashes[members[0]].clone(),
                records,
            })
        })
        .collect()
}

/// Connected components of the similarity graph. Only components holding at
/// least one match are returned; members are in first-seen order.
fn transitive_groups(
    hashes: &[String],
    hasher: &dyn FuzzyHasher,
    threshold: u32,
    self_match: impl Fn(usize) -> bool,
) -> Vec<Vec<usize>> {
    let n = hashes.len();
    let mut sets = DisjointSet::new(n);
    let mut matched = vec![false; n];

    for i in 0..n {
        if self_match(i) {
            matched[i] = true;
        }
        for j in (i + 1)..n {
            if hasher.compare(&hashes[i], &hashes[j]) >= threshold {
                sets.union(i, j);
                matched[i] = true;
                matched[j] = true;
            }
        }
    }

    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: AHashMap<usize, usize> = AHashMap::new();
    for i in (0..n).filter(|&i| matched[i]) {
        let root = sets.find(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push(i);
    }
    order
}

/// One bucket per hash that matched anything, holding itself followed by
/// every later hash it matched directly. Not transitive: a hash can appear in
/// several buckets.
fn first_match_groups(
    hashes: &[String],
    hasher: &dyn FuzzyHasher,
    threshold: u32,
    self_match: impl Fn(usize) -> bool,
) -> Vec<Vec<usize>> {
    let n = hashes.len();
    let mut buckets: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        let mut bucket = vec![i];
        for j in (i + 1)..n {
            if hasher.compare(&hashes[i], &hashes[j]) >= threshold {
                bucket.push(j);
            }
        }
        if bucket.len() > 1 || self_match(i) {
            buckets.push(bucket);
        }
    }
    buckets
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hashes are single letters; similarity comes from an explicit table.
    struct TableHasher {
        pairs: Vec<(&'static str, &'static str, u32)>,
    }

    impl FuzzyHasher for TableHasher {
        fn hash(&self, data: &[u8]) -> String {
            String::from_utf8_lossy(data).into_owned()
        }

        fn compare(&self, a: &str, b: &str) -> u32 {
            if a == b {
                return 100;
            }
            self.pairs
                .iter()
                .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
                .map_or(0, |(_, _, s)| *s)
        }
    }

    fn record(path: &str, page: u32, hash: &str) -> PageRecord {
        PageRecord {
            id: 0,
            document_path: path.to_string(),
            page_number: page,
            page_hash: hash.to_string(),
            document_checksum: format!("md5-{}", path),
        }
    }

    fn index(records: &[PageRecord]) -> (Vec<String>, AHashMap<String, Vec<PageRecord>>) {
        let mut hashes = Vec::new();
        let mut by_hash: AHashMap<String, Vec<PageRecord>> = AHashMap::new();
        for r in records {
            if !by_hash.contains_key(&r.page_hash) {
                hashes.push(r.page_hash.clone());
            }
            by_hash.entry(r.page_hash.clone()).or_default().push(r.clone());
        }
        (hashes, by_hash)
    }

    // a~b and b~c, but a and c are unrelated.
    fn chain() -> (TableHasher, Vec<PageRecord>) {
        let hasher = TableHasher {
            pairs: vec![("a", "b", 96), ("b", "c", 97)],
        };
        let records = vec![
            record("/one.pdf", 1, "a"),
            record("/two.pdf", 1, "b"),
            record("/three.pdf", 1, "c"),
            record("/three.pdf", 2, "z"),
        ];
        (hasher, records)
    }

    #[test]
    fn test_transitive_merges_chain() {
        let (hasher, records) = chain();
        let (hashes, by_hash) = index(&records);
        let clusters = cluster_hashes(&hashes, &by_hash, &hasher, 95, ClusterMode::Transitive);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].key, "a");
        let pages: Vec<&str> = clusters[0].records.iter().map(|r| r.page_hash.as_str()).collect();
        assert_eq!(pages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_match_keeps_buckets() {
        let (hasher, records) = chain();
        let (hashes, by_hash) = index(&records);
        let clusters = cluster_hashes(&hashes, &by_hash, &hasher, 95, ClusterMode::FirstMatch);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].key, "a");
        assert_eq!(clusters[0].records.len(), 2);
        assert_eq!(clusters[1].key, "b");
        let second: Vec<&str> = clusters[1].records.iter().map(|r| r.page_hash.as_str()).collect();
        assert_eq!(second, vec!["b", "c"]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (hasher, records) = chain();
        let (hashes, by_hash) = index(&records);
        let clusters = cluster_hashes(&hashes, &by_hash, &hasher, 97, ClusterMode::Transitive);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].key, "b");
        assert_eq!(clusters[0].records.len(), 2);
    }

    #[test]
    fn test_identical_hash_clusters_with_itself() {
        let hasher = TableHasher { pairs: vec![] };
        let records = vec![
            record("/one.pdf", 1, "same"),
            record("/two.pdf", 3, "same"),
            record("/two.pdf", 4, "other"),
        ];
        let (hashes, by_hash) = index(&records);
        for mode in [ClusterMode::Transitive, ClusterMode::FirstMatch] {
            let clusters = cluster_hashes(&hashes, &by_hash, &hasher, 100, mode);
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters[0].key, "same");
            assert_eq!(clusters[0].records.len(), 2);

            let clusters = cluster_hashes(&hashes, &by_hash, &hasher, 101, mode);
            assert!(clusters.is_empty());
        }
    }

    #[test]
    fn test_no_hashes() {
        let hasher = TableHasher { pairs: vec![] };
        let clusters =
            cluster_hashes(&[], &AHashMap::new(), &hasher, 95, ClusterMode::Transitive);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_disjoint_set() {
        let mut sets = DisjointSet::new(5);
        sets.union(0, 1);
        sets.union(3, 4);
        sets.union(1, 4);
        assert_eq!(sets.find(0), sets.find(3));
        assert_ne!(sets.find(0), sets.find(2));
    }
}
