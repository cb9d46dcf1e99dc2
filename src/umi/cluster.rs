use std::collections::VecDeque;
use std::str::FromStr;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

///////////////////////////////
/// Distinct sequence -> number of times seen. Insertion order is used to break ties
pub type SequenceCounts = IndexMap<Vec<u8>, u64>;

///////////////////////////////
/// A group of sequences believed to come from the same molecule/barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub canonical: Vec<u8>,
    //Canonical first, then by decreasing weight
    pub members: Vec<Vec<u8>>,
    pub total_weight: u64,
}

///////////////////////////////
/// Available clustering methods. The names follow UMI-tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ClusterMethod {
    #[strum(to_string = "unique")]
    Unique,
    #[strum(to_string = "percentile")]
    Percentile,
    #[strum(to_string = "cluster")]
    Cluster,
    #[strum(to_string = "adjacency")]
    Adjacency,
    #[strum(to_string = "directional")]
    Directional,
}

impl FromStr for ClusterMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_lowercase().as_str() {
            "unique" => ClusterMethod::Unique,
            "percentile" => ClusterMethod::Percentile,
            "cluster" => ClusterMethod::Cluster,
            "adjacency" => ClusterMethod::Adjacency,
            "directional" => ClusterMethod::Directional,
            _ => return Err(format!("Unsupported clustering method: {}", s)),
        };
        Ok(method)
    }
}

impl ClusterMethod {
    ///////////////////////////////
    /// Partition the sequences into clusters. Sequences are neighbours if they have the same
    /// length and differ in at most `threshold` positions.
    ///
    /// Every input sequence ends up in exactly one cluster, except for `percentile` which
    /// discards low-count sequences instead of merging them.
    /// Clusters are returned in order of decreasing weight of their canonical sequence
    pub fn cluster(&self, counts: &SequenceCounts, threshold: u32) -> Vec<Cluster> {
        if counts.is_empty() {
            return Vec::new();
        }

        let graph = SequenceGraph::new(counts);
        let mut groups: Vec<Vec<usize>> = match self {
            ClusterMethod::Unique => graph.order.iter().map(|&i| vec![i]).collect(),
            ClusterMethod::Percentile => graph.group_percentile(),
            ClusterMethod::Cluster => {
                let adj = graph.undirected_edges(threshold);
                graph
                    .components(&adj)
                    .into_iter()
                    .map(|c| graph.sorted_by_weight(c))
                    .collect()
            }
            ClusterMethod::Adjacency => {
                let adj = graph.undirected_edges(threshold);
                let components = graph.components(&adj);
                graph.group_adjacency(components, &adj)
            }
            ClusterMethod::Directional => {
                let adj = graph.directional_edges(threshold);
                let components = graph.components(&adj);
                graph.group_directional(components)
            }
        };

        groups.sort_by_key(|group| graph.rank[group[0]]);
        groups
            .into_iter()
            .map(|group| graph.to_cluster(&group))
            .collect()
    }
}

///////////////////////////////
/// Number of mismatching positions; None if the lengths differ
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32)
}

///////////////////////////////
/// Check if two sequences are within the given Hamming distance. Gives up at the first
/// mismatch over the limit
#[inline(always)]
pub fn within_distance(a: &[u8], b: &[u8], max_distance: u32) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut mismatches = 0;
    for (x, y) in a.iter().zip(b) {
        if x != y {
            mismatches += 1;
            if mismatches > max_distance {
                return false;
            }
        }
    }
    true
}

///////////////////////////////
/// Sequences as nodes, indexed in insertion order
struct SequenceGraph<'a> {
    seqs: Vec<&'a [u8]>,
    counts: Vec<u64>,
    //Node indices by decreasing count; ties keep insertion order
    order: Vec<usize>,
    //Position of each node in `order`
    rank: Vec<usize>,
}

impl<'a> SequenceGraph<'a> {
    fn new(input: &'a SequenceCounts) -> SequenceGraph<'a> {
        let seqs: Vec<&[u8]> = input.keys().map(|k| k.as_slice()).collect();
        let counts: Vec<u64> = input.values().copied().collect();

        let mut order: Vec<usize> = (0..seqs.len()).collect();
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));

        let mut rank = vec![0; seqs.len()];
        for (pos, &node) in order.iter().enumerate() {
            rank[node] = pos;
        }

        SequenceGraph {
            seqs,
            counts,
            order,
            rank,
        }
    }

    fn len(&self) -> usize {
        self.seqs.len()
    }

    fn sorted_by_weight(&self, mut nodes: Vec<usize>) -> Vec<usize> {
        nodes.sort_by_key(|&n| self.rank[n]);
        nodes
    }

    fn to_cluster(&self, group: &[usize]) -> Cluster {
        Cluster {
            canonical: self.seqs[group[0]].to_vec(),
            members: group.iter().map(|&n| self.seqs[n].to_vec()).collect(),
            total_weight: group.iter().map(|&n| self.counts[n]).sum(),
        }
    }

    ///////////////////////////////
    /// All pairs (i, j), i < j, within the threshold
    fn neighbour_pairs(&self, threshold: u32) -> Vec<(usize, usize)> {
        //Distinct sequences cannot be at distance 0
        if threshold == 0 || self.len() < 2 {
            return Vec::new();
        }

        //Pick whichever is cheaper: all-vs-all, or looking up every possible variant
        let n = self.len() as f64;
        let cost_pairwise = n * n / 2.0;
        let cost_variants = n * self.num_variants_per_node(threshold);
        if cost_variants < cost_pairwise {
            self.neighbour_pairs_by_variants(threshold)
        } else {
            self.neighbour_pairs_pairwise(threshold)
        }
    }

    fn neighbour_pairs_pairwise(&self, threshold: u32) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.len() {
            for j in (i + 1)..self.len() {
                if within_distance(self.seqs[i], self.seqs[j], threshold) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn alphabet(&self) -> Vec<u8> {
        let mut seen = [false; 256];
        for seq in &self.seqs {
            for &b in seq.iter() {
                seen[b as usize] = true;
            }
        }
        (0..=255u8).filter(|&b| seen[b as usize]).collect()
    }

    fn num_variants_per_node(&self, threshold: u32) -> f64 {
        let max_len = self.seqs.iter().map(|s| s.len()).max().unwrap_or(0) as f64;
        let subs = (self.alphabet().len().max(1) - 1) as f64;
        let mut total = 0.0;
        let mut choose = 1.0;
        for k in 1..=threshold {
            let k = k as f64;
            choose = choose * (max_len - k + 1.0) / k;
            if choose <= 0.0 {
                break;
            }
            total += choose * subs.powf(k);
        }
        total
    }

    ///////////////////////////////
    /// Generate every sequence within the threshold of each node and look it up. Each variant
    /// is generated once, by substituting increasing positions
    fn neighbour_pairs_by_variants(&self, threshold: u32) -> Vec<(usize, usize)> {
        let index: FxHashMap<&[u8], usize> = self
            .seqs
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, i))
            .collect();
        let alphabet = self.alphabet();

        let mut pairs = Vec::new();
        for i in 0..self.len() {
            let mut buf = self.seqs[i].to_vec();
            let mut found = Vec::new();
            substitute_positions(&mut buf, 0, threshold, &alphabet, &index, &mut found);
            for j in found {
                if i < j {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    fn undirected_edges(&self, threshold: u32) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.len()];
        for (i, j) in self.neighbour_pairs(threshold) {
            adj[i].push(j);
            adj[j].push(i);
        }
        for list in adj.iter_mut() {
            list.sort_unstable();
        }
        adj
    }

    ///////////////////////////////
    /// Edge a -> b if count(a) >= 2*count(b) - 1. A node can thus absorb neighbours with at most
    /// about half its count, but never a comparably abundant one
    fn directional_edges(&self, threshold: u32) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.len()];
        for (i, j) in self.neighbour_pairs(threshold) {
            if self.counts[i] >= self.counts[j].saturating_mul(2).saturating_sub(1) {
                adj[i].push(j);
            }
            if self.counts[j] >= self.counts[i].saturating_mul(2).saturating_sub(1) {
                adj[j].push(i);
            }
        }
        for list in adj.iter_mut() {
            list.sort_unstable();
        }
        adj
    }

    ///////////////////////////////
    /// Walk nodes by decreasing count; every node not yet reached starts a breadth-first search.
    /// With directed edges, a search may reach nodes that an earlier search already claimed
    fn components(&self, adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let mut found = vec![false; self.len()];
        let mut visited_in = vec![usize::MAX; self.len()];
        let mut components = Vec::new();

        for &start in &self.order {
            if found[start] {
                continue;
            }
            let search_id = components.len();
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            visited_in[start] = search_id;

            while let Some(node) = queue.pop_front() {
                for &next in &adj[node] {
                    if visited_in[next] != search_id {
                        visited_in[next] = search_id;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }

            for &node in &component {
                found[node] = true;
            }
            components.push(component);
        }
        components
    }

    fn group_directional(&self, components: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        let mut observed = vec![false; self.len()];
        let mut groups = Vec::with_capacity(components.len());

        for component in components {
            let group: Vec<usize> = self
                .sorted_by_weight(component)
                .into_iter()
                .filter(|&n| !observed[n])
                .collect();
            for &n in &group {
                observed[n] = true;
            }
            if !group.is_empty() {
                groups.push(group);
            }
        }
        groups
    }

    ///////////////////////////////
    /// Split each component around the fewest top-count nodes whose neighbourhoods cover it.
    /// Every other node joins the first lead it is adjacent to
    fn group_adjacency(&self, components: Vec<Vec<usize>>, adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let mut groups = Vec::new();

        for component in components {
            if component.len() == 1 {
                groups.push(component);
                continue;
            }

            let sorted = self.sorted_by_weight(component);
            let leads = best_min_account(&sorted, adj);

            let mut observed: FxHashSet<usize> = leads.iter().copied().collect();
            for &lead in leads {
                let mut group = vec![lead];
                for &next in &adj[lead] {
                    if observed.insert(next) {
                        group.push(next);
                    }
                }
                group[1..].sort_by_key(|&n| self.rank[n]);
                groups.push(group);
            }
        }
        groups
    }

    ///////////////////////////////
    /// Keep sequences with a count over 1% of the median count, without merging anything
    fn group_percentile(&self) -> Vec<Vec<usize>> {
        if self.len() == 1 {
            return vec![vec![0]];
        }
        let threshold = median(&self.counts) / 100.0;
        self.order
            .iter()
            .filter(|&&n| self.counts[n] as f64 > threshold)
            .map(|&n| vec![n])
            .collect()
    }
}

///////////////////////////////
/// Smallest prefix of the count-sorted component that, together with its neighbours, covers the
/// whole component
fn best_min_account<'b>(sorted: &'b [usize], adj: &[Vec<usize>]) -> &'b [usize] {
    let mut covered: FxHashSet<usize> = FxHashSet::default();
    for (i, &lead) in sorted.iter().enumerate() {
        covered.insert(lead);
        covered.extend(adj[lead].iter().copied());
        if sorted.iter().all(|n| covered.contains(n)) {
            return &sorted[..=i];
        }
    }
    sorted
}

fn substitute_positions(
    buf: &mut Vec<u8>,
    from: usize,
    remaining: u32,
    alphabet: &[u8],
    index: &FxHashMap<&[u8], usize>,
    found: &mut Vec<usize>,
) {
    for pos in from..buf.len() {
        let original = buf[pos];
        for &b in alphabet {
            if b == original {
                continue;
            }
            buf[pos] = b;
            if let Some(&j) = index.get(buf.as_slice()) {
                found.push(j);
            }
            if remaining > 1 {
                substitute_positions(buf, pos + 1, remaining - 1, alphabet, index, found);
            }
        }
        buf[pos] = original;
    }
}

fn median(values: &[u64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}
