use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::prelude::*;
use petgraph::graphmap::DiGraphMap;
use rayon::prelude::*;


/// A Dijkstra search from one source over the link arena.  Alongside the cost
/// to reach each node it records, for every node, the set of predecessors
/// that achieve exactly that cost, so that every cost-minimal path (ties
/// included) can be recovered by walking the predecessor lists backwards.
pub struct ShortestPathTree {
    pub source: usize,
    pub dist: Vec<f64>,
    pub preds: Vec<Vec<usize>>,
}

/// Computes the shortest-path tree from `source`.  Edge weights of the graph
/// are link indexes into `costs`; all costs must be non-negative.  Nodes that
/// cannot be reached keep an infinite distance and an empty predecessor list.
pub fn shortest_path_tree(graph: &DiGraphMap<usize, usize>, costs: &[f64], n_nodes: usize,
                          source: usize) -> ShortestPathTree {
    let mut dist = vec![f64::INFINITY; n_nodes];
    let mut preds: Vec<Vec<usize>> = vec![vec![]; n_nodes];
    let mut visited = vec![false; n_nodes];
    let mut visit_next = BinaryHeap::new();
    dist[source] = 0.;
    visit_next.push(MinScored(0., source));
    while let Some(MinScored(node_score, node)) = visit_next.pop() {
        if visited[node] {
            continue;
        }
        visited[node] = true;
        for (_, next, &link_idx) in graph.edges(node) {
            if visited[next] {
                continue;
            }
            let next_score = node_score + costs[link_idx];
            if next_score < dist[next] {
                dist[next] = next_score;
                preds[next] = vec![node];
                visit_next.push(MinScored(next_score, next));
            } else if next_score == dist[next] {
                // an equal-cost way into `next`; keep it as a tie
                preds[next].push(node);
            }
        }
    }
    ShortestPathTree { source, dist, preds }
}

/// Runs Dijkstra from every node and assembles the shortest-path-length
/// matrix F, where F[[node, source]] is the minimal cost to reach `node` from
/// `source` (infinite for unreachable pairs).  The per-source searches are
/// independent, so they are run in parallel.
pub fn all_pairs_shortest_paths(graph: &DiGraphMap<usize, usize>, costs: &[f64], n_nodes: usize)
                                -> (Array2<f64>, Vec<ShortestPathTree>) {
    let trees: Vec<ShortestPathTree> = (0..n_nodes).into_par_iter()
        .map(|source| shortest_path_tree(graph, costs, n_nodes, source))
        .collect();
    // by default, all costs are infinite; we assume no path exists
    let mut spl = Array::ones((n_nodes, n_nodes)) * f64::INFINITY;
    for tree in &trees {
        for (node, &dd) in tree.dist.iter().enumerate() {
            spl[[node, tree.source]] = dd;
        }
    }
    (spl, trees)
}


#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> (DiGraphMap<usize, usize>, Vec<f64>) {
        // 0 --1.0--> 1 --2.0--> 2
        let mut graph = DiGraphMap::new();
        for node in 0..3 {
            graph.add_node(node);
        }
        graph.add_edge(0, 1, 0);
        graph.add_edge(1, 2, 1);
        (graph, vec![1., 2.])
    }

    #[test]
    fn test_line_distances() {
        let (graph, costs) = line_graph();
        let tree = shortest_path_tree(&graph, &costs, 3, 0);
        assert_eq!(tree.dist, vec![0., 1., 3.]);
        assert_eq!(tree.preds[1], vec![0]);
        assert_eq!(tree.preds[2], vec![1]);

        // nothing is reachable backwards from the end of the line
        let tree = shortest_path_tree(&graph, &costs, 3, 2);
        assert_eq!(tree.dist[0], f64::INFINITY);
        assert_eq!(tree.dist[1], f64::INFINITY);
        assert!(tree.preds[0].is_empty());
    }

    #[test]
    fn test_tied_predecessors() {
        // diamond: 0 -> 1 -> 3 and 0 -> 2 -> 3, all unit costs
        let mut graph = DiGraphMap::new();
        for node in 0..4 {
            graph.add_node(node);
        }
        graph.add_edge(0, 1, 0);
        graph.add_edge(0, 2, 1);
        graph.add_edge(1, 3, 2);
        graph.add_edge(2, 3, 3);
        let costs = vec![1.; 4];
        let tree = shortest_path_tree(&graph, &costs, 4, 0);
        assert_eq!(tree.dist[3], 2.);
        let mut preds = tree.preds[3].clone();
        preds.sort();
        assert_eq!(preds, vec![1, 2]);
    }

    #[test]
    fn test_all_pairs_matrix() {
        let (graph, costs) = line_graph();
        let (spl, trees) = all_pairs_shortest_paths(&graph, &costs, 3);
        assert_eq!(trees.len(), 3);
        assert_eq!(spl[[0, 0]], 0.);
        assert_eq!(spl[[1, 0]], 1.);
        assert_eq!(spl[[2, 0]], 3.);
        assert_eq!(spl[[2, 1]], 2.);
        assert_eq!(spl[[0, 2]], f64::INFINITY);
        assert_eq!(spl[[0, 1]], f64::INFINITY);
    }
}
