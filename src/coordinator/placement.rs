//! Node selection order
//!
//! Reads scan the node ring starting from a random node so load spreads
//! across replicas. Single-copy writes go to the node holding the fewest
//! files.

use rand::Rng;

/// File count reported by one node, used to rank upload targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLoad {
    pub node_id: usize,
    pub file_count: usize,
}

/// Order upload targets by ascending file count, ties by ascending node id.
pub fn rank_by_load(mut loads: Vec<NodeLoad>) -> Vec<NodeLoad> {
    loads.sort_by_key(|load| (load.file_count, load.node_id));
    loads
}

/// Visit every node id exactly once: `start, start+1, .., len-1, 0, .., start-1`.
pub fn ring_order(start: usize, len: usize) -> impl Iterator<Item = usize> {
    let start = if len == 0 { 0 } else { start % len };
    (0..len).map(move |offset| (start + offset) % len)
}

/// Uniformly random ring start. `len` must be non-zero.
pub fn random_start(len: usize) -> usize {
    rand::thread_rng().gen_range(0..len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(node_id: usize, file_count: usize) -> NodeLoad {
        NodeLoad {
            node_id,
            file_count,
        }
    }

    #[test]
    fn test_rank_by_file_count() {
        let ranked = rank_by_load(vec![load(0, 1), load(1, 0), load(2, 2)]);
        let order: Vec<usize> = ranked.iter().map(|l| l.node_id).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_rank_ties_by_node_id() {
        let ranked = rank_by_load(vec![load(2, 4), load(0, 4), load(1, 7)]);
        let order: Vec<usize> = ranked.iter().map(|l| l.node_id).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_ring_order_wraps() {
        assert_eq!(ring_order(2, 3).collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(ring_order(0, 3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(ring_order(7, 3).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(ring_order(0, 0).count(), 0);
    }

    #[test]
    fn test_ring_visits_each_id_once() {
        for start in 0..5 {
            let mut ids: Vec<usize> = ring_order(start, 5).collect();
            assert_eq!(ids[0], start);
            ids.sort();
            assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_random_start_in_range() {
        for _ in 0..100 {
            assert!(random_start(3) < 3);
        }
    }
}
