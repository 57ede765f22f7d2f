use std::collections::HashMap;
use std::hash::Hash;

/// A trait for layered, acyclic graphs that can be scored.
///
/// `Node`: The type of node identifiers (e.g., a `(x, y)` map coordinate).
/// `Ctx`: A context object passed to scoring (e.g., the player's current stats).
pub trait LayeredDag<Node, Ctx> {
    /// Return the nodes reachable in one step from `node`.
    ///
    /// Returning an empty list marks `node` as a leaf. Implementations are
    /// expected to stop at their horizon (e.g., the row before a boss) this way.
    fn successors(&self, node: Node, context: &Ctx) -> Vec<Node>;

    /// Calculate the value of visiting `node`.
    /// This allows dynamic weighting based on the provided context.
    fn score(&self, node: Node, context: &Ctx) -> f64;
}

/// Memoized backward induction over a [`LayeredDag`].
///
/// Scores are functions of the context, so memo tables never outlive a single
/// call: every public method builds its own table and drops it on return.
pub struct BackwardInduction;

/// One memo entry: best achievable future value and the successor achieving it.
#[derive(Clone, Copy)]
struct Entry<Node> {
    value: f64,
    next: Option<Node>,
}

impl BackwardInduction {
    /// Pick the candidate with the highest `score + future value`.
    ///
    /// Ties go to the earliest candidate. Returns `None` only when `candidates`
    /// is empty.
    pub fn best_branch<Node, Ctx, G>(
        graph: &G,
        candidates: &[Node],
        context: &Ctx,
    ) -> Option<(Node, f64)>
    where
        Node: Copy + Eq + Hash,
        G: LayeredDag<Node, Ctx>,
    {
        let mut memo: HashMap<Node, Entry<Node>> = HashMap::new();
        let mut best: Option<(Node, f64)> = None;

        for &candidate in candidates {
            let value = graph.score(candidate, context)
                + Self::future(graph, candidate, context, &mut memo).value;
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((candidate, value)),
            }
        }

        best
    }

    /// Best value obtainable strictly after `node` (excluding `node`'s own score).
    pub fn future_value<Node, Ctx, G>(graph: &G, node: Node, context: &Ctx) -> f64
    where
        Node: Copy + Eq + Hash,
        G: LayeredDag<Node, Ctx>,
    {
        let mut memo = HashMap::new();
        Self::future(graph, node, context, &mut memo).value
    }

    /// The full best path starting at `start` (inclusive), and its total value.
    pub fn best_path<Node, Ctx, G>(graph: &G, start: Node, context: &Ctx) -> (Vec<Node>, f64)
    where
        Node: Copy + Eq + Hash,
        G: LayeredDag<Node, Ctx>,
    {
        let mut memo = HashMap::new();
        let total =
            graph.score(start, context) + Self::future(graph, start, context, &mut memo).value;

        let mut path = vec![start];
        let mut current = start;
        while let Some(next) = memo.get(&current).and_then(|e| e.next) {
            path.push(next);
            current = next;
        }
        (path, total)
    }

    fn future<Node, Ctx, G>(
        graph: &G,
        node: Node,
        context: &Ctx,
        memo: &mut HashMap<Node, Entry<Node>>,
    ) -> Entry<Node>
    where
        Node: Copy + Eq + Hash,
        G: LayeredDag<Node, Ctx>,
    {
        if let Some(entry) = memo.get(&node) {
            return *entry;
        }

        let mut entry = Entry {
            value: 0.0,
            next: None,
        };
        for child in graph.successors(node, context) {
            let value =
                graph.score(child, context) + Self::future(graph, child, context, memo).value;
            // Strict comparison: the first successor wins ties.
            if entry.next.is_none() || value > entry.value {
                entry = Entry {
                    value,
                    next: Some(child),
                };
            }
        }

        memo.insert(node, entry);
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // Two rows feeding a single sink:
    //   row 0: 0, 1
    //   row 1: 2 (from 0), 3 (from 0 and 1)
    //   row 2: 4
    struct SmallDag;

    impl LayeredDag<u32, f64> for SmallDag {
        fn successors(&self, node: u32, _context: &f64) -> Vec<u32> {
            match node {
                0 => vec![2, 3],
                1 => vec![3],
                2 | 3 => vec![4],
                _ => vec![],
            }
        }

        fn score(&self, node: u32, bonus: &f64) -> f64 {
            match node {
                2 => 10.0,
                3 => *bonus,
                _ => 1.0,
            }
        }
    }

    #[test]
    fn test_best_branch_follows_future_value() {
        // 0 -> 2 -> 4 = 1 + 10 + 1 beats 1 -> 3 -> 4 = 1 + 0 + 1
        let (node, value) = BackwardInduction::best_branch(&SmallDag, &[0, 1], &0.0).unwrap();
        assert_eq!(node, 0);
        assert_eq!(value, 12.0);
    }

    #[test]
    fn test_context_changes_choice() {
        // With a large bonus on node 3 both roots tie at 22; the first listed wins.
        let (node, value) = BackwardInduction::best_branch(&SmallDag, &[1, 0], &20.0).unwrap();
        assert_eq!(node, 1);
        assert_eq!(value, 22.0);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let (node, _) = BackwardInduction::best_branch(&SmallDag, &[2, 3], &10.0).unwrap();
        assert_eq!(node, 2);
        let (node, _) = BackwardInduction::best_branch(&SmallDag, &[3, 2], &10.0).unwrap();
        assert_eq!(node, 3);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(BackwardInduction::best_branch(&SmallDag, &[], &0.0).is_none());
    }

    #[test]
    fn test_leaf_has_zero_future() {
        assert_eq!(BackwardInduction::future_value(&SmallDag, 4, &0.0), 0.0);
    }

    #[test]
    fn test_best_path() {
        let (path, total) = BackwardInduction::best_path(&SmallDag, 0, &0.0);
        assert_eq!(path, vec![0, 2, 4]);
        assert_eq!(total, 12.0);
    }

    // Full binary lattice: every node at (x, y) reaches (x, y+1) and (x+1, y+1).
    // Without memoization this explodes; count score calls to make sure it doesn't.
    struct Lattice {
        depth: u32,
        calls: Cell<usize>,
    }

    impl LayeredDag<(u32, u32), ()> for Lattice {
        fn successors(&self, (x, y): (u32, u32), _context: &()) -> Vec<(u32, u32)> {
            if y >= self.depth {
                vec![]
            } else {
                vec![(x, y + 1), (x + 1, y + 1)]
            }
        }

        fn score(&self, (x, _y): (u32, u32), _context: &()) -> f64 {
            self.calls.set(self.calls.get() + 1);
            x as f64
        }
    }

    #[test]
    fn test_memoization_bounds_work() {
        let lattice = Lattice {
            depth: 20,
            calls: Cell::new(0),
        };
        let (node, value) = BackwardInduction::best_branch(&lattice, &[(0, 0)], &()).unwrap();
        assert_eq!(node, (0, 0));
        // Always stepping right: 0 + 1 + ... + 20
        assert_eq!(value, 210.0);
        // Each node expanded once, each edge scored once: well under 2^20.
        assert!(lattice.calls.get() < 1000);
    }
}
