//! CFG traversal orders.
//!
//! - [`postorder`] - Depth-first search with post-order visitation
//! - [`reverse_postorder`] - Reverse post-order (the iteration order for forward data flow)
//!
//! Both are iterative, so very large functions cannot overflow the stack, and
//! both return collected vectors since the order requires a full traversal
//! anyway. Blocks unreachable from the start are not part of the result.

use crate::machine::BlockId;

/// A graph whose nodes are basic blocks.
pub trait Successors {
    /// Number of node slots; every `BlockId` passed in is below this.
    fn node_count(&self) -> usize;

    /// The successors of `node`, in edge order.
    fn successors(&self, node: BlockId) -> &[BlockId];
}

/// Computes the postorder traversal of blocks reachable from `start`.
///
/// A block is emitted after all the blocks reachable through its successor
/// edges that were not already on the DFS path. Successors are explored in
/// edge order.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V)
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: BlockId) -> Vec<BlockId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;

                stack.push((node, State::Exit));

                // Reverse push so the first successor is explored first
                for &succ in graph.successors(node).iter().rev() {
                    if succ.index() < node_count && !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse postorder traversal of blocks reachable from `start`.
///
/// In reverse postorder every block comes before its successors except along
/// back edges, so a forward analysis sees as many predecessors as possible
/// already processed when it reaches a block.
pub fn reverse_postorder<G: Successors>(graph: &G, start: BlockId) -> Vec<BlockId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}
