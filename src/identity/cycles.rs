//! Simple-cycle enumeration over arena indices.
//!
//! Johnson's algorithm with an explicit stack, so deep chains never grow
//! the call stack. Every elementary cycle is reported exactly once, rotated
//! so that it starts at its smallest index. Work between two reported
//! cycles is bounded by the size of the graph.

/// Hard ceiling on reported cycles. Dense adversarial graphs can hold an
/// exponential number of elementary cycles.
pub const MAX_REPORTED_CYCLES: usize = 1024;

/// Hard ceiling on successor visits across one enumeration.
pub const MAX_SEARCH_STEPS: usize = 1 << 22;

/// Enumerate elementary cycles of the graph given by `successors`
/// (one sorted, deduplicated successor list per index).
pub fn simple_cycles(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    simple_cycles_bounded(successors, MAX_REPORTED_CYCLES, MAX_SEARCH_STEPS)
}

/// [`simple_cycles`] with explicit ceilings. The search stops, keeping what
/// it has found, once either ceiling is reached. Successor ids outside the
/// graph are ignored.
pub fn simple_cycles_bounded(
    successors: &[Vec<usize>],
    max_cycles: usize,
    max_steps: usize,
) -> Vec<Vec<usize>> {
    let n = successors.len();
    let mut predecessors = vec![Vec::new(); n];
    for (from, succ) in successors.iter().enumerate() {
        for &to in succ.iter().filter(|&&to| to < n) {
            predecessors[to].push(from);
        }
    }

    let mut cycles = Vec::new();
    let mut steps = 0usize;
    // Nodes >= start that can walk back to start.
    let mut member = vec![false; n];
    let mut blocked = vec![false; n];
    // Johnson's B-lists: nodes to unblock once the keyed node is unblocked.
    let mut waiting: Vec<Vec<usize>> = vec![Vec::new(); n];

    for start in 0..n {
        if successors[start].is_empty() {
            continue;
        }

        let mut touched = vec![start];
        let mut pending = vec![start];
        member[start] = true;
        while let Some(v) = pending.pop() {
            for &p in &predecessors[v] {
                if p > start && !member[p] {
                    member[p] = true;
                    touched.push(p);
                    pending.push(p);
                }
            }
        }

        // (node, index of the next successor to try, closed a cycle)
        let mut stack: Vec<(usize, usize, bool)> = vec![(start, 0, false)];
        let mut path = vec![start];
        blocked[start] = true;

        while let Some(frame) = stack.last_mut() {
            let (node, next, _) = *frame;
            if next < successors[node].len() {
                frame.1 += 1;
                steps += 1;
                if steps > max_steps {
                    log::warn!("cycle enumeration stopped after {} steps", max_steps);
                    return cycles;
                }
                let succ = successors[node][next];
                if succ >= n || !member[succ] {
                    continue;
                }
                if succ == start {
                    frame.2 = true;
                    cycles.push(path.clone());
                    if cycles.len() >= max_cycles {
                        log::warn!("cycle enumeration stopped at {} cycles", max_cycles);
                        return cycles;
                    }
                } else if !blocked[succ] {
                    blocked[succ] = true;
                    stack.push((succ, 0, false));
                    path.push(succ);
                }
            } else {
                let closed = frame.2;
                stack.pop();
                path.pop();
                if closed {
                    unblock(node, &mut blocked, &mut waiting);
                } else {
                    // Stays blocked until a successor is freed.
                    for &succ in &successors[node] {
                        if succ < n && member[succ] && !waiting[succ].contains(&node) {
                            waiting[succ].push(node);
                        }
                    }
                }
                if let Some(parent) = stack.last_mut() {
                    parent.2 |= closed;
                }
            }
        }

        for v in touched {
            member[v] = false;
            blocked[v] = false;
            waiting[v].clear();
        }
    }

    cycles
}

fn unblock(node: usize, blocked: &mut [bool], waiting: &mut [Vec<usize>]) {
    let mut pending = vec![node];
    while let Some(v) = pending.pop() {
        if blocked[v] {
            blocked[v] = false;
            pending.append(&mut waiting[v]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_has_one_cycle() {
        let succ = vec![vec![1], vec![2], vec![0]];
        assert_eq!(simple_cycles(&succ), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_acyclic_has_none() {
        let succ = vec![vec![1, 2], vec![2], vec![]];
        assert!(simple_cycles(&succ).is_empty());
    }

    #[test]
    fn test_finds_every_cycle_not_just_first() {
        // 0 -> 1 -> 0, 1 -> 2 -> 1, 0 -> 2 -> 0 and the two 3-cycles through all nodes.
        let succ = vec![vec![1, 2], vec![0, 2], vec![0, 1]];
        let mut cycles = simple_cycles(&succ);
        cycles.sort();
        assert_eq!(
            cycles,
            vec![vec![0, 1], vec![0, 1, 2], vec![0, 2], vec![0, 2, 1], vec![1, 2]]
        );
    }

    #[test]
    fn test_self_loop() {
        let succ = vec![vec![0], vec![]];
        assert_eq!(simple_cycles(&succ), vec![vec![0]]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let n = 200_000;
        let mut succ: Vec<Vec<usize>> = (0..n).map(|i| vec![i + 1]).collect();
        succ[n - 1] = vec![0];
        let cycles = simple_cycles(&succ);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), n);
    }

    /// 0 -> 1, 1 -> 0 and into a complete digraph on 2..=k whose nodes all
    /// lead back to 1. From start 0 none of those paths can close a cycle.
    fn fan_into_clique(k: usize) -> Vec<Vec<usize>> {
        let mut succ = vec![vec![1]];
        succ.push((0..=k).filter(|&v| v != 1).collect());
        for v in 2..=k {
            succ.push((1..=k).filter(|&w| w != v).collect());
        }
        succ
    }

    #[test]
    fn test_dense_graph_stays_fast() {
        let succ = fan_into_clique(16);
        let started = std::time::Instant::now();
        let cycles = simple_cycles(&succ);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(cycles.len(), MAX_REPORTED_CYCLES);
        assert_eq!(cycles[0], vec![0, 1]);
        assert!(cycles[1..].iter().all(|c| c[0] == 1));
    }

    #[test]
    fn test_step_ceiling_stops_search() {
        let succ = fan_into_clique(16);
        let cycles = simple_cycles_bounded(&succ, usize::MAX, 50);
        assert!(cycles.len() < MAX_REPORTED_CYCLES);
    }

    #[test]
    fn test_out_of_range_successor_is_ignored() {
        let succ = vec![vec![1, 7], vec![0]];
        assert_eq!(simple_cycles(&succ), vec![vec![0, 1]]);
    }
}
