use std::collections::BTreeSet;

use super::{Connector, SchedulePolicy};

/// Returns block indices in the order a tick visits them.
///
/// `uids` lists blocks in insertion order.
pub(super) fn order(
    policy: SchedulePolicy,
    uids: &[&str],
    connectors: &[Connector],
) -> Vec<usize> {
    match policy {
        SchedulePolicy::InsertionOrder => (0..uids.len()).collect(),
        SchedulePolicy::DependencyOrder => dependency_order(uids, connectors),
    }
}

/// Kahn's algorithm, taking the earliest-inserted ready block first.
fn dependency_order(uids: &[&str], connectors: &[Connector]) -> Vec<usize> {
    let index_of = |uid: &str| uids.iter().position(|u| *u == uid);
    let edges: Vec<(usize, usize)> = connectors
        .iter()
        .filter_map(|c| Some((index_of(&c.output().block)?, index_of(&c.input().block)?)))
        .collect();

    let mut in_degree = vec![0_usize; uids.len()];
    for &(_, to) in &edges {
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..uids.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(uids.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &(from, to) in &edges {
            if from == next {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.insert(to);
                }
            }
        }
    }

    let mut visited = vec![false; uids.len()];
    for &i in &order {
        visited[i] = true;
    }
    order.extend((0..uids.len()).filter(|&i| !visited[i]));
    order
}
