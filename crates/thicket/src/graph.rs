//! Cycle detection for `blocked_by` edges using petgraph.
//!
//! Edges point from the blocked ticket to its blocker. Adding `from -> to`
//! closes a cycle exactly when `from` is already reachable from `to`.

use std::collections::HashMap;

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::cache::Cache;
use crate::domain::{Dependency, TicketId};
use crate::error::{Error, Result};

/// Directed graph of `blocked_by` edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TicketId, ()>,
    node_map: HashMap<TicketId, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from `(from, to)` pairs.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (TicketId, TicketId)>,
    {
        let mut graph = Self::default();
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    fn node(&mut self, id: TicketId) -> NodeIndex {
        if let Some(&node) = self.node_map.get(&id) {
            return node;
        }
        let node = self.graph.add_node(id.clone());
        self.node_map.insert(id, node);
        node
    }

    /// Add an edge. Parallel edges are kept; they don't affect reachability.
    pub fn add_edge(&mut self, from: TicketId, to: TicketId) {
        let from = self.node(from);
        let to = self.node(to);
        self.graph.add_edge(from, to, ());
    }

    /// Number of distinct tickets mentioned by any edge.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if adding `from -> to` would create a cycle.
    ///
    /// Tickets the graph has never seen have no outgoing edges, so an edge
    /// touching one can't close a cycle unless it is a self-edge.
    #[must_use]
    pub fn would_create_cycle(&self, from: &TicketId, to: &TicketId) -> bool {
        if from == to {
            return true;
        }
        let (Some(&from_node), Some(&to_node)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return false;
        };
        algo::has_path_connecting(&self.graph, to_node, from_node, None)
    }
}

/// Check that `dependency` may be added to the cache's current edge set.
///
/// # Errors
///
/// - [`Error::Validation`] for a self-edge or malformed IDs
/// - [`Error::DuplicateDependency`] if the same `(from, to, kind)` exists
/// - [`Error::CircularDependency`] if a `blocked_by` edge would close a cycle
pub fn check_new_edge(cache: &Cache, dependency: &Dependency) -> Result<()> {
    dependency.validate()?;

    let from = &dependency.from_ticket_id;
    let to = &dependency.to_ticket_id;

    if cache.dependency_exists(from, to, dependency.kind)? {
        return Err(Error::DuplicateDependency {
            from: from.clone(),
            to: to.clone(),
            kind: dependency.kind,
        });
    }

    if dependency.is_blocking() {
        let graph = DependencyGraph::from_edges(cache.blocked_by_edges()?);
        if graph.would_create_cycle(from, to) {
            debug!(%from, %to, "Rejected dependency that would create a cycle");
            return Err(Error::CircularDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    Ok(())
}
