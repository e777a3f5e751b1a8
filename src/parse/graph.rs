//! petgraph-based directed graph wrapper for one workflow scope.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::types::WorkflowRawData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLabel {
    pub edge_id: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

pub struct WorkflowGraph {
    pub graph: DiGraph<String, EdgeLabel>,
    pub node_indices: HashMap<String, NodeIndex>,
    /// Node ids in declaration order.
    order: Vec<String>,
}

impl WorkflowGraph {
    /// Build the graph for one scope. Edges naming unknown nodes are left out;
    /// reporting them is the assembler's job.
    pub fn build(raw: &WorkflowRawData) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut order = Vec::with_capacity(raw.nodes.len());

        for node in &raw.nodes {
            if node_indices.contains_key(&node.id) {
                continue;
            }
            let idx = graph.add_node(node.id.clone());
            node_indices.insert(node.id.clone(), idx);
            order.push(node.id.clone());
        }

        for edge in &raw.edges {
            let source = node_indices.get(&edge.source_node_id);
            let target = node_indices.get(&edge.target_node_id);
            if let (Some(&s), Some(&t)) = (source, target) {
                graph.add_edge(
                    s,
                    t,
                    EdgeLabel {
                        edge_id: edge.id.clone(),
                        source_handle: edge.source_handle_id.clone(),
                        target_handle: edge.target_handle_id.clone(),
                    },
                );
            }
        }

        WorkflowGraph {
            graph,
            node_indices,
            order,
        }
    }

    pub fn successors(&self, node_id: &str) -> Vec<(&str, &EdgeLabel)> {
        let Some(&idx) = self.node_indices.get(node_id) else {
            return vec![];
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].as_str(), e.weight()))
            .collect()
    }

    pub fn predecessors(&self, node_id: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(node_id) else {
            return vec![];
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    pub fn incoming_count(&self, node_id: &str) -> usize {
        self.predecessors(node_id).len()
    }

    pub fn outgoing_count(&self, node_id: &str) -> usize {
        self.successors(node_id).len()
    }

    /// Nodes without incoming edges, in declaration order.
    pub fn entrypoints(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.incoming_count(id) == 0)
            .map(String::as_str)
            .collect()
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}
