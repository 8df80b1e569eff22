//! Dependency graph between view inputs and derived artifacts.
//!
//! Built once per session. Evaluation visits artifacts in topological order;
//! invalidation of an input is everything reachable from it.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::view_state::Field;

/// State derived from the view inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    /// Merged runs of the selected instance.
    Dataset,
    /// Bounds for the run selector.
    RunRange,
    Envelope,
    /// Series of the selected run.
    RunSeries,
    Traces,
    Layout,
    Chart,
}

impl Artifact {
    pub const ALL: [Artifact; 7] = [
        Artifact::Dataset,
        Artifact::RunRange,
        Artifact::Envelope,
        Artifact::RunSeries,
        Artifact::Traces,
        Artifact::Layout,
        Artifact::Chart,
    ];
}

/// A vertex of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Input(Field),
    Derived(Artifact),
}

const EDGES: [(Slot, Artifact); 13] = [
    (Slot::Input(Field::Instance), Artifact::Dataset),
    (Slot::Derived(Artifact::Dataset), Artifact::RunRange),
    (Slot::Derived(Artifact::Dataset), Artifact::Envelope),
    (Slot::Derived(Artifact::Dataset), Artifact::RunSeries),
    (Slot::Input(Field::SelectedRun), Artifact::RunSeries),
    // The run range step may reset the selection, so series come after it.
    (Slot::Derived(Artifact::RunRange), Artifact::RunSeries),
    (Slot::Derived(Artifact::RunSeries), Artifact::Traces),
    (Slot::Derived(Artifact::Envelope), Artifact::Traces),
    (Slot::Input(Field::ShowBands), Artifact::Traces),
    (Slot::Derived(Artifact::RunSeries), Artifact::Layout),
    (Slot::Input(Field::Viewport), Artifact::Layout),
    (Slot::Derived(Artifact::Traces), Artifact::Chart),
    (Slot::Derived(Artifact::Layout), Artifact::Chart),
];

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Slot, ()>,
    index: HashMap<Slot, NodeIndex>,
    order: Vec<Artifact>,
    dependencies: HashMap<Artifact, Vec<Slot>>,
}

impl DependencyGraph {
    /// The graph of the interactive view.
    pub fn standard() -> Self {
        Self::from_edges(&EDGES)
    }

    /// # Panics
    /// If the edges contain a cycle.
    fn from_edges(edges: &[(Slot, Artifact)]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let slots = Field::ALL
            .into_iter()
            .map(Slot::Input)
            .chain(Artifact::ALL.into_iter().map(Slot::Derived));
        for slot in slots {
            index.insert(slot, graph.add_node(slot));
        }

        let mut dependencies: HashMap<Artifact, Vec<Slot>> = HashMap::new();
        for &(from, to) in edges {
            graph.add_edge(index[&from], index[&Slot::Derived(to)], ());
            dependencies.entry(to).or_default().push(from);
        }

        let order = toposort(&graph, None)
            .expect("view dependency graph is acyclic")
            .into_iter()
            .filter_map(|node| match graph[node] {
                Slot::Derived(artifact) => Some(artifact),
                Slot::Input(_) => None,
            })
            .collect();

        Self {
            graph,
            index,
            order,
            dependencies,
        }
    }

    /// Artifacts in an order where every dependency comes first.
    pub fn order(&self) -> &[Artifact] {
        &self.order
    }

    pub fn dependencies(&self, artifact: Artifact) -> &[Slot] {
        self.dependencies
            .get(&artifact)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Artifacts that must be recomputed when `field` changes, in evaluation order.
    pub fn invalidated_by(&self, field: Field) -> Vec<Artifact> {
        let start = self.index[&Slot::Input(field)];
        let mut reached = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(node) = bfs.next(&self.graph) {
            if let Slot::Derived(artifact) = self.graph[node] {
                reached.push(artifact);
            }
        }
        self.order
            .iter()
            .copied()
            .filter(|a| reached.contains(a))
            .collect()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::standard()
    }
}
