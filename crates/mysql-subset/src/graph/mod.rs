//! Table-level foreign key graph.
//!
//! Built once from the introspector's edge list and immutable afterwards.
//! Each edge is indexed twice: as an outgoing reference on the child table
//! (to find a row's parent) and as an incoming reference on the parent table
//! (to find the rows that point at a value). Cycles are allowed; the closure
//! builder handles them through row-key deduplication.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::InsertOrder;
use crate::core::ForeignKeyEdge;

/// Outgoing foreign key of a table: `column -> parent_table.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub parent_table: String,
    /// Local referencing column.
    pub column: String,
    pub parent_column: String,
}

/// Incoming foreign key of a table: `child_table.child_column -> column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub child_table: String,
    pub child_column: String,
    /// Local referenced column.
    pub column: String,
}

/// One table in the load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStep {
    pub table: String,

    /// Load this table with foreign key checks disabled. Set for tables
    /// that reference themselves or sit on a dependency cycle.
    pub relax_constraints: bool,
}

/// Directed foreign key graph over tables.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    references: HashMap<String, Vec<ParentRef>>,
    referenced_by: HashMap<String, Vec<ChildRef>>,
    edges: Vec<ForeignKeyEdge>,
}

impl RelationshipGraph {
    /// Build the graph from a flat edge list.
    pub fn from_edges(edges: Vec<ForeignKeyEdge>) -> Self {
        let mut references: HashMap<String, Vec<ParentRef>> = HashMap::new();
        let mut referenced_by: HashMap<String, Vec<ChildRef>> = HashMap::new();

        for edge in &edges {
            references
                .entry(edge.child_table.clone())
                .or_default()
                .push(ParentRef {
                    parent_table: edge.parent_table.clone(),
                    column: edge.child_column.clone(),
                    parent_column: edge.parent_column.clone(),
                });
            referenced_by
                .entry(edge.parent_table.clone())
                .or_default()
                .push(ChildRef {
                    child_table: edge.child_table.clone(),
                    child_column: edge.child_column.clone(),
                    column: edge.parent_column.clone(),
                });
        }

        Self {
            references,
            referenced_by,
            edges,
        }
    }

    /// Outgoing foreign keys of `table`.
    pub fn parents_of(&self, table: &str) -> &[ParentRef] {
        self.references.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming foreign keys of `table`.
    pub fn children_of(&self, table: &str) -> &[ChildRef] {
        self.referenced_by
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of outgoing foreign key edges of `table`.
    pub fn outgoing_count(&self, table: &str) -> usize {
        self.parents_of(table).len()
    }

    /// Whether `table` has a foreign key to itself.
    pub fn is_self_referencing(&self, table: &str) -> bool {
        self.parents_of(table).iter().any(|p| p.parent_table == table)
    }

    /// All edges, in discovery order.
    pub fn edges(&self) -> &[ForeignKeyEdge] {
        &self.edges
    }

    /// Number of foreign key edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Every table that appears on either end of an edge, sorted.
    pub fn tables(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .references
            .keys()
            .chain(self.referenced_by.keys())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Spelling of `name` as the catalog reports it.
    ///
    /// Lookups are exact, so a table named in a different case than the
    /// catalog would have no edges. Returns `None` when no table on any
    /// edge matches, ignoring case.
    pub fn resolve_table(&self, name: &str) -> Option<&str> {
        let known = self.references.keys().chain(self.referenced_by.keys());
        known
            .clone()
            .find(|t| t.as_str() == name)
            .or_else(|| known.filter(|t| t.eq_ignore_ascii_case(name)).min())
            .map(String::as_str)
    }

    /// Order `tables` for loading.
    ///
    /// `tables` is expected in discovery order; [`InsertOrder::EdgeCount`]
    /// keeps that order among tables with equal edge counts.
    pub fn insert_plan(&self, tables: &[String], order: InsertOrder) -> Vec<InsertStep> {
        match order {
            InsertOrder::EdgeCount => self.edge_count_order(tables),
            InsertOrder::Topological => self.topological_order(tables),
        }
    }

    fn edge_count_order(&self, tables: &[String]) -> Vec<InsertStep> {
        let mut ordered: Vec<&String> = tables.iter().collect();
        ordered.sort_by_key(|t| self.outgoing_count(t));
        ordered
            .into_iter()
            .map(|t| InsertStep {
                table: t.clone(),
                relax_constraints: false,
            })
            .collect()
    }

    /// Kahn's algorithm over parent -> child dependencies restricted to
    /// `tables`. When no table is ready, the blocking table with the fewest
    /// outgoing edges is forced out with relaxed constraints, which breaks
    /// the cycle it sits on. Ties break by name.
    fn topological_order(&self, tables: &[String]) -> Vec<InsertStep> {
        let members: BTreeSet<&str> = tables.iter().map(String::as_str).collect();

        let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&str, usize> = members.iter().map(|t| (*t, 0)).collect();

        for &child in &members {
            let parents: BTreeSet<&str> = self
                .parents_of(child)
                .iter()
                .map(|p| p.parent_table.as_str())
                .filter(|p| *p != child && members.contains(p))
                .collect();
            for parent in parents {
                dependents.entry(parent).or_default().insert(child);
                if let Some(d) = in_degree.get_mut(child) {
                    *d += 1;
                }
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(t, _)| *t)
            .collect();
        let mut pending: BTreeSet<&str> = members.clone();
        let mut plan = Vec::with_capacity(members.len());

        while !pending.is_empty() {
            let (current, forced) = match ready.pop_first() {
                Some(t) => (t, false),
                None => {
                    // Every pending table waits on another: a cycle. Only a
                    // table still blocking a pending dependent can break it.
                    let blocks = |t: &str| {
                        dependents
                            .get(t)
                            .is_some_and(|ds| ds.iter().any(|d| pending.contains(d)))
                    };
                    let Some(t) = pending
                        .iter()
                        .filter(|t| blocks(**t))
                        .min_by_key(|t| (self.outgoing_count(t), **t))
                        .or_else(|| pending.first())
                        .copied()
                    else {
                        break;
                    };
                    (t, true)
                }
            };
            pending.remove(current);

            plan.push(InsertStep {
                table: current.to_string(),
                relax_constraints: forced || self.is_self_referencing(current),
            });

            if let Some(children) = dependents.get(current) {
                for &child in children {
                    if !pending.contains(child) {
                        continue;
                    }
                    if let Some(d) = in_degree.get_mut(child) {
                        *d = d.saturating_sub(1);
                        if *d == 0 {
                            ready.insert(child);
                        }
                    }
                }
            }
        }

        plan
    }
}
