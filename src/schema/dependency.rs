//! Foreign-key dependency ordering
//!
//! Tables are ordered so that every table comes after the tables it
//! references (Kahn's algorithm over referenced → referencing edges).
//! When the queue drains early the remaining tables contain a cycle, and a
//! depth-first search recovers one cycle path for the error message.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::TableDescriptor;
use crate::error::{Error, Result};

/// Directed graph over a set of tables
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<Arc<TableDescriptor>>,
    /// nodes[i] references every node in references[i]
    references: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph; duplicate tables keep their first position and
    /// references to tables outside the set are ignored.
    pub fn new(descriptors: impl IntoIterator<Item = Arc<TableDescriptor>>) -> Self {
        let mut nodes: Vec<Arc<TableDescriptor>> = Vec::new();
        for descriptor in descriptors {
            if !nodes.iter().any(|n| n.table == descriptor.table) {
                nodes.push(descriptor);
            }
        }

        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.table.as_str(), i))
            .collect();

        let references = nodes
            .iter()
            .map(|node| {
                let mut targets: Vec<usize> = Vec::new();
                for table in node.dependencies() {
                    if let Some(&target) = index.get(table) {
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
                targets
            })
            .collect();

        Self { nodes, references }
    }

    /// Tables in creation order: referenced tables first.
    pub fn creation_order(&self) -> Result<Vec<Arc<TableDescriptor>>> {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.references.iter().map(Vec::len).collect();

        // referenced -> referencing, in node order
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (from, targets) in self.references.iter().enumerate() {
            for &target in targets {
                dependents[target].push(from);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(next) = queue.pop_front() {
            order.push(self.nodes[next].clone());
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            let path = self.find_cycle(&in_degree).unwrap_or_default();
            return Err(Error::DependencyCycle { path });
        }
        Ok(order)
    }

    /// Tables in drop order: referencing tables first.
    pub fn drop_order(&self) -> Result<Vec<Arc<TableDescriptor>>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }

    /// Depth-first search for a cycle among nodes Kahn could not release.
    fn find_cycle(&self, residual: &[usize]) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn visit(
            graph: &DependencyGraph,
            node: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            marks[node] = Mark::OnStack;
            stack.push(node);
            for &next in &graph.references[node] {
                match marks[next] {
                    Mark::OnStack => {
                        let start = stack.iter().position(|&s| s == next)?;
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|&i| graph.nodes[i].table.clone()).collect();
                        path.push(graph.nodes[next].table.clone());
                        return Some(path);
                    }
                    Mark::Unvisited => {
                        if let Some(path) = visit(graph, next, marks, stack) {
                            return Some(path);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks[node] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for start in 0..self.nodes.len() {
            if residual[start] > 0 && marks[start] == Mark::Unvisited {
                if let Some(path) = visit(self, start, &mut marks, &mut stack) {
                    return Some(path);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Player, Tag, Team, TeamMember};
    use crate::schema::ReferenceEdge;

    fn desc<E: crate::schema::Entity>() -> Arc<TableDescriptor> {
        Arc::new(TableDescriptor::of::<E>().unwrap())
    }

    fn tables(order: &[Arc<TableDescriptor>]) -> Vec<&str> {
        order.iter().map(|d| d.table.as_str()).collect()
    }

    fn position(order: &[&str], table: &str) -> usize {
        order.iter().position(|t| *t == table).unwrap()
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let graph = DependencyGraph::new(vec![desc::<TeamMember>(), desc::<Team>(), desc::<Tag>(), desc::<Player>()]);
        let order = graph.creation_order().unwrap();
        let names = tables(&order);

        assert_eq!(names.len(), 4);
        assert!(position(&names, "players") < position(&names, "teams"));
        assert!(position(&names, "players") < position(&names, "tags"));
        assert!(position(&names, "teams") < position(&names, "team_members"));
    }

    #[test]
    fn test_independent_tables_keep_insertion_order() {
        let graph = DependencyGraph::new(vec![desc::<Player>(), desc::<Tag>(), desc::<Team>()]);
        let order = graph.creation_order().unwrap();
        assert_eq!(tables(&order), vec!["players", "tags", "teams"]);
    }

    #[test]
    fn test_drop_order_is_reversed() {
        let graph = DependencyGraph::new(vec![desc::<Team>(), desc::<Player>()]);
        let order = graph.drop_order().unwrap();
        assert_eq!(tables(&order), vec!["teams", "players"]);
    }

    #[test]
    fn test_cycle_reports_path() {
        let mut players = (*desc::<Player>()).clone();
        players.references.push(ReferenceEdge {
            column: "team_id".into(),
            target_entity: "Team",
            target_table: "teams".into(),
            target_column: "id".into(),
        });

        let graph = DependencyGraph::new(vec![Arc::new(players), desc::<Team>(), desc::<Tag>()]);
        let err = graph.creation_order().unwrap_err();
        match err {
            Error::DependencyCycle { path } => assert_eq!(path, vec!["players", "teams", "players"]),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_self_reference_does_not_block() {
        let mut tags = (*desc::<Tag>()).clone();
        tags.references.push(ReferenceEdge {
            column: "parent_id".into(),
            target_entity: "Tag",
            target_table: "tags".into(),
            target_column: "id".into(),
        });
        let graph = DependencyGraph::new(vec![Arc::new(tags), desc::<Player>()]);
        let order = graph.creation_order().unwrap();
        assert_eq!(tables(&order), vec!["players", "tags"]);
    }
}
