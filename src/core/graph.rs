//! Dependency graph built from a pipeline's task map

use crate::core::{Pipeline, Task};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors raised while building a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cannot build a graph from a pipeline with no tasks")]
    Empty,

    #[error("task '{0}' depends on itself")]
    SelfDependency(String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Task graph with edges pointing from a dependency to its dependents
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Task name -> task
    pub nodes: HashMap<String, Task>,

    /// Dependency -> tasks that depend on it
    pub adjacency: HashMap<String, Vec<String>>,

    /// Number of distinct dependencies per task
    pub indegree: HashMap<String, usize>,
}

impl Graph {
    /// Build the graph for a pipeline, rejecting dangling or cyclic dependencies
    pub fn build(pipeline: &Pipeline) -> Result<Self, GraphError> {
        if pipeline.tasks.is_empty() {
            return Err(GraphError::Empty);
        }

        let count = pipeline.tasks.len();
        let mut graph = Graph {
            nodes: HashMap::with_capacity(count),
            adjacency: HashMap::with_capacity(count),
            indegree: HashMap::with_capacity(count),
        };

        // Sorted for deterministic error reporting and adjacency order
        for name in pipeline.task_names() {
            let task = &pipeline.tasks[name];
            let mut seen = HashSet::with_capacity(task.dependencies.len());
            let mut degree = 0;

            for dependency in &task.dependencies {
                if dependency == name {
                    return Err(GraphError::SelfDependency(name.to_string()));
                }
                if !pipeline.tasks.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        task: name.to_string(),
                        dependency: dependency.clone(),
                    });
                }
                if !seen.insert(dependency.as_str()) {
                    continue;
                }

                degree += 1;
                graph
                    .adjacency
                    .entry(dependency.clone())
                    .or_default()
                    .push(name.to_string());
            }

            graph.nodes.insert(name.to_string(), task.clone());
            graph.indegree.insert(name.to_string(), degree);
        }

        if let Some(path) = graph.find_cycle() {
            return Err(GraphError::Cycle { path });
        }

        Ok(graph)
    }

    /// Number of tasks in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tasks that depend directly on `name`
    pub fn dependents(&self, name: &str) -> &[String] {
        self.adjacency.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks with no dependencies, sorted
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| name.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Topological levels: every task appears one level after its deepest dependency
    ///
    /// Tasks caught in a cycle are left out.
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut remaining = self.indegree.clone();
        let mut levels = Vec::new();
        let mut current = self.roots();

        while !current.is_empty() {
            let mut next = Vec::new();
            for name in &current {
                for dependent in self.dependents(name) {
                    if let Some(degree) = remaining.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            next.sort();
            levels.push(current);
            current = next;
        }

        levels
    }

    /// Kahn's algorithm dry run; returns one concrete cycle if the graph has any
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut remaining = self.indegree.clone();
        let mut queue: VecDeque<&str> = self
            .indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| name.as_str())
            .collect();
        let mut visited = 0;

        while let Some(name) = queue.pop_front() {
            visited += 1;
            for dependent in self.dependents(name) {
                if let Some(degree) = remaining.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        if visited == self.nodes.len() {
            return None;
        }

        // Every node left with a positive degree has a dependency that is also
        // left, so walking dependencies among them must revisit a node.
        let stuck: HashSet<&str> = remaining
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        let mut start: Vec<&str> = stuck.iter().copied().collect();
        start.sort_unstable();

        let mut path: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = *start.first()?;

        loop {
            if let Some(&index) = position.get(current) {
                let mut cycle: Vec<String> = path[index..].iter().rev().map(|s| s.to_string()).collect();
                cycle.push(cycle[0].clone());
                return Some(cycle);
            }
            position.insert(current, path.len());
            path.push(current);

            let mut deps: Vec<&str> = self.nodes[current]
                .dependencies
                .iter()
                .map(String::as_str)
                .filter(|dep| stuck.contains(dep))
                .collect();
            deps.sort_unstable();
            current = *deps.first()?;
        }
    }
}
