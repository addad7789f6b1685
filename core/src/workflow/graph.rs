use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::WorkflowError;

use super::task::Task;

/// Dependency DAG over task ids.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Dependency edges: task_id -> tasks it waits for
    edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> tasks that wait for it
    reverse_edges: HashMap<String, Vec<String>>,

    /// Declaration order, used for every stable ordering
    insertion_order: Vec<String>,

    position: HashMap<String, usize>,
}

impl TaskGraph {
    /// Build the graph from tasks in declaration order.
    pub fn from_tasks<'a, I>(tasks: I) -> Result<Self, WorkflowError>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut graph = Self::default();

        for task in tasks {
            let task_id = task.id().to_string();
            if graph.position.contains_key(&task_id) {
                return Err(WorkflowError::DuplicateTaskId(task_id));
            }

            graph.position.insert(task_id.clone(), graph.insertion_order.len());
            graph.insertion_order.push(task_id.clone());
            graph
                .edges
                .insert(task_id.clone(), task.dependencies().to_vec());

            for dep in task.dependencies() {
                graph
                    .reverse_edges
                    .entry(dep.clone())
                    .or_default()
                    .push(task_id.clone());
            }
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.position.contains_key(task_id)
    }

    /// Task ids in declaration order.
    pub fn task_ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn dependencies(&self, task_id: &str) -> &[String] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks that directly depend on `task_id`, in declaration order.
    pub fn dependents(&self, task_id: &str) -> Vec<String> {
        let mut dependents = self
            .reverse_edges
            .get(task_id)
            .cloned()
            .unwrap_or_default();
        self.sort_by_declaration(&mut dependents);
        dependents
    }

    /// Every task reachable downstream of `task_id`, in declaration order.
    pub fn transitive_dependents(&self, task_id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([task_id]);

        while let Some(current) = queue.pop_front() {
            if let Some(dependents) = self.reverse_edges.get(current) {
                for dependent in dependents {
                    if seen.insert(dependent.clone()) {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        let mut out: Vec<String> = seen.into_iter().collect();
        self.sort_by_declaration(&mut out);
        out
    }

    /// Tasks nothing depends on, in declaration order.
    pub fn sinks(&self) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter(|id| self.reverse_edges.get(*id).map_or(true, Vec::is_empty))
            .cloned()
            .collect()
    }

    /// Validate dependency relationships
    pub fn validate(&self) -> Result<(), WorkflowError> {
        for task_id in &self.insertion_order {
            for dep in self.dependencies(task_id) {
                if !self.contains(dep) {
                    return Err(WorkflowError::DependencyNotFound {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(WorkflowError::CircularDependency(cycle));
        }

        Ok(())
    }

    /// Topological sort using Kahn's algorithm
    ///
    /// Returns execution stages where tasks in the same stage can run in parallel.
    /// Within a stage tasks keep declaration order.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn topological_sort(&self) -> Result<Vec<Vec<String>>, WorkflowError> {
        // edges[A] = [B, C] means A depends on B and C, so A's in-degree is 2
        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.dependencies(id).len()))
            .collect();

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut current_stage: Vec<String> = self
            .insertion_order
            .iter()
            .filter(|id| in_degree.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();

        let mut processed = 0;

        while !current_stage.is_empty() {
            processed += current_stage.len();

            let mut next_stage = Vec::new();
            for task_id in &current_stage {
                if let Some(dependents) = self.reverse_edges.get(task_id) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                            *degree = degree.saturating_sub(1);
                            if *degree == 0 {
                                next_stage.push(dependent.clone());
                            }
                        }
                    }
                }
            }

            self.sort_by_declaration(&mut next_stage);
            stages.push(std::mem::replace(&mut current_stage, next_stage));
        }

        if processed != self.len() {
            return Err(WorkflowError::CircularDependency(
                "Unable to complete topological sort (cycle detected)".to_string(),
            ));
        }

        Ok(stages)
    }

    /// Length of the longest dependency chain from a root to each task.
    pub fn depths(&self) -> Result<HashMap<String, usize>, WorkflowError> {
        let mut depths = HashMap::new();
        for stage in self.topological_sort()? {
            for task_id in stage {
                let depth = self
                    .dependencies(&task_id)
                    .iter()
                    .filter_map(|dep| depths.get(dep))
                    .map(|d| d + 1)
                    .max()
                    .unwrap_or(0);
                depths.insert(task_id, depth);
            }
        }
        Ok(depths)
    }

    fn sort_by_declaration(&self, ids: &mut [String]) {
        ids.sort_by_key(|id| self.position.get(id).copied().unwrap_or(usize::MAX));
    }

    /// Detect circular dependencies using DFS
    fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(format_cycle_path(&stack));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in self.dependencies(node) {
            if let Some(pos) = stack.iter().position(|x| x == dep) {
                stack.push(dep.clone());
                *stack = stack[pos..].to_vec();
                return true;
            }

            if !visited.contains(dep) && self.dfs_cycle(dep, visited, stack) {
                return true;
            }
        }

        stack.pop();
        false
    }
}

fn format_cycle_path(stack: &[String]) -> String {
    stack.join(" -> ")
}
