use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};
use crate::task::{StageKind, Task, TaskId};

/// Grafo explícito de tareas. Se arma una vez y se valida (dependencias
/// declaradas, sin ciclos) antes de ejecutar nada.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(
        &mut self,
        id: impl Into<TaskId>,
        stage: StageKind,
        inputs: Vec<TaskId>,
    ) -> Result<TaskId> {
        let task = Task::new(id, stage, inputs);
        if self.index.contains_key(&task.id) {
            return Err(Error::DuplicateTask { task: task.id });
        }
        let id = task.id.clone();
        self.index.insert(id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Tareas en orden de inserción.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tareas que dependen directamente de `id`.
    pub fn dependents(&self, id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.inputs.iter().any(|i| i == id))
            .collect()
    }

    /// Verifica el grafo y devuelve un orden topológico de ids.
    pub fn validate(&self) -> Result<Vec<TaskId>> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.tasks.len()).map(|i| graph.add_node(i)).collect();

        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.inputs {
                let Some(&j) = self.index.get(dep) else {
                    return Err(Error::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.add_edge(nodes[j], nodes[i], ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| Error::Cycle {
            task: self.tasks[graph[cycle.node_id()]].id.clone(),
        })?;

        Ok(order
            .into_iter()
            .map(|n| self.tasks[graph[n]].id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<TaskId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn validate_devuelve_orden_topologico() {
        let mut g = PipelineGraph::new();
        g.add_task("report", StageKind::Report, ids(&["load"])).unwrap();
        g.add_task("load", StageKind::LoadWarehouse, ids(&["init"])).unwrap();
        g.add_task("init", StageKind::Init, vec![]).unwrap();

        let order = g.validate().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("init") < pos("load"));
        assert!(pos("load") < pos("report"));
        assert_eq!(g.dependents("init").len(), 1);
    }

    #[test]
    fn tarea_duplicada_falla() {
        let mut g = PipelineGraph::new();
        g.add_task("init", StageKind::Init, vec![]).unwrap();
        let err = g.add_task("init", StageKind::Init, vec![]).unwrap_err();
        assert_eq!(err.kind(), "DuplicateTask");
    }

    #[test]
    fn dependencia_no_declarada_falla() {
        let mut g = PipelineGraph::new();
        g.add_task("load", StageKind::LoadWarehouse, ids(&["fantasma"])).unwrap();
        match g.validate().unwrap_err() {
            Error::UnknownDependency { task, dependency } => {
                assert_eq!(task, "load");
                assert_eq!(dependency, "fantasma");
            }
            other => panic!("error inesperado: {other:?}"),
        }
    }

    #[test]
    fn ciclo_detectado() {
        let mut g = PipelineGraph::new();
        g.add_task("a", StageKind::Init, ids(&["b"])).unwrap();
        g.add_task("b", StageKind::Report, ids(&["a"])).unwrap();
        let err = g.validate().unwrap_err();
        assert_eq!(err.kind(), "Cycle");
    }
}
