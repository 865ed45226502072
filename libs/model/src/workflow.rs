use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::meta::ObjectMeta;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowSpec {
    /// Returns step names in an order where every step follows all of its
    /// `depends_on` entries (Kahn's algorithm), or `ModelError::CyclicGraph` if
    /// the dependency graph has a cycle or references an unknown step.
    pub fn topo_order(&self) -> Result<Vec<String>> {
        let names: BTreeSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        let mut indegree: BTreeMap<&str, usize> =
            self.steps.iter().map(|s| (s.name.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for step in &self.steps {
            for dep in &step.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(ModelError::CyclicGraph(format!(
                        "step '{}' depends on unknown step '{dep}'",
                        step.name
                    )));
                }
                *indegree.get_mut(step.name.as_str()).unwrap() += 1;
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(step.name.as_str());
            }
        }

        let mut queue: Vec<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();
        queue.sort();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(next) = queue.pop() {
            order.push(next.to_string());
            if let Some(children) = dependents.get(next) {
                for &child in children {
                    let deg = indegree.get_mut(child).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(child);
                        queue.sort();
                    }
                }
            }
        }

        if order.len() != self.steps.len() {
            return Err(ModelError::CyclicGraph(
                "workflow dependency graph contains a cycle".to_string(),
            ));
        }
        Ok(order)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub meta: ObjectMeta,
    pub spec: WorkflowSpec,
}

impl Workflow {
    pub fn new(meta: ObjectMeta, spec: WorkflowSpec) -> Self {
        Self { meta, spec }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, deps: &[&str]) -> WorkflowStep {
        WorkflowStep {
            name: name.to_string(),
            function: format!("fn-{name}"),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn linear_chain_orders_correctly() {
        let spec = WorkflowSpec {
            steps: vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])],
        };
        assert_eq!(spec.topo_order().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_all_dependencies() {
        let spec = WorkflowSpec {
            steps: vec![
                step("a", &[]),
                step("b", &["a"]),
                step("c", &["a"]),
                step("d", &["b", "c"]),
            ],
        };
        let order = spec.topo_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn cycle_is_rejected() {
        let spec = WorkflowSpec {
            steps: vec![step("a", &["b"]), step("b", &["a"])],
        };
        assert!(matches!(spec.topo_order(), Err(ModelError::CyclicGraph(_))));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let spec = WorkflowSpec {
            steps: vec![step("a", &["ghost"])],
        };
        assert!(matches!(spec.topo_order(), Err(ModelError::CyclicGraph(_))));
    }
}
