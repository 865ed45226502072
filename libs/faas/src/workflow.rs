use flotilla_api_client::FlotillaClient;
use flotilla_model::{Pod, Workflow};
use serde_json::Value;

use crate::invoke::{forward_request, pick_pod};

/// Synchronously traverses a Workflow's step graph in topological order
/// (spec.md §4.5 "synchronous executor traverses graph"), invoking each
/// step's Function with the original request body and collecting each
/// response into `{step_name: response_body}`. Steps run one at a time in
/// dependency order; nothing in spec.md §3's Workflow row describes passing
/// a step's output as another step's input, so every step receives the same
/// payload (recorded as an Open Question resolution in DESIGN.md).
pub async fn execute(
    http: &reqwest::Client,
    client: &FlotillaClient,
    namespace: &str,
    workflow: &Workflow,
    payload: Vec<u8>,
) -> Result<Value, String> {
    let order = workflow.spec.topo_order().map_err(|e| e.to_string())?;
    let mut results = serde_json::Map::new();

    for step_name in order {
        let step = workflow
            .spec
            .steps
            .iter()
            .find(|s| s.name == step_name)
            .expect("topo_order only returns known step names");

        let function = client
            .get_function(namespace, &step.function)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("workflow step '{step_name}' references unknown function '{}'", step.function))?;

        let pods: Vec<Pod> = client
            .list_namespace_pods(namespace)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter(|p| function.status.pod_names.contains(&p.meta.name))
            .collect();

        let pod = pick_pod(&pods)
            .ok_or_else(|| format!("workflow step '{step_name}' has no running backing pod"))?;

        let response = forward_request(http, pod, &function.spec.trigger, payload.clone()).await?;
        results.insert(step_name, Value::String(String::from_utf8_lossy(&response).into_owned()));
    }

    Ok(Value::Object(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_model::{ObjectMeta, WorkflowSpec, WorkflowStep};

    #[test]
    fn topo_order_drives_step_lookup_successfully() {
        let workflow = Workflow::new(
            ObjectMeta::new("pipeline", Some("default".into())),
            WorkflowSpec {
                steps: vec![
                    WorkflowStep { name: "a".into(), function: "fn-a".into(), depends_on: vec![] },
                    WorkflowStep { name: "b".into(), function: "fn-b".into(), depends_on: vec!["a".into()] },
                ],
            },
        );
        let order = workflow.spec.topo_order().unwrap();
        let found: Vec<&str> = order
            .iter()
            .map(|name| workflow.spec.steps.iter().find(|s| &s.name == name).unwrap().function.as_str())
            .collect();
        assert_eq!(found, vec!["fn-a", "fn-b"]);
    }
}
