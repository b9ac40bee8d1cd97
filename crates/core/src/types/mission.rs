use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::memory::{ActionType, AgentId};
use crate::error::SchemaError;

// =============================================================================
// Plan Types
// =============================================================================

/// Altitude used when neither the user nor the plan gives one.
pub const DEFAULT_ALTITUDE: f64 = 10.0;

fn default_altitude() -> f64 {
    DEFAULT_ALTITUDE
}

/// Execution parameters of a task.
///
/// Construction never enforces coordinates; move tasks are checked when the
/// whole plan is validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TaskParams {
    /// Target latitude (required for moves).
    pub lat: Option<f64>,
    /// Target longitude (required for moves).
    pub lon: Option<f64>,
    /// Target altitude in meters.
    #[serde(default = "default_altitude")]
    pub alt: f64,
    /// Target name when scanning.
    pub scan_target: Option<String>,
}

impl Default for TaskParams {
    fn default() -> Self {
        Self {
            lat: None,
            lon: None,
            alt: DEFAULT_ALTITUDE,
            scan_target: None,
        }
    }
}

impl TaskParams {
    pub fn at(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            alt,
            scan_target: None,
        }
    }

    /// Both coordinates, if present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }
}

/// One atomic unit of work for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Task {
    /// Unique ID for the task within its plan.
    pub task_id: String,
    /// Agent that executes the task.
    pub agent_id: AgentId,
    pub action_type: ActionType,
    pub params: TaskParams,
}

impl Task {
    pub fn new(task_id: impl Into<String>, agent_id: AgentId, action_type: ActionType, params: TaskParams) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id,
            action_type,
            params,
        }
    }
}

/// A decomposed mission: the strategy and the ordered task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MissionPlan {
    /// Explanation of the strategy, including hazards that shaped it.
    pub reasoning: String,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
}

impl MissionPlan {
    /// Parse a raw structured-completion response against the strict schema.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        if !value.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Parse a raw JSON document against the strict schema.
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// JSON schema handed to the reasoning capability, in strict
    /// structured-output form.
    pub fn json_schema() -> Value {
        let mut schema = serde_json::to_value(schemars::schema_for!(MissionPlan)).unwrap_or_default();
        require_all_properties(&mut schema);
        schema
    }

    /// Tasks for one agent, in plan order.
    pub fn tasks_for(&self, agent_id: AgentId) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.agent_id == agent_id)
    }

    /// Coordinates of every move task assigned to an agent.
    pub fn move_targets(&self, agent_id: AgentId) -> Vec<(f64, f64)> {
        self.tasks_for(agent_id)
            .filter(|t| t.action_type == ActionType::Move)
            .filter_map(|t| t.params.coordinates())
            .collect()
    }
}

/// Strict mode wants every property listed in `required`; optional fields stay
/// optional through their nullable type. Defaults are a serde concern only.
fn require_all_properties(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if let Some(Value::Object(props)) = map.get_mut("properties") {
                for prop in props.values_mut() {
                    if let Value::Object(prop) = prop {
                        prop.remove("default");
                    }
                }
                let names: Vec<Value> = props.keys().cloned().map(Value::String).collect();
                map.insert("required".into(), Value::Array(names));
            }
            map.values_mut().for_each(require_all_properties);
        }
        Value::Array(items) => items.iter_mut().for_each(require_all_properties),
        _ => {}
    }
}

// =============================================================================
// Tool Results
// =============================================================================

/// Standard result of executing one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_parse_accepts_valid_plan() {
        let plan = MissionPlan::from_value(json!({
            "reasoning": "split sectors",
            "tasks": [
                {"task_id": "t1", "agent_id": 1, "action_type": "move",
                 "params": {"lat": 47.1, "lon": 8.5, "alt": 15.0, "scan_target": null}},
                {"task_id": "t2", "agent_id": 1, "action_type": "scan",
                 "params": {"lat": null, "lon": null, "scan_target": "car"}}
            ]
        }))
        .unwrap();

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].params.coordinates(), Some((47.1, 8.5)));
        assert_eq!(plan.tasks[1].params.alt, DEFAULT_ALTITUDE);
    }

    #[test]
    fn test_strict_parse_rejects_extra_fields() {
        let err = MissionPlan::from_value(json!({
            "reasoning": "r",
            "tasks": [],
            "priority": "high"
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Mismatch(_)));
    }

    #[test]
    fn test_strict_parse_rejects_unknown_action() {
        let err = MissionPlan::from_value(json!({
            "reasoning": "r",
            "tasks": [{"task_id": "t1", "agent_id": 1, "action_type": "hover", "params": {}}]
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Mismatch(_)));
    }

    #[test]
    fn test_parse_non_object_and_bad_json() {
        assert!(matches!(
            MissionPlan::from_value(json!([1, 2])),
            Err(SchemaError::NotAnObject)
        ));
        assert!(matches!(
            MissionPlan::from_json_str("{not json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_schema_forbids_additional_properties() {
        let schema = MissionPlan::json_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert!(schema["definitions"]["ActionType"].is_object());

        // Every object lists all of its properties as required.
        let objects = [&schema, &schema["definitions"]["Task"], &schema["definitions"]["TaskParams"]];
        for object in objects {
            assert_eq!(object["additionalProperties"], json!(false));
            let mut props: Vec<&str> = object["properties"].as_object().unwrap().keys().map(String::as_str).collect();
            let mut required: Vec<&str> = object["required"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap())
                .collect();
            props.sort_unstable();
            required.sort_unstable();
            assert_eq!(props, required);
        }

        let params = &schema["definitions"]["TaskParams"];
        assert_eq!(params["required"].as_array().unwrap().len(), 4);
        assert!(params["properties"]["lat"]["type"].as_array().unwrap().contains(&json!("null")));
        assert!(params["properties"]["alt"].get("default").is_none());
    }

    #[test]
    fn test_move_targets() {
        let plan = MissionPlan {
            reasoning: String::new(),
            tasks: vec![
                Task::new("t1", 1, ActionType::Move, TaskParams::at(1.0, 2.0, 10.0)),
                Task::new("t2", 1, ActionType::Scan, TaskParams::default()),
                Task::new("t3", 2, ActionType::Move, TaskParams::at(3.0, 4.0, 10.0)),
            ],
        };
        assert_eq!(plan.move_targets(1), vec![(1.0, 2.0)]);
        assert_eq!(plan.tasks_for(2).count(), 1);
    }
}
