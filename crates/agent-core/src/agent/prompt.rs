use serde_json::{Map, Value, json};

use super::observation::{EntityKey, EntityRecord};

pub const DEFAULT_TASK_DESCRIPTION: &str = "You are an AI playing a Civilization-style game.\nYour task: play to win. Expand, explore, and multiply as fast as possible.";

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub task_description: String,
    pub output_contract: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            task_description: DEFAULT_TASK_DESCRIPTION.to_string(),
            output_contract: "Return exactly one JSON object and nothing else.\n\nFormat:\n{\"reasoning\":\"<why this action was chosen>\",\"action_name\":\"<one entry of AVAILABLE_ACTIONS>\"}\n\n- Both fields are strings.\n- action_name must be copied exactly from AVAILABLE_ACTIONS.\n- Do not wrap the object in markdown or code fences.\n- Do not add commentary before or after the object.".to_string(),
        }
    }
}

/// Everything the prompt says about one entity.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub key: &'a EntityKey,
    pub record: &'a EntityRecord,
    /// Legal actions as shown to the model (already converted to prompt names).
    pub actions: &'a [String],
    pub scenario_message: Option<&'a str>,
}

fn entity_state(input: &PromptInput<'_>) -> Value {
    let mut state = Map::new();
    state.insert("class".to_string(), json!(input.key.class));
    state.insert("name".to_string(), json!(input.record.name));
    if !input.record.observations.is_null() {
        state.insert(
            "observations".to_string(),
            input.record.observations.clone(),
        );
    }
    for (k, v) in &input.record.extra {
        state.insert(k.clone(), v.clone());
    }
    Value::Object(state)
}

/// Builds the decision request for one entity. Pure: equal inputs give equal prompts.
pub fn build_decision_prompt(input: &PromptInput<'_>, cfg: &PromptConfig) -> String {
    let state_json =
        serde_json::to_string_pretty(&entity_state(input)).unwrap_or_else(|_| "{}".to_string());
    let actions_json =
        serde_json::to_string_pretty(input.actions).unwrap_or_else(|_| "[]".to_string());

    let scenario = input
        .scenario_message
        .map(|msg| format!("[SCENARIO]\n{msg}\n\n"))
        .unwrap_or_default();

    format!(
        "{}\n\n{scenario}[ENTITY_JSON]\nYou control the following {}:\n{state_json}\n\n[AVAILABLE_ACTIONS]\n{actions_json}\n\n[CONTRACT]\n{}\n",
        cfg.task_description, input.key.class, cfg.output_contract
    )
}
