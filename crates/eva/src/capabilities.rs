use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

/// Named optional string arguments passed to a capability
pub type CapabilityArgs = HashMap<String, Option<String>>;

/// Convert the JSON object emitted by the model into capability arguments.
///
/// Nulls become `None`, strings are taken as-is and any other value is kept in its
/// JSON text form.
pub fn args_from_map(map: &Map<String, Value>) -> CapabilityArgs {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            (key.clone(), value)
        })
        .collect()
}

/// A side-effecting action a handler may invoke at most once per turn
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name the model uses to request this capability
    fn name(&self) -> &str;

    /// The tool definition made callable for the model
    fn tool(&self) -> Tool;

    /// Run the capability and describe the outcome as text
    async fn invoke(&self, args: CapabilityArgs) -> AgentResult<String>;
}

/// Placeholder capability that simulates a specialist integration
#[derive(Debug, Clone, PartialEq)]
pub struct DevTool {
    name: String,
    label: String,
    outcome: String,
    action: String,
}

impl DevTool {
    pub fn new<N, L, A>(name: N, label: L, action: A) -> Self
    where
        N: Into<String>,
        L: Into<String>,
        A: Into<String>,
    {
        Self {
            name: name.into(),
            label: label.into(),
            outcome: "executed successfully".to_string(),
            action: action.into(),
        }
    }

    /// Override the "executed successfully" wording of the response
    pub fn with_outcome<S: Into<String>>(mut self, outcome: S) -> Self {
        self.outcome = outcome.into();
        self
    }

    /// The simulated tools for every specialist handler
    pub fn defaults() -> Vec<DevTool> {
        vec![
            DevTool::new("run_slack_dev_tool", "Slack", "Simulated Slack API call"),
            DevTool::new(
                "run_github_dev_tool",
                "GitHub",
                "Simulated GitHub API interaction",
            ),
            DevTool::new(
                "run_therapist_dev_tool",
                "Therapist",
                "Simulated therapeutic exercise or reflection",
            )
            .with_outcome("executed"),
            DevTool::new(
                "run_logical_dev_tool",
                "Logical",
                "Simulated logical analysis or data retrieval",
            ),
            DevTool::new("run_ckb_dev_tool", "CKB", "Simulated knowledge base query"),
            DevTool::new(
                "run_email_mgmt_dev_tool",
                "Email",
                "Simulated email interaction (e.g., fetching or sending)",
            ),
            DevTool::new(
                "run_calendar_mgmt_dev_tool",
                "Calendar",
                "Simulated calendar operation (e.g., event creation)",
            ),
            DevTool::new(
                "run_web_search_dev_tool",
                "Web Search",
                "Simulated web search query",
            ),
            DevTool::new(
                "run_customer_service_dev_tool",
                "Customer Service",
                "Simulated customer interaction or lookup",
            ),
            DevTool::new(
                "run_hubspot_mgmt_dev_tool",
                "HubSpot",
                "Simulated HubSpot CRM action",
            ),
        ]
    }
}

#[async_trait]
impl Capability for DevTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            format!(
                "Runs a placeholder development tool for the {label} agent. \
                 Use this if the user asks to 'Run_Dev_Tool' and you are the {label} agent.",
                label = self.label
            ),
            json!({
                "type": "object",
                "properties": {
                    "task_description": {
                        "type": ["string", "null"],
                        "description": "Optional description of the task for the dev tool."
                    }
                }
            }),
        )
    }

    async fn invoke(&self, args: CapabilityArgs) -> AgentResult<String> {
        let task = args
            .get("task_description")
            .cloned()
            .flatten()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No specific task provided".to_string());
        Ok(format!(
            "The {} Agent has returned the following tool response: Dev tool {}. {}. Task: {}.",
            self.label, self.outcome, self.action, task
        ))
    }
}

/// Owns every capability, keyed by name. Handlers refer to entries by name only.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding [`DevTool::defaults`]
    pub fn with_dev_tools() -> Self {
        let mut registry = Self::new();
        for tool in DevTool::defaults() {
            registry.register(Arc::new(tool));
        }
        registry
    }

    /// Add a capability, replacing any previous one with the same name
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Like [`get`](Self::get), but a missing entry is a configuration error
    pub fn resolve(&self, name: &str) -> AgentResult<Arc<dyn Capability>> {
        self.get(name)
            .ok_or_else(|| AgentError::Internal(format!("Capability not registered: {}", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}
