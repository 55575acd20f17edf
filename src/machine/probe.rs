//! Structural description of a configured machine.
//!
//! The description is plain serde data; rendering it into a diagram or any
//! other format is left to the caller.

use serde::{Deserialize, Serialize};

/// One activity, with nested chains (branches, handlers) as children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeNode {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProbeNode>,
}

impl ProbeNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            children: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ProbeNode>) -> Self {
        self.children = children;
        self
    }
}

/// Activities bound to one event in one state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDescription {
    pub event: String,
    pub activities: Vec<ProbeNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superstate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substates: Vec<String>,
    pub bindings: Vec<BindingDescription>,
    /// Ignored events, excluding the lifecycle events every state ignores.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<String>,
}

impl StateDescription {
    pub fn binding(&self, event: &str) -> Option<&BindingDescription> {
        self.bindings.iter().find(|b| b.event == event)
    }
}

/// Everything a machine was configured with, states in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDescription {
    pub name: String,
    pub initial: String,
    #[serde(rename = "final")]
    pub final_state: String,
    pub events: Vec<String>,
    pub states: Vec<StateDescription>,
}

impl MachineDescription {
    pub fn state(&self, name: &str) -> Option<&StateDescription> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
