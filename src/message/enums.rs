//! Route enumerations carried by every message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a message performs on its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Delete,
    Query,
    Update,
    Response,
    Error,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Delete => "delete",
            Operation::Query => "query",
            Operation::Update => "update",
            Operation::Response => "response",
            Operation::Error => "error",
        }
    }

    /// True for the two operations produced by reply constructors.
    pub fn is_reply(self) -> bool {
        matches!(self, Operation::Response | Operation::Error)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known resource tags. Modules interpret these; the kernel never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Pod,
    Configmap,
    Node,
    Podlist,
    Podstatus,
    Rule,
    Ruleendpoint,
    Rulestatus,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Pod => "pod",
            ResourceType::Configmap => "configmap",
            ResourceType::Node => "node",
            ResourceType::Podlist => "podlist",
            ResourceType::Podstatus => "podstatus",
            ResourceType::Rule => "rule",
            ResourceType::Ruleendpoint => "ruleendpoint",
            ResourceType::Rulestatus => "rulestatus",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.as_str().to_string()
    }
}
