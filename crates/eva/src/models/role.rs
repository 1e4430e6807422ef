use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The author of a message
pub enum Role {
    System,
    User,
    Assistant,
    /// Output of a capability, answering an assistant's tool request
    Tool,
}
