use super::ids::NodeId;
use serde::{Deserialize, Serialize};

/// A node in the archive's variable hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
