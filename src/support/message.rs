use crate::InstanceId;
use serde::{Deserialize, Serialize};

/// A node's view of which proposers it holds certified proposals from.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Message {
    pub instance: InstanceId,
    /// One '0' or '1' per cluster member, in membership order.
    pub bits: String,
}
