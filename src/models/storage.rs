use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBucket {
    pub name: String,
    pub public: bool,
    pub created_at: i64,
}
