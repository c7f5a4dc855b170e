//! Deterministic offline model

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::client::{FoundationModel, ProviderError};
use super::types::GenerateRequest;

pub const MOCK_MODEL_NAME: &str = "mock";

const MOCK_PLAN: &str = r#"```json
{
    "subtasks": [{"id": "1", "description": "Create base mesh"}]
}
```"#;

const MOCK_CODE: &str = r#"```python
import bpy
# Mock generation
bpy.ops.mesh.primitive_cube_add()
```"#;

/// Offline model: planner requests get a subtask block, everything else a
/// cube-adding script
///
/// Roles are told apart by the system prompt; user prompts for code synthesis
/// quote the current plan and cannot be used.
#[derive(Debug, Default)]
pub struct MockModel {
    calls: AtomicU32,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FoundationModel for MockModel {
    fn name(&self) -> &str {
        MOCK_MODEL_NAME
    }

    async fn attempt(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if is_planner(&request.system) {
            Ok(MOCK_PLAN.to_string())
        } else {
            Ok(MOCK_CODE.to_string())
        }
    }
}

fn is_planner(system: &str) -> bool {
    let system = system.to_lowercase();
    system.contains("planning") || system.contains("planner")
}
