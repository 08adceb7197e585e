// Shared fixtures for handler and dispatcher tests

use crate::context::ToolContext;
use genmedia_core::storage::ObjectStoreStorage;
use genmedia_core::ServerConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Context whose upstream APIs live at `endpoint`, with in-memory object storage.
pub fn context(endpoint: &str) -> ToolContext {
    context_with(endpoint, &[])
}

/// Like [`context`], with extra configuration variables layered on top.
pub fn context_with(endpoint: &str, extra: &[(&str, &str)]) -> ToolContext {
    let output_dir = std::env::temp_dir().join("genmedia-tests");
    let mut vars: HashMap<String, String> = HashMap::from([
        ("PROJECT_ID".to_string(), "demo".to_string()),
        ("VERTEX_API_ENDPOINT".to_string(), endpoint.to_string()),
        ("GOOGLE_ACCESS_TOKEN".to_string(), "test-token".to_string()),
        (
            "GENMEDIA_OUTPUT_DIR".to_string(),
            output_dir.to_string_lossy().into_owned(),
        ),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    let config = ServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    ToolContext::new(Arc::new(config), Arc::new(ObjectStoreStorage::in_memory())).unwrap()
}
