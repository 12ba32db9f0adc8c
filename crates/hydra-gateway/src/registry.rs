//! Tool Registry (C3): merges every child's tool catalog under unique
//! namespaced names and resolves a namespaced name back to its owning
//! supervisor.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::supervisor::{ChildSupervisor, ToolDescriptor};

/// A tool as presented through the unified catalog, carrying enough to route
/// a `tools/call` back to the right child using its original name.
#[derive(Debug, Clone)]
pub struct NamespacedTool {
    pub public_name: String,
    pub original_name: String,
    pub child_id: String,
    pub child_name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl NamespacedTool {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "name": self.public_name,
            "description": self.presented_description(),
            "inputSchema": self.input_schema,
        })
    }

    fn presented_description(&self) -> String {
        match &self.description {
            Some(d) => format!("[{}] {}", self.child_name, d),
            None => format!("[{}]", self.child_name),
        }
    }
}

/// Lowercase the child's display name, collapse every run of characters
/// outside `[a-z0-9]` to a single `_`, then append `.` + the original name.
pub fn derive_public_name(child_name: &str, original_name: &str) -> String {
    let lower = child_name.to_ascii_lowercase();
    let mut sanitized = String::with_capacity(lower.len());
    let mut in_run = false;
    for ch in lower.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            sanitized.push(ch);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }
    format!("{sanitized}.{original_name}")
}

struct Entry {
    tool: NamespacedTool,
    supervisor: Arc<ChildSupervisor>,
}

/// In-memory catalog. Bulk-mutated by the gateway manager during
/// start/stop/refresh; read freely and concurrently by the HTTP front end.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Entry>>,
    by_child: RwLock<HashMap<String, HashSet<String>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool a freshly-`ready` supervisor reported. Collisions
    /// with an already-registered public name are dropped and logged; the
    /// first registration wins.
    pub fn register(&self, supervisor: Arc<ChildSupervisor>, tools: &[ToolDescriptor]) {
        let child_id = supervisor.id().to_string();
        let child_name = supervisor.name().to_string();

        let mut registered = HashSet::new();
        let mut tools_guard = self.tools.write().unwrap();
        for tool in tools {
            let public_name = derive_public_name(&child_name, &tool.name);
            if tools_guard.contains_key(&public_name) {
                tracing::warn!(
                    public_name = %public_name,
                    child = %child_name,
                    "duplicate namespaced tool name, dropping later registration"
                );
                continue;
            }
            tools_guard.insert(
                public_name.clone(),
                Entry {
                    tool: NamespacedTool {
                        public_name: public_name.clone(),
                        original_name: tool.name.clone(),
                        child_id: child_id.clone(),
                        child_name: child_name.clone(),
                        description: tool.description.clone(),
                        input_schema: tool.input_schema.clone(),
                    },
                    supervisor: Arc::clone(&supervisor),
                },
            );
            registered.insert(public_name);
        }
        drop(tools_guard);

        self.by_child.write().unwrap().insert(child_id, registered);
    }

    /// Remove every tool contributed by this child, atomically.
    pub fn unregister(&self, child_id: &str) {
        let mut by_child = self.by_child.write().unwrap();
        if let Some(names) = by_child.remove(child_id) {
            let mut tools = self.tools.write().unwrap();
            for name in names {
                tools.remove(&name);
            }
        }
    }

    pub fn get(&self, public_name: &str) -> Option<NamespacedTool> {
        self.tools
            .read()
            .unwrap()
            .get(public_name)
            .map(|e| e.tool.clone())
    }

    pub fn resolve_supervisor(&self, public_name: &str) -> Option<Arc<ChildSupervisor>> {
        self.tools
            .read()
            .unwrap()
            .get(public_name)
            .map(|e| Arc::clone(&e.supervisor))
    }

    pub fn list_public(&self) -> Vec<NamespacedTool> {
        self.tools
            .read()
            .unwrap()
            .values()
            .map(|e| e.tool.clone())
            .collect()
    }

    /// Case-insensitive substring match over public name and description.
    /// Diagnostics only; never consulted by the JSON-RPC method table.
    pub fn search(&self, query: &str) -> Vec<NamespacedTool> {
        let needle = query.to_ascii_lowercase();
        self.tools
            .read()
            .unwrap()
            .values()
            .filter(|e| {
                e.tool.public_name.to_ascii_lowercase().contains(&needle)
                    || e.tool
                        .description
                        .as_deref()
                        .unwrap_or("")
                        .to_ascii_lowercase()
                        .contains(&needle)
            })
            .map(|e| e.tool.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.tools.write().unwrap().clear();
        self.by_child.write().unwrap().clear();
    }

    pub fn total_tools(&self) -> usize {
        self.tools.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChildSpec;
    use serde_json::json;
    use std::time::Duration;

    fn supervisor(id: &str, name: &str) -> Arc<ChildSupervisor> {
        Arc::new(ChildSupervisor::new(
            ChildSpec {
                id: id.into(),
                name: name.into(),
                command: "true".into(),
                args: vec![],
                env: HashMap::new(),
            },
            Duration::from_secs(1),
            Duration::from_secs(1),
        ))
    }

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: Some("does a thing".into()),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn derives_namespaced_name_per_rule() {
        assert_eq!(derive_public_name("Child A", "echo"), "child_a.echo");
        assert_eq!(derive_public_name("My Cool Server!!", "run"), "my_cool_server_.run");
        assert_eq!(derive_public_name("already-lower", "x"), "already_lower.x");
    }

    #[test]
    fn register_and_resolve_round_trip() {
        let registry = ToolRegistry::new();
        let sup = supervisor("a", "Child A");
        registry.register(Arc::clone(&sup), &[descriptor("echo")]);

        let tool = registry.get("child_a.echo").expect("tool present");
        assert_eq!(tool.original_name, "echo");
        assert_eq!(tool.description.as_deref(), Some("does a thing"));
        assert_eq!(tool.presented_description_for_test(), "[Child A] does a thing");

        let resolved = registry.resolve_supervisor("child_a.echo").unwrap();
        assert_eq!(resolved.id(), "a");
    }

    #[test]
    fn first_registration_wins_on_collision() {
        let registry = ToolRegistry::new();
        let sup_a = supervisor("a", "Dup");
        let sup_b = supervisor("b", "Dup");
        registry.register(Arc::clone(&sup_a), &[descriptor("echo")]);
        registry.register(Arc::clone(&sup_b), &[descriptor("echo")]);

        let resolved = registry.resolve_supervisor("dup.echo").unwrap();
        assert_eq!(resolved.id(), "a");
        assert_eq!(registry.total_tools(), 1);
    }

    #[test]
    fn unregister_removes_both_directions() {
        let registry = ToolRegistry::new();
        let sup = supervisor("a", "Child A");
        registry.register(Arc::clone(&sup), &[descriptor("echo"), descriptor("ping")]);
        assert_eq!(registry.total_tools(), 2);

        registry.unregister("a");
        assert_eq!(registry.total_tools(), 0);
        assert!(registry.get("child_a.echo").is_none());
    }

    #[test]
    fn search_matches_name_and_description() {
        let registry = ToolRegistry::new();
        let sup = supervisor("a", "Child A");
        registry.register(Arc::clone(&sup), &[descriptor("echo")]);

        assert_eq!(registry.search("echo").len(), 1);
        assert_eq!(registry.search("THING").len(), 1);
        assert_eq!(registry.search("nonexistent").len(), 0);
    }

    impl NamespacedTool {
        fn presented_description_for_test(&self) -> String {
            self.presented_description()
        }
    }
}
