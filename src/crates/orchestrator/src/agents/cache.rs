//! LLM binding cache.
//!
//! A binding is the reusable part of a chat request: the tool definitions
//! plus the agent's sampling parameters. Bindings are cached process-wide
//! under the composite key `(agent_name, tool_set_hash)` so repeated
//! invocations with an unchanged tool set skip re-binding.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use steward_core::llm::{ChatRequest, ToolDefinition};
use steward_core::Message;

/// A bound request template for one (agent, tool set) pair.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Tool definitions bound to the model
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature
    pub temperature: f32,
    /// Response token budget
    pub max_tokens: u32,
    /// Per-agent model override
    pub model: Option<String>,
}

impl Binding {
    /// Build a chat request for the given messages.
    pub fn request(&self, messages: Vec<Message>) -> ChatRequest {
        let mut request = ChatRequest::new(messages)
            .with_tools(self.tools.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        request
    }
}

struct Entry {
    binding: Arc<Binding>,
    last_used: u64,
}

/// Size-bounded LRU over bindings; thread-safe get-or-insert.
pub struct BindingCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<(String, String), Entry>,
    clock: u64,
}

impl BindingCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Fetch the binding for the key, building it on a miss.
    pub fn get_or_insert(
        &self,
        agent: &str,
        tool_hash: &str,
        build: impl FnOnce() -> Binding,
    ) -> Arc<Binding> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        let key = (agent.to_string(), tool_hash.to_string());
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.last_used = clock;
            return entry.binding.clone();
        }

        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        let binding = Arc::new(build());
        inner.entries.insert(
            key,
            Entry {
                binding: binding.clone(),
                last_used: clock,
            },
        );
        binding
    }

    /// Number of cached bindings.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(temperature: f32) -> Binding {
        Binding {
            tools: Vec::new(),
            temperature,
            max_tokens: 1024,
            model: None,
        }
    }

    #[test]
    fn test_hit_skips_rebuild() {
        let cache = BindingCache::new(10);
        let first = cache.get_or_insert("dev", "hash1", || binding(0.1));
        let second = cache.get_or_insert("dev", "hash1", || panic!("must not rebuild"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_keys_distinct_bindings() {
        let cache = BindingCache::new(10);
        cache.get_or_insert("dev", "hash1", || binding(0.1));
        cache.get_or_insert("dev", "hash2", || binding(0.2));
        cache.get_or_insert("review", "hash1", || binding(0.3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let cache = BindingCache::new(2);
        cache.get_or_insert("a", "h", || binding(0.1));
        cache.get_or_insert("b", "h", || binding(0.2));
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get_or_insert("a", "h", || panic!("cached"));
        cache.get_or_insert("c", "h", || binding(0.3));

        assert_eq!(cache.len(), 2);
        let rebuilt = std::cell::Cell::new(false);
        cache.get_or_insert("b", "h", || {
            rebuilt.set(true);
            binding(0.2)
        });
        assert!(rebuilt.get(), "evicted entry should rebuild");
    }

    #[test]
    fn test_request_template() {
        let b = Binding {
            tools: Vec::new(),
            temperature: 0.4,
            max_tokens: 2048,
            model: Some("gpt-4o-mini".to_string()),
        };
        let request = b.request(vec![Message::user("hi")]);
        assert_eq!(request.temperature, Some(0.4));
        assert_eq!(request.max_tokens, Some(2048));
        assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
    }
}
