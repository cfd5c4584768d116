use fnv::FnvHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::ThreadId;

static THREAD_NAME_MAP: Lazy<RwLock<FnvHashMap<ThreadId, Arc<String>>>> =
    Lazy::new(RwLock::default);

pub fn set_thread_name(id: ThreadId, name: String) {
    THREAD_NAME_MAP.write().insert(id, Arc::new(name));
}

pub fn thread_name(id: ThreadId) -> Option<Arc<String>> {
    THREAD_NAME_MAP.read().get(&id).cloned()
}

/// Name used by sinks, falls back to the std thread name then to a placeholder
pub fn display_thread_name(id: ThreadId) -> String {
    if let Some(name) = thread_name(id) {
        return name.as_ref().clone();
    }

    let current = std::thread::current();
    if current.id() == id {
        if let Some(name) = current.name() {
            return name.to_string();
        }
    }

    "Unknown Thread".to_string()
}

#[cfg(test)]
mod tests {
    use crate::thread::{display_thread_name, set_thread_name, thread_name};

    #[test]
    fn registered_name_is_returned() {
        let id = std::thread::current().id();
        set_thread_name(id, "Render Thread".to_string());
        assert_eq!(thread_name(id).unwrap().as_str(), "Render Thread");
        assert_eq!(display_thread_name(id), "Render Thread");
    }

    #[test]
    fn unregistered_spawned_thread_uses_std_name() {
        let name = std::thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| display_thread_name(std::thread::current().id()))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name, "worker-7");
    }
}
