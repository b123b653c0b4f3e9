use std::collections::HashSet;
use std::sync::RwLock;

use tracing::warn;

/// A named-failure registry shared between updaters and the lookup API.
///
/// Updaters call [`HealthChecker::set_unhealthy`] when they hit a terminal
/// error and [`HealthChecker::clear`] when they recover. The overall process
/// is healthy iff no name is currently registered as failing.
#[derive(Default)]
pub struct HealthChecker {
    failing: RwLock<HashSet<String>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unhealthy(&self, name: &str) {
        let mut guard = self.failing.write().expect("health checker lock poisoned");
        if guard.insert(name.to_string()) {
            warn!(updater = name, "marked unhealthy");
        }
    }

    pub fn clear(&self, name: &str) {
        let mut guard = self.failing.write().expect("health checker lock poisoned");
        guard.remove(name);
    }

    pub fn is_healthy(&self) -> bool {
        self.failing.read().expect("health checker lock poisoned").is_empty()
    }

    pub fn failing_names(&self) -> HashSet<String> {
        self.failing.read().expect("health checker lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy() {
        let checker = HealthChecker::new();
        assert!(checker.is_healthy());
        assert!(checker.failing_names().is_empty());
    }

    #[test]
    fn set_unhealthy_then_clear_restores_health() {
        let checker = HealthChecker::new();
        checker.set_unhealthy("docker-poller");
        assert!(!checker.is_healthy());
        assert_eq!(
            checker.failing_names(),
            HashSet::from(["docker-poller".to_string()])
        );

        checker.clear("docker-poller");
        assert!(checker.is_healthy());
    }

    #[test]
    fn clearing_an_unknown_name_is_a_no_op() {
        let checker = HealthChecker::new();
        checker.clear("never-registered");
        assert!(checker.is_healthy());
    }

    #[test]
    fn multiple_failing_updaters_all_tracked() {
        let checker = HealthChecker::new();
        checker.set_unhealthy("a");
        checker.set_unhealthy("b");
        assert_eq!(checker.failing_names().len(), 2);
        checker.clear("a");
        assert_eq!(checker.failing_names(), HashSet::from(["b".to_string()]));
    }
}
