//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::discovery::ServiceInstance;
use crate::load_balancer::SelectionPolicy;

/// Round-robin selector.
/// Stores an internal counter to rotate through instances.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }

        // Bounded scan so an all-unhealthy slice terminates.
        let start_count = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = instances.len();

        for i in 0..len {
            let index = (start_count + i) % len;
            let instance = &instances[index];
            if instance.healthy {
                return Some(instance);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::instance;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let instances = vec![instance("10.0.0.1:80", true), instance("10.0.0.2:80", true)];

        assert_eq!(lb.select(&instances).unwrap().address, "10.0.0.1:80");
        assert_eq!(lb.select(&instances).unwrap().address, "10.0.0.2:80");
        assert_eq!(lb.select(&instances).unwrap().address, "10.0.0.1:80");
    }

    #[test]
    fn test_round_robin_skips_unhealthy() {
        let lb = RoundRobin::new();
        let instances = vec![instance("10.0.0.1:80", false), instance("10.0.0.2:80", true)];
        for _ in 0..4 {
            assert_eq!(lb.select(&instances).unwrap().address, "10.0.0.2:80");
        }

        let dead = vec![instance("10.0.0.1:80", false)];
        assert!(lb.select(&dead).is_none());
    }
}
