//! Uniform random selection strategy.

use crate::discovery::ServiceInstance;
use crate::load_balancer::SelectionPolicy;

/// Picks a healthy instance uniformly at random.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelection;

impl SelectionPolicy for RandomSelection {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        let healthy: Vec<&ServiceInstance> = instances.iter().filter(|i| i.healthy).collect();
        if healthy.is_empty() {
            return None;
        }
        Some(healthy[fastrand::usize(..healthy.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::instance;

    #[test]
    fn test_random_only_returns_healthy() {
        let instances = vec![
            instance("10.0.0.1:80", false),
            instance("10.0.0.2:80", true),
            instance("10.0.0.3:80", true),
        ];
        for _ in 0..50 {
            let picked = RandomSelection.select(&instances).unwrap();
            assert!(picked.healthy);
            assert_ne!(picked.address, "10.0.0.1:80");
        }
        assert!(RandomSelection.select(&[]).is_none());
    }
}
