//! Agent load balancer.
//!
//! Process-wide, in-memory, best effort. Each agent has an in-flight counter;
//! `pick_agent` selects the least-loaded agent and reserves it in the same
//! critical section.

use std::sync::Mutex;

use tracing::{debug, warn};

pub struct AgentLoadBalancer {
    /// Roster order doubles as the tie-break order.
    loads: Mutex<Vec<(String, u64)>>,
}

impl AgentLoadBalancer {
    pub fn new<I, S>(roster: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut loads: Vec<(String, u64)> = Vec::new();
        for agent in roster {
            let agent = agent.into();
            if !loads.iter().any(|(a, _)| *a == agent) {
                loads.push((agent, 0));
            }
        }
        Self {
            loads: Mutex::new(loads),
        }
    }

    /// Select the least-loaded agent and increment its counter.
    ///
    /// Ties go to the earliest roster entry. `None` only for an empty roster.
    pub fn pick_agent(&self) -> Option<String> {
        let mut loads = self.loads.lock().unwrap_or_else(|e| e.into_inner());
        let (agent, load) = loads
            .iter_mut()
            .reduce(|best, entry| if entry.1 < best.1 { entry } else { best })?;
        *load += 1;
        debug!(agent = %agent, load = *load, "Agent reserved");
        Some(agent.clone())
    }

    /// Hand back a reservation made by `pick_agent`.
    pub fn release(&self, agent: &str) {
        let mut loads = self.loads.lock().unwrap_or_else(|e| e.into_inner());
        match loads.iter_mut().find(|(a, _)| a == agent) {
            Some((_, load)) => *load = load.saturating_sub(1),
            None => warn!(agent, "Release for agent not on the roster"),
        }
    }

    /// Current counters in roster order.
    pub fn loads(&self) -> Vec<(String, u64)> {
        self.loads.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
