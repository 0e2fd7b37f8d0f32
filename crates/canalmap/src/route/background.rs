use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use super::client::RouteClient;
use super::dispatcher::{RouteDispatcher, RouteOutcome};
use super::wire::RouteRequest;

/// Route lookups running beside the interactive one, one lane per key.
///
/// Every lane is its own [`RouteDispatcher`]: a resubmit under a key only
/// supersedes that key's request, never another lane's.
pub struct BackgroundRoutes {
    runtime: Handle,
    client: Arc<dyn RouteClient>,
    timeout: Duration,
    lanes: BTreeMap<String, RouteDispatcher>,
}

impl BackgroundRoutes {
    pub fn new(runtime: Handle, client: Arc<dyn RouteClient>, timeout: Duration) -> Self {
        Self {
            runtime,
            client,
            timeout,
            lanes: BTreeMap::new(),
        }
    }

    pub fn submit(&mut self, key: &str, request: RouteRequest) -> u64 {
        let lane = self.lanes.entry(key.to_string()).or_insert_with(|| {
            RouteDispatcher::new(self.runtime.clone(), Arc::clone(&self.client), self.timeout)
        });
        lane.submit(request)
    }

    pub fn in_flight(&self, key: &str) -> bool {
        self.lanes.get(key).is_some_and(RouteDispatcher::in_flight)
    }

    pub fn in_flight_count(&self) -> usize {
        self.lanes.values().filter(|lane| lane.in_flight()).count()
    }

    /// Drops the lane; a pending lookup is aborted and never reported.
    pub fn cancel(&mut self, key: &str) -> bool {
        let Some(lane) = self.lanes.remove(key) else {
            return false;
        };
        let was_in_flight = lane.in_flight();
        if was_in_flight {
            debug!(key, "background_route_cancelled");
        }
        was_in_flight
    }

    /// Every outcome that has arrived, in key order.
    pub fn poll(&mut self) -> Vec<(String, RouteOutcome)> {
        let mut outcomes = Vec::new();
        for (key, lane) in &mut self.lanes {
            while let Some(outcome) = lane.poll() {
                outcomes.push((key.clone(), outcome));
            }
        }
        outcomes
    }
}

impl fmt::Debug for BackgroundRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRoutes")
            .field("timeout", &self.timeout)
            .field("lanes", &self.lanes.len())
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}
