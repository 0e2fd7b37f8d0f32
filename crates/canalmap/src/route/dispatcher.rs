use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pathfinding::Path;

use super::client::RouteClient;
use super::error::RouteError;
use super::wire::RouteRequest;

pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub generation: u64,
    pub request: RouteRequest,
    pub result: Result<Path, RouteError>,
}

struct InFlight {
    generation: u64,
    request: RouteRequest,
    task: JoinHandle<()>,
}

/// Runs at most one route lookup at a time for a session.
///
/// Submitting while a request is in flight aborts the older one; only the
/// newest generation is ever returned from `poll`. Results come back over a
/// channel so the frame thread never waits on the runtime.
pub struct RouteDispatcher {
    runtime: Handle,
    client: Arc<dyn RouteClient>,
    timeout: Duration,
    generation: u64,
    in_flight: Option<InFlight>,
    sender: UnboundedSender<RouteOutcome>,
    receiver: UnboundedReceiver<RouteOutcome>,
}

impl RouteDispatcher {
    pub fn new(runtime: Handle, client: Arc<dyn RouteClient>, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            runtime,
            client,
            timeout,
            generation: 0,
            in_flight: None,
            sender,
            receiver,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation
    }

    pub fn submit(&mut self, request: RouteRequest) -> u64 {
        if let Some(stale) = self.in_flight.take() {
            stale.task.abort();
            debug!(generation = stale.generation, "route_request_superseded");
        }
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        let timeout = self.timeout;
        let task = self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, client.find_route(request)).await {
                Ok(result) => result,
                Err(_) => Err(RouteError::RequestTimeout { timeout }),
            };
            // The receiver only disappears with the dispatcher itself.
            let _ = sender.send(RouteOutcome {
                generation,
                request,
                result,
            });
        });
        self.in_flight = Some(InFlight {
            generation,
            request,
            task,
        });
        info!(
            generation,
            mode = request.pathfinding_mode.as_str(),
            "route_request_submitted"
        );
        generation
    }

    /// Aborts the in-flight request; `poll` then reports it as cancelled
    /// under a fresh generation so a result that raced the abort is dropped.
    pub fn cancel(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        in_flight.task.abort();
        self.generation = self.generation.wrapping_add(1);
        let _ = self.sender.send(RouteOutcome {
            generation: self.generation,
            request: in_flight.request,
            result: Err(RouteError::Cancelled),
        });
        debug!(generation = in_flight.generation, "route_request_cancelled");
        true
    }

    /// Next outcome for the current generation, without blocking.
    pub fn poll(&mut self) -> Option<RouteOutcome> {
        loop {
            match self.receiver.try_recv() {
                Ok(outcome) if outcome.generation != self.generation => {
                    debug!(generation = outcome.generation, "stale_route_outcome_dropped");
                }
                Ok(outcome) => {
                    if self
                        .in_flight
                        .as_ref()
                        .is_some_and(|in_flight| in_flight.generation == outcome.generation)
                    {
                        self.in_flight = None;
                    }
                    match &outcome.result {
                        Ok(path) => debug!(
                            generation = outcome.generation,
                            path = %path.id(),
                            "route_outcome_received"
                        ),
                        Err(RouteError::RequestTimeout { .. }) => warn!(
                            generation = outcome.generation,
                            timeout_s = self.timeout.as_secs_f64(),
                            "route_request_timed_out"
                        ),
                        Err(error) => debug!(
                            generation = outcome.generation,
                            error = %error,
                            "route_request_failed"
                        ),
                    }
                    return Some(outcome);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl fmt::Debug for RouteDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDispatcher")
            .field("timeout", &self.timeout)
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight.as_ref().map(|in_flight| in_flight.generation))
            .finish()
    }
}

impl Drop for RouteDispatcher {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::geo::GeoPoint;
    use crate::graph::{NodeKind, PathfindingMode, TransportMode};
    use crate::pathfinding::{PathError, Waypoint};
    use crate::route::RouteFuture;

    /// Answers with a straight two-point path after `delay`.
    struct DelayedClient {
        delay: Duration,
    }

    impl RouteClient for DelayedClient {
        fn find_route(&self, request: RouteRequest) -> RouteFuture {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                if request.start_point == request.end_point {
                    return Err(PathError::NoRoute.into());
                }
                let waypoint = |position: GeoPoint| Waypoint {
                    position,
                    kind: NodeKind::Endpoint,
                    mode: TransportMode::Walking,
                    is_intermediate: false,
                };
                Ok(Path::from_waypoints(
                    vec![waypoint(request.start_point), waypoint(request.end_point)],
                    false,
                ))
            })
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime")
    }

    fn request(end_lng: f64) -> RouteRequest {
        RouteRequest::new(
            GeoPoint::new(45.437, 12.332),
            GeoPoint::new(45.437, end_lng),
            PathfindingMode::Real,
        )
    }

    fn wait_for(dispatcher: &mut RouteDispatcher) -> RouteOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(outcome) = dispatcher.poll() {
                return outcome;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("no route outcome within deadline");
    }

    #[test]
    fn completed_request_is_delivered_once() {
        let runtime = runtime();
        let client = Arc::new(DelayedClient {
            delay: Duration::from_millis(1),
        });
        let mut dispatcher =
            RouteDispatcher::new(runtime.handle().clone(), client, DEFAULT_ROUTE_TIMEOUT);

        let generation = dispatcher.submit(request(12.333));
        assert!(dispatcher.in_flight());
        let outcome = wait_for(&mut dispatcher);
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.result.expect("path").waypoints().len(), 2);
        assert!(!dispatcher.in_flight());
        assert!(dispatcher.poll().is_none());
    }

    #[test]
    fn newer_submit_supersedes_the_stale_request() {
        let runtime = runtime();
        let client = Arc::new(DelayedClient {
            delay: Duration::from_millis(20),
        });
        let mut dispatcher =
            RouteDispatcher::new(runtime.handle().clone(), client, DEFAULT_ROUTE_TIMEOUT);

        let first = dispatcher.submit(request(12.333));
        let second = dispatcher.submit(request(12.334));
        assert_ne!(first, second);

        let outcome = wait_for(&mut dispatcher);
        assert_eq!(outcome.generation, second);
        let path = outcome.result.expect("path");
        assert_eq!(path.end(), Some(GeoPoint::new(45.437, 12.334)));
        std::thread::sleep(Duration::from_millis(40));
        assert!(dispatcher.poll().is_none());
    }

    #[test]
    fn slow_lookup_times_out() {
        let runtime = runtime();
        let client = Arc::new(DelayedClient {
            delay: Duration::from_secs(30),
        });
        let timeout = Duration::from_millis(10);
        let mut dispatcher = RouteDispatcher::new(runtime.handle().clone(), client, timeout);

        dispatcher.submit(request(12.333));
        let outcome = wait_for(&mut dispatcher);
        let error = outcome.result.expect_err("timeout");
        assert_eq!(error, RouteError::RequestTimeout { timeout });
        assert!(error.is_retryable());
        assert!(!dispatcher.in_flight());
    }

    #[test]
    fn cancel_reports_the_request_as_cancelled() {
        let runtime = runtime();
        let client = Arc::new(DelayedClient {
            delay: Duration::from_secs(30),
        });
        let mut dispatcher =
            RouteDispatcher::new(runtime.handle().clone(), client, DEFAULT_ROUTE_TIMEOUT);

        assert!(!dispatcher.cancel());
        dispatcher.submit(request(12.333));
        assert!(dispatcher.cancel());
        assert!(!dispatcher.in_flight());
        let outcome = dispatcher.poll().expect("cancel outcome");
        assert_eq!(outcome.result, Err(RouteError::Cancelled));
    }

    #[test]
    fn path_errors_pass_through_unchanged() {
        let runtime = runtime();
        let client = Arc::new(DelayedClient {
            delay: Duration::ZERO,
        });
        let mut dispatcher =
            RouteDispatcher::new(runtime.handle().clone(), client, DEFAULT_ROUTE_TIMEOUT);

        dispatcher.submit(request(12.332));
        let outcome = wait_for(&mut dispatcher);
        assert_eq!(outcome.result, Err(RouteError::Path(PathError::NoRoute)));
    }
}
