//! The lifecycle gate.
//!
//! Owns the dependency handle, the listener task and the single state
//! variable. Traffic is accepted only between READY and SHUTTING_DOWN.

use std::sync::atomic::Ordering;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use axum::Router;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{validate_config, ServiceConfig};
use crate::dependency::{redact_uri, Connector, DependencyHandle};
use crate::error::{ShutdownError, StartupError};
use crate::http::GateServer;
use crate::lifecycle::monitor::{GateMonitor, GateStatus};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{IllegalTransition, LifecycleEvent, LifecycleState};
use crate::net::listener;
use crate::observability::metrics;
use crate::resilience::{connect_with_retry, RetryError, RetryPolicy};

type ServerTask = JoinHandle<Result<(), std::io::Error>>;

/// Connection-gated service lifecycle controller.
///
/// Construct with the dependency connector and the fully-registered
/// application router, then call [`start`](Self::start) once. Share behind
/// an `Arc` so a signal handler can call [`shutdown`](Self::shutdown)
/// concurrently.
pub struct LifecycleGate<C: Connector> {
    connector: C,
    app: Router,
    monitor: GateMonitor,
    /// Aborts the retry loop when shutdown arrives during CONNECTING.
    cancel: Shutdown,
    /// Stops the accept loop.
    stop: Shutdown,
    /// Abandons requests still running after the drain deadline.
    expire: Shutdown,
    config: OnceLock<ServiceConfig>,
    handle: Mutex<Option<C::Handle>>,
    server: Mutex<Option<ServerTask>>,
    stopped: watch::Sender<bool>,
}

impl<C: Connector> LifecycleGate<C> {
    pub fn new(connector: C, app: Router) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            connector,
            app,
            monitor: GateMonitor::new(),
            cancel: Shutdown::new(),
            stop: Shutdown::new(),
            expire: Shutdown::new(),
            config: OnceLock::new(),
            handle: Mutex::new(None),
            server: Mutex::new(None),
            stopped,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.monitor.state()
    }

    pub fn status(&self) -> GateStatus {
        self.monitor.status()
    }

    /// States entered so far, oldest first.
    pub fn history(&self) -> Vec<LifecycleState> {
        self.monitor.history()
    }

    /// Cloneable read-only view, also available to handlers as an extension.
    pub fn monitor(&self) -> GateMonitor {
        self.monitor.clone()
    }

    /// Resolve once the gate is terminal: shutdown finished or startup failed.
    ///
    /// A `start` rejected for invalid config leaves the gate INITIALIZING and
    /// startable, so it does not count; wait only after a `start` that got
    /// past validation.
    pub async fn wait_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Connect to the dependency, then open the listener.
    pub async fn start(&self, config: ServiceConfig) -> Result<(), StartupError> {
        let current = self.state();
        if current != LifecycleState::Initializing {
            tracing::warn!(state = %current, "Start rejected, gate already started");
            return Err(StartupError::AlreadyStarting { state: current });
        }

        if let Err(errors) = validate_config(&config) {
            let err = StartupError::InvalidConfig(errors);
            tracing::error!(state = %current, error = %err, "Refusing to start");
            return Err(err);
        }

        self.transition(LifecycleEvent::StartRequested)
            .map_err(|illegal| StartupError::AlreadyStarting { state: illegal.from })?;

        let started = Instant::now();
        let config = self.config.get_or_init(|| config);
        let policy = RetryPolicy::from_config(config);

        tracing::info!(
            port = config.port,
            dependency = %redact_uri(&config.dependency_uri),
            max_attempts = policy.max_attempts(),
            "Connecting to dependency"
        );

        let mut cancel = self.cancel.subscribe();
        let inner = self.monitor.inner();
        let outcome = connect_with_retry(
            &self.connector,
            &config.dependency_uri,
            policy,
            &mut cancel,
            |attempt, _| {
                inner.attempts.store(attempt, Ordering::SeqCst);
                if let Err(illegal) = self.transition(LifecycleEvent::AttemptFailed) {
                    tracing::warn!(error = %illegal, "Retry observed outside CONNECTING");
                }
            },
        )
        .await;

        let connected = match outcome {
            Ok(connected) => connected,
            Err(err) => {
                let attempts = err.attempts();
                inner.attempts.store(attempts, Ordering::SeqCst);
                return Err(match err {
                    RetryError::Exhausted { last_error, .. } => {
                        self.fail(LifecycleEvent::RetriesExhausted);
                        tracing::error!(
                            state = %self.state(),
                            attempts,
                            error = %last_error,
                            "Dependency unreachable, giving up"
                        );
                        StartupError::DependencyUnreachable {
                            attempts,
                            source: last_error,
                        }
                    }
                    RetryError::Cancelled { .. } => {
                        self.fail(LifecycleEvent::Cancelled);
                        tracing::error!(state = %self.state(), attempts, "Startup cancelled by shutdown");
                        StartupError::Cancelled { attempts }
                    }
                });
            }
        };

        let attempts = connected.attempts;
        let handle = connected.handle;
        inner.attempts.store(attempts, Ordering::SeqCst);
        tracing::info!(peer = %handle.peer(), attempts, "Dependency ready");

        let (tcp, local_addr) = match listener::bind(config.bind_address()).await {
            Ok(bound) => bound,
            Err(err) => {
                handle.close().await;
                self.fail(LifecycleEvent::ListenerFailed);
                tracing::error!(state = %self.state(), error = %err, "Listener bind failed");
                return Err(StartupError::ListenerBindFailure(err));
            }
        };

        if self.cancel.is_triggered() {
            drop(tcp);
            handle.close().await;
            self.fail(LifecycleEvent::Cancelled);
            tracing::error!(state = %self.state(), attempts, "Startup cancelled by shutdown");
            return Err(StartupError::Cancelled { attempts });
        }

        let (open_tx, open_rx) = oneshot::channel();
        let server = GateServer::new(
            self.app.clone(),
            self.monitor.clone(),
            config.max_connections,
            self.expire.subscribe(),
        );
        let task = tokio::spawn(server.run(tcp, open_rx, self.stop.subscribe()));

        put(&self.handle, handle);
        put(&self.server, task);
        let _ = inner.local_addr.set(local_addr);

        if let Err(illegal) = self.transition(LifecycleEvent::DependencyReady) {
            if let Some(handle) = take(&self.handle) {
                handle.close().await;
            }
            tracing::error!(error = %illegal, "Gate could not open");
            return Err(illegal.into());
        }
        let _ = open_tx.send(());

        metrics::record_startup(started.elapsed());
        tracing::info!(
            address = %local_addr,
            attempts,
            elapsed = ?started.elapsed(),
            "Gate open, accepting traffic"
        );
        Ok(())
    }

    /// Stop accepting, drain in-flight requests, then release the dependency.
    ///
    /// During CONNECTING this cancels startup instead. Calling again after a
    /// completed shutdown returns `Ok(())` without doing anything.
    pub async fn shutdown(&self, reason: &str) -> Result<(), ShutdownError> {
        loop {
            match self.state() {
                LifecycleState::Ready => {
                    if self.transition(LifecycleEvent::ShutdownRequested).is_ok() {
                        break;
                    }
                }
                LifecycleState::ShuttingDown => {
                    return if *self.stopped.borrow() {
                        Ok(())
                    } else {
                        Err(ShutdownError::AlreadyShuttingDown)
                    };
                }
                LifecycleState::Connecting => {
                    tracing::info!(reason, "Shutdown requested while connecting, cancelling startup");
                    let _ = self.monitor.inner().shutdown_reason.set(reason.to_string());
                    self.cancel.trigger();

                    let mut changes = self.monitor.subscribe();
                    let _ = changes
                        .wait_for(|state| *state != LifecycleState::Connecting)
                        .await;

                    if self.state() == LifecycleState::Failed {
                        return Ok(());
                    }
                }
                state @ (LifecycleState::Initializing | LifecycleState::Failed) => {
                    tracing::warn!(state = %state, reason, "Shutdown rejected, gate not running");
                    return Err(ShutdownError::NotReady { state });
                }
            }
        }

        let _ = self.monitor.inner().shutdown_reason.set(reason.to_string());
        let tracker = self.monitor.tracker();
        tracing::info!(
            reason,
            in_flight = tracker.active_count(),
            "Shutting down, no longer accepting connections"
        );

        self.stop.trigger();

        let grace = self
            .config
            .get()
            .map(ServiceConfig::drain_grace)
            .unwrap_or(Duration::from_secs(10));
        let mut result = Ok(());

        let task = take(&self.server);
        if let Some(mut task) = task {
            let drained = tokio::time::timeout(grace, async {
                let served = (&mut task).await;
                tracker.wait_idle().await;
                served
            })
            .await;

            match drained {
                Ok(Ok(Ok(()))) => tracing::info!("In-flight requests drained"),
                Ok(Ok(Err(e))) => {
                    tracing::error!(error = %e, "HTTP server failed while draining");
                    result = Err(ShutdownError::Server(e));
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "HTTP server task failed");
                    result = Err(ShutdownError::ServerTask(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(
                        grace = ?grace,
                        in_flight = tracker.active_count(),
                        "Drain deadline exceeded, aborting remaining requests"
                    );
                    self.expire.trigger();
                    tracker.wait_idle().await;
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        let handle = take(&self.handle);
        if let Some(handle) = handle {
            let peer = handle.peer();
            handle.close().await;
            tracing::info!(peer = %peer, "Dependency connection released");
        }

        self.stopped.send_replace(true);
        tracing::info!(reason, "Shutdown complete");
        result
    }

    fn transition(&self, event: LifecycleEvent) -> Result<LifecycleState, IllegalTransition> {
        self.monitor.inner().state.apply(event)
    }

    /// Move to FAILED and release anyone waiting on the gate.
    fn fail(&self, event: LifecycleEvent) {
        if let Err(illegal) = self.transition(event) {
            tracing::warn!(error = %illegal, "Failure observed outside CONNECTING");
        }
        self.stopped.send_replace(true);
    }
}

fn put<T>(slot: &Mutex<Option<T>>, value: T) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}
