// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live permission updates.
//!
//! The subscriber listens to the server's permission change stream. A change
//! notice never carries the new permissions: on receipt the subscriber
//! refetches them, tells the UI, and asks for a full reload after a short
//! grace period so no component keeps stale state.
//!
//! The stream only shortens how long the UI can be out of date. The server
//! evaluates every request against the stored role, so a missed event costs
//! nothing but a few stale controls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crm_rbac_core::PermissionEvent;
use eventsource_stream::{Event, Eventsource};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::client::PermissionsClient;
use crate::error::{ClientError, Result};

pub const DEFAULT_RELOAD_GRACE: Duration = Duration::from_secs(3);

const SIGNAL_CAPACITY: usize = 16;

pub const PERMISSIONS_CHANGED_MESSAGE: &str =
	"Your permissions have been updated. The page will reload shortly.";

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
	/// Delay between the change notice and the reload request.
	pub reload_grace: Duration,
	pub reconnect_base_delay: Duration,
	pub reconnect_max_delay: Duration,
	/// Give up after this many consecutive failures (0 = never).
	pub max_reconnect_attempts: u32,
	/// Randomize reconnect delays so clients do not reconnect in lockstep.
	pub jitter: bool,
}

impl Default for SubscriberConfig {
	fn default() -> Self {
		Self {
			reload_grace: DEFAULT_RELOAD_GRACE,
			reconnect_base_delay: Duration::from_secs(1),
			reconnect_max_delay: Duration::from_secs(30),
			max_reconnect_attempts: 0,
			jitter: true,
		}
	}
}

/// Shown to the user after their permissions were refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionNotice {
	/// The event that triggered the refresh.
	pub reason: &'static str,
	pub message: String,
	pub version: u64,
}

/// The UI should reload the page now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequest {
	pub version: u64,
}

/// What the subscriber asks of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiSignal {
	Notice(PermissionNotice),
	Reload(ReloadRequest),
	/// Every session of the user is gone. Send them to sign in.
	SessionRevoked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefetchStatus {
	Pending,
	Completed { version: u64 },
	Failed(String),
	Cancelled,
}

/// A refetch in flight. Cancelling it before it finishes leaves the stored
/// permissions untouched.
#[derive(Debug, Clone)]
pub struct RefetchHandle {
	abort: AbortHandle,
	status: watch::Receiver<RefetchStatus>,
}

impl RefetchHandle {
	pub fn cancel(&self) {
		self.abort.abort();
	}

	pub fn is_pending(&self) -> bool {
		*self.status.borrow() == RefetchStatus::Pending && !self.abort.is_finished()
	}

	pub async fn wait(&self) -> RefetchStatus {
		let mut status = self.status.clone();
		loop {
			let current = status.borrow_and_update().clone();
			if current != RefetchStatus::Pending {
				return current;
			}
			if status.changed().await.is_err() {
				// Sender dropped without reporting: the task was aborted.
				let last = status.borrow().clone();
				return match last {
					RefetchStatus::Pending => RefetchStatus::Cancelled,
					other => other,
				};
			}
		}
	}
}

/// How the subscriber reacted to one event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
	Ignored,
	Refetching(RefetchHandle),
	/// A refetch was already running; this event joined it.
	Coalesced(RefetchHandle),
	SessionRevoked,
}

#[derive(Debug, Default)]
struct Pending {
	refetch: Option<RefetchHandle>,
	reload: Option<AbortHandle>,
}

#[derive(Debug)]
struct Shared {
	client: PermissionsClient,
	config: SubscriberConfig,
	signals: broadcast::Sender<UiSignal>,
	pending: Mutex<Pending>,
	connected: AtomicBool,
	reconnect_attempts: AtomicU64,
	events_received: AtomicU64,
}

impl Shared {
	fn pending(&self) -> MutexGuard<'_, Pending> {
		self.pending.lock().unwrap_or_else(PoisonError::into_inner)
	}

	async fn handle_event(self: &Arc<Self>, event: PermissionEvent) -> EventOutcome {
		debug!(event_type = event.event_type(), "Handling permission event");

		if event.invalidates_permissions() {
			let (handle, coalesced) = self.request_refetch(event.event_type());
			return if coalesced {
				EventOutcome::Coalesced(handle)
			} else {
				EventOutcome::Refetching(handle)
			};
		}

		match event {
			PermissionEvent::SessionRevoked(data) => {
				info!(user_id = %data.user_id, "Session revoked by server");
				self.cancel_pending();
				self.client.store().clear().await;
				let _ = self.signals.send(UiSignal::SessionRevoked);
				EventOutcome::SessionRevoked
			}
			_ => EventOutcome::Ignored,
		}
	}

	/// Start a refetch unless one is in flight. The flag is true when the
	/// returned handle belongs to an earlier request.
	fn request_refetch(self: &Arc<Self>, reason: &'static str) -> (RefetchHandle, bool) {
		let mut pending = self.pending();
		if let Some(handle) = pending.refetch.as_ref().filter(|h| h.is_pending()) {
			debug!(reason, "Refetch already in flight; coalescing");
			return (handle.clone(), true);
		}

		let (status_tx, status_rx) = watch::channel(RefetchStatus::Pending);
		let shared = Arc::clone(self);
		let task = tokio::spawn(async move {
			let status = match shared.client.refresh().await {
				Ok((_, version)) => {
					shared.after_refresh(reason, version);
					RefetchStatus::Completed { version }
				}
				Err(e) => {
					warn!(reason, error = %e, "Permission refetch failed");
					RefetchStatus::Failed(e.to_string())
				}
			};
			let _ = status_tx.send(status);
		});

		let handle = RefetchHandle {
			abort: task.abort_handle(),
			status: status_rx,
		};
		pending.refetch = Some(handle.clone());
		(handle, false)
	}

	fn after_refresh(&self, reason: &'static str, version: u64) {
		let _ = self.signals.send(UiSignal::Notice(PermissionNotice {
			reason,
			message: PERMISSIONS_CHANGED_MESSAGE.to_string(),
			version,
		}));

		let mut pending = self.pending();
		if pending.reload.as_ref().is_some_and(|h| !h.is_finished()) {
			return;
		}
		let signals = self.signals.clone();
		let grace = self.config.reload_grace;
		let task = tokio::spawn(async move {
			tokio::time::sleep(grace).await;
			let _ = signals.send(UiSignal::Reload(ReloadRequest { version }));
		});
		pending.reload = Some(task.abort_handle());
	}

	fn cancel_pending(&self) {
		let mut pending = self.pending();
		if let Some(refetch) = pending.refetch.take() {
			refetch.cancel();
		}
		if let Some(reload) = pending.reload.take() {
			reload.abort();
		}
	}
}

/// Keeps a [`PermissionStore`](crate::PermissionStore) in step with the
/// server and tells the UI when it changed.
#[derive(Debug)]
pub struct PermissionSubscriber {
	shared: Arc<Shared>,
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PermissionSubscriber {
	pub fn new(client: PermissionsClient, config: SubscriberConfig) -> Self {
		let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
		Self {
			shared: Arc::new(Shared {
				client,
				config,
				signals,
				pending: Mutex::new(Pending::default()),
				connected: AtomicBool::new(false),
				reconnect_attempts: AtomicU64::new(0),
				events_received: AtomicU64::new(0),
			}),
			task_handle: None,
			shutdown_tx: None,
		}
	}

	pub fn client(&self) -> &PermissionsClient {
		&self.shared.client
	}

	/// Notices, reload requests and revocations for the UI.
	pub fn signals(&self) -> broadcast::Receiver<UiSignal> {
		self.shared.signals.subscribe()
	}

	/// React to one event. Events arriving over another transport can be fed
	/// in here directly.
	pub async fn handle_event(&self, event: PermissionEvent) -> EventOutcome {
		self.shared.handle_event(event).await
	}

	/// Refetch now, joining a refetch already in flight.
	pub fn refetch(&self) -> RefetchHandle {
		self.shared.request_refetch("manual").0
	}

	/// Abort a pending refetch and reload, e.g. when the user navigates away.
	pub fn cancel_pending(&self) {
		self.shared.cancel_pending();
	}

	/// Open the stream in a background task. Reconnects with backoff until
	/// stopped or the server rejects the session.
	pub async fn start(&mut self) -> Result<()> {
		self.stop().await;

		let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
		self.shutdown_tx = Some(shutdown_tx);

		let shared = Arc::clone(&self.shared);
		self.task_handle = Some(tokio::spawn(async move {
			run_stream_loop(shared, shutdown_rx).await;
		}));
		Ok(())
	}

	pub async fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(()).await;
		}
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
			let _ = handle.await;
		}
		self.shared.cancel_pending();
		self.shared.connected.store(false, Ordering::SeqCst);
	}

	pub fn is_connected(&self) -> bool {
		self.shared.connected.load(Ordering::SeqCst)
	}

	pub fn reconnect_attempts(&self) -> u64 {
		self.shared.reconnect_attempts.load(Ordering::SeqCst)
	}

	pub fn events_received(&self) -> u64 {
		self.shared.events_received.load(Ordering::SeqCst)
	}
}

impl Drop for PermissionSubscriber {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
		self.shared.cancel_pending();
	}
}

/// Exponential backoff capped at `reconnect_max_delay`. With jitter the delay
/// is drawn from the upper half of the window.
pub fn reconnect_delay(config: &SubscriberConfig, consecutive_failures: u32) -> Duration {
	let factor = 2u64.saturating_pow(consecutive_failures.min(10));
	let base_ms = config.reconnect_base_delay.as_millis() as u64;
	let max_ms = config.reconnect_max_delay.as_millis() as u64;
	let capped = base_ms.saturating_mul(factor).min(max_ms);
	if config.jitter {
		let half = capped / 2;
		Duration::from_millis(half + fastrand::u64(0..=capped - half))
	} else {
		Duration::from_millis(capped)
	}
}

async fn run_stream_loop(shared: Arc<Shared>, mut shutdown_rx: mpsc::Receiver<()>) {
	let mut consecutive_failures: u32 = 0;
	let mut resync = false;

	loop {
		if shutdown_rx.try_recv().is_ok() {
			info!("Permission stream received shutdown signal");
			break;
		}

		let url = shared.client.stream_url();
		info!(url = %url, "Connecting to permission stream");

		match connect_and_process(&shared, resync).await {
			Ok(()) => {
				debug!("Permission stream ended normally");
				consecutive_failures = 0;
			}
			Err(e) if !e.is_transient() => {
				error!(error = %e, "Permission stream rejected; not reconnecting");
				shared.connected.store(false, Ordering::SeqCst);
				break;
			}
			Err(e) => {
				error!(error = %e, "Permission stream error");
				consecutive_failures += 1;
			}
		}

		shared.connected.store(false, Ordering::SeqCst);
		// Events may have been missed while disconnected.
		resync = true;

		let max = shared.config.max_reconnect_attempts;
		if max > 0 && consecutive_failures >= max {
			error!(
				attempts = consecutive_failures,
				"Max reconnection attempts reached, stopping permission stream"
			);
			break;
		}

		let delay = reconnect_delay(&shared.config, consecutive_failures);
		shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
		warn!(
			delay_ms = delay.as_millis() as u64,
			attempts = consecutive_failures,
			"Reconnecting to permission stream"
		);

		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown_rx.recv() => {
				info!("Permission stream received shutdown signal during reconnect wait");
				break;
			}
		}
	}
}

async fn connect_and_process(shared: &Arc<Shared>, resync: bool) -> Result<()> {
	let response = shared.client.stream_request().send().await?;

	let status = response.status();
	if status == reqwest::StatusCode::UNAUTHORIZED {
		return Err(ClientError::Unauthorized);
	}
	if !status.is_success() {
		return Err(ClientError::ServerError {
			status: status.as_u16(),
			message: response.text().await.unwrap_or_default(),
		});
	}

	shared.connected.store(true, Ordering::SeqCst);
	info!("Permission stream established");

	if resync {
		shared.request_refetch("reconnected");
	}

	let mut events = response.bytes_stream().eventsource();
	while let Some(event) = events.next().await {
		match event {
			Ok(event) => {
				shared.events_received.fetch_add(1, Ordering::SeqCst);
				if let Some(event) = parse_event(&event) {
					shared.handle_event(event).await;
				}
			}
			Err(e) => return Err(ClientError::SseStreamError(e.to_string())),
		}
	}

	Ok(())
}

fn parse_event(event: &Event) -> Option<PermissionEvent> {
	if event.data.is_empty() {
		return None;
	}
	match serde_json::from_str(&event.data) {
		Ok(parsed) => Some(parsed),
		Err(e) => {
			warn!(event_type = %event.event, error = %e, "Failed to parse permission event");
			None
		}
	}
}
