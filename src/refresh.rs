//! Single-flight credential renewal.
//!
//! [`RefreshCoordinator::acquire_token`] is the only way to renew the session. The first caller
//! that finds the coordinator idle claims the cycle under one mutex guard: it reads the refresh
//! token, builds the renewal future, and records it in the state before anything is awaited.
//! Every caller arriving while the cycle is running attaches to that same future instead of
//! starting its own, so exactly one renewal call is outstanding no matter how many requests
//! were rejected. The claimed cycle is also handed to the coordinator's [`Spawner`], so it runs
//! to completion even if every attached caller goes away. The cycle commits the new pair (or clears the store), returns the state to idle,
//! publishes the lifecycle event, and then resolves every attached caller with the same outcome.

mod metrics;
mod renewal;

pub use metrics::RefreshMetrics;

// std
use std::sync::Weak;
// crates.io
use futures::{
	future::{BoxFuture, FutureExt, Shared},
	task::SpawnExt,
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	error::{ExpiryReason, SessionExpired},
	http::HttpTransport,
	notify::{NotificationBus, SessionEvent},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	runtime::Spawner,
	store::CredentialStore,
};

type RenewalOutcome = std::result::Result<TokenSecret, SessionExpired>;
type RenewalHandle = Shared<BoxFuture<'static, RenewalOutcome>>;

/// Internal state of the coordinator.
enum RefreshState {
	Idle,
	Refreshing {
		cycle: u64,
		renewal: RenewalHandle,
		waiters: usize,
	},
}

struct StateSlot {
	state: RefreshState,
	cycles: u64,
}
impl Default for StateSlot {
	fn default() -> Self {
		Self { state: RefreshState::Idle, cycles: 0 }
	}
}

/// Point-in-time view of the coordinator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No renewal is outstanding.
	Idle,
	/// A renewal is in flight.
	Refreshing {
		/// Monotonic cycle number, starting at 1.
		cycle: u64,
		/// Callers that attached to the cycle after its owner claimed it.
		waiters: usize,
	},
}

/// Single-flight renewal state machine shared by every dispatcher of one session.
///
/// Cloning is cheap and yields another handle to the same state, store, and transport.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	slot: Arc<Mutex<StateSlot>>,
	store: Arc<dyn CredentialStore>,
	transport: Arc<T>,
	endpoint: Url,
	bus: Option<NotificationBus>,
	spawner: Spawner,
	metrics: Arc<RefreshMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator renewing against `endpoint`.
	///
	/// When `bus` is `None` renewals still run, but no lifecycle events are published. Every
	/// claimed cycle is spawned on `spawner`.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
		endpoint: Url,
		bus: Option<NotificationBus>,
		spawner: Spawner,
	) -> Self {
		Self {
			slot: Default::default(),
			store,
			transport: transport.into(),
			endpoint,
			bus,
			spawner,
			metrics: Default::default(),
		}
	}

	/// Returns the renewal endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Returns the shared renewal counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns a snapshot of the current state.
	pub fn state(&self) -> RefreshPhase {
		match &self.slot.lock().state {
			RefreshState::Idle => RefreshPhase::Idle,
			RefreshState::Refreshing { cycle, waiters, .. } =>
				RefreshPhase::Refreshing { cycle: *cycle, waiters: *waiters },
		}
	}

	/// Returns a fresh access token, renewing the credential pair if needed.
	///
	/// Joins the renewal in flight when there is one; otherwise starts a new cycle. Fails fast
	/// with [`Error::AuthExpired`] when no refresh token is stored, without any network call.
	/// Dropping the returned future detaches this caller only; the renewal keeps running on the
	/// spawner and still commits its outcome and publishes its event.
	pub async fn acquire_token(&self) -> Result<TokenSecret> {
		let renewal = self.claim()?;

		renewal.await.map_err(Error::from)
	}

	fn claim(&self) -> Result<RenewalHandle> {
		let mut slot = self.slot.lock();

		if let RefreshState::Refreshing { renewal, waiters, .. } = &mut slot.state {
			*waiters += 1;

			self.metrics.record_coalesced();
			obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Coalesced);

			return Ok(renewal.clone());
		}

		let Some(pair) = self.store.get()? else {
			drop(slot);

			return Err(self.expire_without_renewal().into());
		};

		slot.cycles += 1;

		let cycle = slot.cycles;
		let renewal = Renewal {
			slot: Arc::downgrade(&self.slot),
			store: self.store.clone(),
			transport: self.transport.clone(),
			endpoint: self.endpoint.clone(),
			bus: self.bus.clone(),
			metrics: self.metrics.clone(),
		}
		.run(cycle, pair.refresh_token)
		.boxed()
		.shared();

		slot.state = RefreshState::Refreshing { cycle, renewal: renewal.clone(), waiters: 0 };

		drop(slot);

		if self.spawner.spawn(renewal.clone().map(drop)).is_err() {
			FlowSpan::new(FlowKind::Renewal, "spawn")
				.note("executor unavailable; renewal is driven by its callers");
		}

		Ok(renewal)
	}

	fn expire_without_renewal(&self) -> SessionExpired {
		let span = FlowSpan::new(FlowKind::Renewal, "missing_refresh_token");

		span.note("no refresh token stored; expiring session without a renewal call");

		if self.store.clear().is_err() {
			span.note("failed to clear credential store");
		}

		self.metrics.record_failure();
		obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Failure);

		if let Some(bus) = &self.bus {
			bus.publish(SessionEvent::CredentialExpired);
		}

		SessionExpired::new(ExpiryReason::MissingRefreshToken)
	}
}
impl<T> Clone for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			slot: self.slot.clone(),
			store: self.store.clone(),
			transport: self.transport.clone(),
			endpoint: self.endpoint.clone(),
			bus: self.bus.clone(),
			spawner: self.spawner.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("endpoint", &self.endpoint.as_str())
			.field("state", &self.state())
			.field("notifications", &self.bus.is_some())
			.finish()
	}
}

/// Everything one renewal cycle needs, detached from the coordinator so an abandoned cycle
/// does not keep the coordinator alive.
struct Renewal<T>
where
	T: ?Sized + HttpTransport,
{
	slot: Weak<Mutex<StateSlot>>,
	store: Arc<dyn CredentialStore>,
	transport: Arc<T>,
	endpoint: Url,
	bus: Option<NotificationBus>,
	metrics: Arc<RefreshMetrics>,
}
impl<T> Renewal<T>
where
	T: ?Sized + HttpTransport,
{
	async fn run(self, cycle: u64, refresh_token: TokenSecret) -> RenewalOutcome {
		const KIND: FlowKind = FlowKind::Renewal;

		let span = FlowSpan::new(KIND, "renew");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_renewal();

		let outcome = span.instrument(self.exchange(&refresh_token)).await.and_then(|pair| {
			let access_token = pair.access_token.clone();

			self.store
				.set(pair)
				.map(|()| access_token)
				.map_err(|e| ExpiryReason::Storage { message: e.to_string() })
		});

		if outcome.is_err() && self.store.clear().is_err() {
			span.note("failed to clear credential store after renewal failure");
		}

		obs::record_renewal_waiters(self.finish(cycle));

		match outcome {
			Ok(access_token) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				if let Some(bus) = &self.bus {
					bus.publish(SessionEvent::CredentialRefreshed {
						access_token: access_token.clone(),
					});
				}

				Ok(access_token)
			},
			Err(reason) => {
				span.note("renewal failed; session expired");
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				if let Some(bus) = &self.bus {
					bus.publish(SessionEvent::CredentialExpired);
				}

				Err(SessionExpired::new(reason))
			},
		}
	}

	async fn exchange(
		&self,
		refresh_token: &TokenSecret,
	) -> std::result::Result<CredentialPair, ExpiryReason> {
		let request = renewal::build_request(&self.endpoint, refresh_token)?;
		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| ExpiryReason::Transport { message: e.to_string() })?;

		renewal::parse_response(response, refresh_token)
	}

	/// Returns the state to idle and reports how many callers attached after the owner.
	fn finish(&self, cycle: u64) -> usize {
		let Some(slot) = self.slot.upgrade() else { return 0 };
		let mut slot = slot.lock();
		let waiters = match &slot.state {
			RefreshState::Refreshing { cycle: current, waiters, .. } if *current == cycle => *waiters,
			_ => return 0,
		};

		slot.state = RefreshState::Idle;

		waiters
	}
}
