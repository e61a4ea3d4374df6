//! Session lifecycle notifications.
//!
//! [`NotificationBus`] fans out two signals, `credential-refreshed` and `credential-expired`, to
//! explicitly registered observers. Delivery is best-effort: channel subscribers are unbounded and
//! dropped subscriptions are skipped, so publishing never waits on a consumer and a missed event
//! cannot leave a request unresolved.

// std
use std::task::{Context, Poll};
// crates.io
use futures::{
	Stream,
	channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
// self
use crate::{_prelude::*, auth::TokenSecret, obs};

/// Credential lifecycle event published by the refresh coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A renewal succeeded and `access_token` is now attached to every call.
	CredentialRefreshed {
		/// Newly issued access token.
		access_token: TokenSecret,
	},
	/// Renewal failed or was impossible; stored credentials have been cleared.
	CredentialExpired,
}
impl SessionEvent {
	/// Returns the stable signal name.
	pub const fn name(&self) -> &'static str {
		match self {
			Self::CredentialRefreshed { .. } => "credential-refreshed",
			Self::CredentialExpired => "credential-expired",
		}
	}
}
impl Display for SessionEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}

/// Callback-style consumer of [`SessionEvent`]s.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Handles one event. Runs on the task that completed the renewal; keep it short.
	fn on_event(&self, event: &SessionEvent);
}
impl<F> SessionObserver for F
where
	F: Send + Sync + Fn(&SessionEvent),
{
	fn on_event(&self, event: &SessionEvent) {
		self(event)
	}
}

#[derive(Clone)]
enum Subscriber {
	Observer(Arc<dyn SessionObserver>),
	Channel(UnboundedSender<SessionEvent>),
}
impl Subscriber {
	fn is_closed(&self) -> bool {
		match self {
			Self::Observer(_) => false,
			Self::Channel(tx) => tx.is_closed(),
		}
	}
}

/// Explicit fan-out point for session lifecycle events.
///
/// Cloning the bus yields another handle to the same subscriber list.
#[derive(Clone, Default)]
pub struct NotificationBus {
	subscribers: Arc<RwLock<Vec<Subscriber>>>,
}
impl NotificationBus {
	/// Registers a callback observer for every future event.
	pub fn register(&self, observer: Arc<dyn SessionObserver>) {
		self.subscribers.write().push(Subscriber::Observer(observer));
	}

	/// Opens a [`Subscription`] stream receiving every future event.
	pub fn subscribe(&self) -> Subscription {
		let (tx, rx) = mpsc::unbounded();

		self.subscribers.write().push(Subscriber::Channel(tx));

		Subscription(rx)
	}

	/// Returns the number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.subscribers.read().iter().filter(|s| !s.is_closed()).count()
	}

	/// Delivers `event` to every subscriber, pruning dropped subscriptions.
	pub fn publish(&self, event: SessionEvent) {
		obs::record_session_event(event.name());

		let snapshot = self.subscribers.read().clone();
		let mut pruned = false;

		for subscriber in &snapshot {
			match subscriber {
				Subscriber::Observer(observer) => observer.on_event(&event),
				Subscriber::Channel(tx) =>
					if tx.unbounded_send(event.clone()).is_err() {
						pruned = true;
					},
			}
		}

		if pruned {
			self.subscribers.write().retain(|s| !s.is_closed());
		}
	}
}
impl Debug for NotificationBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NotificationBus")
			.field("subscribers", &self.subscribers.read().len())
			.finish()
	}
}

/// Stream of [`SessionEvent`]s returned by [`NotificationBus::subscribe`].
///
/// Dropping the subscription unregisters it on the next publish.
#[derive(Debug)]
pub struct Subscription(UnboundedReceiver<SessionEvent>);
impl Subscription {
	/// Returns the next already-delivered event without waiting.
	pub fn try_next(&mut self) -> Option<SessionEvent> {
		self.0.try_recv().ok()
	}
}
impl Stream for Subscription {
	type Item = SessionEvent;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.0).poll_next(cx)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use futures::StreamExt;
	// self
	use super::*;

	#[test]
	fn event_names_match_signal_contract() {
		let refreshed = SessionEvent::CredentialRefreshed { access_token: TokenSecret::new("T2") };

		assert_eq!(refreshed.name(), "credential-refreshed");
		assert_eq!(SessionEvent::CredentialExpired.to_string(), "credential-expired");
	}

	#[test]
	fn observers_receive_each_event() {
		let bus = NotificationBus::default();
		let seen = Arc::new(AtomicUsize::new(0));
		let counter = seen.clone();

		bus.register(Arc::new(move |event: &SessionEvent| {
			if matches!(event, SessionEvent::CredentialExpired) {
				counter.fetch_add(1, Ordering::SeqCst);
			}
		}));
		bus.publish(SessionEvent::CredentialExpired);
		bus.publish(SessionEvent::CredentialRefreshed { access_token: TokenSecret::new("T2") });

		assert_eq!(seen.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn subscriptions_stream_events_in_order() {
		let bus = NotificationBus::default();
		let mut subscription = bus.subscribe();

		bus.publish(SessionEvent::CredentialRefreshed { access_token: TokenSecret::new("T2") });
		bus.publish(SessionEvent::CredentialExpired);

		assert_eq!(
			subscription.next().await,
			Some(SessionEvent::CredentialRefreshed { access_token: TokenSecret::new("T2") })
		);
		assert_eq!(subscription.next().await, Some(SessionEvent::CredentialExpired));
		assert_eq!(subscription.try_next(), None);
	}

	#[test]
	fn dropped_subscriptions_are_pruned_on_publish() {
		let bus = NotificationBus::default();
		let kept = bus.subscribe();

		drop(bus.subscribe());

		assert_eq!(bus.subscriber_count(), 1);

		bus.publish(SessionEvent::CredentialExpired);

		assert_eq!(bus.subscribers.read().len(), 1);

		drop(kept);
	}
}
