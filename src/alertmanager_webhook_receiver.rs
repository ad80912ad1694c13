//! the http endpoint alertmanager delivers its webhook notifications to
use std::{
	collections::HashMap,
	error::Error,
	net::{IpAddr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::JsonRejection, Extension, Json},
	http::StatusCode,
	routing::{get, post},
	Router,
};
use prometheus::{IntCounterVec, Opts};
use serde::Deserialize;

use crate::{alert, notify::Receiver, settings::Settings, telemetry_endpoint};

/// the only webhook schema version we understand
const SUPPORTED_VERSION: &str = "4";

/// receiver label of requests that couldn't be attributed to a receiver
const UNKNOWN_RECEIVER: &str = "N/A";

/// the `alert_webhook_receiver` section of the configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	#[allow(clippy::missing_docs_in_private_items)]
	pub bind_address: IpAddr,
	#[allow(clippy::missing_docs_in_private_items)]
	pub port: u16,
}

impl AlertReceiverSettings {
	/// the global webhook receiver settings
	pub fn global() -> &'static Self {
		&Settings::global().alert_webhook_receiver
	}

	#[allow(clippy::missing_docs_in_private_items)]
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// shared by all requests
pub struct State {
	/// configured receivers by name
	receivers: HashMap<String, Receiver>,
	/// use the hashed issue identifier label
	hash_jira_label: bool,
	/// handled requests by receiver and response status code
	metric: IntCounterVec,
}

impl State {
	/// construct state, the request counter isn't registered yet
	pub fn new(receivers: Vec<Receiver>, hash_jira_label: bool) -> Result<Self> {
		let metric = IntCounterVec::new(
			Opts::new("requests_total", "requests processed by the alertmanager webhook receiver")
				.namespace("jiralert")
				.subsystem("alertmanager_webhook"),
			&["receiver", "status_code"],
		)?;

		let receivers =
			receivers.into_iter().map(|receiver| (receiver.name().to_owned(), receiver)).collect();

		Ok(Self { receivers, hash_jira_label, metric })
	}

	/// Handles a decoded notification.
	///
	/// Returns the response status and body.
	async fn handle(&self, data: alert::Data) -> (StatusCode, String) {
		tracing::debug!(
			"received notification for receiver {:?}, group {:?} with {} alerts",
			data.receiver,
			data.group_key,
			data.alerts.len()
		);

		if data.version != SUPPORTED_VERSION {
			let message = format!(
				"unsupported webhook version {:?}, only version {SUPPORTED_VERSION} is supported",
				data.version
			);
			return self.respond(&data.receiver, StatusCode::BAD_REQUEST, message);
		}

		let receiver = match self.receivers.get(&data.receiver) {
			Some(receiver) => receiver,
			None => {
				let message = format!("receiver {:?} is not configured", data.receiver);
				return self.respond(&data.receiver, StatusCode::NOT_FOUND, message);
			}
		};

		match receiver.notify(&data, self.hash_jira_label).await {
			Ok(()) => self.respond(&data.receiver, StatusCode::OK, "OK".to_string()),
			Err(err) => {
				let status = if err.should_retry() {
					StatusCode::SERVICE_UNAVAILABLE
				} else {
					StatusCode::INTERNAL_SERVER_ERROR
				};
				self.respond(&data.receiver, status, error_chain(&err))
			}
		}
	}

	/// count and log the response
	fn respond(&self, receiver: &str, status: StatusCode, body: String) -> (StatusCode, String) {
		self.metric.with_label_values(&[receiver, status.as_str()]).inc();

		if status.is_success() {
			tracing::debug!("notification for receiver {receiver:?} processed");
		} else if status.is_client_error() {
			tracing::warn!("rejected notification for receiver {receiver:?} ({status}): {body}");
		} else {
			tracing::error!("notification for receiver {receiver:?} failed ({status}): {body}");
		}

		(status, body)
	}
}

/// `err` and all its sources joined by `: `
fn error_chain(err: &dyn Error) -> String {
	let mut message = err.to_string();
	let mut source = err.source();

	while let Some(err) = source {
		message.push_str(": ");
		message.push_str(&err.to_string());
		source = err.source();
	}

	message
}

#[allow(clippy::missing_docs_in_private_items)]
async fn alert_handler(
	Extension(state): Extension<Arc<State>>,
	data: Result<Json<alert::Data>, JsonRejection>,
) -> (StatusCode, String) {
	match data {
		Ok(Json(data)) => state.handle(data).await,
		Err(err) => {
			tracing::debug!("failed to deserialize alert: {err:?}");
			state.respond(UNKNOWN_RECEIVER, StatusCode::BAD_REQUEST, err.to_string())
		}
	}
}

#[allow(clippy::missing_docs_in_private_items)]
async fn health_handler() -> &'static str {
	"OK"
}

/// serve the webhook endpoint until the server fails
pub async fn run_alertmanager_receiver(state: State) -> Result<()> {
	prometheus::register(Box::new(state.metric.clone()))
		.context("failed to register prometheus meters")?;

	let addr = AlertReceiverSettings::global().to_socket_addr();

	let app = Router::new()
		.route("/alert", post(alert_handler))
		.route("/healthz", get(health_handler))
		.route("/metrics", get(telemetry_endpoint::metrics_handler))
		.layer(Extension(Arc::new(state)));

	tracing::info!("listening on {addr}");

	axum::Server::bind(&addr)
		.serve(app.into_make_service())
		.await
		.context("alertmanager webhook endpoint crashed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::{
		jira::fake::Fake,
		notify::tests::{config, firing, receiver},
	};

	fn state(fake: &Arc<Fake>) -> State {
		State::new(vec![receiver(fake, config())], false).unwrap()
	}

	fn count(state: &State, receiver: &str, status: StatusCode) -> u64 {
		state.metric.with_label_values(&[receiver, status.as_str()]).get()
	}

	#[tokio::test]
	async fn test_notification_processed() {
		let fake = Arc::new(Fake::new());
		let state = state(&fake);

		let (status, body) = state.handle(firing()).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "OK");
		assert_eq!(fake.calls().create.len(), 1);
		assert_eq!(count(&state, "jira-ab", StatusCode::OK), 1);
	}

	#[tokio::test]
	async fn test_unknown_receiver() {
		let fake = Arc::new(Fake::new());
		let state = state(&fake);

		let mut data = firing();
		data.receiver = "jira-xy".to_string();
		let (status, _) = state.handle(data).await;

		assert_eq!(status, StatusCode::NOT_FOUND);
		assert!(fake.calls().search.is_empty());
		assert_eq!(count(&state, "jira-xy", StatusCode::NOT_FOUND), 1);
	}

	#[tokio::test]
	async fn test_unsupported_version() {
		let fake = Arc::new(Fake::new());
		let state = state(&fake);

		let mut data = firing();
		data.version = "3".to_string();
		let (status, body) = state.handle(data).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body.contains("\"3\""));
		assert!(fake.calls().search.is_empty());
	}

	#[tokio::test]
	async fn test_retryable_failure() {
		let fake = Arc::new(Fake::new().failing("Issue.Search", 503));
		let state = state(&fake);

		let (status, body) = state.handle(firing()).await;

		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert!(body.contains("503"));
		assert_eq!(count(&state, "jira-ab", StatusCode::SERVICE_UNAVAILABLE), 1);
	}

	#[tokio::test]
	async fn test_permanent_failure() {
		let fake = Arc::new(Fake::new().failing("Issue.Create", 400));
		let state = state(&fake);

		let (status, _) = state.handle(firing()).await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn test_error_chain() {
		let err = anyhow::anyhow!("inner").context("outer");
		let err: &(dyn Error + 'static) = err.as_ref();
		assert_eq!(error_chain(err), "outer: inner");
	}
}
