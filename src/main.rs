//! prometheus alertmanager receiver that keeps jira issues in sync with alerts
//!
//! Features:
//! - creates an issue per alert group, alerting rule or alert
//! - refreshes summary and description of existing issues
//! - reopens recently resolved issues, unless they were resolved as won't fix
//! - optionally resolves issues once all alerts are resolved
//! - no local state, issues are found again through their identifier label

use std::sync::Arc;

use anyhow::{Context, Result};
use settings::Settings;

use crate::{alertmanager_webhook_receiver::State, notify::Receiver, template::Template};

mod alert;
mod alertmanager_webhook_receiver;
mod identity;
mod jira;
mod log;
mod notify;
mod settings;
mod telemetry_endpoint;
mod template;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// a [Receiver] with its own jira client for every configured receiver
fn build_receivers(settings: &Settings, template: &Arc<Template>) -> Result<Vec<Receiver>> {
	let configs = notify::settings::resolve_all(&settings.receivers, &settings.defaults)
		.context("invalid receiver configuration")?;

	let mut receivers = Vec::with_capacity(configs.len());
	for conf in configs {
		let client = jira::http_client::Client::new(&conf.name, &conf.jira)
			.with_context(|| format!("failed to construct jira client of receiver {}", conf.name))?;

		tracing::info!("configured receiver {} for {}", conf.name, conf.jira.api_url);
		receivers.push(Receiver::new(Arc::new(client), Arc::new(conf), template.clone()));
	}

	Ok(receivers)
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::global();

	log::setup_logging().context("could not setup logging")?;

	let template =
		Arc::new(Template::new(settings.template.as_deref()).context("failed to load templates")?);

	let receivers = build_receivers(settings, &template)?;
	if receivers.is_empty() {
		tracing::warn!("no receivers configured, every notification will be rejected");
	}

	let state = State::new(receivers, settings.hash_jira_label)
		.context("failed to construct webhook receiver")?;

	alertmanager_webhook_receiver::run_alertmanager_receiver(state).await
}
