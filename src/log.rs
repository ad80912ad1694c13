//! tracing setup
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

/// the `log` section of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	/// one of error, warn, info, debug or trace
	#[serde(default = "LogSettings::default_level")]
	pub level: String,
}

impl Default for LogSettings {
	fn default() -> Self {
		Self { level: Self::default_level() }
	}
}

impl LogSettings {
	/// the global log settings
	pub fn global() -> &'static Self {
		&Settings::global().log
	}

	#[allow(clippy::missing_docs_in_private_items)]
	fn default_level() -> String {
		"info".to_string()
	}
}

/// install the global tracing subscriber
pub fn setup_logging() -> Result<()> {
	let level = LogSettings::global().level.as_str();
	let level = tracing::Level::from_str(level)
		.with_context(|| format!("invalid log level {level:?}"))?;

	let fmt_layer = fmt::layer();

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

	Ok(())
}
