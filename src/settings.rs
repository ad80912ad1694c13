//! configuration file and command line arguments
use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, log::LogSettings,
	notify::settings::ReceiverSettings,
};

#[allow(clippy::missing_docs_in_private_items)]
static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// all settings of jiralert
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	/// where alertmanager delivers its notifications
	pub alert_webhook_receiver: AlertReceiverSettings,
	#[serde(default)]
	#[allow(clippy::missing_docs_in_private_items)]
	pub log: LogSettings,
	/// glob of template files, their templates can be included by the
	/// configured ones
	#[serde(default)]
	pub template: Option<String>,
	/// use the fixed length hashed issue identifier label
	#[serde(default)]
	pub hash_jira_label: bool,
	/// options inherited by every receiver
	#[serde(default)]
	pub defaults: ReceiverSettings,
	#[allow(clippy::missing_docs_in_private_items)]
	pub receivers: Vec<ReceiverSettings>,
}

impl Settings {
	/// The settings, loaded on first use. Exits the program if they can't be
	/// loaded.
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load().context("failed to load config and command line arguments") {
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					eprintln!("{err:?}");
					std::process::exit(1);
				}
			}
		})
	}

	#[allow(clippy::missing_docs_in_private_items)]
	fn command() -> Command<'static> {
		Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["error", "warn", "info", "debug", "trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
				Arg::new("hash-jira-label")
					.help("identify issues by a hash of the group labels")
					.long("hash-jira-label"),
			])
	}

	#[allow(clippy::missing_docs_in_private_items)]
	fn load() -> Result<Self> {
		let opts = Self::command().get_matches();

		let config_path = opts.value_of("config").context("missing config path")?;

		let mut settings: Settings = Config::builder()
			.add_source(config::File::with_name(config_path))
			.build()
			.and_then(Config::try_deserialize)
			.with_context(|| format!("can't load config {config_path:?}"))?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		if opts.is_present("hash-jira-label") {
			settings.hash_jira_label = true;
		}

		Ok(settings)
	}
}
