use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::settings::Settings;

/// output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	/// human readable
	#[default]
	Full,
	/// one json object per line
	Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
	pub level: String,
	pub format: LogFormat,
}

impl Default for LogSettings {
	fn default() -> Self {
		Self { level: String::from("info"), format: LogFormat::Full }
	}
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

pub fn setup_logging() -> Result<()> {
	let settings = LogSettings::global();
	let level = tracing::Level::from_str(settings.level.as_str())
		.with_context(|| format!("invalid log level {:?}", settings.level))?;

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	let registry = tracing_subscriber::registry().with(filter_layer);

	match settings.format {
		LogFormat::Full => registry.with(fmt::layer()).try_init(),
		LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
	}
	.context("a global subscriber was already installed")?;

	Ok(())
}
