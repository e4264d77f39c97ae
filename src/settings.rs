use std::{
	env, fs,
	path::{Path, PathBuf},
	time::Duration,
};

use alertbridge::{
	config::{resolve_receivers, ReceiverConfig, ReceiverSettings},
	notify::ReconcileOptions,
};
use anyhow::{anyhow, Context, Result};
use clap::{Arg, Command};
use config::{Config, File, FileFormat};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::{
	log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings,
	webhook_receiver::WebhookReceiverSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// `$(NAME)` references to environment variables in the config file
const ENV_REFERENCE: &str = r"\$\(([a-zA-Z_0-9]+)\)";

fn default_http_timeout() -> Duration {
	Duration::from_secs(10)
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub log: LogSettings,
	#[serde(default)]
	pub webhook_receiver: WebhookReceiverSettings,
	#[serde(default)]
	pub telemetry_endpoint: TelemetryEndpointSettings,
	/// timeout of a single jira request
	#[serde_as(as = "DurationSeconds<f64>")]
	#[serde(default = "default_http_timeout")]
	pub http_timeout: Duration,
	/// glob of the template library, relative to the config file
	#[serde(default)]
	pub template: Option<String>,
	#[serde(default)]
	pub reconcile: ReconcileOptions,
	#[serde(default)]
	pub defaults: ReceiverSettings,
	pub receivers: Vec<ReceiverSettings>,
	/// receivers with the defaults merged in
	#[serde(skip)]
	resolved: Vec<ReceiverConfig>,
}

/// the settings as served on `/config`, secrets are redacted by [ReceiverConfig]
#[serde_as]
#[derive(Serialize)]
struct Redacted<'a> {
	log: &'a LogSettings,
	webhook_receiver: &'a WebhookReceiverSettings,
	telemetry_endpoint: &'a TelemetryEndpointSettings,
	#[serde_as(as = "DurationSeconds<f64>")]
	http_timeout: Duration,
	template: &'a Option<String>,
	reconcile: &'a ReconcileOptions,
	receivers: &'a [ReceiverConfig],
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| match Self::load().context("failed to load config and command line arguments") {
			Ok(settings) => settings,
			Err(err) => {
				// tracing wasn't setup yet
				panic!("{:#?}", err);
			}
		})
	}

	/// receivers with the defaults merged in, in config file order
	pub fn receiver_configs(&self) -> &[ReceiverConfig] {
		&self.resolved
	}

	/// the settings with every secret replaced
	pub fn redacted(&self) -> Result<serde_json::Value> {
		let redacted = Redacted {
			log: &self.log,
			webhook_receiver: &self.webhook_receiver,
			telemetry_endpoint: &self.telemetry_endpoint,
			http_timeout: self.http_timeout,
			template: &self.template,
			reconcile: &self.reconcile,
			receivers: &self.resolved,
		};

		serde_json::to_value(redacted).context("can't serialize config")
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").unwrap_or("./config.yaml");

		let mut settings = Self::from_file(Path::new(config_path))?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// read, substitute and parse the config file at `path`
	fn from_file(path: &Path) -> Result<Self> {
		let text =
			fs::read_to_string(path).with_context(|| format!("can't read config file {}", path.display()))?;

		Self::parse(&text, path)
	}

	/// Parses `text` as yaml config. Relative template paths are resolved
	/// against the directory of `path`.
	fn parse(text: &str, path: &Path) -> Result<Self> {
		let text = substitute_env_vars(text)?;

		let conf = Config::builder()
			.add_source(File::from_str(&text, FileFormat::Yaml))
			.build()
			.context("can't load config")?;

		let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

		settings.template = settings.template.map(|template| {
			let base = path.parent().unwrap_or_else(|| Path::new(""));
			resolve_path(base, &template)
		});

		settings.resolved = resolve_receivers(&settings.defaults, &settings.receivers)
			.context("invalid receiver configuration")?;

		Ok(settings)
	}
}

/// replace `$(NAME)` by the value of the environment variable `NAME`
fn substitute_env_vars(text: &str) -> Result<String> {
	let reference = Regex::new(ENV_REFERENCE)?;

	let mut substituted = String::with_capacity(text.len());
	let mut last = 0;

	for captures in reference.captures_iter(text) {
		let (whole, name) = match (captures.get(0), captures.get(1)) {
			(Some(whole), Some(name)) => (whole, name.as_str()),
			_ => continue,
		};

		let value = env::var(name).map_err(|_| anyhow!("missing env variable: {name:?}"))?;

		substituted.push_str(&text[last..whole.start()]);
		substituted.push_str(&value);
		last = whole.end();
	}
	substituted.push_str(&text[last..]);

	Ok(substituted)
}

/// join relative paths with `base`
fn resolve_path(base: &Path, path: &str) -> String {
	if path.is_empty() || Path::new(path).is_absolute() {
		return path.to_owned();
	}

	let resolved: PathBuf = base.join(path);
	tracing::debug!(relative = path, absolute = %resolved.display(), "resolved relative configuration path");

	resolved.to_string_lossy().into_owned()
}
