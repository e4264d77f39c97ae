//! prometheus alertmanager receiver that keeps one jira ticket per alert group
//!
//! Features:
//! - creates a ticket for every new alert group
//! - keeps summary, description and priority of existing tickets up to date
//! - reopens recently resolved tickets, optionally resolves tickets once every alert resolved

use std::sync::Arc;

use alertbridge::{
	jira::JiraClient,
	notify::Reconciler,
	template::{FunctionTable, TemplateEngine},
};
use anyhow::{Context, Result};
use settings::Settings;
use webhook_receiver::Receiver;

mod log;
mod settings;
mod telemetry_endpoint;
mod webhook_receiver;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let settings = Settings::global();
	tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting alertbridge");

	let functions = FunctionTable::builtin();
	let templates = match &settings.template {
		Some(glob) => TemplateEngine::from_glob(glob, &functions).context("failed to load templates")?,
		None => TemplateEngine::new(&functions),
	};

	let reconciler = Reconciler::new(Arc::new(templates), settings.reconcile);

	let receivers = settings
		.receiver_configs()
		.iter()
		.map(|config| {
			let client = JiraClient::new(config, settings.http_timeout)
				.with_context(|| format!("failed to create jira client for receiver {}", config.name))?;

			Ok(Receiver { config: config.clone(), service: Arc::new(client) })
		})
		.collect::<Result<Vec<_>>>()?;

	tokio::spawn(async {
		#[allow(clippy::expect_used)]
		telemetry_endpoint::run_telemetry_endpoint()
			.await
			.expect("telemetry endpoint failed to start or crashed");
	});

	webhook_receiver::run_webhook_receiver(receivers, reconciler).await
}
