//! Here we expose prometheus metrics about alertbridge
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TelemetryEndpointSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl Default for TelemetryEndpointSettings {
	fn default() -> Self {
		Self { bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9098 }
	}
}

impl TelemetryEndpointSettings {
	pub fn global() -> &'static Self {
		&Settings::global().telemetry_endpoint
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler() -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	match encoder.encode(&metric_families, &mut buffer) {
		Ok(()) => ([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response(),
		Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
	}
}

pub async fn run_telemetry_endpoint() -> Result<()> {
	let app = Router::new().route("/metrics", get(metrics_handler));

	axum::Server::bind(&TelemetryEndpointSettings::global().to_socket_addr())
		.serve(app.into_make_service())
		.await
		.context("telemetry endpoint crashed")?;

	Ok(())
}
