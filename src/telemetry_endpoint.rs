//! Here we expose prometheus metrics about jiralert
use axum::{
	body::Body,
	http::{header::CONTENT_TYPE, Response, StatusCode},
};
use prometheus::{Encoder, TextEncoder};

/// all registered meters in the prometheus text format
pub async fn metrics_handler() -> Response<Body> {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	let response = match encoder.encode(&metric_families, &mut buffer) {
		Ok(()) => Response::builder()
			.status(StatusCode::OK)
			.header(CONTENT_TYPE, encoder.format_type())
			.body(Body::from(buffer)),
		Err(err) => {
			tracing::error!("failed to encode metrics: {err}");
			Response::builder()
				.status(StatusCode::INTERNAL_SERVER_ERROR)
				.body(Body::from(err.to_string()))
		}
	};

	response.unwrap_or_else(|err| {
		tracing::error!("failed to build metrics response: {err}");
		let mut response = Response::new(Body::empty());
		*response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
		response
	})
}
