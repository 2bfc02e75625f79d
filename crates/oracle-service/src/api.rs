//! HTTP API exposing oracle prices.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::get,
	Router,
};
use oracle_core::OracleEngine;
use oracle_types::{Address, OracleError, ProviderId, U256};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
	engine: Arc<OracleEngine>,
}

pub fn router(engine: Arc<OracleEngine>) -> Router {
	Router::new()
		.route("/health", get(health_check))
		.route("/price/{asset}", get(get_price))
		.route("/quote", get(get_quote))
		.route("/oracles/{name}/price/{asset}", get(get_oracle_price))
		.route("/stable-coin", get(get_stable_coin))
		.with_state(AppState { engine })
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

pub async fn start_http_server(engine: Arc<OracleEngine>, host: String, port: u16) -> anyhow::Result<()> {
	let app = router(engine);
	let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

	info!("API server listening on {}:{}", host, port);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Error body: the stable reason code plus a human readable message.
struct ApiError {
	status: StatusCode,
	reason: &'static str,
	message: String,
}

impl ApiError {
	fn bad_request(reason: &'static str, message: String) -> Self {
		Self {
			status: StatusCode::BAD_REQUEST,
			reason,
			message,
		}
	}

	fn not_found(reason: &'static str, message: String) -> Self {
		Self {
			status: StatusCode::NOT_FOUND,
			reason,
			message,
		}
	}
}

impl From<OracleError> for ApiError {
	fn from(error: OracleError) -> Self {
		let status = match &error {
			OracleError::InvalidProvider
			| OracleError::ProviderNotRegistered(_)
			| OracleError::OracleNotSet(_) => StatusCode::NOT_FOUND,
			OracleError::PrimaryFailed(_)
			| OracleError::FallbackAFailed
			| OracleError::FallbacksFailed
			| OracleError::SourceFailure { .. }
			| OracleError::SourceTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
			OracleError::PricesDeviationTooHigh
			| OracleError::InvalidTokenPrice(_)
			| OracleError::StablePricesInvalid(_)
			| OracleError::MathOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
			_ => StatusCode::BAD_REQUEST,
		};
		Self {
			status,
			reason: error.reason(),
			message: error.to_string(),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		warn!(reason = self.reason, "Request failed: {}", self.message);
		(
			self.status,
			Json(serde_json::json!({
				"error": self.reason,
				"message": self.message,
			})),
		)
			.into_response()
	}
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn parse_address(raw: &str) -> Result<Address, ApiError> {
	raw.parse::<Address>()
		.map_err(|e| ApiError::bad_request("invalid-address", format!("'{}': {}", raw, e)))
}

async fn health_check() -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"timestamp": chrono::Utc::now().timestamp()
	}))
}

/// Asset price through the master registry.
async fn get_price(State(state): State<AppState>, Path(asset): Path<String>) -> ApiResult {
	let asset = parse_address(&asset)?;
	let price = state.engine.master().get_price(asset).await?;

	Ok(Json(serde_json::json!({
		"asset": asset,
		"price_in_usd": price.price_in_usd.to_string(),
		"updated_at": price.updated_at,
	})))
}

async fn get_oracle_price(
	State(state): State<AppState>,
	Path((name, asset)): Path<(String, String)>,
) -> ApiResult {
	let asset = parse_address(&asset)?;
	let oracle = state
		.engine
		.oracle(&name)
		.ok_or_else(|| ApiError::not_found("unknown-oracle", format!("no oracle named '{}'", name)))?;
	let price = oracle.get_price_in_usd(asset).await?;

	Ok(Json(serde_json::json!({
		"oracle": name,
		"asset": asset,
		"price_in_usd": price.price_in_usd.to_string(),
		"updated_at": price.updated_at,
	})))
}

#[derive(Debug, Deserialize)]
struct QuoteParams {
	provider_in: ProviderId,
	token_in: String,
	provider_out: ProviderId,
	token_out: String,
	/// Integer amount in the input token's native decimals.
	amount: String,
}

async fn get_quote(State(state): State<AppState>, Query(params): Query<QuoteParams>) -> ApiResult {
	let token_in = parse_address(&params.token_in)?;
	let token_out = parse_address(&params.token_out)?;
	let amount = params.amount.parse::<U256>().map_err(|e| {
		ApiError::bad_request("invalid-amount", format!("'{}': {}", params.amount, e))
	})?;

	let quote = state
		.engine
		.providers()
		.quote(params.provider_in, token_in, params.provider_out, token_out, amount)
		.await?;

	Ok(Json(serde_json::json!({
		"amount_out": quote.amount_out.to_string(),
		"updated_at_in": quote.updated_at_in,
		"updated_at_out": quote.updated_at_out,
	})))
}

async fn get_stable_coin(State(state): State<AppState>) -> ApiResult {
	let peg = state.engine.stable_peg().ok_or_else(|| {
		ApiError::not_found(
			"stable-peg-not-configured",
			"no stable peg helper configured".to_string(),
		)
	})?;
	let coin = peg.get_stable_coin_if_pegged().await?;

	Ok(Json(serde_json::json!({
		"address": coin.address,
		"decimals": coin.decimals,
	})))
}
