use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde_json::Value;

/// Client for the external audit/trace service. Callers treat every function
/// here as best-effort; errors are caught and logged at the call site and
/// never reach the primary response path.
fn client(cfg: &keel_config::Audit) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?)
}

fn headers(cfg: &keel_config::Audit) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert("x-api-key", cfg.api_key.parse()?);
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	Ok(headers)
}

pub async fn create_thread(cfg: &keel_config::Audit, call_id: &str) -> Result<String> {
	let res = client(cfg)?
		.post(format!("{}/threads", cfg.api_base))
		.headers(headers(cfg)?)
		.json(&serde_json::json!({ "metadata": { "call_id": call_id, "source": "keel" } }))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_thread_id(json)
}

pub async fn append(cfg: &keel_config::Audit, thread_id: &str, label: &str, content: &str) -> Result<()> {
	let res = client(cfg)?
		.post(format!("{}/threads/{thread_id}/messages", cfg.api_base))
		.headers(headers(cfg)?)
		.json(&serde_json::json!({ "label": label, "content": content, "store_only": true }))
		.send()
		.await?;

	res.error_for_status()?;

	Ok(())
}

pub async fn fetch(cfg: &keel_config::Audit, thread_id: &str) -> Result<Value> {
	let res = client(cfg)?
		.get(format!("{}/threads/{thread_id}", cfg.api_base))
		.headers(headers(cfg)?)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

fn parse_thread_id(json: Value) -> Result<String> {
	json.get("thread_id")
		.or_else(|| json.get("id"))
		.and_then(|v| v.as_str())
		.map(|id| id.to_string())
		.ok_or_else(|| eyre::eyre!("Thread response is missing an id."))
}
