use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Embeds one text into a vector of exactly `cfg.dimensions` floats. One
/// attempt per call; the retry policy lives with the pipeline so it applies
/// uniformly to any provider implementation. A response with the wrong
/// dimensionality is malformed, never padded.
pub async fn embed(cfg: &keel_config::EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": text,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json, cfg.dimensions as usize)
}

fn parse_embedding_response(json: Value, dimensions: usize) -> Result<Vec<f32>> {
	let embedding = json
		.get("data")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|item| item.get("embedding"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data[0].embedding."))?;

	let mut vector = Vec::with_capacity(embedding.len());
	for value in embedding {
		let number =
			value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;
		vector.push(number as f32);
	}

	if vector.len() != dimensions {
		return Err(eyre::eyre!(
			"Embedding has {} dimensions, expected {dimensions}.",
			vector.len()
		));
	}

	Ok(vector)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_first_embedding() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [0.5, 1.5, -0.25] }
			]
		});
		let parsed = parse_embedding_response(json, 3).expect("parse failed");

		assert_eq!(parsed, vec![0.5, 1.5, -0.25]);
	}

	#[test]
	fn rejects_wrong_dimensionality() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});

		assert!(parse_embedding_response(json, 3).is_err());
	}

	#[test]
	fn rejects_missing_data() {
		assert!(parse_embedding_response(serde_json::json!({}), 3).is_err());
	}
}
