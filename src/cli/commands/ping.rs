use futures::future::join_all;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::cli::output::{output_failure, output_success};
use crate::cli::OutputFormat;

struct PingResult {
    url: String,
    status: Option<u16>,
    elapsed_ms: u128,
    body: Option<Value>,
    error: Option<String>,
}

impl PingResult {
    fn healthy(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

async fn ping(http: &reqwest::Client, base: &str) -> PingResult {
    let url = format!("{}/health", base.trim_end_matches('/'));
    let started = Instant::now();
    match http.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let body = resp.json::<Value>().await.ok();
            PingResult {
                url,
                status: Some(status),
                elapsed_ms: started.elapsed().as_millis(),
                body,
                error: None,
            }
        }
        Err(e) => PingResult {
            url,
            status: None,
            elapsed_ms: started.elapsed().as_millis(),
            body: None,
            error: Some(e.to_string()),
        },
    }
}

/// GET `{url}/health` for every url concurrently.
pub async fn handle(urls: Vec<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    let results = join_all(urls.iter().map(|url| ping(&http, url))).await;

    let mut down = 0;
    for result in &results {
        let data = json!({
            "url": result.url,
            "status": result.status,
            "elapsed_ms": result.elapsed_ms as u64,
            "health": result.body,
            "error": result.error,
        });
        if result.healthy() {
            output_success(output_format, &format!("{} is up", result.url), Some(data))?;
        } else {
            down += 1;
            output_failure(output_format, &format!("{} is down", result.url), Some(data))?;
        }
    }

    if down > 0 {
        anyhow::bail!("{} of {} services unhealthy", down, results.len());
    }
    Ok(())
}
