use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const DATASET: &str = "bench";
const COLUMNS: &[&str] = &["event", "page", "country", "latency_ms", "user_id", "score"];
const EVENTS: &[&str] = &["click", "view", "purchase", "scroll", "hover", "submit"];
const COUNTRIES: &[&str] = &["US", "UK", "CA", "DE", "FR", "JP", "AU", "BR"];

fn fast_random(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

/// One multirows body. Each row records a random subset of the columns, plus
/// an integer-keyed column, so the dataset stays sparse.
fn generate_rows(count: usize, batch_num: usize, ts: i64, seed: &mut u64) -> Value {
    let rows: Vec<Value> = (0..count)
        .map(|i| {
            let mut cells: Vec<Value> = Vec::with_capacity(COLUMNS.len() + 1);
            for &col in COLUMNS {
                if fast_random(seed) % 3 == 0 {
                    continue;
                }
                let value = match col {
                    "event" => json!(EVENTS[fast_random(seed) as usize % EVENTS.len()]),
                    "country" => json!(COUNTRIES[fast_random(seed) as usize % COUNTRIES.len()]),
                    "page" => json!(format!("/page/{}", fast_random(seed) % 50)),
                    "score" => json!((fast_random(seed) % 1000) as f64 / 10.0),
                    _ => json!((fast_random(seed) % 500) as i64),
                };
                cells.push(json!([col, value, ts]));
            }
            cells.push(json!([fast_random(seed) % 4, i as i64, ts]));
            json!([batch_num * count + i, cells])
        })
        .collect();

    Value::Array(rows)
}

struct BenchmarkStats {
    total_rows: usize,
    total_duration: Duration,
    latencies: Vec<Duration>,
}

impl BenchmarkStats {
    fn rows_per_sec(&self) -> f64 {
        self.total_rows as f64 / self.total_duration.as_secs_f64()
    }

    fn avg_latency(&self) -> Duration {
        let sum: Duration = self.latencies.iter().sum();
        sum / self.latencies.len().max(1) as u32
    }

    fn percentile(&self, p: usize) -> Duration {
        let mut sorted = self.latencies.clone();
        sorted.sort();
        sorted
            .get(sorted.len() * p / 100)
            .copied()
            .unwrap_or_default()
    }
}

async fn check(response: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        return Err(format!("{}: {}", status, body).into());
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let rows_per_batch: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let num_batches: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let host = std::env::var("SPARSEDB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("SPARSEDB_PORT").unwrap_or_else(|_| "8080".to_string());
    let base_url = format!("http://{}:{}", host, port);

    println!("sparsedb Benchmark");
    println!("==================");
    println!("Target:          {}", base_url);
    println!("Rows per batch:  {}", rows_per_batch);
    println!("Batches:         {}", num_batches);
    println!();

    let client = Client::new();
    let mut seed: u64 = 12345;
    let ts = chrono::Utc::now().timestamp_millis();

    check(
        client
            .post(format!("{}/v1/datasets", base_url))
            .json(&json!({"type": "sparse.mutable", "id": DATASET}))
            .send()
            .await?,
    )
    .await?;

    print!("Recording... ");
    std::io::Write::flush(&mut std::io::stdout())?;
    let mut latencies = Vec::with_capacity(num_batches);
    let start = Instant::now();
    for batch_num in 0..num_batches {
        let body = generate_rows(rows_per_batch, batch_num, ts, &mut seed);
        let batch_start = Instant::now();
        check(
            client
                .post(format!("{}/v1/datasets/{}/multirows", base_url, DATASET))
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        latencies.push(batch_start.elapsed());
    }
    let record = BenchmarkStats {
        total_rows: rows_per_batch * num_batches,
        total_duration: start.elapsed(),
        latencies,
    };
    println!("done");
    println!("  Rows/sec:    {:.0}", record.rows_per_sec());
    println!(
        "  Latency:     avg={:?} p50={:?} p99={:?}",
        record.avg_latency(),
        record.percentile(50),
        record.percentile(99)
    );

    let commit_start = Instant::now();
    let stats = check(
        client
            .post(format!("{}/v1/datasets/{}/commit", base_url, DATASET))
            .send()
            .await?,
    )
    .await?;
    println!("Commit:        {:?}", commit_start.elapsed());
    println!(
        "  {} rows, {} columns, {} cell versions",
        stats["row_count"], stats["column_count"], stats["version_count"]
    );
    println!();

    for (label, sql) in [
        ("select *", format!("select * from {} limit 1000", DATASET)),
        ("select \"0\"", format!("select \"0\" from {} limit 1000", DATASET)),
        ("select event, score", format!("select event, score from {} limit 1000", DATASET)),
    ] {
        let mut latencies = Vec::with_capacity(10);
        let start = Instant::now();
        for _ in 0..10 {
            let query_start = Instant::now();
            check(
                client
                    .get(format!("{}/v1/query", base_url))
                    .query(&[("q", sql.as_str()), ("format", "table")])
                    .send()
                    .await?,
            )
            .await?;
            latencies.push(query_start.elapsed());
        }
        let stats = BenchmarkStats {
            total_rows: 10_000,
            total_duration: start.elapsed(),
            latencies,
        };
        println!(
            "{:<20} avg={:?} p50={:?} rows/sec={:.0}",
            label,
            stats.avg_latency(),
            stats.percentile(50),
            stats.rows_per_sec()
        );
    }

    Ok(())
}
