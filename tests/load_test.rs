//! Load testing for the gateway.

use axum::http::StatusCode;
use std::time::{Duration, Instant};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    let b0 = common::start_mock_backend("backend-0").await;
    let b1 = common::start_mock_backend("backend-1").await;

    let mut config = common::config_for(&[&b0, &b1]);
    config.rate_limit.per_ip_per_minute = 100_000;
    let gw = common::start_gateway(config).await;

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gw.url("/api/data");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            let mut served_by = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                        let name = res.headers()["x-served-by"].to_str().unwrap().to_string();
                        served_by.push(name);
                    }
                }
            }
            (latencies, served_by)
        }));
    }

    let mut all_latencies = Vec::new();
    let mut all_served = Vec::new();
    for task in tasks {
        let (latencies, served_by) = task.await.unwrap();
        all_latencies.extend(latencies);
        all_served.extend(served_by);
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    // The cursor advances atomically, so two live backends split the load evenly.
    let on_b0 = all_served.iter().filter(|s| *s == "backend-0").count();
    assert_eq!(on_b0, total_requests / 2);

    common::wait_for_entries(&gw.log, total_requests).await;
    assert_eq!(gw.log.len(), total_requests);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("Split:          {} / {}", on_b0, total_requests - on_b0);
    println!("-------------------------\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_burst_respects_limit() {
    let b0 = common::start_mock_backend("backend-0").await;

    // 60/min refills one token per second.
    let mut config = common::config_for(&[&b0]);
    config.rate_limit.per_ip_per_minute = 60;
    let gw = common::start_gateway(config).await;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..200 {
        let client = client.clone();
        let url = gw.url("/api/data");
        tasks.push(tokio::spawn(async move {
            client.get(&url).send().await.map(|r| r.status()).ok()
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            Some(StatusCode::OK) => ok += 1,
            Some(StatusCode::TOO_MANY_REQUESTS) => limited += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    let refilled = start.elapsed().as_secs() as usize + 1;

    assert!(ok >= 60, "burst capacity not honoured: {ok}");
    assert!(ok <= 60 + refilled, "limit exceeded: {ok} in {:?}", start.elapsed());
    assert_eq!(ok + limited, 200);

    common::wait_for_entries(&gw.log, 200).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gw.log.len(), 200);
}
