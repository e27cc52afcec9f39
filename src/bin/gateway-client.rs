use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-client")]
#[command(about = "Test client for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    /// API key sent as X-API-Key.
    #[arg(short, long)]
    key: Option<String>,

    /// Number of requests for the repeated commands.
    #[arg(short, long, default_value_t = 1)]
    count: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the gateway health summary
    Health,
    /// POST a JSON body to /api/echo
    Echo,
    /// GET /api/user?id=<n>
    User,
    /// GET /api/data
    Data,
    /// GET /api/slow
    Slow,
    /// Compare requests without a key, with a bogus key and with key-admin
    Auth,
    /// Fire requests at /api/user and count 429s
    RateLimit,
}

struct GatewayClient {
    base: String,
    http: reqwest::Client,
    headers: HeaderMap,
}

impl GatewayClient {
    fn new(base: &str, key: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = key {
            headers.insert("x-api-key", HeaderValue::from_str(key)?);
        }
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
            headers,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base, path))
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}

fn backend_of(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("backend").cloned())
        .map(|b| b.as_str().map(str::to_string).unwrap_or_else(|| b.to_string()))
        .unwrap_or_else(|| "-".to_string())
}

async fn repeat(client: &GatewayClient, label: &str, count: usize, path: impl Fn(usize) -> String) {
    println!("Testing {label} ({count} requests)...");
    for i in 1..=count {
        match client.send(Method::GET, &path(i), None).await {
            Ok((status, body)) => {
                println!("[{i}] Status: {}", status.as_u16());
                if status.is_success() {
                    println!("    Backend: {}", backend_of(&body));
                }
            }
            Err(e) => eprintln!("Request {i} error: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = GatewayClient::new(&cli.endpoint, cli.key.as_deref())?;

    match cli.command {
        Commands::Health => {
            let (status, body) = client.send(Method::GET, "/health", None).await?;
            println!("Status: {}", status.as_u16());
            match serde_json::from_str::<Value>(&body) {
                Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                Err(_) => println!("{body}"),
            }
        }
        Commands::Echo => {
            println!("Testing /api/echo ({} requests)...", cli.count);
            for i in 1..=cli.count {
                let body = json!({ "message": format!("Request {i}") });
                match client.send(Method::POST, "/api/echo", Some(body)).await {
                    Ok((status, body)) => {
                        println!("[{i}] Status: {}", status.as_u16());
                        if status.is_success() {
                            println!("    Backend: {}", backend_of(&body));
                        }
                    }
                    Err(e) => eprintln!("Request {i} error: {e}"),
                }
            }
        }
        Commands::User => repeat(&client, "/api/user", cli.count, |i| format!("/api/user?id={i}")).await,
        Commands::Data => repeat(&client, "/api/data", cli.count, |_| "/api/data".to_string()).await,
        Commands::Slow => repeat(&client, "/api/slow", cli.count, |_| "/api/slow".to_string()).await,
        Commands::Auth => {
            let cases = [
                ("without key (should succeed)", None),
                ("with invalid key (should fail)", Some("invalid-key")),
                ("with valid key (should succeed)", Some("key-admin")),
            ];
            for (i, (label, key)) in cases.into_iter().enumerate() {
                let client = GatewayClient::new(&cli.endpoint, key)?;
                let (status, body) = client.send(Method::GET, "/api/user", None).await?;
                println!("{}. Request {label}: {}", i + 1, status.as_u16());
                if status.is_success() {
                    println!("   Backend: {}", backend_of(&body));
                }
            }
        }
        Commands::RateLimit => {
            println!("Testing rate limiting ({} requests)...", cli.count);
            let mut ok = 0;
            let mut limited = 0;
            for i in 1..=cli.count {
                match client.send(Method::GET, "/api/user", None).await {
                    Ok((StatusCode::OK, _)) => ok += 1,
                    Ok((StatusCode::TOO_MANY_REQUESTS, _)) => {
                        limited += 1;
                        println!("[{i}] Rate limited");
                    }
                    Ok((status, _)) => println!("[{i}] Status: {}", status.as_u16()),
                    Err(e) => eprintln!("Request {i} error: {e}"),
                }
            }
            println!("Successful: {ok}/{}, Limited: {limited}/{}", cli.count, cli.count);
        }
    }

    Ok(())
}
