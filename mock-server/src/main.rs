use tokio::net::TcpListener;

const ROUTES: &[&str] = &[
    "GET|POST /items",
    "GET|PUT|DELETE /items/{id}",
    "GET /legacy/items (application/php)",
    "GET /moved, /moved-twice (302)",
    "GET /notes (text/plain)",
    "ANY /echo",
];

/// Serves the sample REST API on `127.0.0.1:$PORT` (default 3000).
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock REST API listening on http://{addr}");
    for route in ROUTES {
        println!("  {route}");
    }
    mock_server::run(listener).await
}
