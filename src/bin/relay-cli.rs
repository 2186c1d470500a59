use std::net::SocketAddr;

use axum::{
    extract::Path,
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Operator tools for the supplier relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a stand-in local API (structured and legacy path conventions)
    MockLocal {
        #[arg(short, long, default_value = "127.0.0.1:5001")]
        listen: SocketAddr,
    },
    /// Send a path-encoded callback to the relay's receiver
    PathCallback {
        /// Callback text, e.g. "235.0823434343.MOBO.R*323274"
        text: String,
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        url: String,
    },
    /// POST a body callback to the relay's /callback endpoint
    BodyCallback {
        /// Raw body to send
        body: String,
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        url: String,
        #[arg(short, long, default_value = "text/plain")]
        content_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::MockLocal { listen } => {
            let app = Router::new()
                .route("/process", post(mock_process))
                .route("/{*order}", get(mock_order));

            println!("Mock local API listening on http://{}", listen);
            let listener = tokio::net::TcpListener::bind(listen).await?;
            axum::serve(listener, app).await?;
        }
        Commands::PathCallback { text, url } => {
            let mut target = reqwest::Url::parse(&url)?;
            target
                .path_segments_mut()
                .map_err(|_| format!("{} cannot take a path", url))?
                .pop_if_empty()
                .push(&text);
            let res = client.get(target).send().await?;
            print_response(res).await?;
        }
        Commands::BodyCallback { body, url, content_type } => {
            let res = client
                .post(format!("{}/callback", url.trim_end_matches('/')))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn mock_process(Json(request): Json<Value>) -> Json<Value> {
    println!("Local API received: {} {}", request["method"], request["payload"]);
    Json(json!({
        "ok": true,
        "status": "SUCCESS",
        "message": "Transaksi Berhasil (mock)",
        "raw": { "pulsa": "5000", "sn": "123456789" }
    }))
}

async fn mock_order(Path(order): Path<String>) -> String {
    println!("Local API received order: {}", order);
    format!("R#{} sedang diproses", order)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: receiver returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }
    println!("{}", text);
    Ok(())
}
