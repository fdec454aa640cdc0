use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use image_relay::pipeline::data_uri;
use image_relay::FinalResponse;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Client for a running image relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status
    Status,
    /// Send an image through the relay and save the result
    Generate {
        /// Image file to upload
        image: PathBuf,

        /// Where to write the transformed image
        #[arg(short, long, default_value = "result.png")]
        out: PathBuf,

        /// Route the relay serves
        #[arg(long, default_value = "/api/generate")]
        route: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Generate { image, out, route } => {
            let bytes = tokio::fs::read(&image).await?;
            let res = client
                .post(format!("{}{}", cli.url, route))
                .json(&json!({ "image_base64": STANDARD.encode(&bytes) }))
                .send()
                .await?;

            if !res.status().is_success() {
                return print_response(res).await;
            }

            let relayed: FinalResponse = res.json().await?;
            let uri = data_uri::parse(&relayed.data_url).ok_or("relay returned a malformed data_url")?;
            let decoded = STANDARD.decode(uri.payload)?;
            tokio::fs::write(&out, &decoded).await?;

            if let Some(url) = relayed.result_url {
                println!("result_url: {}", url);
            }
            println!("wrote {} bytes ({}) to {}", decoded.len(), uri.mime_type, out.display());
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
