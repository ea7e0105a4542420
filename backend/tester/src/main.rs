//! Walks a running server through sign-up, sign-in, upload, analyze, history and stats.
use std::{fs, path::PathBuf};

use anyhow::{Context, Error, bail};
use clap::Parser;
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use uuid::Uuid;

/// Smallest valid PNG, used when no image is given.
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://localhost:1111")]
    base_url: String,

    /// A fresh address is generated when omitted.
    #[arg(long)]
    email: Option<String>,

    #[arg(long, default_value = "purity-check")]
    password: String,

    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long, default_value = "milk-dairy")]
    category: String,

    #[arg(long, default_value = "milk")]
    item: String,
}

async fn body(step: &str, response: Response) -> Result<Value, Error> {
    let status = response.status();
    let body: Value = response.json().await.context(format!("{step}: body is not JSON"))?;

    println!("{step}: {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("{step} failed with {status}");
    }

    Ok(body)
}

fn image_part(path: Option<&PathBuf>) -> Result<Part, Error> {
    let Some(path) = path else {
        return Ok(Part::bytes(PIXEL_PNG).file_name("pixel.png").mime_str("image/png")?);
    };

    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("sample.jpg")
        .to_string();

    let bytes = fs::read(path).context(format!("Failed to read {}", path.display()))?;

    Ok(Part::bytes(bytes).file_name(file_name).mime_str(mime)?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    let client = Client::new();
    let base = args.base_url.trim_end_matches('/');

    let email = args
        .email
        .unwrap_or_else(|| format!("tester-{}@example.com", Uuid::new_v4().simple()));

    let credentials = json!({ "email": email, "password": args.password });

    let sign_up = client
        .post(format!("{base}/api/auth/signup"))
        .json(&json!({ "email": email, "password": args.password, "fullName": "Purity Tester" }))
        .send()
        .await?;

    // an existing account is fine, sign-in decides
    if sign_up.status().as_u16() != 409 {
        body("signup", sign_up).await?;
    }

    let signed_in = body(
        "signin",
        client
            .post(format!("{base}/api/auth/signin"))
            .json(&credentials)
            .send()
            .await?,
    )
    .await?;

    let token = signed_in["session"]["accessToken"]
        .as_str()
        .context("signin: no access token")?
        .to_string();

    let form = Form::new()
        .part("file", image_part(args.image.as_ref())?)
        .text("category", args.category.clone())
        .text("itemName", args.item.clone());

    let uploaded = body(
        "upload",
        client
            .post(format!("{base}/api/upload"))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?,
    )
    .await?;

    let image_url = uploaded["imageUrl"]
        .as_str()
        .context("upload: no image url")?;

    body(
        "analyze",
        client
            .post(format!("{base}/api/analyze"))
            .bearer_auth(&token)
            .json(&json!({
                "imageUrl": image_url,
                "category": args.category,
                "itemName": args.item,
                "testType": "visual_analysis",
            }))
            .send()
            .await?,
    )
    .await?;

    body(
        "tests",
        client
            .get(format!("{base}/api/tests?limit=5"))
            .bearer_auth(&token)
            .send()
            .await?,
    )
    .await?;

    body(
        "stats",
        client
            .get(format!("{base}/api/tests/stats"))
            .bearer_auth(&token)
            .send()
            .await?,
    )
    .await?;

    Ok(())
}
