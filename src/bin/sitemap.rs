//! Sitemap generator.
//!
//! Walks the running API for products and published content pages and
//! writes a storefront sitemap.xml. Exits non-zero when the API is
//! unreachable so cron jobs notice.
//!
//! Run with: cargo run --bin sitemap -- --api-base-url http://localhost:8080

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sitemap", about = "Generate sitemap.xml from the live catalog")]
struct Args {
    /// Base URL of the running API; SITEMAP_API_BASE_URL is used when omitted
    #[arg(long)]
    api_base_url: Option<String>,
    /// Public storefront URL the entries point at; STORE_BASE_URL when omitted
    #[arg(long)]
    store_base_url: Option<String>,
    /// Output path
    #[arg(long, default_value = "sitemap.xml")]
    output: PathBuf,
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
}

#[derive(Deserialize)]
struct Paginated<T> {
    items: Vec<T>,
    total_pages: u64,
}

#[derive(Deserialize)]
struct ProductRow {
    slug: String,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ContentRow {
    slug: String,
    updated_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let api_base = args
        .api_base_url
        .or_else(|| std::env::var("SITEMAP_API_BASE_URL").ok())
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let store_base = args
        .store_base_url
        .or_else(|| std::env::var("STORE_BASE_URL").ok())
        .unwrap_or_else(|| "https://happyhopz.com".to_string());
    let api_base = api_base.trim_end_matches('/').to_string();
    let store_base = store_base.trim_end_matches('/').to_string();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    info!("Fetching catalog from {}", api_base);
    let products = fetch_products(&client, &api_base).await?;
    let pages = fetch_pages(&client, &api_base).await?;

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    xml.push('\n');

    for path in ["/", "/products"] {
        writeln!(xml, "  <url><loc>{}{}</loc></url>", store_base, path)?;
    }
    for product in &products {
        writeln!(
            xml,
            "  <url><loc>{}/products/{}</loc><lastmod>{}</lastmod></url>",
            store_base,
            product.slug,
            product.updated_at.format("%Y-%m-%d")
        )?;
    }
    for page in &pages {
        writeln!(
            xml,
            "  <url><loc>{}/pages/{}</loc><lastmod>{}</lastmod></url>",
            store_base,
            page.slug,
            page.updated_at.format("%Y-%m-%d")
        )?;
    }
    xml.push_str("</urlset>\n");

    std::fs::write(&args.output, &xml)?;
    info!(
        "Wrote {} URLs to {}",
        2 + products.len() + pages.len(),
        args.output.display()
    );

    Ok(())
}

async fn fetch_products(
    client: &reqwest::Client,
    api_base: &str,
) -> anyhow::Result<Vec<ProductRow>> {
    let mut all = Vec::new();
    let mut page = 1u64;

    loop {
        let url = format!("{}/api/v1/products?page={}&per_page=100", api_base, page);
        let envelope: Envelope<Paginated<ProductRow>> = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !envelope.success {
            anyhow::bail!("products request reported failure");
        }
        let data = envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("products response had no data"))?;

        all.extend(data.items);
        if page >= data.total_pages {
            break;
        }
        page += 1;
    }

    Ok(all)
}

async fn fetch_pages(client: &reqwest::Client, api_base: &str) -> anyhow::Result<Vec<ContentRow>> {
    let url = format!("{}/api/v1/content", api_base);
    let envelope: Envelope<Vec<ContentRow>> = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    if !envelope.success {
        anyhow::bail!("content request reported failure");
    }
    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("content response had no data"))
}
