//! Image re-hosting
//!
//! Each row's product image is downloaded and uploaded to an image host, and
//! the image column is rewritten to the hosted URL. Rows run one at a time
//! with a pause after every upload.

use crate::config::Config;
use crate::postprocess::{PostprocessError, PostprocessResult, REQUEST_TIMEOUT};
use crate::storage::CsvTable;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Characters of the product name kept in an uploaded file name
const FILE_NAME_CHARS: usize = 30;

/// Stores an image and returns the URL it is served from
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: Vec<u8>, filename: &str) -> PostprocessResult<String>;
}

/// An [`ImageHost`] speaking the EasyImage upload API
pub struct EasyImageHost {
    client: Client,
    api_url: String,
    token: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl EasyImageHost {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> PostprocessResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    /// Builds a host from the `[images]` section
    pub fn from_config(config: &Config) -> PostprocessResult<Self> {
        let api_url = config
            .images
            .api_url
            .clone()
            .ok_or(PostprocessError::MissingSetting("image host api-url"))?;
        let token = config
            .images
            .token()
            .ok_or(PostprocessError::MissingSetting("image host token"))?;
        Self::new(api_url, token)
    }
}

#[async_trait]
impl ImageHost for EasyImageHost {
    async fn upload(&self, image: Vec<u8>, filename: &str) -> PostprocessResult<String> {
        let part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))?;
        let form = Form::new().text("token", self.token.clone()).part("image", part);

        let response = self.client.post(&self.api_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PostprocessError::Status {
                service: "image host",
                status: status.as_u16(),
            });
        }

        let body: UploadResponse = response.json().await?;
        match (body.result.as_str(), body.url) {
            ("success", Some(url)) => Ok(url),
            _ => Err(PostprocessError::Rejected {
                service: "image host",
                message: body.message.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

/// Downloads product images and hands them to an [`ImageHost`]
pub struct ImageProcessor {
    client: Client,
    host: Box<dyn ImageHost>,
}

impl ImageProcessor {
    pub fn new(host: Box<dyn ImageHost>) -> PostprocessResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, host })
    }

    async fn download(&self, url: &str) -> PostprocessResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PostprocessError::Status {
                service: "image download",
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Re-hosts the image at `image_url`, returning its new URL
    pub async fn rehost(&self, image_url: &str, product_name: &str) -> PostprocessResult<String> {
        let image = self.download(image_url).await?;
        tracing::debug!("Downloaded {} bytes from {}", image.len(), image_url);
        self.host
            .upload(image, &upload_file_name(product_name, image_url))
            .await
    }
}

/// File name for an upload: the start of the product name plus the image's
/// extension
fn upload_file_name(product_name: &str, image_url: &str) -> String {
    let extension = url::Url::parse(image_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        })
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "png".to_string());

    let stem: String = product_name
        .trim()
        .chars()
        .take(FILE_NAME_CHARS)
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect();
    let stem = if stem.is_empty() { "product".to_string() } else { stem };
    format!("{}.{}", stem, extension)
}

fn mime_for(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Column selection and pacing for an image run
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub image_column: String,
    pub name_column: String,
    /// Pause after each upload attempt
    pub request_delay: Duration,
}

impl ImageOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image_column: config.images.image_column.clone(),
            name_column: config.images.name_column.clone(),
            request_delay: config.images.request_delay(),
        }
    }
}

/// What an image run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub rows: usize,
    pub rehosted: usize,
    /// Rows without an image URL
    pub skipped: usize,
    /// Rows whose original URL was kept after a failure
    pub failed: usize,
}

/// Re-hosts every row's image in place
pub async fn process_table_images(
    table: &mut CsvTable,
    processor: &ImageProcessor,
    options: &ImageOptions,
) -> PostprocessResult<ImageReport> {
    let image_col = table
        .column(&options.image_column)
        .ok_or_else(|| PostprocessError::MissingColumn(options.image_column.clone()))?;
    let name_col = table.column(&options.name_column);

    let total = table.len();
    let mut report = ImageReport {
        rows: total,
        ..Default::default()
    };

    for (idx, row) in table.rows.iter_mut().enumerate() {
        let original = row[image_col].trim().to_string();
        let name = name_col
            .map(|col| row[col].clone())
            .unwrap_or_else(|| format!("product_{}", idx + 1));

        if original.is_empty() {
            tracing::info!("[{}/{}] {}: no image, skipping", idx + 1, total, name);
            report.skipped += 1;
            continue;
        }

        match processor.rehost(&original, &name).await {
            Ok(hosted) => {
                tracing::info!("[{}/{}] {}: {}", idx + 1, total, name, hosted);
                row[image_col] = hosted;
                report.rehosted += 1;
            }
            Err(e) => {
                tracing::warn!("[{}/{}] {}: keeping original image ({})", idx + 1, total, name, e);
                report.failed += 1;
            }
        }
        tokio::time::sleep(options.request_delay).await;
    }

    Ok(report)
}

/// Re-hosts the images of `input` into a new CSV at `output`
pub async fn process_csv_images(
    input: &Path,
    output: &Path,
    processor: &ImageProcessor,
    options: &ImageOptions,
) -> PostprocessResult<ImageReport> {
    let mut table = CsvTable::read(input)?;
    if table.is_empty() {
        tracing::warn!("{} has no rows", input.display());
    }

    let report = process_table_images(&mut table, processor, options).await?;
    table.write(output)?;
    tracing::info!(
        "Saved {} ({} re-hosted, {} skipped, {} kept)",
        output.display(),
        report.rehosted,
        report.skipped,
        report.failed
    );
    Ok(report)
}
