//! Column translation
//!
//! Every non-trivial cell of the selected columns is translated on its own
//! request. Requests run concurrently but start no closer together than the
//! configured spacing.

use crate::config::{Config, TranslateConfig};
use crate::postprocess::{PostprocessError, PostprocessResult, REQUEST_TIMEOUT};
use crate::storage::CsvTable;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const SYSTEM_PROMPT: &str = "You are a professional translator for product listings. \
Translate only the product information without explaining, adding or removing anything. \
Remove all postal address details. Keep the original formatting such as semicolons and \
line breaks. If the text contains nothing but an address, return an empty string.";

/// Translates a single piece of text
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> PostprocessResult<String>;
}

/// A [`Translator`] backed by an OpenAI-compatible chat-completions endpoint
pub struct ChatTranslator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    target_language: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatTranslator {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        target_language: impl Into<String>,
    ) -> PostprocessResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            target_language: target_language.into(),
        })
    }

    /// Builds a translator from the `[translate]` section
    pub fn from_config(config: &TranslateConfig) -> PostprocessResult<Self> {
        let api_key = config
            .api_key()
            .ok_or(PostprocessError::MissingSetting("translation API key"))?;
        Self::new(
            &config.base_url,
            api_key,
            config.model.clone(),
            config.target_language.clone(),
        )
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str) -> PostprocessResult<String> {
        let prompt = format!("Translate the following into {}:\n{}", self.target_language, text);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PostprocessError::Status {
                service: "translation API",
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| PostprocessError::Rejected {
                service: "translation API",
                message: "response has no choices".to_string(),
            })
    }
}

/// Pacing and selection for a translation run
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Columns to translate; those missing from the table are skipped
    pub columns: Vec<String>,
    /// Requests in flight at once
    pub workers: usize,
    /// Attempts per cell
    pub max_retries: u32,
    /// Minimum spacing between request starts
    pub request_delay: Duration,
    /// Pause before retrying a cell
    pub retry_delay: Duration,
    /// Cells with fewer characters are left as they are
    pub min_length: usize,
}

impl TranslateOptions {
    pub fn from_config(config: &Config) -> Self {
        let translate = &config.translate;
        Self {
            columns: translate.columns.clone(),
            workers: translate.workers,
            max_retries: translate.max_retries,
            request_delay: translate.request_delay(),
            retry_delay: translate.retry_delay(),
            min_length: translate.min_length,
        }
    }
}

/// What a translation run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateReport {
    pub rows: usize,
    /// Columns that were translated
    pub columns: Vec<String>,
    pub translated: usize,
    /// Cells that kept their original text after every attempt failed
    pub failed: usize,
    /// Cells too short or empty to send
    pub skipped: usize,
}

/// Translates the selected columns of `table` in place
pub async fn translate_table(
    table: &mut CsvTable,
    translator: &dyn Translator,
    options: &TranslateOptions,
) -> TranslateReport {
    let columns: Vec<(usize, String)> = options
        .columns
        .iter()
        .filter_map(|name| table.column(name).map(|idx| (idx, name.clone())))
        .collect();
    for name in &options.columns {
        if table.column(name).is_none() {
            tracing::warn!("Column '{}' not in table, skipping", name);
        }
    }

    let mut report = TranslateReport {
        rows: table.len(),
        columns: columns.iter().map(|(_, name)| name.clone()).collect(),
        ..Default::default()
    };

    let mut cells = Vec::new();
    for (col, _) in &columns {
        for (row, values) in table.rows.iter().enumerate() {
            let text = values[*col].trim();
            if text.chars().count() < options.min_length.max(1) {
                report.skipped += 1;
            } else {
                cells.push((row, *col, text.to_string()));
            }
        }
    }

    tracing::info!(
        "Translating {} cells in {} columns ({} workers)",
        cells.len(),
        columns.len(),
        options.workers
    );

    let pacing = Mutex::new(());
    let total = cells.len();
    let mut results = stream::iter(cells)
        .map(|(row, col, text)| {
            let pacing = &pacing;
            async move {
                let translated = translate_cell(translator, &text, options, pacing).await;
                (row, col, translated)
            }
        })
        .buffer_unordered(options.workers.max(1));

    let mut done = 0;
    while let Some((row, col, translated)) = results.next().await {
        done += 1;
        match translated {
            Some(text) => {
                table.rows[row][col] = text;
                report.translated += 1;
            }
            None => report.failed += 1,
        }
        if done % 50 == 0 || done == total {
            tracing::info!("Translated {}/{} cells", done, total);
        }
    }

    report
}

/// Translates one cell, returning `None` once every attempt has failed
async fn translate_cell(
    translator: &dyn Translator,
    text: &str,
    options: &TranslateOptions,
    pacing: &Mutex<()>,
) -> Option<String> {
    let attempts = options.max_retries.max(1);
    for attempt in 1..=attempts {
        {
            let _turn = pacing.lock().await;
            tokio::time::sleep(options.request_delay).await;
        }

        match translator.translate(text).await {
            Ok(translated) => return Some(translated),
            Err(e) => {
                tracing::warn!("Translation failed (attempt {}/{}): {}", attempt, attempts, e);
                if attempt < attempts {
                    tokio::time::sleep(options.retry_delay).await;
                }
            }
        }
    }
    tracing::error!("Keeping original text after {} attempts", attempts);
    None
}

/// Translates `input` into a new CSV at `output`
pub async fn translate_csv(
    input: &Path,
    output: &Path,
    translator: &dyn Translator,
    options: &TranslateOptions,
) -> PostprocessResult<TranslateReport> {
    let mut table = CsvTable::read(input)?;
    tracing::info!(
        "Read {} rows and {} columns from {}",
        table.len(),
        table.headers.len(),
        input.display()
    );

    let report = translate_table(&mut table, translator, options).await;
    table.write(output)?;
    tracing::info!(
        "Saved translation to {} ({} translated, {} kept)",
        output.display(),
        report.translated,
        report.failed
    );
    Ok(report)
}
