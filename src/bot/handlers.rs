//! Free-text command handlers: `vreme`, `radar`, `beseda`.
//!
//! Commands are plain keywords at the start of a message, not slash
//! commands, with at most one argument. The bot only answers in chats
//! whose title matches the configured channel allow-list. Every remote
//! product goes through the resource caches on [`AppState`]; handlers
//! degrade to short Slovenian notices when a product is unavailable
//! instead of failing the whole reply.

use crate::bot::messaging;
use crate::cache::{FetchError, ResourceCache};
use crate::config::{self, Settings};
use crate::fetch::Fetcher;
use crate::html::{self, ReportNode};
use crate::report::{self, ForecastMode};
use crate::utils;
use bytes::Bytes;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::warn;

/// Shared handler state: settings, the HTTP client and one cache per
/// payload shape (scanned pages, table cells, binary blobs).
pub struct AppState {
    pub settings: Arc<Settings>,
    pub fetcher: Fetcher,
    pub pages: ResourceCache<Arc<[ReportNode]>>,
    pub tables: ResourceCache<Arc<[String]>>,
    pub blobs: ResourceCache<Bytes>,
}

impl AppState {
    #[must_use]
    pub fn new(settings: Arc<Settings>, fetcher: Fetcher) -> Self {
        Self {
            settings,
            fetcher,
            pages: ResourceCache::new(),
            tables: ResourceCache::new(),
            blobs: ResourceCache::new(),
        }
    }
}

/// True when the chat's title matches the channel allow-list.
#[must_use]
pub fn valid_channel(settings: &Settings, chat_title: Option<&str>) -> bool {
    let Some(title) = chat_title else {
        return false;
    };
    settings
        .valid_channels()
        .iter()
        .any(|fragment| title.contains(fragment.as_str()))
}

/// Entry point for every inbound text message.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    if !valid_channel(&state.settings, msg.chat.title()) {
        return respond(());
    }

    let lower = text.to_lowercase();
    let words: Vec<&str> = text.split_whitespace().collect();
    let result = if lower.starts_with("vreme") && words.len() < 3 {
        vreme(&bot, &msg, &state, words.get(1).copied()).await
    } else if lower.starts_with("radar") {
        radar(&bot, &msg, &state).await
    } else if lower.starts_with("beseda") && words.len() == 2 {
        beseda(&bot, &msg, &state, words[1]).await
    } else {
        Ok(())
    };

    if let Err(err) = result {
        warn!(error = %err, "command handler error");
        let notice = utils::truncate_str(err.to_string(), 300);
        if let Err(send_err) = messaging::send_code_block(&bot, msg.chat.id, &notice).await {
            warn!(error = %send_err, "failed to report handler error to chat");
        }
    }
    respond(())
}

async fn vreme(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    arg: Option<&str>,
) -> anyhow::Result<()> {
    let mode = match arg {
        None => Some(ForecastMode::Long),
        Some(raw) => ForecastMode::parse(raw),
    };
    let Some(mode) = mode else {
        let raw = arg.unwrap_or_default();
        let notice = format!("ne vem kaj je to {raw}, lahko je short, long, full");
        return messaging::send_code_block(bot, msg.chat.id, &notice).await;
    };

    let policy = config::page_policy();
    let forecast = {
        let fetcher = state.fetcher.clone();
        let url = state.settings.forecast_url.clone();
        state
            .pages
            .get("napoved", &policy, move || {
                fetch_report(fetcher.clone(), url.clone())
            })
            .await
    };
    let cells = {
        let fetcher = state.fetcher.clone();
        let url = state.settings.observations_url.clone();
        state
            .tables
            .get("podatki", &policy, move || {
                fetch_cells(fetcher.clone(), url.clone())
            })
            .await
    };

    let mut reply = String::new();
    match cells {
        Some(cells) => reply.push_str(&report::observations(&cells, &state.settings.locations())),
        None => reply.push_str("\npodatki trenutno niso na voljo\n"),
    }
    match forecast {
        Some(nodes) => reply.push_str(&report::forecast_text(&nodes, mode)),
        None => reply.push_str("\nnapoved trenutno ni na voljo"),
    }
    messaging::send_code_block(bot, msg.chat.id, &reply).await
}

async fn radar(bot: &Bot, msg: &Message, state: &AppState) -> anyhow::Result<()> {
    let policy = config::page_policy();
    let gif = {
        let fetcher = state.fetcher.clone();
        let url = state.settings.radar_url.clone();
        state
            .blobs
            .get("radar", &policy, move || {
                let fetcher = fetcher.clone();
                let url = url.clone();
                async move { fetcher.bytes(&url).await }
            })
            .await
    };

    match gif {
        Some(payload) => {
            // Each hit is an independent zero-offset view of the GIF.
            let file = InputFile::memory(payload).file_name("radar.gif");
            messaging::send_document_resilient(bot, msg.chat.id, file).await?;
            Ok(())
        }
        None => messaging::send_code_block(bot, msg.chat.id, "radar trenutno ni na voljo").await,
    }
}

async fn beseda(bot: &Bot, msg: &Message, state: &AppState, word: &str) -> anyhow::Result<()> {
    let key = format!("beseda-{}", word.to_lowercase());
    let policy = config::dictionary_policy();
    let nodes = {
        let fetcher = state.fetcher.clone();
        let url = state.settings.dictionary_url.clone();
        let word = word.to_string();
        state
            .pages
            .get(&key, &policy, move || {
                fetch_definition(fetcher.clone(), url.clone(), word.clone())
            })
            .await
    };

    let reply = nodes
        .map(|nodes| report::forecast_text(&nodes, ForecastMode::Short))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("ni razlage za {word}"));
    messaging::send_code_block(bot, msg.chat.id, &reply).await
}

async fn fetch_report(fetcher: Fetcher, url: String) -> Result<Arc<[ReportNode]>, FetchError> {
    let body = fetcher.text(&url).await?;
    let nodes = html::sibling_run(&body);
    if nodes.is_empty() {
        return Err(FetchError::Parse(format!("no report sections in {url}")));
    }
    Ok(nodes.into())
}

async fn fetch_cells(fetcher: Fetcher, url: String) -> Result<Arc<[String]>, FetchError> {
    let body = fetcher.text(&url).await?;
    let cells = html::table_cells(&body);
    if cells.is_empty() {
        return Err(FetchError::Parse(format!("no observation cells in {url}")));
    }
    Ok(cells.into())
}

async fn fetch_definition(
    fetcher: Fetcher,
    url: String,
    word: String,
) -> Result<Arc<[ReportNode]>, FetchError> {
    let body = fetcher
        .text_query(&url, &[("View", "1"), ("Query", &word)])
        .await?;
    let nodes = html::sibling_run(&body);
    if nodes.is_empty() {
        return Err(FetchError::Parse(format!("no entry markup for {word}")));
    }
    Ok(nodes.into())
}
