use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{AppConfig, ItemErrorPolicy};
use crate::providers::{CardSink, ListSource};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Board list every card is created on.
    pub list_id: String,
    pub poll_interval: Duration,
    pub single_run: bool,
    pub on_item_error: ItemErrorPolicy,
    pub clear_source: bool,
}

impl SyncOptions {
    pub fn from_config(config: &AppConfig, single_run: bool, clear_source: bool) -> Self {
        Self {
            list_id: config.trello.buy_list_id.clone(),
            poll_interval: Duration::from_secs(config.schedule.poll_time_in_seconds),
            single_run,
            on_item_error: config.schedule.on_item_error,
            clear_source: clear_source || config.schedule.clear_source,
        }
    }
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub created: usize,
    pub failed: usize,
    pub cleared: usize,
}

/// Mirrors the list source onto the card sink, once or on a fixed interval.
pub struct SyncDriver<'a> {
    source: &'a dyn ListSource,
    sink: &'a dyn CardSink,
    options: SyncOptions,
}

impl<'a> SyncDriver<'a> {
    pub fn new(source: &'a dyn ListSource, sink: &'a dyn CardSink, options: SyncOptions) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    /// Fetch the list and create one card per item.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let items = self
            .source
            .fetch_items()
            .await
            .with_context(|| format!("Failed to fetch items from {}", self.source.name()))?;

        let mut report = CycleReport {
            fetched: items.len(),
            ..CycleReport::default()
        };
        let mut mirrored = Vec::with_capacity(items.len());

        for item in items {
            tracing::info!("creating card for {}", item.text);
            match self
                .sink
                .create_card(&item.text, &self.options.list_id, None)
                .await
            {
                Ok(card) => {
                    report.created += 1;
                    if let Some(url) = card.short_url.as_deref().or(card.id.as_deref()) {
                        tracing::debug!("Created {} card {url}", self.sink.name());
                    }
                    mirrored.push(item);
                }
                Err(e) => match self.options.on_item_error {
                    ItemErrorPolicy::Skip => {
                        report.failed += 1;
                        tracing::warn!("Skipping {:?}: {e:#}", item.text);
                    }
                    ItemErrorPolicy::Abort => {
                        return Err(e.context(format!("Aborting cycle at {:?}", item.text)));
                    }
                },
            }
        }

        if self.options.clear_source && !mirrored.is_empty() {
            report.cleared = self.source.delete_items(mirrored).await;
        }

        Ok(report)
    }

    /// Run cycles until single-run mode stops after the first one.
    ///
    /// In polling mode a failed cycle is logged and the next one still runs.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            "Sync started (interval: {:?}, single run: {})",
            self.options.poll_interval,
            self.options.single_run
        );

        loop {
            match self.run_cycle().await {
                Ok(report) => tracing::info!(
                    "Cycle done: {} fetched, {} created, {} failed, {} cleared",
                    report.fetched,
                    report.created,
                    report.failed,
                    report.cleared
                ),
                Err(e) if self.options.single_run => return Err(e),
                Err(e) => tracing::error!("Sync cycle failed: {e:#}"),
            }

            if self.options.single_run {
                return Ok(());
            }

            tokio::time::sleep(self.options.poll_interval).await;
            tracing::info!("Polling again after {:?}", self.options.poll_interval);
        }
    }
}
