use crate::catalog::AssetCatalog;
use crate::commands::{self, asset_keyboard, Command, Reply};
use crate::registry::SubscriberRegistry;
use crate::scheduler::{wait_shutdown, BroadcastScheduler};
use crate::telegram::{TelegramClient, Update};
use crate::types::SubscriberId;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Long-polls Telegram for commands and button presses and applies them to the registry.
pub struct FrontEnd {
    client: Arc<TelegramClient>,
    registry: Arc<SubscriberRegistry>,
    catalog: Arc<AssetCatalog>,
    scheduler: Arc<BroadcastScheduler>,
    poll: Duration,
    backoff: Duration,
}

impl FrontEnd {
    pub fn new(
        client: Arc<TelegramClient>,
        registry: Arc<SubscriberRegistry>,
        catalog: Arc<AssetCatalog>,
        scheduler: Arc<BroadcastScheduler>,
    ) -> Self {
        Self {
            client,
            registry,
            catalog,
            scheduler,
            poll: Duration::from_secs(25),
            backoff: Duration::from_secs(5),
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(assets = self.catalog.len(), "telegram front end polling");
        let mut offset: Option<i64> = None;
        loop {
            let polled = tokio::select! {
                res = self.client.get_updates(offset, self.poll) => res,
                _ = wait_shutdown(&mut shutdown) => break,
            };
            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let update_id = update.update_id;
                        if let Err(e) = self.handle(update).await {
                            tracing::warn!(update_id, error = %e, "update handling failed");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed; backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(self.backoff) => {}
                        _ = wait_shutdown(&mut shutdown) => break,
                    }
                }
            }
        }
        tracing::info!("telegram front end stopped");
    }

    async fn handle(&self, update: Update) -> anyhow::Result<()> {
        if let Some(cb) = update.callback_query {
            // An expired callback cannot be acknowledged; the selection still applies.
            if let Err(e) = self.client.answer_callback_query(&cb.id).await {
                tracing::warn!(error = %e, "answerCallbackQuery failed");
            }
            let (Some(data), Some(msg)) = (cb.data, cb.message) else {
                return Ok(());
            };
            let reply = self.apply(SubscriberId(msg.chat.id), Command::SelectAsset(data));
            self.client
                .edit_message_text(msg.chat.id, msg.message_id, &reply.text(&self.catalog))
                .await
                .context("editMessageText")?;
            return Ok(());
        }

        let Some(msg) = update.message else {
            return Ok(());
        };
        let Some(text) = msg.text.as_deref() else {
            return Ok(());
        };
        let reply = self.apply(SubscriberId(msg.chat.id), Command::parse(text));
        let keyboard = reply.offers_assets().then(|| asset_keyboard(&self.catalog));
        self.client
            .send_message(msg.chat.id, &reply.text(&self.catalog), keyboard)
            .await
            .context("sendMessage")?;
        Ok(())
    }

    fn apply(&self, id: SubscriberId, cmd: Command) -> Reply {
        let reply = commands::apply(&self.registry, &self.catalog, id, cmd);
        // The first selection starts broadcasting without waiting out the initial delay.
        if matches!(reply, Reply::AssetSelected(_)) && self.scheduler.cycles_started() == 0 {
            self.scheduler.request_tick();
        }
        reply
    }
}
