//! Long-polling loop feeding Telegram updates to the command handler.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::client::TelegramClient;
use super::commands::CommandHandler;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Spawn the bot polling task.
///
/// Each batch is handled to completion before cancellation is observed.
/// The offset advances past every update, including ones whose handling
/// failed, so a poisoned update cannot wedge the bot. Failures are reported
/// by [`CommandHandler::process_update`].
#[must_use]
pub fn spawn_bot_poller(
    client: TelegramClient,
    handler: CommandHandler,
    poll_timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut offset: Option<i64> = None;
            let mut backoff = INITIAL_RETRY_DELAY;
            info!("telegram bot poller started");

            loop {
                let batch = tokio::select! {
                    () = cancel.cancelled() => break,
                    batch = client.get_updates(offset, poll_timeout) => batch,
                };

                let updates = match batch {
                    Ok(updates) => {
                        backoff = INITIAL_RETRY_DELAY;
                        updates
                    }
                    Err(err) => {
                        warn!(%err, delay = ?backoff, "getUpdates failed; retrying");
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                        continue;
                    }
                };

                for update in &updates {
                    offset = Some(update.update_id + 1);
                    handler.process_update(update).await;
                }
            }

            info!("telegram bot poller shutting down");
        }
        .instrument(info_span!("bot_poller")),
    )
}
