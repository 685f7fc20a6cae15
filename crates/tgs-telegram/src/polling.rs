use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tgs_core::updates::bus::UpdateBus;

use crate::convert;

/// Long-poll Telegram and dispatch every convertible update into `bus`.
///
/// Runs until the dispatcher shuts down.
pub async fn run(bot: Bot, bus: UpdateBus) {
    if let Ok(me) = bot.get_me().await {
        tracing::info!(username = %me.username(), "polling started");
    }

    let handler = dptree::entry().endpoint(forward);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![bus])
        .build()
        .dispatch()
        .await;
}

async fn forward(update: Update, bus: UpdateBus) -> ResponseResult<()> {
    match convert::update(&update) {
        Some(event) => {
            let delivered = bus.dispatch(&event);
            tracing::debug!(update_id = update.id, kind = ?event.kind(), delivered, "update dispatched");
        }
        None => tracing::debug!(update_id = update.id, "update kind not collected"),
    }
    Ok(())
}
