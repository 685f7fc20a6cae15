use std::sync::Arc;

use teloxide::Bot;

use tgs_core::{config::Config, updates::bus::UpdateBus};

mod commands;

#[tokio::main]
async fn main() -> Result<(), tgs_core::Error> {
    tgs_core::logging::init("tgs")?;

    let cfg = Arc::new(Config::load()?);
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let bus = UpdateBus::new();

    // Held for the lifetime of the process; dropping it detaches the commands.
    let _commands = commands::install(&bus, bot.clone(), cfg);

    tgs_telegram::polling::run(bot, bus).await;

    Ok(())
}
