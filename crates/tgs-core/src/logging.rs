use crate::Result;

/// Initialize logging/tracing for a binary built on the SDK.
///
/// Library code always emits `tracing` events; installing a subscriber is
/// gated behind the `tracing` feature so embedders can bring their own.
pub fn init(service_name: &str) -> Result<()> {
    let _ = service_name;

    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::{fmt, EnvFilter};

        // Default: info for our crates, warn for everything else.
        // Can be overridden with `RUST_LOG`.
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,tgs_core=info,tgs_telegram=info,{service_name}=info"
            ))
        });

        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .try_init()
            .map_err(|e| crate::Error::Config(format!("logging already initialized: {e}")))?;
    }

    Ok(())
}
