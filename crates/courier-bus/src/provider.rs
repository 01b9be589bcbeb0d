//! Bus provider selection from configuration.

use std::sync::Arc;

use tracing::info;

use courier_core::config::BusConfig;
use courier_core::error::AppError;
use courier_core::result::AppResult;
use courier_core::traits::bus::MessageBus;

use crate::memory::MemoryBus;

/// Builds the configured message bus.
pub async fn build_bus(config: &BusConfig) -> AppResult<Arc<dyn MessageBus>> {
    let bus: Arc<dyn MessageBus> = match config.provider.as_str() {
        "memory" => Arc::new(MemoryBus::new()),
        #[cfg(feature = "redis-bus")]
        "redis" => Arc::new(crate::redis::RedisBus::connect(config).await?),
        other => {
            return Err(AppError::configuration(format!(
                "Unsupported bus provider '{other}'"
            )));
        }
    };
    info!(provider = bus.provider_type(), "Message bus initialized");
    Ok(bus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_provider() {
        let bus = build_bus(&BusConfig::default()).await.unwrap();
        assert_eq!(bus.provider_type(), "memory");
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let config = BusConfig {
            provider: "carrier-pigeon".to_string(),
            ..BusConfig::default()
        };
        let err = build_bus(&config).await.unwrap_err();
        assert_eq!(err.kind, courier_core::error::ErrorKind::Configuration);
    }
}
