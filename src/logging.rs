// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 日志初始化 (tracing)

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量优先于 `log_level`。重复初始化时直接返回。
pub fn init_logging(log_level: &str, json_format: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = if json_format {
        subscriber.with(fmt::layer().json()).try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::info!(
            "📝 日志已初始化: level={}, format={}",
            log_level,
            if json_format { "json" } else { "text" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        assert!(init_logging("debug", false).is_ok());
        assert!(init_logging("info", true).is_ok());
    }
}
