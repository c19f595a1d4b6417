//! 日志初始化
//!
//! `tracing_subscriber::fmt()` + `EnvFilter`，`RUST_LOG` 优先于传入的默认过滤器。
//! 同时安装 `LogTracer`，依赖库通过 `log` 宏输出的记录也会进入 tracing。

use std::sync::Once;

use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// 默认过滤器
pub const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// 以默认过滤器（`info`）初始化日志
pub fn init_logging() {
    init_logging_with_filter(DEFAULT_FILTER);
}

/// 以指定过滤器初始化日志
///
/// 只有第一次调用生效，之后的调用为空操作。若进程中已有全局 subscriber
/// （例如测试框架安装的），保留原有的。
pub fn init_logging_with_filter(filter: &str) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

        // log -> tracing 桥接；已有 logger 时忽略
        let _ = LogTracer::builder()
            .with_max_level(log::LevelFilter::Trace)
            .init();

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_thread_names(true)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("global subscriber already installed, keeping it");
        }
    });
}
