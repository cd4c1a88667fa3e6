use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ログ設定の初期化（`RUST_LOG` が優先される）
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stride=debug,stride_lib=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
