use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时默认 info，详细模式下本 crate 输出 debug。
/// 日志写到 stderr，stdout 只用于界面。
pub fn init(verbose: bool) {
    let default_directive = if verbose { "info,exam_client=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
