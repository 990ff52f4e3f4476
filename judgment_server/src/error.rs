use thiserror::Error;

/// 服务器启动阶段的错误；游戏内的错误都是 `GameError`，会作为 error 事件发回客户端
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("配置加载失败: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("监听地址无效: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("日志过滤规则无效: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}
