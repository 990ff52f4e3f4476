//! # Judgment 服务器
//!
//! 在 `judgment_core` 的状态机外面包一层网络：axum WebSocket 会话、
//! 房间注册表、按连接保序的发件箱，以及宽限期和计分停顿两种定时器。

pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod session;
pub mod timers;

pub use crate::config::Settings;
pub use crate::error::ServerError;
pub use registry::Registry;
pub use session::{SharedRegistry, websocket_handler};
