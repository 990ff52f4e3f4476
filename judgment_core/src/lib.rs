//! # Judgment 核心逻辑库
//!
//! 这个 `core` crate 包含了 Judgment（定约吃墩）游戏的全部房间状态、
//! 叫牌与出牌规则、计分、断线重连，以及客户端-服务器通信消息的定义。
//! 它不做任何网络 IO，也不读时钟：时间和随机数都由调用方传入，
//! 所有操作返回带收件人的消息列表，交给上层服务器投递。

mod bidding;
mod card;
mod error;
mod logic;
mod message;
mod reconnect;
mod scoring;
mod state;
mod trick;

pub use bidding::*;

pub use card::*;

pub use error::*;

pub use logic::*;

pub use message::*;

pub use scoring::*;

pub use state::*;

pub use trick::*;
