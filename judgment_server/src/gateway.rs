use judgment_core::{Outbound, PlayerId, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;

/// 一条连接的发件箱，session 的写任务按顺序把它清空到 WebSocket
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// 房间内在线玩家的发件箱
///
/// 只在持有房间锁时调用 `deliver`，这样每条连接看到的消息顺序就是状态变化的顺序。
#[derive(Debug, Default)]
pub struct Outboxes {
    by_player: HashMap<PlayerId, Outbox>,
}

impl Outboxes {
    pub fn attach(&mut self, player_id: PlayerId, outbox: Outbox) {
        self.by_player.insert(player_id, outbox);
    }

    pub fn detach(&mut self, player_id: PlayerId) -> Option<Outbox> {
        self.by_player.remove(&player_id)
    }

    /// 按收件人投递；离线玩家没有发件箱，消息直接丢弃，重连时会收到快照
    pub fn deliver(&self, messages: Vec<Outbound>) {
        for outbound in messages {
            match outbound {
                Outbound::Room(msg) => {
                    for (player_id, outbox) in &self.by_player {
                        send(*player_id, outbox, msg.clone());
                    }
                }
                Outbound::Player(player_id, msg) => {
                    if let Some(outbox) = self.by_player.get(&player_id) {
                        send(player_id, outbox, msg);
                    }
                }
            }
        }
    }
}

fn send(player_id: PlayerId, outbox: &Outbox, msg: ServerMessage) {
    if outbox.send(msg).is_err() {
        // 写任务已退出，连接的断线处理由它自己的 session 完成
        warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
    }
}
