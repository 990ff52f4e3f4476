use crate::registry::Registry;
use judgment_core::{PlayerId, RoomCode};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// 定时器只记住房间码和房间实例 ID，到期后重新查房间、加锁、检查状态，
// 房间已销毁或被同码的新房间取代时什么都不做。

/// 断线玩家的宽限期
pub fn schedule_grace_expiry(registry: Arc<Registry>, code: RoomCode, instance: Uuid, player_id: PlayerId, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        registry.expire(&code, instance, player_id);
    });
}

/// 墩间或轮间的展示停顿
pub fn schedule_advance(registry: Arc<Registry>, code: RoomCode, instance: Uuid, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        registry.advance(&code, instance);
    });
}
