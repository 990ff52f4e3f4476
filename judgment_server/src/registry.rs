use crate::gateway::{Outbox, Outboxes};
use crate::timers;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use judgment_core::{
    ClientMessage, ConnectionId, GameError, GamePhase, Outbound, PlayerId, PlayerSecret, Room, RoomCode, Timings,
    normalize_room_code,
};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ROOM_CODE_LEN: usize = 4;
const ROOM_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 一个房间的全部内容：权威状态，加上在线玩家的发件箱
#[derive(Debug)]
pub struct RoomSlot {
    pub room: Room,
    pub outboxes: Outboxes,
    /// 房间已销毁；之后拿到这个锁的人（定时器、迟到的消息）什么都不做
    pub closed: bool,
    /// 已经有一个推进停顿（墩间或轮间）的定时器在等待
    pub advance_scheduled: bool,
}

pub type RoomCell = Mutex<RoomSlot>;

/// 连接所在的座位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
}

/// 服务器全局状态：所有房间，以及连接到座位的反向索引
///
/// 重要‼️：拿房间锁之前必须先放掉 DashMap 的分片引用（先 clone 出 Arc 再 lock），
/// 持有房间锁时可以再访问 DashMap，反过来不行。
pub struct Registry {
    rooms: DashMap<RoomCode, Arc<RoomCell>>,
    connections: DashMap<ConnectionId, Seat>,
    timings: Timings,
}

impl Registry {
    pub fn new(timings: Timings) -> Self {
        Registry {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            timings,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room(&self, code: &str) -> Option<Arc<RoomCell>> {
        self.rooms.get(code).map(|r| r.value().clone())
    }

    /// 连接当前坐在哪个房间的哪个座位
    pub fn seat_of(&self, connection: ConnectionId) -> Option<Seat> {
        self.connections.get(&connection).map(|s| s.value().clone())
    }

    /// 处理一条客户端消息；被拒绝时只把错误发回给这条连接
    pub fn handle(self: &Arc<Self>, connection: ConnectionId, outbox: &Outbox, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::CreateRoom { name, persistent_id } => {
                self.create_room(connection, outbox, &name, persistent_id)
            }
            ClientMessage::JoinRoom { name, room_code, persistent_id } => {
                self.join_room(connection, outbox, &room_code, &name, persistent_id)
            }
            ClientMessage::RejoinRoom { room_code, persistent_id } => {
                self.rejoin_room(connection, outbox, &room_code, persistent_id)
            }
            ClientMessage::StartGame { room_code } => self.in_seated_room(connection, &room_code, |room, player_id| {
                let messages = room.start_game(player_id, &mut rand::rng())?;
                info!(room = %room.code, players = room.players.len(), max_rounds = room.max_rounds, "游戏开始");
                Ok(messages)
            }),
            ClientMessage::PlaceBid { room_code, bid } => {
                self.in_seated_room(connection, &room_code, |room, player_id| room.place_bid(player_id, bid))
            }
            ClientMessage::RequestAvailableBids { room_code } => {
                self.in_seated_room(connection, &room_code, |room, player_id| room.available_bids_for(player_id))
            }
            ClientMessage::ThrowCard { room_code, card } => self.in_seated_room(connection, &room_code, |room, player_id| {
                room.throw_card(player_id, card, Instant::now())
            }),
            ClientMessage::Heartbeat => {
                self.heartbeat(connection);
                Ok(())
            }
        };

        if let Err(err) = result {
            debug!(%connection, kind = ?err.kind(), "请求被拒绝: {}", err);
            // 写任务已退出时连接正在关闭，错误消息无处可发
            let _ = outbox.send(err.into());
        }
    }

    fn create_room(
        self: &Arc<Self>,
        connection: ConnectionId,
        outbox: &Outbox,
        name: &str,
        secret: PlayerSecret,
    ) -> Result<(), GameError> {
        if self.connections.contains_key(&connection) {
            return Err(GameError::AlreadyInRoom);
        }

        let mut rng = rand::rng();
        loop {
            let code = generate_room_code(&mut rng);
            // 持有空位的 entry 期间其他人拿不到这个房间码
            let Entry::Vacant(entry) = self.rooms.entry(code.clone()) else { continue };
            let (room, player_id, messages) =
                Room::create(code.clone(), name, secret, connection, self.timings, Instant::now())?;

            let mut slot = RoomSlot { room, outboxes: Outboxes::default(), closed: false, advance_scheduled: false };
            slot.outboxes.attach(player_id, outbox.clone());
            slot.outboxes.deliver(messages);
            entry.insert(Arc::new(Mutex::new(slot)));

            self.connections.insert(connection, Seat { room_code: code.clone(), player_id });
            info!(room = %code, %player_id, "玩家创建了新房间");
            return Ok(());
        }
    }

    fn join_room(
        self: &Arc<Self>,
        connection: ConnectionId,
        outbox: &Outbox,
        room_code: &str,
        name: &str,
        secret: PlayerSecret,
    ) -> Result<(), GameError> {
        if self.connections.contains_key(&connection) {
            return Err(GameError::AlreadyInRoom);
        }
        let code = normalize_room_code(room_code);
        let cell = self.room(&code).ok_or(GameError::RoomNotFound)?;
        let mut slot = cell.lock();
        if slot.closed {
            return Err(GameError::RoomNotFound);
        }

        let joined = slot.room.join(name, secret, connection, Instant::now())?;
        slot.outboxes.attach(joined.player_id, outbox.clone());
        self.connections.insert(connection, Seat { room_code: code.clone(), player_id: joined.player_id });
        slot.outboxes.deliver(joined.messages);
        if joined.reconnected {
            info!(room = %code, player_id = %joined.player_id, "玩家按名字重连");
        } else {
            info!(room = %code, player_id = %joined.player_id, "玩家加入房间");
        }

        self.after_change(&code, &mut slot);
        Ok(())
    }

    fn rejoin_room(
        self: &Arc<Self>,
        connection: ConnectionId,
        outbox: &Outbox,
        room_code: &str,
        secret: PlayerSecret,
    ) -> Result<(), GameError> {
        if self.connections.contains_key(&connection) {
            return Err(GameError::AlreadyInRoom);
        }
        let code = normalize_room_code(room_code);
        let cell = self.room(&code).ok_or(GameError::RoomNotFound)?;
        let mut slot = cell.lock();
        if slot.closed {
            return Err(GameError::RoomNotFound);
        }

        let (player_id, messages) = slot.room.rejoin(secret, connection, Instant::now())?;
        slot.outboxes.attach(player_id, outbox.clone());
        self.connections.insert(connection, Seat { room_code: code.clone(), player_id });
        slot.outboxes.deliver(messages);
        info!(room = %code, %player_id, "玩家凭持久身份重连");

        self.after_change(&code, &mut slot);
        Ok(())
    }

    /// 在连接所在房间的锁内执行一次操作，并投递产生的消息
    ///
    /// 消息里带的房间码必须就是连接所在的房间。
    fn in_seated_room<F>(self: &Arc<Self>, connection: ConnectionId, claimed_code: &str, op: F) -> Result<(), GameError>
    where
        F: FnOnce(&mut Room, PlayerId) -> Result<Vec<Outbound>, GameError>,
    {
        let seat = self.seat_of(connection).ok_or(GameError::NotInRoom)?;
        if normalize_room_code(claimed_code) != seat.room_code {
            return Err(GameError::NotInRoom);
        }
        let cell = self.room(&seat.room_code).ok_or(GameError::RoomNotFound)?;
        let mut slot = cell.lock();
        if slot.closed {
            return Err(GameError::RoomNotFound);
        }

        let messages = op(&mut slot.room, seat.player_id)?;
        slot.outboxes.deliver(messages);
        self.after_change(&seat.room_code, &mut slot);
        Ok(())
    }

    fn heartbeat(&self, connection: ConnectionId) {
        let Some(seat) = self.seat_of(connection) else { return };
        if let Some(cell) = self.room(&seat.room_code) {
            cell.lock().room.heartbeat(seat.player_id, Instant::now());
        }
    }

    /// 连接关闭：座位保留，房间暂停，开始计算宽限期
    pub fn disconnect(self: &Arc<Self>, connection: ConnectionId) {
        let Some((_, seat)) = self.connections.remove(&connection) else {
            debug!(%connection, "未入座的连接关闭");
            return;
        };
        let Some(cell) = self.room(&seat.room_code) else {
            warn!(%connection, room = %seat.room_code, "断线连接所在的房间已不存在");
            return;
        };
        let mut slot = cell.lock();
        if slot.closed {
            return;
        }
        let current = slot.room.player(seat.player_id).and_then(|p| p.connection);
        if current != Some(connection) {
            warn!(%connection, room = %seat.room_code, player_id = %seat.player_id, "断线连接与座位登记的连接不符");
            return;
        }

        slot.outboxes.detach(seat.player_id);
        match slot.room.disconnect(seat.player_id, Instant::now()) {
            Ok(messages) => {
                slot.outboxes.deliver(messages);
                info!(room = %seat.room_code, player_id = %seat.player_id, "玩家断线，保留座位");
                timers::schedule_grace_expiry(
                    self.clone(),
                    seat.room_code.clone(),
                    slot.room.instance,
                    seat.player_id,
                    slot.room.timings.grace_period,
                );
            }
            Err(err) => warn!(room = %seat.room_code, player_id = %seat.player_id, "断线处理失败: {}", err),
        }
        self.after_change(&seat.room_code, &mut slot);
    }

    /// 宽限期定时器到期
    pub fn expire(self: &Arc<Self>, code: &str, instance: Uuid, player_id: PlayerId) {
        let Some(cell) = self.room(code) else {
            warn!(room = %code, %player_id, "宽限期到期时房间已不存在");
            return;
        };
        let mut slot = cell.lock();
        if slot.closed || slot.room.instance != instance {
            return;
        }

        let messages = slot.room.expire_player(player_id, Instant::now());
        if slot.room.player(player_id).is_none() {
            slot.outboxes.detach(player_id);
        }
        slot.outboxes.deliver(messages);
        self.after_change(code, &mut slot);
    }

    /// 展示停顿结束：墩间停顿后领出下一墩，轮间停顿后发下一轮的牌
    pub fn advance(self: &Arc<Self>, code: &str, instance: Uuid) {
        let Some(cell) = self.room(code) else {
            warn!(room = %code, "推进停顿时房间已不存在");
            return;
        };
        let mut slot = cell.lock();
        if slot.closed || slot.room.instance != instance {
            return;
        }
        slot.advance_scheduled = false;

        let result = match slot.room.phase {
            GamePhase::TrickOver => slot.room.advance_trick(),
            _ => slot.room.advance_round(&mut rand::rng()),
        };
        match result {
            Ok(messages) => {
                slot.outboxes.deliver(messages);
                info!(room = %code, round = slot.room.current_round, phase = ?slot.room.phase, "推进到下一阶段");
            }
            // 暂停中：恢复时会重新安排
            Err(err) => debug!(room = %code, "暂不推进: {}", err),
        }
        self.after_change(code, &mut slot);
    }

    /// 每次改动房间之后调用：安排展示停顿，或者销毁已经结束的房间
    fn after_change(self: &Arc<Self>, code: &str, slot: &mut RoomSlot) {
        let room = &slot.room;
        if room.phase == GamePhase::Ended || room.players.is_empty() {
            self.teardown(code, slot);
            return;
        }
        if room.paused || slot.advance_scheduled {
            return;
        }
        let delay = match room.phase {
            GamePhase::TrickOver => room.timings.trick_pause(),
            GamePhase::RoundOver => room.timings.next_round_delay,
            _ => return,
        };
        let instance = room.instance;
        slot.advance_scheduled = true;
        timers::schedule_advance(self.clone(), code.to_string(), instance, delay);
    }

    /// 销毁房间；之后到来的定时器和消息都会因为 closed 或找不到房间而作废
    fn teardown(&self, code: &str, slot: &mut RoomSlot) {
        slot.closed = true;
        self.connections.retain(|_, seat| seat.room_code != code);
        // 房间码只有在这里移除后才可能被新房间复用
        self.rooms.remove(code);
        info!(room = %code, instance = %slot.room.instance, "房间已销毁");
    }
}

fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}
