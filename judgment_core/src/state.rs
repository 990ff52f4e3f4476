use crate::card::{Card, Suit, trump_for_round};
use crate::message::{GameSnapshot, LocalPlayerState, PlayerView, RoundInfo, TableState};
use crate::scoring::RoundStat;
use crate::trick::Trick;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 座位的持久 ID，由服务端在玩家入座时生成，断线重连后保持不变
pub type PlayerId = Uuid;
/// 客户端自带的持久身份令牌（线上字段名 persistentId），只用于重连认证，从不广播
pub type PlayerSecret = Uuid;
/// 单条 WebSocket 连接的临时 ID，每次重连都会变
pub type ConnectionId = Uuid;
pub type RoomCode = String;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    Lobby,
    Bidding,
    CardThrowing,
    /// 一墩已经结算，桌面上的牌留着展示，等待赢家领出下一墩（或本轮计分）
    TrickOver,
    /// 一轮已经计分，等待进入下一轮（或结束游戏）
    RoundOver,
    Ended,
}

/// 房间内使用的各种时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// 同一玩家两次出牌之间的最短间隔
    pub card_throw_cooldown: Duration,
    /// 一墩结算后到赢家领出下一墩之间的停顿
    pub trick_resolution_delay: Duration,
    /// 一轮计分后到下一轮发牌之间的停顿，留给客户端展示比分
    pub next_round_delay: Duration,
    /// 断线玩家保留座位的时长
    pub grace_period: Duration,
}

impl Timings {
    /// 实际的一墩停顿：不短于出牌冷却，保证被提示领牌的赢家不会被限流
    pub fn trick_pause(&self) -> Duration {
        self.trick_resolution_delay.max(self.card_throw_cooldown)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            card_throw_cooldown: Duration::from_millis(2000),
            trick_resolution_delay: Duration::from_millis(2000),
            next_round_delay: Duration::from_millis(4000),
            grace_period: Duration::from_secs(20 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub secret: PlayerSecret,
    /// 当前连接，断线时为 None
    pub connection: Option<ConnectionId>,
    pub name: String,
    pub is_admin: bool,
    pub hand: Vec<Card>,
    /// None 表示本轮还没叫
    pub bid: Option<u8>,
    pub hands_won: u8,
    pub total_score: u32,
    pub last_throw_at: Option<Instant>,
    pub last_heartbeat_at: Instant,
}

impl Player {
    pub fn new(name: String, secret: PlayerSecret, connection: ConnectionId, is_admin: bool, now: Instant) -> Self {
        Player {
            id: Uuid::new_v4(),
            secret,
            connection: Some(connection),
            name,
            is_admin,
            hand: Vec::new(),
            bid: None,
            hands_won: 0,
            total_score: 0,
            last_throw_at: None,
            last_heartbeat_at: now,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// 一个房间的全部权威状态
///
/// `players` 的顺序就是固定的顺时针座次，所有轮转都按它走。
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    /// 房间实例 ID；房间码在房间销毁后可能被复用，定时器用它识别自己的房间
    pub instance: Uuid,
    pub players: Vec<Player>,
    pub phase: GamePhase,
    /// 暂停只是盖在当前阶段上的标记，恢复时阶段原样保留
    pub paused: bool,
    pub current_round: u8,
    pub max_rounds: u8,
    pub trump_offset: usize,
    pub trump_suit: Suit,
    pub current_turn: Option<PlayerId>,
    pub current_trick: Trick,
    /// 本轮开叫的玩家，也是本轮第一个出牌的人
    pub last_bid_starter: Option<PlayerId>,
    /// 每轮结束时追加一组 RoundStat，只增不改
    pub all_round_stats: Vec<Vec<RoundStat>>,
    pub timings: Timings,
}

impl Room {
    pub fn new(code: RoomCode, timings: Timings) -> Self {
        let trump_offset = 0;
        Room {
            code,
            instance: Uuid::new_v4(),
            players: Vec::new(),
            phase: GamePhase::Lobby,
            paused: false,
            current_round: 0,
            max_rounds: 0,
            trump_offset,
            trump_suit: trump_for_round(trump_offset, 1),
            current_turn: None,
            current_trick: Trick::new(),
            last_bid_starter: None,
            all_round_stats: Vec::new(),
            timings,
        }
    }

    // --- 座位查询 ---

    pub fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn player_by_secret(&self, secret: PlayerSecret) -> Option<&Player> {
        self.players.iter().find(|p| p.secret == secret)
    }

    pub fn player_name(&self, player_id: PlayerId) -> &str {
        self.player(player_id).map_or("Unknown Player", |p| p.name.as_str())
    }

    /// 顺时针的下一个座位
    pub fn next_seat(&self, player_id: PlayerId) -> Option<PlayerId> {
        let idx = self.seat_of(player_id)?;
        Some(self.players[(idx + 1) % self.players.len()].id)
    }

    pub fn all_connected(&self) -> bool {
        self.players.iter().all(Player::is_connected)
    }

    pub fn all_bids_placed(&self) -> bool {
        self.players.iter().all(|p| p.bid.is_some())
    }

    pub fn round_is_over(&self) -> bool {
        self.players.iter().all(|p| p.hand.is_empty())
    }

    pub fn is_in_game(&self) -> bool {
        matches!(
            self.phase,
            GamePhase::Bidding | GamePhase::CardThrowing | GamePhase::TrickOver | GamePhase::RoundOver
        )
    }

    // --- 给客户端的视图 ---

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players
            .iter()
            .enumerate()
            .map(|(seat, p)| PlayerView {
                id: p.id,
                name: p.name.clone(),
                seat,
                is_admin: p.is_admin,
                is_connected: p.is_connected(),
                bid: p.bid,
                hands_won: p.hands_won,
                total_score: p.total_score,
                cards_in_hand: p.hand.len(),
            })
            .collect()
    }

    /// 给某个玩家的完整快照，只包含他自己的手牌
    pub fn snapshot_for(&self, player_id: PlayerId) -> Option<GameSnapshot> {
        let player = self.player(player_id)?;
        Some(GameSnapshot {
            player_id,
            name: player.name.clone(),
            room_code: self.code.clone(),
            round_info: RoundInfo {
                current_round: self.current_round,
                max_rounds: self.max_rounds,
                trump_suit: self.trump_suit,
                starting_suit: self.current_trick.starting_suit(),
            },
            table_state: TableState {
                players: self.player_views(),
                thrown_cards: self.current_trick.plays().to_vec(),
                current_turn: self.current_turn,
            },
            local_player_state: LocalPlayerState {
                cards: player.hand.clone(),
                is_current_turn: self.current_turn == Some(player_id),
                current_game_phase: self.phase,
                is_paused: self.paused,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};

    fn room_with(names: &[&str]) -> Room {
        let now = Instant::now();
        let mut room = Room::new("ABCD".to_string(), Timings::default());
        for (i, name) in names.iter().enumerate() {
            room.players.push(Player::new(name.to_string(), Uuid::new_v4(), Uuid::new_v4(), i == 0, now));
        }
        room
    }

    #[test]
    fn test_next_seat_wraps_clockwise() {
        let room = room_with(&["a", "b", "c"]);
        let ids: Vec<_> = room.players.iter().map(|p| p.id).collect();
        assert_eq!(room.next_seat(ids[0]), Some(ids[1]));
        assert_eq!(room.next_seat(ids[2]), Some(ids[0]));
        assert_eq!(room.next_seat(Uuid::new_v4()), None);
    }

    #[test]
    fn test_snapshot_hides_other_hands() {
        let mut room = room_with(&["a", "b"]);
        room.players[0].hand = vec![Card::new(Rank::Ace, Suit::Heart)];
        room.players[1].hand = vec![Card::new(Rank::Two, Suit::Club)];
        let a = room.players[0].id;

        let snap = room.snapshot_for(a).unwrap();
        assert_eq!(snap.local_player_state.cards, vec![Card::new(Rank::Ace, Suit::Heart)]);
        assert_eq!(snap.table_state.players[1].cards_in_hand, 1);
        assert!(room.snapshot_for(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_trick_pause_covers_throw_cooldown() {
        let mut timings = Timings::default();
        assert_eq!(timings.trick_pause(), Duration::from_millis(2000));
        timings.trick_resolution_delay = Duration::from_millis(500);
        assert_eq!(timings.trick_pause(), timings.card_throw_cooldown);
        timings.trick_resolution_delay = Duration::from_secs(3);
        assert_eq!(timings.trick_pause(), Duration::from_secs(3));
    }

    #[test]
    fn test_views_never_carry_secret() {
        let room = room_with(&["a"]);
        let json = serde_json::to_string(&room.player_views()).unwrap();
        assert!(!json.contains(&room.players[0].secret.to_string()));
    }
}
