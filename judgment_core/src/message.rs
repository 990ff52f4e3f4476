use crate::card::{Card, Suit};
use crate::scoring::{FinalStanding, RoundStat};
use crate::state::{GamePhase, PlayerId, PlayerSecret, RoomCode};
use crate::trick::ThrownCard;
use serde::{Deserialize, Serialize};

/// 协议版本，随 roomCreated / roomJoined 下发
pub const PROTOCOL_VERSION: u16 = 1;

// --- 客户端 -> 服务器 的消息 ---
// 线上格式: {"event": "placeBid", "data": {"roomCode": "ABCD", "bid": 2}}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    // --- 房间管理消息 ---
    /// 创建一个新房间，创建者成为房主
    CreateRoom { name: String, persistent_id: PlayerSecret },
    /// 加入房间；游戏已开始时按名字重连
    JoinRoom { name: String, room_code: RoomCode, persistent_id: PlayerSecret },
    /// 只凭持久身份重连
    RejoinRoom { room_code: RoomCode, persistent_id: PlayerSecret },

    // --- 游戏内消息 ---
    StartGame { room_code: RoomCode },
    PlaceBid { room_code: RoomCode, bid: u8 },
    RequestAvailableBids { room_code: RoomCode },
    ThrowCard { room_code: RoomCode, card: Card },
    Heartbeat,
}

/// 房间码统一去空格并转大写
pub fn normalize_room_code(code: &str) -> RoomCode {
    code.trim().to_ascii_uppercase()
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    // --- 房间管理消息 ---
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
        player_list: Vec<PlayerView>,
        is_admin: bool,
        protocol_version: u16,
    },
    RoomJoined {
        room_code: RoomCode,
        player_id: PlayerId,
        player_list: Vec<PlayerView>,
        is_admin: bool,
        protocol_version: u16,
    },
    UpdatePlayerList { players: Vec<PlayerView> },

    // --- 叫牌 ---
    GameStarted {
        player_turn: PlayerId,
        current_round: u8,
        max_rounds: u8,
        trump_suit: Suit,
    },
    /// 单播：本轮自己的手牌
    CardsDistributed { cards: Vec<Card> },
    StartBidding { player_turn: PlayerId },
    /// 单播：当前可叫的数
    AvailableBids { bids: Vec<u8> },
    BidPlaced { player: PlayerId, name: String, bid: u8 },

    // --- 出牌 ---
    StartCardThrowing { player_turn: PlayerId },
    CardThrown { player: PlayerId, name: String, card: Card },
    StartingSuitSet { suit: Suit },
    /// 单播：轮到的玩家可以选哪些花色
    UpdateSelectableCards { selectable_suits: Vec<Suit> },
    ClearThrownCards,
    NextPlayerTurn { player_turn: PlayerId, game_phase: GamePhase },

    // --- 计分与轮次 ---
    HandWinner { winner_id: PlayerId, name: String },
    RoundScores { round: u8, stats: Vec<RoundStat> },
    RoundEnded { round_stats: Vec<Vec<RoundStat>> },
    UpdateTotalScores { players: Vec<PlayerView> },
    NewRoundStarted {
        current_round: u8,
        trump_suit: Suit,
        player_turn: PlayerId,
    },
    GameEnded { results: Vec<FinalStanding> },

    // --- 断线重连 ---
    PlayerDisconnected { name: String, player_id: PlayerId },
    PlayerReconnected { name: String, is_all_players_connected: bool },
    PlayerRejoined { name: String, is_all_players_connected: bool },
    GamePaused { message: String },
    GameResumed { message: String },
    /// 单播：完整快照
    GameState(GameSnapshot),

    Error { message: String },
}

/// 公开的玩家信息，广播给房间里所有人
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub is_admin: bool,
    pub is_connected: bool,
    pub bid: Option<u8>,
    pub hands_won: u8,
    pub total_score: u32,
    pub cards_in_hand: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub player_id: PlayerId,
    pub name: String,
    pub room_code: RoomCode,
    pub round_info: RoundInfo,
    pub table_state: TableState,
    pub local_player_state: LocalPlayerState,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub current_round: u8,
    pub max_rounds: u8,
    pub trump_suit: Suit,
    pub starting_suit: Option<Suit>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub players: Vec<PlayerView>,
    pub thrown_cards: Vec<ThrownCard>,
    pub current_turn: Option<PlayerId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalPlayerState {
    pub cards: Vec<Card>,
    pub is_current_turn: bool,
    pub current_game_phase: GamePhase,
    pub is_paused: bool,
}

/// 状态机产出的消息及其收件人，由服务端负责投递
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// 发给房间里所有在线的玩家
    Room(ServerMessage),
    /// 只发给某一个玩家
    Player(PlayerId, ServerMessage),
}

impl From<crate::error::GameError> for ServerMessage {
    fn from(err: crate::error::GameError) -> Self {
        ServerMessage::Error { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rank;
    use uuid::Uuid;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"placeBid","data":{"roomCode":"ABCD","bid":2}}"#).unwrap();
        assert_eq!(msg, ClientMessage::PlaceBid { room_code: "ABCD".into(), bid: 2 });

        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"throwCard","data":{"roomCode":"ABCD","card":{"suit":"CLUB","rank":"KING"}}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::ThrowCard { room_code, card } if room_code == "ABCD" && card == Card::new(Rank::King, Suit::Club)));

        let msg: ClientMessage = serde_json::from_str(r#"{"event":"heartbeat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Heartbeat);
    }

    #[test]
    fn test_malformed_client_messages_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"placeBid","data":{"roomCode":"A","bid":-1}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"cheat","data":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"createRoom","data":{"name":"a","persistentId":"nope"}}"#).is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ServerMessage::NextPlayerTurn {
            player_turn: id,
            game_phase: GamePhase::CardThrowing,
        })
        .unwrap();
        assert_eq!(json["event"], "nextPlayerTurn");
        assert_eq!(json["data"]["gamePhase"], "cardThrowing");
        assert_eq!(json["data"]["playerTurn"], id.to_string());

        let json = serde_json::to_value(ServerMessage::ClearThrownCards).unwrap();
        assert_eq!(json["event"], "clearThrownCards");
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code("  ab1z "), "AB1Z");
    }
}
