use crate::card::Suit;
use crate::state::GamePhase;
use thiserror::Error;

/// 错误大类，决定服务端如何记录日志；所有错误都只回给请求方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 请求本身不合法（空名字、坏牌、越界的叫牌）
    Validation,
    /// 请求合法但当前状态不允许（阶段不对、不是你的回合、游戏已暂停）
    State,
    /// 出牌过快
    RateLimit,
    /// 房间或玩家不存在
    NotFound,
}

/// 游戏层面的所有拒绝原因。`Display` 就是发给客户端的 `error` 文本。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    // --- 校验错误 ---
    #[error("Name is required.")]
    NameRequired,
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Bid {bid} is not allowed. Available bids: {available:?}")]
    InvalidBid { bid: u8, available: Vec<u8> },
    #[error("Invalid card or card not in hand.")]
    CardNotInHand,
    #[error("You must follow the starting suit ({0}).")]
    MustFollowSuit(Suit),

    // --- 状态错误 ---
    #[error("You are already in a room.")]
    AlreadyInRoom,
    #[error("You are not in this room.")]
    NotInRoom,
    #[error("The game has already started. You cannot join now.")]
    GameAlreadyStarted,
    #[error("This player is already connected to the game.")]
    AlreadyConnected,
    #[error("This seat belongs to another player.")]
    IdentityMismatch,
    #[error("A player with that name already exists in the room.")]
    DuplicateName,
    #[error("Room is full.")]
    RoomFull,
    #[error("Only the room admin can start the game.")]
    NotAdmin,
    #[error("At least 2 players are required to start the game.")]
    NotEnoughPlayers,
    #[error("The game is paused while a player is disconnected.")]
    GamePaused,
    #[error("That action is not allowed during the {0:?} phase.")]
    WrongPhase(GamePhase),
    #[error("It is not your turn.")]
    NotYourTurn,
    #[error("Not enough cards in the deck ({needed} needed).")]
    DeckExhausted { needed: usize },

    // --- 限流 ---
    #[error("You are throwing cards too quickly. Please wait a moment.")]
    RateLimited,

    // --- 未找到 ---
    #[error("Invalid room code.")]
    RoomNotFound,
    #[error("Player not found in room.")]
    PlayerNotFound,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NameRequired
            | GameError::MalformedMessage(_)
            | GameError::InvalidBid { .. }
            | GameError::CardNotInHand
            | GameError::MustFollowSuit(_) => ErrorKind::Validation,
            GameError::RateLimited => ErrorKind::RateLimit,
            GameError::RoomNotFound | GameError::PlayerNotFound => ErrorKind::NotFound,
            _ => ErrorKind::State,
        }
    }
}
