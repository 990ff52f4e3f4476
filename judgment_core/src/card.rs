use crate::error::GameError;
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- 核心数据结构定义 ---

/// 花色 (Suit)
/// 变体顺序即将牌轮换顺序：黑桃 -> 方块 -> 梅花 -> 红心
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Suit {
    Spade,   // 黑桃 ♠️
    Diamond, // 方块 ♦️
    Club,    // 梅花 ♣️
    Heart,   // 红心 ♥️
}

/// 点数 (Rank)
/// Ord 的派生即比牌顺序：2 最小，A 最大
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "JACK")]
    Jack,
    #[serde(rename = "QUEEN")]
    Queen,
    #[serde(rename = "KING")]
    King,
    #[serde(rename = "ACE")]
    Ace,
}

/// 单张扑克牌 (Card)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { suit, rank }
    }
}

pub const SUITS: [Suit; 4] = [Suit::Spade, Suit::Diamond, Suit::Club, Suit::Heart];

pub const RANKS: [Rank; 13] = [
    Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
    Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
];

pub const DECK_SIZE: usize = 52;

// --- 显示 ---
// 与线上格式用同一套名字，错误文本和日志里看到的就是客户端收到的

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Suit::Spade => "SPADE",
            Suit::Diamond => "DIAMOND",
            Suit::Club => "CLUB",
            Suit::Heart => "HEART",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Rank::Jack => "JACK",
            Rank::Queen => "QUEEN",
            Rank::King => "KING",
            Rank::Ace => "ACE",
            pip => return write!(f, "{}", *pip as u8 + 2),
        };
        f.write_str(name)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

// --- 牌组与发牌 ---

/// 创建一副完整的 52 张扑克牌（未洗）
pub fn new_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for &suit in &SUITS {
        for &rank in &RANKS {
            deck.push(Card { suit, rank });
        }
    }
    deck
}

/// 创建并洗好一副新牌
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = new_deck();
    deck.shuffle(rng);
    deck
}

/// 从一副新洗的牌中给 `players` 个玩家各发 `cards_each` 张
///
/// 返回值的索引与座位顺序一致。牌不够时返回 `DeckExhausted`，不会发出半手牌。
pub fn deal<R: Rng + ?Sized>(
    players: usize,
    cards_each: usize,
    rng: &mut R,
) -> Result<Vec<Vec<Card>>, GameError> {
    let needed = players * cards_each;
    if needed > DECK_SIZE {
        return Err(GameError::DeckExhausted { needed });
    }

    let mut deck = shuffled_deck(rng);
    let hands = (0..players)
        .map(|_| deck.split_off(deck.len() - cards_each))
        .collect();
    Ok(hands)
}

/// 第 `round` 轮（从 1 开始）的将牌花色
///
/// 纯函数：只由房间自己的起始偏移和轮数决定，与其它房间无关。
pub fn trump_for_round(starting_offset: usize, round: u8) -> Suit {
    let step = usize::from(round.max(1)) - 1;
    SUITS[(starting_offset + step) % SUITS.len()]
}

/// 按人数决定总轮数，保证 `轮数 × 人数 <= 52`
pub fn max_rounds(player_count: usize) -> u8 {
    match player_count {
        2..=5 => 10,
        6 => 8,
        7 => 7,
        8 => 6,
        _ => 1,
    }
}

// --- 单元测试 ---
