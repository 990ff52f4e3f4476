use crate::card::{Card, SUITS, Suit};
use crate::state::PlayerId;
use serde::{Deserialize, Serialize};

/// 一墩中已经打出的一张牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrownCard {
    pub player_id: PlayerId,
    pub card: Card,
}

/// 当前这一墩 (Trick)
///
/// 首牌花色在第一张牌落下时确定，直到这一墩结算才清空。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trick {
    plays: Vec<ThrownCard>,
    starting_suit: Option<Suit>,
}

impl Trick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> &[ThrownCard] {
        &self.plays
    }

    pub fn starting_suit(&self) -> Option<Suit> {
        self.starting_suit
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    /// 加入一张牌；如果是这一墩的第一张，返回新确定的首牌花色
    pub fn push(&mut self, player_id: PlayerId, card: Card) -> Option<Suit> {
        self.plays.push(ThrownCard { player_id, card });
        if self.starting_suit.is_none() {
            self.starting_suit = Some(card.suit);
            return self.starting_suit;
        }
        None
    }

    /// 撤回某个玩家的牌（玩家被永久移出房间时使用），首牌花色随之重算
    pub fn withdraw(&mut self, player_id: PlayerId) -> Option<Card> {
        let idx = self.plays.iter().position(|p| p.player_id == player_id)?;
        let removed = self.plays.remove(idx);
        self.starting_suit = self.plays.first().map(|p| p.card.suit);
        Some(removed.card)
    }

    pub fn clear(&mut self) {
        self.plays.clear();
        self.starting_suit = None;
    }
}

// --- 出牌合法性 ---

/// 计算玩家当前可以打出的牌：有首牌花色就必须跟，没有才可以随便出
pub fn legal_cards(hand: &[Card], starting_suit: Option<Suit>) -> Vec<Card> {
    if let Some(lead) = starting_suit {
        if hand.iter().any(|c| c.suit == lead) {
            return hand.iter().copied().filter(|c| c.suit == lead).collect();
        }
    }
    hand.to_vec()
}

/// 客户端用来高亮可选牌的花色集合
pub fn selectable_suits(hand: &[Card], starting_suit: Option<Suit>) -> Vec<Suit> {
    match starting_suit {
        Some(lead) if hand.iter().any(|c| c.suit == lead) => vec![lead],
        _ => SUITS.to_vec(),
    }
}

// --- 一墩的胜负 ---

/// `challenger` 是否压过当前最大的 `best`
///
/// 将牌压过一切非将牌；同为将牌或同为首牌花色时比点数；
/// 既不是将牌也不是首牌花色的牌永远赢不了。
pub fn beats(challenger: Card, best: Card, starting_suit: Suit, trump: Suit) -> bool {
    let c_trump = challenger.suit == trump;
    let b_trump = best.suit == trump;
    match (c_trump, b_trump) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => challenger.rank > best.rank,
        (false, false) => {
            if challenger.suit != starting_suit {
                return false;
            }
            best.suit != starting_suit || challenger.rank > best.rank
        }
    }
}

/// 结算一墩，返回赢家。空墩返回 None。
pub fn trick_winner(trick: &Trick, trump: Suit) -> Option<PlayerId> {
    let first = trick.plays.first()?;
    let lead = trick.starting_suit.unwrap_or(first.card.suit);

    let best = trick.plays[1..].iter().fold(first, |best, play| {
        if beats(play.card, best.card, lead, trump) { play } else { best }
    });
    Some(best.player_id)
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rank::*;
    use crate::card::Suit::*;
    use crate::card::{Rank, new_deck};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn trick_of(cards: &[Card]) -> (Trick, Vec<PlayerId>) {
        let mut trick = Trick::new();
        let ids: Vec<PlayerId> = cards.iter().map(|_| Uuid::new_v4()).collect();
        for (id, c) in ids.iter().zip(cards) {
            trick.push(*id, *c);
        }
        (trick, ids)
    }

    #[test]
    fn test_push_sets_starting_suit_once() {
        let mut trick = Trick::new();
        assert_eq!(trick.push(Uuid::new_v4(), card(Two, Club)), Some(Club));
        assert_eq!(trick.push(Uuid::new_v4(), card(Ace, Heart)), None);
        assert_eq!(trick.starting_suit(), Some(Club));
        trick.clear();
        assert!(trick.is_empty());
        assert_eq!(trick.starting_suit(), None);
    }

    #[test]
    fn test_withdraw_recomputes_starting_suit() {
        let (mut trick, ids) = trick_of(&[card(Two, Club), card(Ace, Heart)]);
        assert_eq!(trick.withdraw(ids[0]), Some(card(Two, Club)));
        assert_eq!(trick.starting_suit(), Some(Heart));
        assert_eq!(trick.withdraw(ids[0]), None);
        trick.withdraw(ids[1]);
        assert_eq!(trick.starting_suit(), None);
    }

    #[test]
    fn test_legal_cards_must_follow_suit() {
        let hand = [card(Ace, Spade), card(King, Heart), card(Two, Heart)];
        let legal = legal_cards(&hand, Some(Heart));
        assert_eq!(legal, vec![card(King, Heart), card(Two, Heart)]);
        assert_eq!(selectable_suits(&hand, Some(Heart)), vec![Heart]);
    }

    #[test]
    fn test_legal_cards_void_in_suit_plays_anything() {
        let hand = [card(Ace, Spade), card(King, Heart)];
        assert_eq!(legal_cards(&hand, Some(Club)).len(), 2);
        assert_eq!(legal_cards(&hand, None).len(), 2);
        assert_eq!(selectable_suits(&hand, Some(Club)), SUITS.to_vec());
    }

    #[test]
    fn test_highest_starting_suit_wins_without_trump() {
        let (trick, ids) = trick_of(&[card(Ten, Club), card(Ace, Heart), card(Queen, Club)]);
        assert_eq!(trick_winner(&trick, Spade), Some(ids[2]));
    }

    #[test]
    fn test_low_trump_beats_high_starting_suit() {
        let (trick, ids) = trick_of(&[card(Ace, Club), card(Two, Diamond), card(King, Club)]);
        assert_eq!(trick_winner(&trick, Diamond), Some(ids[1]));
    }

    #[test]
    fn test_highest_trump_wins_among_trumps() {
        let (trick, ids) = trick_of(&[
            card(Ace, Club),
            card(Three, Diamond),
            card(Jack, Diamond),
            card(Four, Diamond),
        ]);
        assert_eq!(trick_winner(&trick, Diamond), Some(ids[2]));
    }

    #[test]
    fn test_leading_trump_wins_when_all_trump() {
        let (trick, ids) = trick_of(&[card(Nine, Spade), card(Ten, Heart)]);
        assert_eq!(trick_winner(&trick, Spade), Some(ids[0]));
        assert_eq!(trick_winner(&Trick::new(), Spade), None);
    }

    // 参照实现：给每张牌打分，分数最高者胜
    fn oracle_value(c: Card, lead: Suit, trump: Suit) -> i32 {
        let base = c.rank as i32;
        if c.suit == trump {
            base + 100
        } else if c.suit == lead {
            base + 50
        } else {
            -1
        }
    }

    fn distinct_cards(max: usize) -> impl Strategy<Value = Vec<Card>> {
        Just(new_deck()).prop_shuffle().prop_flat_map(move |deck| {
            (2..=max).prop_map(move |n| deck[..n].to_vec())
        })
    }

    fn any_suit() -> impl Strategy<Value = Suit> {
        prop::sample::select(SUITS.to_vec())
    }

    proptest! {
        #[test]
        fn prop_winner_matches_oracle(cards in distinct_cards(8), trump in any_suit()) {
            let (trick, ids) = trick_of(&cards);
            let lead = cards[0].suit;
            let winner = trick_winner(&trick, trump).unwrap();

            let best_idx = (0..cards.len())
                .max_by_key(|&i| oracle_value(cards[i], lead, trump))
                .unwrap();
            prop_assert_eq!(winner, ids[best_idx]);
        }

        #[test]
        fn prop_trump_always_wins_if_played(cards in distinct_cards(8), trump in any_suit()) {
            let (trick, ids) = trick_of(&cards);
            let winner = trick_winner(&trick, trump).unwrap();
            let idx = ids.iter().position(|id| *id == winner).unwrap();
            if cards.iter().any(|c| c.suit == trump) {
                prop_assert_eq!(cards[idx].suit, trump);
            } else {
                prop_assert_eq!(cards[idx].suit, cards[0].suit);
            }
        }

        #[test]
        fn prop_legal_cards_follow_suit(cards in distinct_cards(13), lead in any_suit()) {
            let legal = legal_cards(&cards, Some(lead));
            prop_assert!(!legal.is_empty());
            if cards.iter().any(|c| c.suit == lead) {
                prop_assert!(legal.iter().all(|c| c.suit == lead));
            } else {
                prop_assert_eq!(legal.len(), cards.len());
            }
        }
    }
}
