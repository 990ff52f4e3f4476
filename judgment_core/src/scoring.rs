use crate::card::Suit;
use crate::state::PlayerId;
use serde::{Deserialize, Serialize};

/// 单个玩家在某一轮结束时的记录，一旦生成就不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStat {
    pub player_id: PlayerId,
    pub player_name: String,
    pub round_number: u8,
    pub trump_suit: Suit,
    pub bid: u8,
    pub hands_won: u8,
    pub score: u32,
    pub total_score: u32,
}

/// 游戏结束时的最终排名条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalStanding {
    pub id: PlayerId,
    pub name: String,
    pub total_score: u32,
}

/// 单轮得分：叫中了得 `10 + bid`，没叫中一分没有
pub fn round_score(bid: u8, hands_won: u8) -> u32 {
    if bid == hands_won { 10 + u32::from(bid) } else { 0 }
}

/// 结算一轮所需的单个玩家输入
#[derive(Debug, Clone)]
pub struct RoundResult<'a> {
    pub player_id: PlayerId,
    pub player_name: &'a str,
    pub bid: u8,
    pub hands_won: u8,
    pub previous_total: u32,
}

/// 把一轮的结果换算成 RoundStat（按传入顺序，即座位顺序）
pub fn settle_round(round_number: u8, trump_suit: Suit, results: &[RoundResult<'_>]) -> Vec<RoundStat> {
    results
        .iter()
        .map(|r| {
            let score = round_score(r.bid, r.hands_won);
            RoundStat {
                player_id: r.player_id,
                player_name: r.player_name.to_string(),
                round_number,
                trump_suit,
                bid: r.bid,
                hands_won: r.hands_won,
                score,
                total_score: r.previous_total + score,
            }
        })
        .collect()
}

/// 按总分从高到低排列；同分保持座位顺序
pub fn final_standings(mut standings: Vec<FinalStanding>) -> Vec<FinalStanding> {
    standings.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    standings
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn test_exact_bid_scores_ten_plus_bid() {
        assert_eq!(round_score(0, 0), 10);
        assert_eq!(round_score(3, 3), 13);
    }

    #[test]
    fn test_missed_bid_scores_zero() {
        assert_eq!(round_score(2, 1), 0);
        assert_eq!(round_score(0, 1), 0);
        assert_eq!(round_score(1, 3), 0);
    }

    #[test]
    fn test_settle_round_accumulates_totals() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let results = [
            RoundResult { player_id: a, player_name: "Ann", bid: 1, hands_won: 1, previous_total: 20 },
            RoundResult { player_id: b, player_name: "Bob", bid: 0, hands_won: 1, previous_total: 11 },
        ];
        let stats = settle_round(2, Suit::Diamond, &results);
        assert_eq!(stats[0].score, 11);
        assert_eq!(stats[0].total_score, 31);
        assert_eq!(stats[1].score, 0);
        assert_eq!(stats[1].total_score, 11);
        assert!(stats.iter().all(|s| s.round_number == 2 && s.trump_suit == Suit::Diamond));
    }

    #[test]
    fn test_final_standings_sorted_stable() {
        let s = |name: &str, total| FinalStanding { id: Uuid::new_v4(), name: name.into(), total_score: total };
        let ranked = final_standings(vec![s("a", 10), s("b", 30), s("c", 10)]);
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    proptest! {
        #[test]
        fn prop_score_iff_exact(bid in 0u8..=10, won in 0u8..=10, prev in 0u32..500) {
            let id = Uuid::nil();
            let stats = settle_round(1, Suit::Spade, &[RoundResult {
                player_id: id, player_name: "p", bid, hands_won: won, previous_total: prev,
            }]);
            let expected = if bid == won { 10 + u32::from(bid) } else { 0 };
            prop_assert_eq!(stats[0].score, expected);
            prop_assert_eq!(stats[0].total_score, prev + expected);
            prop_assert!(stats[0].total_score >= prev);
        }
    }
}
