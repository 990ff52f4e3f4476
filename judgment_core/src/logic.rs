use crate::bidding::available_bids;
use crate::card::{Card, deal, max_rounds, trump_for_round};
use crate::error::GameError;
use crate::message::{Outbound, PROTOCOL_VERSION, ServerMessage};
use crate::scoring::{FinalStanding, RoundResult, final_standings, settle_round};
use crate::state::*;
use crate::trick::{legal_cards, selectable_suits, trick_winner};
use rand::Rng;
use std::time::Instant;
use tracing::debug;

/// 加入房间的结果
#[derive(Debug)]
pub struct Joined {
    pub player_id: PlayerId,
    /// true 表示接管了一个已有座位（重连），而不是新入座
    pub reconnected: bool,
    pub messages: Vec<Outbound>,
}

fn validate_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::NameRequired);
    }
    Ok(name.to_string())
}

// --- 核心游戏流程 ---
//
// 所有操作都先完整校验，再修改状态：返回 Err 时房间状态没有任何变化。

impl Room {
    /// 创建房间，创建者坐 0 号位并成为房主
    pub fn create(
        code: RoomCode,
        name: &str,
        secret: PlayerSecret,
        connection: ConnectionId,
        timings: Timings,
        now: Instant,
    ) -> Result<(Room, PlayerId, Vec<Outbound>), GameError> {
        let name = validate_name(name)?;
        let mut room = Room::new(code, timings);
        let admin = Player::new(name, secret, connection, true, now);
        let admin_id = admin.id;
        room.players.push(admin);

        let messages = vec![Outbound::Player(admin_id, ServerMessage::RoomCreated {
            room_code: room.code.clone(),
            player_id: admin_id,
            player_list: room.player_views(),
            is_admin: true,
            protocol_version: PROTOCOL_VERSION,
        })];
        Ok((room, admin_id, messages))
    }

    /// 加入房间
    ///
    /// 大厅阶段：持久身份对得上的断线玩家直接重连，否则按名字入座。
    /// 游戏开始后：只能按名字接管一个断线的座位。
    pub fn join(
        &mut self,
        name: &str,
        secret: PlayerSecret,
        connection: ConnectionId,
        now: Instant,
    ) -> Result<Joined, GameError> {
        let name = validate_name(name)?;

        if self.phase == GamePhase::Lobby {
            if let Some(existing) = self.player_by_secret(secret).filter(|p| !p.is_connected()) {
                let player_id = existing.id;
                let messages = self.reconnect(player_id, connection, now, ReconnectVia::Name)?;
                return Ok(Joined { player_id, reconnected: true, messages });
            }
            if self.player_by_name(&name).is_some() {
                return Err(GameError::DuplicateName);
            }
            if self.players.len() >= MAX_PLAYERS {
                return Err(GameError::RoomFull);
            }

            let player = Player::new(name, secret, connection, false, now);
            let player_id = player.id;
            self.players.push(player);

            let messages = vec![
                Outbound::Player(player_id, ServerMessage::RoomJoined {
                    room_code: self.code.clone(),
                    player_id,
                    player_list: self.player_views(),
                    is_admin: false,
                    protocol_version: PROTOCOL_VERSION,
                }),
                Outbound::Room(ServerMessage::UpdatePlayerList { players: self.player_views() }),
            ];
            return Ok(Joined { player_id, reconnected: false, messages });
        }

        let existing = self.player_by_name(&name).ok_or(GameError::GameAlreadyStarted)?;
        if existing.is_connected() {
            return Err(GameError::AlreadyConnected);
        }
        if existing.secret != secret {
            return Err(GameError::IdentityMismatch);
        }
        let player_id = existing.id;
        let messages = self.reconnect(player_id, connection, now, ReconnectVia::Name)?;
        Ok(Joined { player_id, reconnected: true, messages })
    }

    /// 房主开始游戏：发第一轮牌并进入叫牌阶段
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        requester: PlayerId,
        rng: &mut R,
    ) -> Result<Vec<Outbound>, GameError> {
        let player = self.player(requester).ok_or(GameError::PlayerNotFound)?;
        if !player.is_admin {
            return Err(GameError::NotAdmin);
        }
        if self.phase != GamePhase::Lobby {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.paused {
            return Err(GameError::GamePaused);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        let hands = deal(self.players.len(), 1, rng)?;

        self.current_round = 1;
        self.max_rounds = max_rounds(self.players.len());
        self.trump_suit = trump_for_round(self.trump_offset, self.current_round);
        self.all_round_stats.clear();
        for p in &mut self.players {
            p.total_score = 0;
            p.last_throw_at = None;
        }
        let starter = self.players[0].id;
        self.begin_round(hands, starter);
        debug!(room = %self.code, players = self.players.len(), "游戏开始");

        let mut messages = vec![Outbound::Room(ServerMessage::GameStarted {
            player_turn: starter,
            current_round: self.current_round,
            max_rounds: self.max_rounds,
            trump_suit: self.trump_suit,
        })];
        self.announce_deal(&mut messages);
        Ok(messages)
    }

    /// 当前可叫的数（含最后一家的限制）
    pub fn legal_bids(&self) -> Vec<u8> {
        available_bids(self.current_round, self.players.iter().map(|p| p.bid))
    }

    /// 单播当前可叫的数给请求者
    pub fn available_bids_for(&self, requester: PlayerId) -> Result<Vec<Outbound>, GameError> {
        self.player(requester).ok_or(GameError::PlayerNotFound)?;
        if self.phase != GamePhase::Bidding {
            return Err(GameError::WrongPhase(self.phase));
        }
        Ok(vec![Outbound::Player(requester, ServerMessage::AvailableBids { bids: self.legal_bids() })])
    }

    /// 叫牌
    pub fn place_bid(&mut self, player_id: PlayerId, bid: u8) -> Result<Vec<Outbound>, GameError> {
        self.require_turn(player_id, GamePhase::Bidding)?;
        let available = self.legal_bids();
        if !available.contains(&bid) {
            return Err(GameError::InvalidBid { bid, available });
        }

        let player = self.player_mut(player_id).ok_or(GameError::PlayerNotFound)?;
        player.bid = Some(bid);
        let name = player.name.clone();
        debug!(room = %self.code, player = %name, bid, "叫牌");

        let mut messages = vec![Outbound::Room(ServerMessage::BidPlaced { player: player_id, name, bid })];
        if self.all_bids_placed() {
            self.begin_card_throwing(&mut messages);
        } else if let Some(next) = self.next_seat(player_id) {
            self.current_turn = Some(next);
            self.announce_turn(&mut messages);
        }
        Ok(messages)
    }

    /// 出牌
    pub fn throw_card(&mut self, player_id: PlayerId, card: Card, now: Instant) -> Result<Vec<Outbound>, GameError> {
        self.require_turn(player_id, GamePhase::CardThrowing)?;
        let cooldown = self.timings.card_throw_cooldown;
        let lead = self.current_trick.starting_suit();
        let player = self.player(player_id).ok_or(GameError::PlayerNotFound)?;

        if let Some(last) = player.last_throw_at {
            if now.saturating_duration_since(last) < cooldown {
                return Err(GameError::RateLimited);
            }
        }
        if !player.hand.contains(&card) {
            return Err(GameError::CardNotInHand);
        }
        if !legal_cards(&player.hand, lead).contains(&card) {
            // 手里有首牌花色才会走到这里，所以 lead 一定存在
            return Err(lead.map_or(GameError::CardNotInHand, GameError::MustFollowSuit));
        }

        let player = self.player_mut(player_id).ok_or(GameError::PlayerNotFound)?;
        player.hand.retain(|c| *c != card);
        player.last_throw_at = Some(now);
        let name = player.name.clone();
        let new_lead = self.current_trick.push(player_id, card);
        debug!(room = %self.code, player = %name, card = %card, "出牌");

        let mut messages = vec![Outbound::Room(ServerMessage::CardThrown { player: player_id, name, card })];
        if let Some(suit) = new_lead {
            messages.push(Outbound::Room(ServerMessage::StartingSuitSet { suit }));
        }

        if self.current_trick.len() == self.players.len() {
            self.complete_trick(&mut messages);
        } else if let Some(next) = self.next_seat(player_id) {
            self.current_turn = Some(next);
            self.announce_turn(&mut messages);
        }
        Ok(messages)
    }

    /// 一墩的展示停顿结束：清桌，赢家领出下一墩；手牌打光则本轮计分
    pub fn advance_trick(&mut self) -> Result<Vec<Outbound>, GameError> {
        if self.phase != GamePhase::TrickOver {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.paused {
            return Err(GameError::GamePaused);
        }

        self.current_trick.clear();
        let mut messages = vec![Outbound::Room(ServerMessage::ClearThrownCards)];
        if self.round_is_over() {
            self.finish_round(&mut messages);
        } else {
            self.phase = GamePhase::CardThrowing;
            self.announce_turn(&mut messages);
        }
        Ok(messages)
    }

    /// 计分停顿结束后推进：发下一轮的牌，或者在最后一轮后结束游戏
    pub fn advance_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<Outbound>, GameError> {
        if self.phase != GamePhase::RoundOver {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.paused {
            return Err(GameError::GamePaused);
        }

        let mut messages = Vec::new();
        if self.current_round >= self.max_rounds {
            self.end_game(&mut messages);
            return Ok(messages);
        }

        let first_seat = self.players.first().map(|p| p.id).ok_or(GameError::PlayerNotFound)?;
        let next_round = self.current_round + 1;
        let hands = deal(self.players.len(), usize::from(next_round), rng)?;
        let starter = self
            .last_bid_starter
            .and_then(|id| self.next_seat(id))
            .unwrap_or(first_seat);

        self.current_round = next_round;
        self.trump_suit = trump_for_round(self.trump_offset, next_round);
        self.begin_round(hands, starter);
        debug!(room = %self.code, round = next_round, trump = ?self.trump_suit, "新一轮开始");

        messages.push(Outbound::Room(ServerMessage::NewRoundStarted {
            current_round: self.current_round,
            trump_suit: self.trump_suit,
            player_turn: starter,
        }));
        self.announce_deal(&mut messages);
        Ok(messages)
    }

    /// 恢复暂停的游戏：给每个人发快照，并重新提示当前回合
    pub(crate) fn resume(&mut self, reason: &str, messages: &mut Vec<Outbound>) {
        self.paused = false;
        for p in &self.players {
            if let Some(snapshot) = self.snapshot_for(p.id) {
                messages.push(Outbound::Player(p.id, ServerMessage::GameState(snapshot)));
            }
        }

        let mut message = format!("Game resumed: {}.", reason);
        if let Some(turn) = self.current_turn {
            match self.phase {
                GamePhase::Bidding => message.push_str(&format!(" It's {}'s turn to bid.", self.player_name(turn))),
                GamePhase::CardThrowing => {
                    message.push_str(&format!(" It's {}'s turn to throw a card.", self.player_name(turn)))
                }
                _ => {}
            }
        }
        messages.push(Outbound::Room(ServerMessage::GameResumed { message }));

        if let Some(turn) = self.current_turn {
            self.prompt_player(turn, messages);
        }
    }

    // --- 辅助逻辑函数 ---

    fn require_turn(&self, player_id: PlayerId, phase: GamePhase) -> Result<(), GameError> {
        self.player(player_id).ok_or(GameError::PlayerNotFound)?;
        if self.paused {
            return Err(GameError::GamePaused);
        }
        if self.phase != phase {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.current_turn != Some(player_id) {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    /// 重置本轮状态、发牌，并由 `starter` 开叫
    fn begin_round(&mut self, hands: Vec<Vec<Card>>, starter: PlayerId) {
        for (player, hand) in self.players.iter_mut().zip(hands) {
            player.hand = hand;
            player.bid = None;
            player.hands_won = 0;
        }
        self.current_trick.clear();
        self.last_bid_starter = Some(starter);
        self.current_turn = Some(starter);
        self.phase = GamePhase::Bidding;
    }

    /// 单播手牌，并宣布开叫
    fn announce_deal(&self, messages: &mut Vec<Outbound>) {
        for p in &self.players {
            messages.push(Outbound::Player(p.id, ServerMessage::CardsDistributed { cards: p.hand.clone() }));
        }
        if let Some(turn) = self.current_turn {
            messages.push(Outbound::Room(ServerMessage::StartBidding { player_turn: turn }));
            messages.push(Outbound::Player(turn, ServerMessage::AvailableBids { bids: self.legal_bids() }));
        }
    }

    /// 广播轮到谁，并单播该玩家的可选项
    pub(crate) fn announce_turn(&self, messages: &mut Vec<Outbound>) {
        let Some(turn) = self.current_turn else { return };
        messages.push(Outbound::Room(ServerMessage::NextPlayerTurn { player_turn: turn, game_phase: self.phase }));
        match self.phase {
            GamePhase::Bidding => {
                messages.push(Outbound::Player(turn, ServerMessage::AvailableBids { bids: self.legal_bids() }))
            }
            GamePhase::CardThrowing => messages.push(self.selectable_cards_for(turn)),
            _ => {}
        }
    }

    /// 只提示某个玩家（重连、恢复时用），不广播
    pub(crate) fn prompt_player(&self, player_id: PlayerId, messages: &mut Vec<Outbound>) {
        if self.current_turn != Some(player_id) {
            return;
        }
        match self.phase {
            GamePhase::Bidding => {
                messages.push(Outbound::Player(player_id, ServerMessage::StartBidding { player_turn: player_id }));
                messages.push(Outbound::Player(player_id, ServerMessage::AvailableBids { bids: self.legal_bids() }));
            }
            GamePhase::CardThrowing => {
                messages.push(self.selectable_cards_for(player_id));
                messages.push(Outbound::Player(player_id, ServerMessage::StartCardThrowing { player_turn: player_id }));
            }
            _ => {}
        }
    }

    fn selectable_cards_for(&self, player_id: PlayerId) -> Outbound {
        let hand = self.player(player_id).map_or(&[][..], |p| p.hand.as_slice());
        let selectable_suits = selectable_suits(hand, self.current_trick.starting_suit());
        Outbound::Player(player_id, ServerMessage::UpdateSelectableCards { selectable_suits })
    }

    /// 所有人都叫完：开叫的人先出牌
    pub(crate) fn begin_card_throwing(&mut self, messages: &mut Vec<Outbound>) {
        self.phase = GamePhase::CardThrowing;
        self.current_trick.clear();
        self.current_turn = self.last_bid_starter.or_else(|| self.players.first().map(|p| p.id));
        debug!(room = %self.code, round = self.current_round, "叫牌结束，开始出牌");

        if let Some(turn) = self.current_turn {
            messages.push(Outbound::Room(ServerMessage::StartCardThrowing { player_turn: turn }));
        }
        self.announce_turn(messages);
    }

    /// 结算一墩：赢家加一墩，桌面上的牌保留到停顿结束
    pub(crate) fn complete_trick(&mut self, messages: &mut Vec<Outbound>) {
        let Some(winner) = trick_winner(&self.current_trick, self.trump_suit) else { return };
        let name = match self.player_mut(winner) {
            Some(p) => {
                p.hands_won += 1;
                p.name.clone()
            }
            None => return,
        };
        self.phase = GamePhase::TrickOver;
        self.current_turn = Some(winner);
        debug!(room = %self.code, winner = %name, "一墩结算");
        messages.push(Outbound::Room(ServerMessage::HandWinner { winner_id: winner, name }));
    }

    /// 本轮计分，写入历史，进入 RoundOver 等待推进
    fn finish_round(&mut self, messages: &mut Vec<Outbound>) {
        let stats = {
            let results: Vec<RoundResult<'_>> = self
                .players
                .iter()
                .map(|p| RoundResult {
                    player_id: p.id,
                    player_name: &p.name,
                    bid: p.bid.unwrap_or(0),
                    hands_won: p.hands_won,
                    previous_total: p.total_score,
                })
                .collect();
            settle_round(self.current_round, self.trump_suit, &results)
        };

        for (player, stat) in self.players.iter_mut().zip(&stats) {
            player.total_score = stat.total_score;
        }
        self.all_round_stats.push(stats.clone());
        self.phase = GamePhase::RoundOver;
        self.current_turn = None;
        debug!(room = %self.code, round = self.current_round, "本轮结束");

        messages.push(Outbound::Room(ServerMessage::RoundScores { round: self.current_round, stats }));
        messages.push(Outbound::Room(ServerMessage::RoundEnded { round_stats: self.all_round_stats.clone() }));
        messages.push(Outbound::Room(ServerMessage::UpdateTotalScores { players: self.player_views() }));
    }

    /// 进入终态并公布最终排名
    pub(crate) fn end_game(&mut self, messages: &mut Vec<Outbound>) {
        self.phase = GamePhase::Ended;
        self.paused = false;
        self.current_turn = None;
        let results = final_standings(
            self.players
                .iter()
                .map(|p| FinalStanding { id: p.id, name: p.name.clone(), total_score: p.total_score })
                .collect(),
        );
        debug!(room = %self.code, "游戏结束");
        messages.push(Outbound::Room(ServerMessage::GameEnded { results }));
    }
}

/// 重连的来源，决定广播 playerReconnected 还是 playerRejoined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectVia {
    /// joinRoom 按名字接管
    Name,
    /// rejoinRoom 按持久身份接管
    Secret,
}

// --- 单元测试 ---
