use crate::error::GameError;
use crate::logic::ReconnectVia;
use crate::message::{Outbound, PROTOCOL_VERSION, ServerMessage};
use crate::state::*;
use std::time::Instant;
use tracing::{debug, info};

// --- 断线、重连与宽限期 ---

impl Room {
    /// 玩家断线：标记离线、暂停房间，座位保留到宽限期结束
    ///
    /// 对已经离线的玩家重复调用不会产生任何消息。
    pub fn disconnect(&mut self, player_id: PlayerId, now: Instant) -> Result<Vec<Outbound>, GameError> {
        let player = self.player_mut(player_id).ok_or(GameError::PlayerNotFound)?;
        if !player.is_connected() {
            return Ok(Vec::new());
        }
        player.connection = None;
        player.last_heartbeat_at = now;
        let name = player.name.clone();
        info!(room = %self.code, player = %name, "玩家断线");

        let mut messages = Vec::new();
        if !self.paused && self.phase != GamePhase::Ended {
            self.paused = true;
            messages.push(Outbound::Room(ServerMessage::GamePaused {
                message: format!("Game paused: {} has disconnected.", name),
            }));
        }
        messages.push(Outbound::Room(ServerMessage::PlayerDisconnected { name, player_id }));
        messages.push(Outbound::Room(ServerMessage::UpdatePlayerList { players: self.player_views() }));
        Ok(messages)
    }

    /// 断线玩家回到原座位
    ///
    /// 座位上的所有状态都以 PlayerId 为键，这里只需要换上新的连接。
    /// 最后一个断线的人回来后房间自动恢复。
    pub fn reconnect(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
        now: Instant,
        via: ReconnectVia,
    ) -> Result<Vec<Outbound>, GameError> {
        let player = self.player_mut(player_id).ok_or(GameError::PlayerNotFound)?;
        if player.is_connected() {
            return Err(GameError::AlreadyConnected);
        }
        player.connection = Some(connection);
        player.last_heartbeat_at = now;
        let name = player.name.clone();
        let is_admin = player.is_admin;
        info!(room = %self.code, player = %name, ?via, "玩家重连");

        let mut messages = vec![Outbound::Player(player_id, ServerMessage::RoomJoined {
            room_code: self.code.clone(),
            player_id,
            player_list: self.player_views(),
            is_admin,
            protocol_version: PROTOCOL_VERSION,
        })];
        let is_all_players_connected = self.all_connected();
        let resumes = self.paused && is_all_players_connected;
        // 立即恢复时 resume 会给每个人发快照和提示，这里不重复
        if !resumes {
            if let Some(snapshot) = self.snapshot_for(player_id) {
                messages.push(Outbound::Player(player_id, ServerMessage::GameState(snapshot)));
            }
            self.prompt_player(player_id, &mut messages);
        }

        messages.push(Outbound::Room(ServerMessage::UpdatePlayerList { players: self.player_views() }));
        messages.push(Outbound::Room(match via {
            ReconnectVia::Name => ServerMessage::PlayerReconnected { name: name.clone(), is_all_players_connected },
            ReconnectVia::Secret => ServerMessage::PlayerRejoined { name: name.clone(), is_all_players_connected },
        }));

        if resumes {
            self.resume(&format!("{} has reconnected", name), &mut messages);
        }
        Ok(messages)
    }

    /// 凭持久身份重连（rejoinRoom）
    pub fn rejoin(
        &mut self,
        secret: PlayerSecret,
        connection: ConnectionId,
        now: Instant,
    ) -> Result<(PlayerId, Vec<Outbound>), GameError> {
        let player_id = self.player_by_secret(secret).map(|p| p.id).ok_or(GameError::PlayerNotFound)?;
        let messages = self.reconnect(player_id, connection, now, ReconnectVia::Secret)?;
        Ok((player_id, messages))
    }

    pub fn heartbeat(&mut self, player_id: PlayerId, now: Instant) {
        if let Some(player) = self.player_mut(player_id) {
            player.last_heartbeat_at = now;
        }
    }

    /// 宽限期定时器触发
    ///
    /// 玩家已经回来、已经被移除，或者离线时间还不够（期间重连后又断线），都什么也不做。
    pub fn expire_player(&mut self, player_id: PlayerId, now: Instant) -> Vec<Outbound> {
        let grace = self.timings.grace_period;
        let Some(player) = self.player(player_id) else {
            return Vec::new();
        };
        if player.is_connected() || now.saturating_duration_since(player.last_heartbeat_at) < grace {
            return Vec::new();
        }
        self.remove_player(player_id)
    }

    /// 永久移出玩家，并让房间回到一致的状态
    fn remove_player(&mut self, player_id: PlayerId) -> Vec<Outbound> {
        let Some(idx) = self.seat_of(player_id) else {
            return Vec::new();
        };
        let removed = self.players.remove(idx);
        self.current_trick.withdraw(player_id);
        info!(room = %self.code, player = %removed.name, "玩家超时未归，已移出房间");

        let mut messages = Vec::new();
        if self.players.is_empty() {
            self.current_turn = None;
            self.last_bid_starter = None;
            return messages;
        }

        if removed.is_admin {
            self.players[0].is_admin = true;
        }
        // 指向被移出玩家的指针改指向顺时针的下一个座位
        let successor = self.players[idx % self.players.len()].id;
        if self.last_bid_starter == Some(player_id) {
            self.last_bid_starter = Some(successor);
        }
        let turn_moved = self.current_turn == Some(player_id);
        if turn_moved {
            self.current_turn = Some(successor);
        }
        messages.push(Outbound::Room(ServerMessage::UpdatePlayerList { players: self.player_views() }));

        if self.is_in_game() && self.players.len() < MIN_PLAYERS {
            self.end_game(&mut messages);
            return messages;
        }

        match self.phase {
            GamePhase::Bidding if self.all_bids_placed() => self.begin_card_throwing(&mut messages),
            GamePhase::CardThrowing if !self.current_trick.is_empty() && self.current_trick.len() == self.players.len() => {
                self.complete_trick(&mut messages)
            }
            GamePhase::Bidding | GamePhase::CardThrowing if turn_moved => self.announce_turn(&mut messages),
            _ => {}
        }

        if self.paused && self.all_connected() {
            debug!(room = %self.code, "剩余玩家均在线，恢复游戏");
            self.resume(&format!("{} left the game", removed.name), &mut messages);
        }
        messages
    }
}
