//! Multiplayer state exchange.
//!
//! Framing and sockets belong to the transport; this module only knows how
//! to turn packets into bytes and back, how often to broadcast, and how to
//! keep a shadow of every remote player between updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::VehicleSnapshot;
use crate::Result;

/// Local state is broadcast this often while racing.
pub const BROADCAST_INTERVAL: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    NotReady,
    AwaitingStart,
    Racing,
    Crashed,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerData {
    pub player_number: u8,
    pub position_x: f32,
    pub position_y: f32,
    pub speed: f32,
    pub frequency: u32,
    pub engine_running: bool,
    pub braking: bool,
    pub horning: bool,
    pub backfiring: bool,
    pub state: PlayerState,
}

impl PlayerData {
    pub fn from_snapshot(player_number: u8, snapshot: &VehicleSnapshot, state: PlayerState) -> Self {
        Self {
            player_number,
            position_x: snapshot.position_x,
            position_y: snapshot.position_y,
            speed: snapshot.speed,
            frequency: snapshot.frequency,
            engine_running: snapshot.engine_running,
            braking: snapshot.braking,
            horning: snapshot.horning,
            backfiring: snapshot.backfiring,
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    PlayerData(PlayerData),
    PlayerBumped {
        player_number: u8,
        bump_x: f32,
        bump_y: f32,
        bump_speed: f32,
    },
    PlayerFinished {
        player_number: u8,
    },
    PlayerJoined {
        player_number: u8,
        name: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Non-blocking packet pipe supplied by the host.
pub trait Transport {
    /// Fire-and-forget.
    fn send(&mut self, payload: Vec<u8>);
    /// Dequeues one raw packet if any has arrived.
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

/// In-process transport; [`ChannelTransport::pair`] returns two connected
/// endpoints.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: flume::Sender<Vec<u8>>,
    rx: flume::Receiver<Vec<u8>>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = flume::unbounded();
        let (b_tx, a_rx) = flume::unbounded();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }

    pub fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        self.send(packet.encode()?);
        Ok(())
    }

    pub fn recv_packet(&mut self) -> Option<Result<Packet>> {
        self.try_recv().map(|bytes| Packet::decode(&bytes))
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, payload: Vec<u8>) {
        // A vanished peer is indistinguishable from packet loss.
        let _ = self.tx.send(payload);
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

/// Lightweight stand-in for a remote car. Between updates the position is
/// extrapolated from the last known speed.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub player_number: u8,
    pub name: Option<String>,
    pub data: PlayerData,
    pub since_update: f32,
}

impl RemotePlayer {
    fn new(player_number: u8) -> Self {
        Self {
            player_number,
            name: None,
            data: PlayerData {
                player_number,
                ..PlayerData::default()
            },
            since_update: 0.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.data.position_y
    }

    pub fn is_finished(&self) -> bool {
        self.data.state == PlayerState::Finished
    }

    fn extrapolate(&mut self, elapsed: f32) {
        self.since_update += elapsed;
        if self.data.state == PlayerState::Racing {
            self.data.position_y += self.data.speed / 3.6 * elapsed;
        }
    }
}

/// Something the race driver has to react to after a packet was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined { player_number: u8, name: String },
    Finished { player_number: u8 },
    LocalBumped { bump_x: f32, bump_y: f32, bump_speed: f32 },
}

pub struct NetSession {
    transport: Box<dyn Transport>,
    local_player: u8,
    remotes: BTreeMap<u8, RemotePlayer>,
    send_timer: f32,
}

impl NetSession {
    pub fn new(transport: Box<dyn Transport>, local_player: u8) -> Self {
        Self {
            transport,
            local_player,
            remotes: BTreeMap::new(),
            send_timer: 0.0,
        }
    }

    pub fn local_player(&self) -> u8 {
        self.local_player
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn remote(&self, player_number: u8) -> Option<&RemotePlayer> {
        self.remotes.get(&player_number)
    }

    pub fn send(&mut self, packet: &Packet) {
        match packet.encode() {
            Ok(bytes) => self.transport.send(bytes),
            Err(err) => tracing::warn!(%err, "failed to encode packet"),
        }
    }

    /// Sends the local state once per [`BROADCAST_INTERVAL`]. Returns whether
    /// a packet went out on this tick.
    pub fn broadcast(&mut self, elapsed: f32, snapshot: &VehicleSnapshot, state: PlayerState) -> bool {
        self.send_timer += elapsed.max(0.0);
        if self.send_timer < BROADCAST_INTERVAL {
            return false;
        }
        self.send_timer %= BROADCAST_INTERVAL;

        let data = PlayerData::from_snapshot(self.local_player, snapshot, state);
        self.send(&Packet::PlayerData(data));
        true
    }

    /// Dequeues and decodes at most one packet. Undecodable payloads are
    /// dropped.
    pub fn receive(&mut self) -> Option<Packet> {
        let bytes = self.transport.try_recv()?;
        match Packet::decode(&bytes) {
            Ok(packet) => Some(packet),
            Err(err) => {
                tracing::debug!(%err, len = bytes.len(), "dropping malformed packet");
                None
            }
        }
    }

    /// Folds a packet into the remote shadows.
    pub fn apply(&mut self, packet: Packet) -> Option<SessionEvent> {
        match packet {
            Packet::PlayerData(data) => {
                if data.player_number == self.local_player {
                    return None;
                }
                let remote = self
                    .remotes
                    .entry(data.player_number)
                    .or_insert_with(|| RemotePlayer::new(data.player_number));
                let was_finished = remote.is_finished();
                remote.data = data;
                remote.since_update = 0.0;

                (!was_finished && remote.is_finished()).then_some(SessionEvent::Finished {
                    player_number: data.player_number,
                })
            }
            Packet::PlayerBumped {
                player_number,
                bump_x,
                bump_y,
                bump_speed,
            } => (player_number == self.local_player).then_some(SessionEvent::LocalBumped {
                bump_x,
                bump_y,
                bump_speed,
            }),
            Packet::PlayerFinished { player_number } => {
                if player_number == self.local_player {
                    return None;
                }
                let remote = self
                    .remotes
                    .entry(player_number)
                    .or_insert_with(|| RemotePlayer::new(player_number));
                remote.data.state = PlayerState::Finished;
                Some(SessionEvent::Finished { player_number })
            }
            Packet::PlayerJoined { player_number, name } => {
                if player_number == self.local_player {
                    return None;
                }
                let remote = self
                    .remotes
                    .entry(player_number)
                    .or_insert_with(|| RemotePlayer::new(player_number));
                remote.name = Some(name.clone());
                Some(SessionEvent::Joined {
                    player_number,
                    name,
                })
            }
        }
    }

    pub fn extrapolate(&mut self, elapsed: f32) {
        for remote in self.remotes.values_mut() {
            remote.extrapolate(elapsed);
        }
    }
}

impl std::fmt::Debug for NetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetSession")
            .field("local_player", &self.local_player)
            .field("remotes", &self.remotes.len())
            .field("send_timer", &self.send_timer)
            .finish()
    }
}
