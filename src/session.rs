use std::net::Ipv4Addr;
use std::time::Instant;

use log::trace;

use crate::codec::{
    response, Request, CHALLENGE_SENTINEL, S2A_CHALLENGE, S2A_INFO, S2A_INFO_OLD, S2A_PING,
    S2A_PLAYER, S2A_RULES,
};
use crate::errors::{Error, Result};
use crate::models::{Endpoint, Player, Rule, ServerInfo};
use crate::reassembly::Reassembly;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    AwaitInfo,
    AwaitChallengePlayer,
    AwaitPlayers,
    AwaitChallengeRules,
    AwaitRules,
    AwaitPing,
    Done,
    Failed,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::AwaitInfo => "await-info",
            Stage::AwaitChallengePlayer => "await-challenge-player",
            Stage::AwaitPlayers => "await-players",
            Stage::AwaitChallengeRules => "await-challenge-rules",
            Stage::AwaitRules => "await-rules",
            Stage::AwaitPing => "await-ping",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Info(ServerInfo),
    Challenge(i32),
    Players(Vec<Player>),
    Rules(Vec<Rule>),
    Ping(f64),
}

#[derive(Debug)]
pub struct Step {
    pub reply: Reply,
    pub send: Option<Request>,
}

#[derive(Debug)]
pub struct Session {
    pub host: String,
    pub addr: Option<Ipv4Addr>,
    pub port: u16,

    stage: Stage,
    info: Option<ServerInfo>,
    players: Option<Vec<Player>>,
    rules: Option<Vec<Rule>>,
    ping_ms: Option<f64>,
    challenge_player: Option<i32>,
    challenge_rules: Option<i32>,
    ping_sent_at: Option<Instant>,

    pub reassembly: Option<Reassembly>,
}

impl Session {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            addr: None,
            port,
            stage: Stage::AwaitInfo,
            info: None,
            players: None,
            rules: None,
            ping_ms: None,
            challenge_player: None,
            challenge_rules: None,
            ping_sent_at: None,
            reassembly: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn fail(&mut self) {
        if self.stage != Stage::Done {
            self.stage = Stage::Failed;
        }
        self.reassembly = None;
    }

    pub fn app_id(&self) -> Option<u16> {
        self.info.as_ref().and_then(ServerInfo::app_id)
    }

    pub fn protocol_version(&self) -> Option<u8> {
        self.info.as_ref().map(ServerInfo::protocol)
    }

    // Called immediately before the A2S_PING datagram leaves the socket.
    pub fn mark_ping_sent(&mut self) {
        self.ping_sent_at = Some(Instant::now());
    }

    pub fn handle(&mut self, payload: &[u8]) -> Result<Step> {
        let kind = *payload.first().ok_or(Error::Truncated(0))?;
        let body = &payload[1..];

        let step = match kind {
            S2A_INFO | S2A_INFO_OLD => {
                self.expect_stage(kind, Stage::AwaitInfo)?;
                let info = if kind == S2A_INFO {
                    response::parse_info(body)?
                } else {
                    response::parse_goldsource_info(body)?
                };
                self.info = Some(info.clone());
                self.stage = Stage::AwaitChallengePlayer;
                Step {
                    reply: Reply::Info(info),
                    send: Some(Request::Players {
                        challenge: CHALLENGE_SENTINEL,
                    }),
                }
            }

            S2A_CHALLENGE => {
                if self.stage != Stage::AwaitChallengePlayer
                    && self.stage != Stage::AwaitChallengeRules
                {
                    return Err(self.out_of_order(kind));
                }
                let token = response::parse_challenge(body)?;
                // The token binds to whichever query has no challenge yet;
                // requests are strictly serialized per endpoint, so the
                // player slot always fills first.
                let send = if self.challenge_player.is_none() {
                    self.challenge_player = Some(token);
                    self.stage = Stage::AwaitPlayers;
                    Request::Players { challenge: token }
                } else {
                    self.challenge_rules = Some(token);
                    self.stage = Stage::AwaitRules;
                    Request::Rules { challenge: token }
                };
                Step {
                    reply: Reply::Challenge(token),
                    send: Some(send),
                }
            }

            S2A_PLAYER => {
                self.expect_stage(kind, Stage::AwaitPlayers)?;
                let players = response::parse_players(body, self.app_id())?;
                self.players = Some(players.clone());
                self.stage = Stage::AwaitChallengeRules;
                Step {
                    reply: Reply::Players(players),
                    send: Some(Request::Rules {
                        challenge: CHALLENGE_SENTINEL,
                    }),
                }
            }

            S2A_RULES => {
                self.expect_stage(kind, Stage::AwaitRules)?;
                let rules = response::parse_rules(body)?;
                self.rules = Some(rules.clone());
                self.stage = Stage::AwaitPing;
                Step {
                    reply: Reply::Rules(rules),
                    send: Some(Request::Ping),
                }
            }

            S2A_PING => {
                self.expect_stage(kind, Stage::AwaitPing)?;
                let sent_at = self.ping_sent_at.ok_or(Error::OutOfOrder {
                    kind,
                    stage: self.stage.name(),
                })?;
                let ping_ms = sent_at.elapsed().as_secs_f64() * 1e3;
                self.ping_ms = Some(ping_ms);
                self.stage = Stage::Done;
                Step {
                    reply: Reply::Ping(ping_ms),
                    send: None,
                }
            }

            other => return Err(Error::UnexpectedResponseType(other)),
        };

        trace!(
            "{}:{} advanced to {}",
            self.host,
            self.port,
            self.stage.name()
        );
        Ok(step)
    }

    fn expect_stage(&self, kind: u8, expected: Stage) -> Result<()> {
        if self.stage != expected {
            return Err(self.out_of_order(kind));
        }
        Ok(())
    }

    fn out_of_order(&self, kind: u8) -> Error {
        Error::OutOfOrder {
            kind,
            stage: self.stage.name(),
        }
    }

    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            addr: self.addr,
            port: self.port,
            info: self.info.clone(),
            players: self.players.clone(),
            rules: self.rules.clone(),
            ping_ms: self.ping_ms,
        }
    }
}
