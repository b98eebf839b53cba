pub mod reader;
pub mod response;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{Error, Result};

pub const SIMPLE_FRAME: i32 = -1;
pub const SPLIT_FRAME: i32 = -2;

// Challenge value sent while no server-issued token is known yet.
pub const CHALLENGE_SENTINEL: i32 = -1;

pub const A2S_INFO: u8 = 0x54;
pub const A2S_PLAYER: u8 = 0x55;
pub const A2S_RULES: u8 = 0x56;
pub const A2S_GETCHALLENGE: u8 = 0x57;
pub const A2S_PING: u8 = 0x69;

pub const S2A_INFO: u8 = 0x49;
pub const S2A_INFO_OLD: u8 = 0x6D;
pub const S2A_CHALLENGE: u8 = 0x41;
pub const S2A_PLAYER: u8 = 0x44;
pub const S2A_RULES: u8 = 0x45;
pub const S2A_PING: u8 = 0x6A;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Info,
    Players { challenge: i32 },
    Rules { challenge: i32 },
    GetChallenge,
    Ping,
}

impl Request {
    pub fn kind(&self) -> u8 {
        match self {
            Request::Info => A2S_INFO,
            Request::Players { .. } => A2S_PLAYER,
            Request::Rules { .. } => A2S_RULES,
            Request::GetChallenge => A2S_GETCHALLENGE,
            Request::Ping => A2S_PING,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(25);
        let mut prefix = [0u8; 4];
        LittleEndian::write_i32(&mut prefix, SIMPLE_FRAME);
        out.extend_from_slice(&prefix);
        out.push(self.kind());

        match *self {
            Request::Info => out.extend_from_slice(INFO_PAYLOAD),
            Request::Players { challenge } | Request::Rules { challenge } => {
                let mut token = [0u8; 4];
                LittleEndian::write_i32(&mut token, challenge);
                out.extend_from_slice(&token);
            }
            Request::GetChallenge | Request::Ping => {}
        }

        out
    }
}

// For tooling that decodes outbound datagrams; building a request from an
// unknown kind is unrepresentable on the typed side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Info,
    Players,
    Rules,
    GetChallenge,
    Ping,
}

impl TryFrom<u8> for RequestKind {
    type Error = Error;

    fn try_from(kind: u8) -> Result<Self> {
        match kind {
            A2S_INFO => Ok(RequestKind::Info),
            A2S_PLAYER => Ok(RequestKind::Players),
            A2S_RULES => Ok(RequestKind::Rules),
            A2S_GETCHALLENGE => Ok(RequestKind::GetChallenge),
            A2S_PING => Ok(RequestKind::Ping),
            other => Err(Error::InvalidRequestKind(other)),
        }
    }
}
