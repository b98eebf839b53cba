use std::net::Ipv4Addr;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Endpoint {
    pub host: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<Ipv4Addr>,

    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<ServerInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_ms: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "engine")]
pub enum ServerInfo {
    Source(SourceInfo),
    GoldSource(GoldSourceInfo),
}

impl ServerInfo {
    pub fn app_id(&self) -> Option<u16> {
        match self {
            ServerInfo::Source(info) => Some(info.app_id),
            ServerInfo::GoldSource(_) => None,
        }
    }

    pub fn protocol(&self) -> u8 {
        match self {
            ServerInfo::Source(info) => info.protocol,
            ServerInfo::GoldSource(info) => info.protocol,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: char,
    pub environment: char,
    pub visibility: u8,
    pub vac: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub the_ship: Option<TheShip>,

    pub version: String,

    // Set bits select which extended fields follow, in wire order.
    pub edf: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TheShip {
    pub mode: u8,
    pub witnesses: u8,
    pub duration: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtendedInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i16>,

    // steam_id and game_id are u64 on the wire, rendered as decimal strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steam_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectator: Option<Spectator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Spectator {
    pub port: i16,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoldSourceInfo {
    pub address: String,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub players: u8,
    pub max_players: u8,
    pub protocol: u8,
    pub server_type: char,
    pub environment: char,
    pub visibility: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub half_life_mod: Option<HalfLifeMod>,

    pub vac: u8,
    pub bots: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HalfLifeMod {
    pub link: String,
    pub download_link: String,
    pub version: i32,
    pub size: i32,
    pub mod_type: u8,
    pub dll: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Player {
    pub index: u8,
    pub name: String,
    pub score: i32,
    pub duration_seconds: f32,

    // The Ship (app id 2400) only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub money: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rule {
    pub name: String,
    pub value: String,
}
