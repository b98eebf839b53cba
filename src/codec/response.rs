//! Response parsers; payloads arrive with framing and type byte consumed.

use crate::errors::Result;
use crate::models::{
    ExtendedInfo, GoldSourceInfo, HalfLifeMod, Player, Rule, ServerInfo, SourceInfo, Spectator,
    TheShip,
};

use super::reader::Reader;

pub const THE_SHIP_APP_ID: u16 = 2400;

const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SPECTATOR: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// `0x49` server info.
pub fn parse_info(payload: &[u8]) -> Result<ServerInfo> {
    let mut r = Reader::new(payload);

    let protocol = r.read_u8()?;
    let name = r.read_string()?;
    let map = r.read_string()?;
    let folder = r.read_string()?;
    let game = r.read_string()?;
    let app_id = r.read_i16()? as u16;
    let players = r.read_u8()?;
    let max_players = r.read_u8()?;
    let bots = r.read_u8()?;
    let server_type = r.read_char()?;
    let environment = r.read_char()?;
    let visibility = r.read_u8()?;
    let vac = r.read_u8()?;

    let the_ship = if app_id == THE_SHIP_APP_ID {
        Some(TheShip {
            mode: r.read_u8()?,
            witnesses: r.read_u8()?,
            duration: r.read_u8()?,
        })
    } else {
        None
    };

    let version = r.read_string()?;
    let edf = if r.remaining() > 0 { r.read_u8()? } else { 0 };

    // Trailer fields appear in this fixed order, gated by their flag bits.
    let extended = if edf != 0 {
        let mut ext = ExtendedInfo::default();
        if edf & EDF_PORT != 0 {
            ext.port = Some(r.read_i16()?);
        }
        if edf & EDF_STEAM_ID != 0 {
            ext.steam_id = Some(r.read_u64()?.to_string());
        }
        if edf & EDF_SPECTATOR != 0 {
            ext.spectator = Some(Spectator {
                port: r.read_i16()?,
                name: r.read_string()?,
            });
        }
        if edf & EDF_KEYWORDS != 0 {
            ext.keywords = Some(r.read_string()?);
        }
        if edf & EDF_GAME_ID != 0 {
            ext.game_id = Some(r.read_u64()?.to_string());
        }
        Some(ext)
    } else {
        None
    };

    Ok(ServerInfo::Source(SourceInfo {
        protocol,
        name,
        map,
        folder,
        game,
        app_id,
        players,
        max_players,
        bots,
        server_type,
        environment,
        visibility,
        vac,
        the_ship,
        version,
        edf,
        extended,
    }))
}

/// `0x6D` obsolete GoldSource info.
pub fn parse_goldsource_info(payload: &[u8]) -> Result<ServerInfo> {
    let mut r = Reader::new(payload);

    let address = r.read_string()?;
    let name = r.read_string()?;
    let map = r.read_string()?;
    let folder = r.read_string()?;
    let game = r.read_string()?;
    let players = r.read_u8()?;
    let max_players = r.read_u8()?;
    let protocol = r.read_u8()?;
    let server_type = r.read_char()?;
    let environment = r.read_char()?;
    let visibility = r.read_u8()?;
    let is_mod = r.read_u8()?;

    let half_life_mod = if is_mod == 1 {
        let link = r.read_string()?;
        let download_link = r.read_string()?;
        r.skip(1)?;
        Some(HalfLifeMod {
            link,
            download_link,
            version: r.read_i32()?,
            size: r.read_i32()?,
            mod_type: r.read_u8()?,
            dll: r.read_u8()?,
        })
    } else {
        None
    };

    Ok(ServerInfo::GoldSource(GoldSourceInfo {
        address,
        name,
        map,
        folder,
        game,
        players,
        max_players,
        protocol,
        server_type,
        environment,
        visibility,
        half_life_mod,
        vac: r.read_u8()?,
        bots: r.read_u8()?,
    }))
}

/// `0x44` player list. Servers in the wild under-report, so a buffer that
/// runs out at a record boundary ends the list cleanly.
pub fn parse_players(payload: &[u8], app_id: Option<u16>) -> Result<Vec<Player>> {
    let mut r = Reader::new(payload);
    let ship = app_id == Some(THE_SHIP_APP_ID);

    let count = r.read_u8()?;
    let mut players = Vec::with_capacity(count as usize);

    for _ in 0..count {
        if r.remaining() == 0 {
            break;
        }
        let index = r.read_u8()?;
        let name = r.read_string()?;
        let score = r.read_i32()?;
        let duration_seconds = r.read_f32()?;
        let (deaths, money) = if ship {
            (Some(r.read_i32()?), Some(r.read_i32()?))
        } else {
            (None, None)
        };
        players.push(Player {
            index,
            name,
            score,
            duration_seconds,
            deaths,
            money,
        });
    }

    Ok(players)
}

/// `0x45` rules list, with the same exhaustion tolerance as the player list.
pub fn parse_rules(payload: &[u8]) -> Result<Vec<Rule>> {
    let mut r = Reader::new(payload);

    let count = r.read_i16()?;
    let mut rules = Vec::with_capacity(count.max(0) as usize);

    for _ in 0..count.max(0) {
        if r.remaining() == 0 {
            break;
        }
        rules.push(Rule {
            name: r.read_string()?,
            value: r.read_string()?,
        });
    }

    Ok(rules)
}

/// `0x41` challenge token.
pub fn parse_challenge(payload: &[u8]) -> Result<i32> {
    Reader::new(payload).read_i32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn push_str(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }

    // A 0x49 response body as it looks after the type byte.
    fn info_payload(edf: u8, trailer: &[u8]) -> Vec<u8> {
        let mut out = vec![11];
        push_str(&mut out, "Test");
        push_str(&mut out, "de_dust");
        push_str(&mut out, "cstrike");
        push_str(&mut out, "CS");
        out.extend_from_slice(&16i16.to_le_bytes());
        out.extend_from_slice(&[4, 22, 0, b'd', b'l', 0, 1]);
        push_str(&mut out, "1.0");
        out.push(edf);
        out.extend_from_slice(trailer);
        out
    }

    #[test]
    fn plain_info() {
        let info = parse_info(&info_payload(0, &[])).unwrap();
        let ServerInfo::Source(info) = info else {
            panic!("expected source info");
        };
        assert_eq!(info.protocol, 11);
        assert_eq!(info.name, "Test");
        assert_eq!(info.map, "de_dust");
        assert_eq!(info.folder, "cstrike");
        assert_eq!(info.game, "CS");
        assert_eq!(info.app_id, 16);
        assert_eq!(info.players, 4);
        assert_eq!(info.max_players, 22);
        assert_eq!(info.bots, 0);
        assert_eq!(info.server_type, 'd');
        assert_eq!(info.environment, 'l');
        assert_eq!(info.visibility, 0);
        assert_eq!(info.vac, 1);
        assert_eq!(info.version, "1.0");
        assert_eq!(info.the_ship, None);
        assert_eq!(info.extended, None);
    }

    #[test]
    fn info_with_extended_flags() {
        let mut trailer = Vec::new();
        trailer.extend_from_slice(&30015i16.to_le_bytes());
        trailer.extend_from_slice(&1u64.to_le_bytes());
        push_str(&mut trailer, "pvp");
        trailer.extend_from_slice(&10u64.to_le_bytes());

        let info = parse_info(&info_payload(0xB1, &trailer)).unwrap();
        let ServerInfo::Source(info) = info else {
            panic!("expected source info");
        };
        assert_eq!(info.edf, 0xB1);
        let ext = info.extended.unwrap();
        assert_eq!(ext.port, Some(30015));
        assert_eq!(ext.steam_id.as_deref(), Some("1"));
        assert_eq!(ext.keywords.as_deref(), Some("pvp"));
        assert_eq!(ext.game_id.as_deref(), Some("10"));
        assert_eq!(ext.spectator, None);
    }

    #[test]
    fn info_with_spectator() {
        let mut trailer = Vec::new();
        trailer.extend_from_slice(&27020i16.to_le_bytes());
        push_str(&mut trailer, "SourceTV");

        let info = parse_info(&info_payload(0x40, &trailer)).unwrap();
        let ServerInfo::Source(info) = info else {
            panic!("expected source info");
        };
        let spec = info.extended.unwrap().spectator.unwrap();
        assert_eq!(spec.port, 27020);
        assert_eq!(spec.name, "SourceTV");
    }

    #[test]
    fn ship_info_carries_mode_triple() {
        let mut out = vec![7];
        push_str(&mut out, "Ship");
        push_str(&mut out, "batavia");
        push_str(&mut out, "ship");
        push_str(&mut out, "The Ship");
        out.extend_from_slice(&2400i16.to_le_bytes());
        out.extend_from_slice(&[2, 16, 0, b'd', b'w', 0, 0]);
        out.extend_from_slice(&[1, 2, 30]);
        push_str(&mut out, "1.0.0.4");
        out.push(0);

        let info = parse_info(&out).unwrap();
        let ServerInfo::Source(info) = info else {
            panic!("expected source info");
        };
        assert_eq!(
            info.the_ship,
            Some(TheShip {
                mode: 1,
                witnesses: 2,
                duration: 30
            })
        );
        assert_eq!(info.version, "1.0.0.4");
    }

    #[test]
    fn goldsource_info() {
        let mut out = Vec::new();
        push_str(&mut out, "192.0.2.1:27015");
        push_str(&mut out, "Half-Life");
        push_str(&mut out, "crossfire");
        push_str(&mut out, "valve");
        push_str(&mut out, "Half-Life");
        out.extend_from_slice(&[6, 16, 47, b'd', b'l', 0, 0]);
        out.extend_from_slice(&[1, 0]);

        let info = parse_goldsource_info(&out).unwrap();
        let ServerInfo::GoldSource(info) = info else {
            panic!("expected goldsource info");
        };
        assert_eq!(info.address, "192.0.2.1:27015");
        assert_eq!(info.protocol, 47);
        assert_eq!(info.half_life_mod, None);
        assert_eq!(info.vac, 1);
        assert_eq!(info.bots, 0);
    }

    #[test]
    fn goldsource_info_with_mod_record() {
        let mut out = Vec::new();
        push_str(&mut out, "192.0.2.1:27015");
        push_str(&mut out, "CS 1.6");
        push_str(&mut out, "de_aztec");
        push_str(&mut out, "cstrike");
        push_str(&mut out, "Counter-Strike");
        out.extend_from_slice(&[12, 32, 47, b'd', b'l', 0, 1]);
        push_str(&mut out, "http://counter-strike.net");
        push_str(&mut out, "");
        out.push(0);
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&184_000_000i32.to_le_bytes());
        out.extend_from_slice(&[0, 1]);
        out.extend_from_slice(&[1, 4]);

        let info = parse_goldsource_info(&out).unwrap();
        let ServerInfo::GoldSource(info) = info else {
            panic!("expected goldsource info");
        };
        let hl_mod = info.half_life_mod.unwrap();
        assert_eq!(hl_mod.link, "http://counter-strike.net");
        assert_eq!(hl_mod.version, 1);
        assert_eq!(hl_mod.size, 184_000_000);
        assert_eq!(hl_mod.mod_type, 0);
        assert_eq!(hl_mod.dll, 1);
        assert_eq!(info.vac, 1);
        assert_eq!(info.bots, 4);
    }

    fn player_record(index: u8, name: &str, score: i32, duration: f32) -> Vec<u8> {
        let mut out = vec![index];
        push_str(&mut out, name);
        out.extend_from_slice(&score.to_le_bytes());
        out.extend_from_slice(&duration.to_le_bytes());
        out
    }

    #[test]
    fn players_plain() {
        let mut out = vec![2];
        out.extend_from_slice(&player_record(0, "alice", 10, 120.5));
        out.extend_from_slice(&player_record(1, "bob", -2, 3.0));

        let players = parse_players(&out, Some(16)).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "alice");
        assert_eq!(players[0].score, 10);
        assert_eq!(players[1].score, -2);
        assert_eq!(players[1].deaths, None);
    }

    #[test]
    fn players_the_ship() {
        let mut out = vec![1];
        out.extend_from_slice(&player_record(3, "mate", 5, 60.0));
        out.extend_from_slice(&2i32.to_le_bytes());
        out.extend_from_slice(&1500i32.to_le_bytes());

        let players = parse_players(&out, Some(THE_SHIP_APP_ID)).unwrap();
        assert_eq!(players[0].deaths, Some(2));
        assert_eq!(players[0].money, Some(1500));
    }

    #[test]
    fn players_tolerate_under_reporting() {
        // Count claims three, buffer holds one.
        let mut out = vec![3];
        out.extend_from_slice(&player_record(0, "solo", 1, 9.0));

        let players = parse_players(&out, None).unwrap();
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn player_cut_mid_record_is_truncated() {
        let mut out = vec![1, 0];
        out.extend_from_slice(b"half");
        assert!(matches!(
            parse_players(&out, None),
            Err(Error::TruncatedString(_))
        ));
    }

    #[test]
    fn rules_list() {
        let mut out = Vec::new();
        out.extend_from_slice(&3i16.to_le_bytes());
        for (name, value) in [
            ("mp_friendlyfire", "1"),
            ("sv_cheats", "0"),
            ("mp_timelimit", "30"),
        ] {
            push_str(&mut out, name);
            push_str(&mut out, value);
        }

        let rules = parse_rules(&out).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].name, "mp_friendlyfire");
        assert_eq!(rules[0].value, "1");
        assert_eq!(rules[2].value, "30");
    }

    #[test]
    fn rules_tolerate_short_buffer() {
        let mut out = Vec::new();
        out.extend_from_slice(&5i16.to_le_bytes());
        push_str(&mut out, "sv_gravity");
        push_str(&mut out, "800");

        let rules = parse_rules(&out).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn challenge_token() {
        let payload = 0x12345678i32.to_le_bytes();
        assert_eq!(parse_challenge(&payload).unwrap(), 0x12345678);
    }

    #[test]
    fn round_trip_over_flag_combinations() {
        for edf in [0x00u8, 0x01, 0x10, 0x20, 0x40, 0x80, 0xB1, 0xF1] {
            let mut trailer = Vec::new();
            if edf & 0x80 != 0 {
                trailer.extend_from_slice(&27015i16.to_le_bytes());
            }
            if edf & 0x10 != 0 {
                trailer.extend_from_slice(&76561198000000000u64.to_le_bytes());
            }
            if edf & 0x40 != 0 {
                trailer.extend_from_slice(&27020i16.to_le_bytes());
                push_str(&mut trailer, "tv");
            }
            if edf & 0x20 != 0 {
                push_str(&mut trailer, "kw1,kw2");
            }
            if edf & 0x01 != 0 {
                trailer.extend_from_slice(&730u64.to_le_bytes());
            }

            let extended = (edf != 0).then(|| ExtendedInfo {
                port: (edf & 0x80 != 0).then_some(27015),
                steam_id: (edf & 0x10 != 0).then(|| "76561198000000000".to_owned()),
                spectator: (edf & 0x40 != 0).then(|| Spectator {
                    port: 27020,
                    name: "tv".to_owned(),
                }),
                keywords: (edf & 0x20 != 0).then(|| "kw1,kw2".to_owned()),
                game_id: (edf & 0x01 != 0).then(|| "730".to_owned()),
            });
            let expected = SourceInfo {
                protocol: 11,
                name: "Test".to_owned(),
                map: "de_dust".to_owned(),
                folder: "cstrike".to_owned(),
                game: "CS".to_owned(),
                app_id: 16,
                players: 4,
                max_players: 22,
                bots: 0,
                server_type: 'd',
                environment: 'l',
                visibility: 0,
                vac: 1,
                the_ship: None,
                version: "1.0".to_owned(),
                edf,
                extended,
            };

            let info = parse_info(&info_payload(edf, &trailer)).unwrap();
            assert_eq!(info, ServerInfo::Source(expected), "edf {:#04x}", edf);
        }
    }
}
