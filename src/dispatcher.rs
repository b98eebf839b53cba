use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::codec::{Request, SIMPLE_FRAME, SPLIT_FRAME};
use crate::codec::reader::Reader;
use crate::dns::{Resolver, SystemResolver};
use crate::errors::{Error, Result};
use crate::models::{Endpoint, Player, Rule, ServerInfo};
use crate::reassembly;
use crate::session::{Reply, Session, Stage};
use crate::{QueryOptions, UserQuery};

const RECV_BUFFER_SIZE: usize = 65536;

/// `endpoint` indexes the query list handed to [`QueryClient::query`].
#[derive(Debug)]
pub enum Event {
    Info { endpoint: usize, info: ServerInfo },
    Players { endpoint: usize, players: Vec<Player> },
    Rules { endpoint: usize, rules: Vec<Rule> },
    Challenge { endpoint: usize, token: i32 },
    Ping { endpoint: usize, ping_ms: f64 },
    Error(Error),
    Done(Vec<Endpoint>),
}

pub struct QueryClient {
    options: QueryOptions,
    resolver: Arc<dyn Resolver>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl QueryClient {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            options,
            resolver: Arc::new(SystemResolver),
            events: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    // Optional; without a subscriber the run still completes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Per-endpoint failures leave holes in the result; only socket-level
    /// failures abort the run.
    pub async fn query(&self, queries: Vec<UserQuery>) -> Result<Vec<Endpoint>> {
        let dispatcher = Dispatcher {
            sessions: queries
                .into_iter()
                .map(|q| Session::new(q.host, q.port))
                .collect(),
            demux: HashMap::new(),
            options: self.options.clone(),
            resolver: Arc::clone(&self.resolver),
            events: self.events.clone(),
        };
        dispatcher.run().await
    }
}

struct Dispatcher {
    sessions: Vec<Session>,
    demux: HashMap<SocketAddrV4, usize>,
    options: QueryOptions,
    resolver: Arc<dyn Resolver>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl Dispatcher {
    async fn run(mut self) -> Result<Vec<Endpoint>> {
        self.resolve_all().await;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        info!("bound query socket on {}", socket.local_addr()?);

        for idx in 0..self.sessions.len() {
            if self.sessions[idx].addr.is_some() {
                self.send(&socket, idx, Request::Info).await?;
            }
        }

        let deadline = Instant::now() + self.options.timeout;
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while !self.sessions.iter().all(Session::is_done) {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    info!("query deadline reached, delivering partial results");
                    break;
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = received?;
                    debug!("{} bytes from {}", len, from);
                    self.on_datagram(&socket, &buf[..len], from).await?;
                }
            }
        }

        // Closes the socket; `run` consumed self so this happens exactly once.
        drop(socket);

        let endpoints: Vec<Endpoint> = self.sessions.iter().map(Session::to_endpoint).collect();
        self.emit(Event::Done(endpoints.clone()));
        Ok(endpoints)
    }

    async fn resolve_all(&mut self) {
        let lookups = self
            .sessions
            .iter()
            .map(|s| self.resolver.resolve(&s.host))
            .collect::<Vec<_>>();

        for (idx, resolved) in join_all(lookups).await.into_iter().enumerate() {
            match resolved {
                Ok(addrs) => match addrs.first() {
                    Some(&addr) => {
                        let session = &mut self.sessions[idx];
                        session.addr = Some(addr);
                        self.demux.insert(SocketAddrV4::new(addr, session.port), idx);
                    }
                    None => self.resolve_failed(idx),
                },
                Err(err) => {
                    self.emit(Event::Error(err));
                    self.resolve_failed(idx);
                }
            }
        }
    }

    fn resolve_failed(&mut self, idx: usize) {
        let session = &mut self.sessions[idx];
        warn!("no address for {}:{}", session.host, session.port);
        session.fail();
    }

    async fn on_datagram(
        &mut self,
        socket: &UdpSocket,
        data: &[u8],
        from: SocketAddr,
    ) -> Result<()> {
        let idx = match self.route(from) {
            Some(idx) => idx,
            None => {
                self.emit(Event::Error(Error::UnknownSource(from)));
                return Ok(());
            }
        };

        // Anything arriving after the endpoint settled is a stray
        // retransmission; drop it without ceremony.
        let stage = self.sessions[idx].stage();
        if stage == Stage::Done || stage == Stage::Failed {
            debug!("dropping late datagram for settled endpoint {}", from);
            return Ok(());
        }

        match self.unframe(idx, data, true) {
            Ok(None) => Ok(()),
            Ok(Some(payload)) => match self.apply(socket, idx, &payload).await {
                Ok(()) => Ok(()),
                Err(err) => self.surface(idx, err),
            },
            Err(err) => self.surface(idx, err),
        }
    }

    fn route(&self, from: SocketAddr) -> Option<usize> {
        match from {
            SocketAddr::V4(v4) => self.demux.get(&v4).copied(),
            SocketAddr::V6(_) => None,
        }
    }

    // A reassembled payload re-enters here once to have its inner framing
    // prefix read; that inner prefix must be -1.
    fn unframe(&mut self, idx: usize, data: &[u8], allow_split: bool) -> Result<Option<Vec<u8>>> {
        let mut r = Reader::new(data);
        match r.read_i32()? {
            SIMPLE_FRAME => Ok(Some(r.rest().to_vec())),
            SPLIT_FRAME if allow_split => {
                let session = &mut self.sessions[idx];
                let app_id = session.app_id();
                let protocol = session.protocol_version();
                match reassembly::feed(&mut session.reassembly, r.rest(), app_id, protocol)? {
                    None => Ok(None),
                    Some(combined) => self.unframe(idx, &combined, false),
                }
            }
            other => Err(Error::BadFraming(other)),
        }
    }

    async fn apply(&mut self, socket: &UdpSocket, idx: usize, payload: &[u8]) -> Result<()> {
        let step = self.sessions[idx].handle(payload)?;

        self.emit(match step.reply {
            Reply::Info(info) => Event::Info { endpoint: idx, info },
            Reply::Challenge(token) => Event::Challenge {
                endpoint: idx,
                token,
            },
            Reply::Players(players) => Event::Players {
                endpoint: idx,
                players,
            },
            Reply::Rules(rules) => Event::Rules {
                endpoint: idx,
                rules,
            },
            Reply::Ping(ping_ms) => Event::Ping {
                endpoint: idx,
                ping_ms,
            },
        });

        if let Some(request) = step.send {
            self.send(socket, idx, request).await?;
        }
        Ok(())
    }

    async fn send(&mut self, socket: &UdpSocket, idx: usize, request: Request) -> Result<()> {
        let session = &mut self.sessions[idx];
        let addr = match session.addr {
            Some(addr) => SocketAddrV4::new(addr, session.port),
            None => return Ok(()),
        };

        if request == Request::Ping {
            session.mark_ping_sent();
        }

        debug!("sending {:#04x} to {}", request.kind(), addr);
        socket.send_to(&request.to_bytes(), addr).await?;
        Ok(())
    }

    // Truncation and checksum failures end the endpoint's run; everything
    // else is surfaced only. Socket errors abort the whole run.
    fn surface(&mut self, idx: usize, err: Error) -> Result<()> {
        match err {
            Error::Socket(_) => return Err(err),
            Error::Truncated(_)
            | Error::TruncatedString(_)
            | Error::Checksum { .. }
            | Error::Decompress(_) => {
                warn!(
                    "endpoint {}:{} failed: {}",
                    self.sessions[idx].host, self.sessions[idx].port, err
                );
                self.sessions[idx].fail();
                self.emit(Event::Error(err));
            }
            other => {
                debug!(
                    "endpoint {}:{}: {}",
                    self.sessions[idx].host, self.sessions[idx].port, other
                );
                self.emit(Event::Error(other));
            }
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}
