use std::net::{IpAddr, Ipv4Addr};

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::errors::{Error, Result};

// The protocol runs over IPv4 only; the first returned address wins.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str) -> BoxFuture<'static, Result<Vec<Ipv4Addr>>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> BoxFuture<'static, Result<Vec<Ipv4Addr>>> {
        let host = host.to_owned();

        async move {
            if let Ok(literal) = host.parse::<Ipv4Addr>() {
                return Ok(vec![literal]);
            }

            let addrs: Vec<Ipv4Addr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|_| Error::Resolve { host: host.clone() })?
                .filter_map(|addr| match addr.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .collect();

            debug!("resolved {} to {:?}", host, addrs);
            if addrs.is_empty() {
                return Err(Error::Resolve { host });
            }
            Ok(addrs)
        }
        .boxed()
    }
}

// Literal-only resolver; no name lookups, tests mainly.
impl Resolver for () {
    fn resolve(&self, host: &str) -> BoxFuture<'static, Result<Vec<Ipv4Addr>>> {
        let parsed = host
            .parse::<Ipv4Addr>()
            .map(|addr| vec![addr])
            .map_err(|_| Error::Resolve {
                host: host.to_owned(),
            });
        futures::future::ready(parsed).boxed()
    }
}
