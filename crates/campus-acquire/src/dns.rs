use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Google and Cloudflare public resolvers.
pub const PUBLIC_NAMESERVERS: [IpAddr; 4] = [
    IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 4, 4)),
    IpAddr::V4(std::net::Ipv4Addr::new(1, 1, 1, 1)),
    IpAddr::V4(std::net::Ipv4Addr::new(1, 0, 0, 1)),
];

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("could not resolve {host}: {message}")]
    Lookup { host: String, message: String },

    #[error("no addresses for {0}")]
    NoAddresses(String),

    #[error("resolving {host} took longer than {after:?}")]
    Timeout { host: String, after: Duration },
}

/// Resolves with the system resolver, then public resolvers on failure.
///
/// Built once and handed to every HTTP client through
/// `ClientBuilder::dns_resolver`; process-wide resolution is left alone.
#[derive(Clone)]
pub struct FallbackResolver {
    public: TokioAsyncResolver,
    overall: Duration,
}

impl Default for FallbackResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResolver {
    pub fn new() -> Self {
        Self::with_nameservers(&PUBLIC_NAMESERVERS)
    }

    pub fn with_nameservers(ips: &[IpAddr]) -> Self {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(ips, 53, true),
        );
        let mut opts = ResolverOpts::default();
        opts.timeout = QUERY_TIMEOUT;
        opts.attempts = 1;
        Self {
            public: TokioAsyncResolver::tokio(config, opts),
            overall: OVERALL_TIMEOUT,
        }
    }

    pub async fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        match tokio::time::timeout(self.overall, self.lookup(host)).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Timeout {
                host: host.to_string(),
                after: self.overall,
            }),
        }
    }

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => {
                let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                if !ips.is_empty() {
                    return Ok(ips);
                }
                tracing::debug!(host, "System resolver returned no addresses");
            }
            Err(e) => tracing::debug!(host, "System resolver failed: {e}"),
        }

        let answer = self.public.lookup_ip(host).await.map_err(|e| DnsError::Lookup {
            host: host.to_string(),
            message: e.to_string(),
        })?;
        let ips: Vec<IpAddr> = answer.iter().collect();
        if ips.is_empty() {
            return Err(DnsError::NoAddresses(host.to_string()));
        }
        tracing::info!(host, addrs = ips.len(), "Resolved through public DNS");
        Ok(ips)
    }
}

impl Resolve for FallbackResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let ips = resolver.resolve_host(name.as_str()).await?;
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
