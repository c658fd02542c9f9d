// src/resolver.rs
use crate::types::{CertFinderError, ResolutionResult, ResolverConfig};
use async_trait::async_trait;
use log::{debug, error};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use trust_dns_resolver::config::{LookupIpStrategy, ResolverConfig as DnsResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A single IPv4 address lookup. Failures are `None`, never errors.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup_ipv4(&self, hostname: &str) -> Option<Ipv4Addr>;
}

/// DNS backed lookup keeping the first A record of each answer.
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
}

impl DnsLookup {
    pub fn new(config: &ResolverConfig) -> Result<Self, CertFinderError> {
        let (resolver_config, mut opts) = if config.use_system_resolver {
            trust_dns_resolver::system_conf::read_system_conf()
                .map_err(|e| CertFinderError::ResolutionError(format!("Failed to read system resolver: {}", e)))?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &config.nameservers {
                let socket_addr = SocketAddr::from_str(ns)
                    .map_err(|e| CertFinderError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e)))?;
                resolver_config.add_name_server(trust_dns_resolver::config::NameServerConfig {
                    socket_addr,
                    protocol: trust_dns_resolver::config::Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            (resolver_config, ResolverOpts::default())
        };

        opts.timeout = config.timeout;
        opts.attempts = 1;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

#[async_trait]
impl Lookup for DnsLookup {
    async fn lookup_ipv4(&self, hostname: &str) -> Option<Ipv4Addr> {
        match self.resolver.lookup_ip(hostname).await {
            Ok(lookup) => lookup.iter().find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            }),
            Err(e) => {
                debug!("Lookup failed for {}: {}", hostname, e);
                None
            }
        }
    }
}

/// Resolves a set of names concurrently and streams the results back in
/// completion order.
pub struct Resolver {
    lookup: Option<Arc<dyn Lookup>>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, CertFinderError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let lookup = DnsLookup::new(config)?;
        Ok(Self::with_lookup(Arc::new(lookup), config.concurrency))
    }

    pub fn with_lookup(lookup: Arc<dyn Lookup>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            lookup: Some(lookup),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// A resolver that emits every name with an empty address.
    pub fn disabled() -> Self {
        Self {
            lookup: None,
            semaphore: Arc::new(Semaphore::new(1)),
            concurrency: 1,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lookup.is_some()
    }

    /// Start one task per name. The returned receiver yields exactly one
    /// result per input name and closes once every task has finished.
    pub fn resolve_stream(&self, names: Vec<String>) -> mpsc::Receiver<ResolutionResult> {
        let (tx, rx) = mpsc::channel(self.concurrency);

        let Some(lookup) = self.lookup.clone() else {
            tokio::spawn(async move {
                for name in names {
                    if tx.send(ResolutionResult::unresolved(name)).await.is_err() {
                        break;
                    }
                }
            });
            return rx;
        };

        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            let tx = tx.clone();
            let lookup = Arc::clone(&lookup);
            let semaphore = Arc::clone(&self.semaphore);

            handles.push(tokio::spawn(async move {
                let address = match semaphore.acquire_owned().await {
                    Ok(_permit) => lookup.lookup_ipv4(&name).await,
                    Err(_) => None,
                };
                // A dropped receiver only means nobody is listening anymore
                let _ = tx.send(ResolutionResult { subdomain: name, address }).await;
            }));
        }

        // Supervisor: the stream closes when its sender goes away after the join
        tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Resolution task failed: {}", e);
                }
            }
            drop(tx);
            debug!("All resolution tasks finished");
        });

        rx
    }

    pub async fn resolve_all(&self, names: Vec<String>) -> Vec<ResolutionResult> {
        let mut rx = self.resolve_stream(names);
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }

    pub async fn resolve_single(&self, hostname: &str) -> Option<Ipv4Addr> {
        let lookup = self.lookup.as_ref()?;
        let _permit = self.semaphore.acquire().await.ok()?;
        lookup.lookup_ipv4(hostname).await
    }
}
