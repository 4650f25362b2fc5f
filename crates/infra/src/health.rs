use std::time::Duration;

use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::health::{HealthProbe, HealthReport};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Reports the in-process adapters, which cannot be down.
#[derive(Debug, Clone, Default)]
pub struct MemoryHealthProbe;

impl HealthProbe for MemoryHealthProbe {
    fn probe(&self) -> BoxFuture<'_, HealthReport> {
        Box::pin(async { HealthReport::healthy("memory") })
    }
}

/// TCP reachability of the Supabase endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseHealthProbe {
    endpoint: String,
}

impl SupabaseHealthProbe {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl HealthProbe for SupabaseHealthProbe {
    fn probe(&self) -> BoxFuture<'_, HealthReport> {
        Box::pin(async move {
            let address = match socket_address(&self.endpoint) {
                Ok(address) => address,
                Err(detail) => return HealthReport::unhealthy("supabase", detail),
            };
            match timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
                Ok(Ok(_)) => {
                    tracing::debug!(address, "supabase health check succeeded");
                    HealthReport::healthy("supabase")
                }
                Ok(Err(err)) => {
                    HealthReport::unhealthy("supabase", format!("connect failed: {err}"))
                }
                Err(_) => HealthReport::unhealthy("supabase", "connect timed out"),
            }
        })
    }
}

fn socket_address(endpoint: &str) -> Result<String, String> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };
    let parsed = Url::parse(&normalized)
        .map_err(|err| format!("invalid supabase endpoint '{endpoint}': {err}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("missing host in supabase endpoint '{endpoint}'"))?;
    let port = parsed.port_or_known_default().unwrap_or(443);
    Ok(format!("{host}:{port}"))
}
