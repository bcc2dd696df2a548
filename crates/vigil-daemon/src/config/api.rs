use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use super::constants::DEFAULT_API_PORT;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_API_PORT,
            request_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn is_localhost_only(&self) -> bool {
        self.bind_address.is_loopback()
    }

    /// Base URL the CLI uses to reach a running daemon.
    pub fn base_url(&self) -> String {
        let host = if self.bind_address.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.bind_address
        };
        format!("http://{}", SocketAddr::new(host, self.port))
    }
}
