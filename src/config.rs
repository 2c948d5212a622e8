use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::NodeId;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Static cluster description shared by every node and client.
///
/// ```toml
/// n = 4
/// max_faulty = 1
/// host = "127.0.0.1"
/// ports = [50051, 50052, 50053, 50054]
/// ```
///
/// Node `i` listens on `ports[i - 1]`. `n` defaults to the number of ports
/// and `max_faulty` to the largest tolerable value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    pub n: Option<usize>,
    pub max_faulty: Option<usize>,
    #[serde(default = "default_host")]
    pub host: String,
    pub ports: Vec<u16>,
    pub timeout_ms: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ClusterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("reading {}: {err}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|err| Error::Config(err.to_string()))?;
        config.size()?;
        Ok(config)
    }

    pub fn size(&self) -> Result<usize> {
        let n = self.n.unwrap_or(self.ports.len());
        if n == 0 {
            return Err(Error::Config("the cluster has no members".to_string()));
        }
        if n > self.ports.len() {
            return Err(Error::Config(format!(
                "{} members but only {} ports",
                n,
                self.ports.len()
            )));
        }
        Ok(n)
    }

    pub fn cluster(&self) -> Result<Cluster> {
        let n = self.size()?;
        Cluster::new((1..=n).collect(), self.max_faulty.unwrap_or(usize::MAX))
    }

    pub fn port_of(&self, id: NodeId) -> Result<u16> {
        let n = self.size()?;
        if id == 0 || id > n {
            return Err(Error::NotMember(id));
        }
        Ok(self.ports[id - 1])
    }

    /// The address of every member, by id.
    pub fn peers(&self) -> Result<BTreeMap<NodeId, SocketAddr>> {
        let n = self.size()?;
        (1..=n)
            .map(|id| -> Result<(NodeId, SocketAddr)> {
                let port = self.ports[id - 1];
                let addr = (self.host.as_str(), port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| {
                        Error::Config(format!("{}:{} does not resolve", self.host, port))
                    })?;
                Ok((id, addr))
            })
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}
