use std::collections::BTreeMap;

use serde::Deserialize;

/// Connection settings for a storage cluster.
///
/// Built once by the caller and handed to every client that needs it;
/// there is no process-wide default instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    /// Coordination quorum hosts.
    #[serde(default = "default_quorum")]
    pub quorum: Vec<String>,

    /// Port the quorum hosts listen on.
    #[serde(default = "default_client_port")]
    pub client_port: u16,

    /// Root node of the cluster's coordination tree.
    #[serde(default = "default_znode_parent")]
    pub znode_parent: String,

    /// Extra backend-specific properties, passed through untouched.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_quorum() -> Vec<String> {
    vec!["localhost".into()]
}

fn default_client_port() -> u16 {
    2181
}

fn default_znode_parent() -> String {
    "/hbase".into()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            quorum: default_quorum(),
            client_port: default_client_port(),
            znode_parent: default_znode_parent(),
            properties: BTreeMap::new(),
        }
    }
}

impl ClusterConfig {
    pub fn new(quorum: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            quorum: quorum.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// `host:port` pairs of the quorum, in configuration order.
    pub fn endpoints(&self) -> Vec<String> {
        self.quorum
            .iter()
            .map(|host| {
                if host.contains(':') {
                    host.clone()
                } else {
                    format!("{host}:{}", self.client_port)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_append_client_port() {
        let cfg = ClusterConfig::new(["zk1", "zk2:2182"]);
        assert_eq!(cfg.endpoints(), vec!["zk1:2181", "zk2:2182"]);
    }

    #[test]
    fn default_points_at_localhost() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.quorum, vec!["localhost"]);
        assert_eq!(cfg.znode_parent, "/hbase");
    }
}
