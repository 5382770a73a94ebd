use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use colbus_api::ClusterConfig;
use colbus_broker_memory::MemoryBrokerConfig;
use colbus_producer::Properties;
use colbus_storage_memory::MemoryStoreConfig;

use crate::error::DemoError;

#[derive(Parser)]
#[command(name = "colbus-demo", about = "Table client and partitioned producer walkthroughs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a table, write, scan, read and delete rows, then drop it
    Table(TableArgs),
    /// Publish records through the partitioned producer
    Produce(ProduceArgs),
}

#[derive(Args, Clone, Debug)]
pub struct TableArgs {
    /// Path to TOML config file; built-in defaults when omitted
    #[arg(long, env = "COLBUS_CONFIG")]
    pub config: Option<String>,

    /// Table the walkthrough creates and drops
    #[arg(long, default_value = "emp")]
    pub table: String,
}

#[derive(Args, Clone, Debug)]
pub struct ProduceArgs {
    /// Path to TOML config file; built-in defaults when omitted
    #[arg(long, env = "COLBUS_CONFIG")]
    pub config: Option<String>,

    #[arg(long, default_value = "yuandan")]
    pub topic: String,

    /// Number of records to publish
    #[arg(long, default_value_t = 99)]
    pub count: usize,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub storage: MemoryStoreConfig,
    #[serde(default)]
    pub broker: MemoryBrokerConfig,
    /// Producer properties in the broker's naming (`bootstrap.servers`, ...).
    #[serde(default = "default_producer")]
    pub producer: BTreeMap<String, toml::Value>,
}

fn default_producer() -> BTreeMap<String, toml::Value> {
    [
        ("bootstrap.servers", "192.168.133.128:9092"),
        ("acks", "all"),
        ("retries", "0"),
        ("batch.size", "10241"),
        ("buffer.memory", "12341235"),
        ("key.serializer", "org.apache.kafka.common.serialization.StringSerializer"),
        ("value.serializer", "org.apache.kafka.common.serialization.StringSerializer"),
        ("partitioner.class", "round_robin"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
    .collect()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            storage: MemoryStoreConfig::default(),
            broker: MemoryBrokerConfig::default(),
            producer: default_producer(),
        }
    }
}

impl DemoConfig {
    pub fn load(path: Option<&str>) -> Result<Self, DemoError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| DemoError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            DemoError::Config { context, detail } => DemoError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, DemoError> {
        toml::from_str(content).map_err(|e| DemoError::Config { context: "parse", detail: e.to_string() })
    }

    /// `[producer]` as flat string properties. Numbers and booleans are
    /// accepted unquoted.
    pub fn producer_properties(&self) -> Result<Properties, DemoError> {
        let mut props = Properties::new();
        for (key, value) in &self.producer {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(n) => n.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s.clone()),
                        other => Err(DemoError::Config {
                            context: "producer",
                            detail: format!("{key}: unsupported list item {other}"),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?
                    .join(","),
                other => {
                    return Err(DemoError::Config {
                        context: "producer",
                        detail: format!("{key}: unsupported value {other}"),
                    });
                }
            };
            props.set(key.as_str(), value);
        }
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = DemoConfig::load(None).unwrap();
        assert_eq!(config.cluster.quorum, vec!["localhost"]);
        assert_eq!(config.broker.partitions, 3);
        let props = config.producer_properties().unwrap();
        assert_eq!(props.get("acks"), Some("all"));
        assert_eq!(props.get("retries"), Some("0"));
    }

    #[test]
    fn parses_sections() {
        let config = DemoConfig::parse(
            r#"
            [cluster]
            quorum = ["zk1", "zk2:2182"]

            [broker]
            partitions = 5

            [producer]
            "bootstrap.servers" = ["b1:9092", "b2:9092"]
            acks = 1
            "batch.size" = 0
            "partitioner.class" = "default"
            "#,
        )
        .unwrap();
        assert_eq!(config.cluster.endpoints(), vec!["zk1:2181", "zk2:2182"]);
        assert_eq!(config.broker.partitions, 5);
        assert_eq!(config.storage.max_caching, 1_000);

        let props = config.producer_properties().unwrap();
        assert_eq!(props.get("bootstrap.servers"), Some("b1:9092,b2:9092"));
        assert_eq!(props.get("acks"), Some("1"));
        assert_eq!(props.get("batch.size"), Some("0"));
    }

    #[test]
    fn rejects_nested_producer_tables() {
        let config = DemoConfig::parse(
            r#"
            [producer.extra]
            a = 1
            "#,
        )
        .unwrap();
        assert!(config.producer_properties().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = DemoConfig::parse("[cluster").unwrap_err();
        assert!(matches!(err, DemoError::Config { context: "parse", .. }));
    }
}
