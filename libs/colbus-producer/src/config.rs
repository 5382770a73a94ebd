use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use colbus_api::Acks;

use crate::error::ProducerError;

// ═══════════════════════════════════════════════════════════════
//  Properties
// ═══════════════════════════════════════════════════════════════

/// Raw `key = value` producer properties in the broker's naming
/// (`bootstrap.servers`, `acks`, ...). Later `set` calls win.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

// ═══════════════════════════════════════════════════════════════
//  Serializer format
// ═══════════════════════════════════════════════════════════════

/// Wire format of record keys or values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializerFormat {
    /// UTF-8 text.
    #[default]
    String,
    /// Bytes passed through as-is.
    Bytes,
}

impl FromStr for SerializerFormat {
    type Err = ProducerError;

    /// Accepts short names and the broker's Java class names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "string" | "org.apache.kafka.common.serialization.StringSerializer" => {
                Ok(SerializerFormat::String)
            }
            "bytes"
            | "bytearray"
            | "org.apache.kafka.common.serialization.ByteArraySerializer"
            | "org.apache.kafka.common.serialization.BytesSerializer" => Ok(SerializerFormat::Bytes),
            other => Err(ProducerError::Config(format!("unknown serializer '{other}'"))),
        }
    }
}

impl fmt::Display for SerializerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerFormat::String => f.write_str("string"),
            SerializerFormat::Bytes => f.write_str("bytes"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ProducerConfig
// ═══════════════════════════════════════════════════════════════

pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const ACKS: &str = "acks";
pub const RETRIES: &str = "retries";
pub const BATCH_SIZE: &str = "batch.size";
pub const BUFFER_MEMORY: &str = "buffer.memory";
pub const LINGER_MS: &str = "linger.ms";
pub const RETRY_BACKOFF_MS: &str = "retry.backoff.ms";
pub const MAX_BLOCK_MS: &str = "max.block.ms";
pub const METADATA_MAX_AGE_MS: &str = "metadata.max.age.ms";
pub const KEY_SERIALIZER: &str = "key.serializer";
pub const VALUE_SERIALIZER: &str = "value.serializer";
pub const PARTITIONER_CLASS: &str = "partitioner.class";

/// Validated producer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub bootstrap_servers: Vec<String>,
    pub acks: Acks,
    /// Extra attempts after a retriable failure.
    pub retries: u32,
    /// Target batch size in bytes per partition. 0 disables batching.
    pub batch_size: usize,
    /// Bytes of records that may wait for delivery at once.
    pub buffer_memory: usize,
    /// How long a non-full batch may wait for more records.
    pub linger: Duration,
    pub retry_backoff: Duration,
    /// Upper bound on how long `send` waits for metadata or buffer space.
    pub max_block: Duration,
    /// Cached topic metadata older than this is fetched again before use.
    pub metadata_max_age: Duration,
    pub key_serializer: SerializerFormat,
    pub value_serializer: SerializerFormat,
    /// Name the partitioner is registered under.
    pub partitioner: String,
}

impl ProducerConfig {
    pub fn new(bootstrap_servers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into_iter().map(Into::into).collect(),
            acks: Acks::All,
            retries: i32::MAX as u32,
            batch_size: 16_384,
            buffer_memory: 33_554_432,
            linger: Duration::ZERO,
            retry_backoff: Duration::from_millis(100),
            max_block: Duration::from_millis(60_000),
            metadata_max_age: Duration::from_millis(300_000),
            key_serializer: SerializerFormat::String,
            value_serializer: SerializerFormat::String,
            partitioner: "default".into(),
        }
    }

    /// Build from broker-style properties. Unknown keys are logged and ignored.
    pub fn from_properties(props: &Properties) -> Result<Self, ProducerError> {
        let servers = props
            .get(BOOTSTRAP_SERVERS)
            .ok_or_else(|| ProducerError::Config(format!("{BOOTSTRAP_SERVERS} is required")))?;
        let mut config = Self::new(
            servers.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from),
        );
        if config.bootstrap_servers.is_empty() {
            return Err(ProducerError::Config(format!("{BOOTSTRAP_SERVERS} is empty")));
        }

        for (key, value) in props.iter() {
            match key {
                BOOTSTRAP_SERVERS => {}
                ACKS => {
                    config.acks = value
                        .parse::<Acks>()
                        .map_err(|e| ProducerError::Config(e.message().to_string()))?
                }
                RETRIES => config.retries = parse_number(key, value)?,
                BATCH_SIZE => config.batch_size = parse_number(key, value)?,
                BUFFER_MEMORY => config.buffer_memory = parse_number(key, value)?,
                LINGER_MS => config.linger = Duration::from_millis(parse_number(key, value)?),
                RETRY_BACKOFF_MS => {
                    config.retry_backoff = Duration::from_millis(parse_number(key, value)?)
                }
                MAX_BLOCK_MS => config.max_block = Duration::from_millis(parse_number(key, value)?),
                METADATA_MAX_AGE_MS => {
                    config.metadata_max_age = Duration::from_millis(parse_number(key, value)?)
                }
                KEY_SERIALIZER => config.key_serializer = value.parse()?,
                VALUE_SERIALIZER => config.value_serializer = value.parse()?,
                PARTITIONER_CLASS => config.partitioner = value.trim().to_string(),
                _ => tracing::warn!(key, "supplied property is not a known producer config"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProducerError> {
        if self.bootstrap_servers.is_empty() {
            return Err(ProducerError::Config(format!("{BOOTSTRAP_SERVERS} is empty")));
        }
        if self.buffer_memory == 0 {
            return Err(ProducerError::Config(format!("{BUFFER_MEMORY} must be positive")));
        }
        if self.buffer_memory > u32::MAX as usize {
            return Err(ProducerError::Config(format!("{BUFFER_MEMORY} must fit in 32 bits")));
        }
        if self.partitioner.is_empty() {
            return Err(ProducerError::Config(format!("{PARTITIONER_CLASS} is empty")));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ProducerError> {
    value.trim().parse().map_err(|_| {
        ProducerError::Config(format!("{key}: expected a non-negative integer, got '{value}'"))
    })
}
