//! Broker connection configuration.

use crate::client::FetchOptions;
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize broker uris as either a comma-separated string or a list.
fn deserialize_uris<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct UrisVisitor;

    impl<'de> Visitor<'de> for UrisVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a comma-separated string or a list of broker addresses")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.split(',').map(|s| s.trim().to_string()).collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut uris = Vec::new();
            while let Some(uri) = seq.next_element::<String>()? {
                uris.push(uri);
            }
            Ok(uris)
        }
    }

    deserializer.deserialize_any(UrisVisitor)
}

/// Broker endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker addresses (comma-separated string or list)
    #[serde(deserialize_with = "deserialize_uris", default = "default_uris")]
    pub uris: Vec<String>,
    /// SASL username (for cloud authentication)
    pub sasl_username: Option<String>,
    /// SASL password (for cloud authentication)
    pub sasl_password: Option<String>,
    /// Fetch tuning passed through to every fetch RPC
    #[serde(default)]
    pub fetch: FetchOptions,
}

fn default_uris() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            uris: default_uris(),
            sasl_username: None,
            sasl_password: None,
            fetch: FetchOptions::default(),
        }
    }
}

impl BrokerConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn uri_string(&self) -> String {
        self.uris.join(",")
    }
}
