//! Environment-variable configuration source
//!
//! Reads the same variable names the bridge has always been deployed with.
//! Empty values count as absent.

use std::str::FromStr;

use contracts::{
    defaults, BridgeConfig, CacheConfig, ContractError, DispatchConfig, DocumentStoreConfig, FeedConfig,
    PushGatewayConfig, QoS, RelationalStoreConfig, SensitiveString,
};

pub const MQTT_BROKER: &str = "MQTT_BROKER";
pub const MQTT_PORT: &str = "MQTT_PORT";
pub const MQTT_USERNAME: &str = "MQTT_USERNAME";
pub const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
pub const MQTT_TOPIC: &str = "MQTT_TOPIC";
pub const MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";
pub const MQTT_QOS: &str = "MQTT_QOS";
pub const REDIS_HOST: &str = "REDIS_HOST";
pub const REDIS_PORT: &str = "REDIS_PORT";
pub const REDIS_DB: &str = "REDIS_DB";
pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const REDIS_TOPIC: &str = "REDIS_TOPIC";
pub const MONGODB_URI: &str = "MONGODB_URI";
pub const MONGODB_DB: &str = "MONGODB_DB";
pub const MONGODB_COLLECTION: &str = "MONGODB_COLLECTION";
pub const POSTGRES_URI: &str = "POSTGRES_URI";
pub const CENTRIFUGO_API_ENDPOINT: &str = "CENTRIFUGO_API_ENDPOINT";
pub const CENTRIFUGO_API_KEY: &str = "CENTRIFUGO_API_KEY";

/// Build a BridgeConfig from a variable lookup function
///
/// Timeouts and dispatch tuning keep their defaults; use a config file to
/// change them.
pub fn from_lookup<F>(lookup: F) -> Result<BridgeConfig, ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars { lookup };

    let qos = match vars.parsed::<u8>(MQTT_QOS)? {
        Some(level) => QoS::from_u8(level).ok_or_else(|| {
            ContractError::config_validation(MQTT_QOS, format!("unsupported QoS level {level}"))
        })?,
        None => QoS::default(),
    };

    let feed = FeedConfig {
        host: vars.required(MQTT_BROKER)?,
        port: vars.parsed(MQTT_PORT)?.unwrap_or(defaults::MQTT_PORT),
        topic: vars.required(MQTT_TOPIC)?,
        client_id: vars.optional(MQTT_CLIENT_ID),
        username: vars.optional(MQTT_USERNAME),
        password: vars.optional(MQTT_PASSWORD).map(SensitiveString::from),
        qos,
        keep_alive_secs: defaults::KEEP_ALIVE_SECS,
        connect_timeout_secs: defaults::CONNECT_TIMEOUT_SECS,
        reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
    };

    let cache = CacheConfig {
        host: vars.required(REDIS_HOST)?,
        port: vars.parsed(REDIS_PORT)?.unwrap_or(defaults::REDIS_PORT),
        db: vars.parsed(REDIS_DB)?.unwrap_or(0),
        password: vars.optional(REDIS_PASSWORD).map(SensitiveString::from),
        key: vars.required(REDIS_TOPIC)?,
        timeout_ms: defaults::TIMEOUT_MS,
    };

    let document_store = DocumentStoreConfig {
        uri: vars.required(MONGODB_URI)?,
        database: vars.required(MONGODB_DB)?,
        collection: vars.required(MONGODB_COLLECTION)?,
        server_selection_timeout_ms: defaults::TIMEOUT_MS,
    };

    let relational_store = RelationalStoreConfig {
        uri: vars.required(POSTGRES_URI)?,
        connect_timeout_ms: defaults::TIMEOUT_MS,
    };

    let push_gateway = PushGatewayConfig {
        endpoint: vars.required(CENTRIFUGO_API_ENDPOINT)?,
        api_key: SensitiveString::from(vars.required(CENTRIFUGO_API_KEY)?),
        timeout_ms: defaults::TIMEOUT_MS,
    };

    Ok(BridgeConfig {
        feed,
        cache,
        document_store,
        relational_store,
        push_gateway,
        dispatch: DispatchConfig::default(),
    })
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ContractError> {
        self.optional(name)
            .ok_or_else(|| ContractError::missing_setting(name))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, ContractError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    ContractError::config_validation(name, format!("invalid value '{raw}': {e}"))
                })
            })
            .transpose()
    }
}
