use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

/**
 * \brief Provider configuration as persisted in providers.json.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /** \brief Model identifier, unique key of the registry */
    pub model: String,
    /** \brief Absolute HTTP(S) endpoint receiving the chat payload */
    pub url: String,
    /** \brief Literal secret or env reference (`${NAME}`, `$NAME`, `{NAME}`, `env:NAME`) */
    pub token: String,
}

impl Provider {
    /**
     * \brief Token-free view handed out by list/add.
     */
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            model: self.model.clone(),
            url: self.url.clone(),
        }
    }
}

/**
 * \brief Sanitized provider, the only shape that leaves the registry.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub model: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/**
 * \brief RFC 3339 instant that keeps the exact text it was read from.
 * \details Serializes back byte for byte, so `...45.100Z` stays `...45.100Z`.
 *          Fresh timestamps use the browser's `toISOString()` layout (UTC, milliseconds).
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    raw: String,
    instant: OffsetDateTime,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        let now = now - time::Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000));
        let raw = format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            now.year(),
            u8::from(now.month()),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.millisecond()
        );
        Self { raw, instant: now }
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, time::error::Parse> {
        let raw = raw.into();
        let instant = OffsetDateTime::parse(&raw, &Rfc3339)?;
        Ok(Self { raw, instant })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> OffsetDateTime {
        self.instant
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(raw).map_err(de::Error::custom)
    }
}

/**
 * \brief One chat bubble, immutable once created.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /** \brief UUID v4 for messages created here; any string coming from the UI */
    pub id: String,
    pub timestamp: Timestamp,
    pub role: Role,
    pub content: String,
    /** \brief Model name of the provider the message belongs to */
    pub provider: String,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Timestamp::now(),
            role,
            content: content.into(),
            provider: provider.into(),
        }
    }

    pub fn user(content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::new(Role::User, content, provider)
    }

    pub fn assistant(content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, provider)
    }
}
