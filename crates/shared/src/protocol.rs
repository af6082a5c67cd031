use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Put,
}

/// Message pushed to the browser over the websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketMessage {
    pub channel: String,
    pub body: serde_json::Value,
    pub method: Method,
}

impl SocketMessage {
    pub fn put(channel: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            body,
            method: Method::Put,
        }
    }
}

/// Login token id. The API has served both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => TokenId(text),
            RawId::Number(number) => TokenId(number.to_string()),
        })
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    #[serde(default)]
    pub claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub provider_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl User {
    /// Title of the last account linked through `provider_id` that has one.
    pub fn title_for(&self, provider_id: &str) -> Option<&str> {
        self.accounts
            .iter()
            .filter(|account| account.provider_id == provider_id)
            .filter_map(|account| account.title.as_deref())
            .filter(|title| !title.is_empty())
            .last()
    }
}
