use std::fmt;

/// Header names the client sets itself, plus an escape hatch for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeaderKey {
    Receipt,
    Destination,
    Id,
    ContentLength,
    ContentType,
    Ack,
    Transaction,
    Subscription,
    Disconnect,
    Disconnected,
    HeartBeat,
    AcceptVersion,
    Custom(String),
}

impl HeaderKey {
    pub fn as_str(&self) -> &str {
        match self {
            HeaderKey::Receipt => "receipt",
            HeaderKey::Destination => "destination",
            HeaderKey::Id => "id",
            HeaderKey::ContentLength => "content-length",
            HeaderKey::ContentType => "content-type",
            HeaderKey::Ack => "ack",
            HeaderKey::Transaction => "transaction",
            HeaderKey::Subscription => "subscription",
            HeaderKey::Disconnect => "disconnect",
            HeaderKey::Disconnected => "disconnected",
            HeaderKey::HeartBeat => "heart-beat",
            HeaderKey::AcceptVersion => "accept-version",
            HeaderKey::Custom(name) => name,
        }
    }
}

impl From<&str> for HeaderKey {
    fn from(name: &str) -> Self {
        match name {
            "receipt" => HeaderKey::Receipt,
            "destination" => HeaderKey::Destination,
            "id" => HeaderKey::Id,
            "content-length" => HeaderKey::ContentLength,
            "content-type" => HeaderKey::ContentType,
            "ack" => HeaderKey::Ack,
            "transaction" => HeaderKey::Transaction,
            "subscription" => HeaderKey::Subscription,
            "disconnect" => HeaderKey::Disconnect,
            "disconnected" => HeaderKey::Disconnected,
            "heart-beat" => HeaderKey::HeartBeat,
            "accept-version" => HeaderKey::AcceptVersion,
            other => HeaderKey::Custom(other.to_string()),
        }
    }
}

impl From<String> for HeaderKey {
    fn from(name: String) -> Self {
        match HeaderKey::from(name.as_str()) {
            HeaderKey::Custom(_) => HeaderKey::Custom(name),
            known => known,
        }
    }
}

impl From<&String> for HeaderKey {
    fn from(name: &String) -> Self {
        HeaderKey::from(name.as_str())
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header names on inbound frames the dispatcher reads.
pub(crate) const SESSION: &str = "session";
pub(crate) const RECEIPT_ID: &str = "receipt-id";
pub(crate) const MESSAGE: &str = "message";

/// Value forced into `accept-version` on every CONNECT.
pub const ACCEPT_VERSION: &str = "1.1,1.2";

/// Header map with unique keys.
///
/// Keys keep the position of their first insertion; inserting an existing key
/// replaces its value in place. Iteration yields headers in that order, which
/// is also the order they are written on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<HeaderKey>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key.as_str()) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key.as_str().to_string(), value));
                None
            }
        }
    }

    /// Builder-style [`Headers::insert`].
    pub fn with(mut self, key: impl Into<HeaderKey>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key` only if it is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<HeaderKey>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains(key.as_str()) {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<HeaderKey>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<HeaderKey>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
