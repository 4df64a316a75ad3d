use std::fmt;

pub type TargetName = String;

/// Opaque connection string for one target database.
///
/// The engine only hands it to its connector; nothing downstream parses it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    url: String,
    redacted: String,
}

impl ConnectionDescriptor {
    pub fn postgres(user: &str, password: &str, host: &str, port: u16, target: &str) -> Self {
        let redacted = if password.is_empty() {
            format!("postgres://{user}@{host}:{port}/{target}")
        } else {
            format!("postgres://{user}:***@{host}:{port}/{target}")
        };
        Self {
            url: format!("postgres://{user}:{password}@{host}:{port}/{target}"),
            redacted,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

impl From<String> for ConnectionDescriptor {
    fn from(url: String) -> Self {
        Self {
            redacted: if url.is_empty() { String::new() } else { "***".to_owned() },
            url,
        }
    }
}

impl From<&str> for ConnectionDescriptor {
    fn from(url: &str) -> Self {
        Self::from(url.to_owned())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionDescriptor")
            .field(&self.redacted)
            .finish()
    }
}
