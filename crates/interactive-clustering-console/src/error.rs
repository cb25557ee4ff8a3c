use std::fmt;

/// Errors surfaced by the console.
///
/// `Transport` and `Protocol` halt the polling loop; `Application` comes from a
/// user-triggered pipeline command and is followed by a view reload.
#[derive(Debug)]
pub enum Error {
    /// The request never produced an HTTP response (connect, timeout, body read).
    Transport(String),
    /// The backend answered outside the status contract.
    Protocol(String),
    /// A pipeline command was refused by the backend.
    Application { code: u16, detail: String },
    Config(String),
    Io(String),
    Terminal(String),
    Other(String),
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self::Other(msg.into())
    }

    pub fn protocol<M: Into<String>>(msg: M) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transport<M: Into<String>>(msg: M) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config<M: Into<String>>(msg: M) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Application { code, detail } => {
                if detail.is_empty() {
                    write!(f, "request refused with status {code}")
                } else {
                    write!(f, "request refused with status {code}: {detail}")
                }
            }
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Io(msg) => write!(f, "{msg}"),
            Self::Terminal(msg) => write!(f, "terminal error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("malformed JSON: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn application_error_includes_detail_when_present() {
        let e = Error::Application {
            code: 403,
            detail: "clustering not done".into(),
        };
        assert_eq!(
            e.to_string(),
            "request refused with status 403: clustering not done"
        );
        let bare = Error::Application {
            code: 500,
            detail: String::new(),
        };
        assert_eq!(bare.to_string(), "request refused with status 500");
    }

    #[test]
    fn json_errors_map_to_protocol() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(Error::from(err).is_protocol());
    }
}
