use common::competition::SpecError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server base URL invalid: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("server returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("competition specification malformed: {0}")]
    MalformedSpec(#[from] SpecError),
    #[error("missing credential: set {0}")]
    MissingCredentials(&'static str),
    #[error("unexpected response shape: {0}")]
    Unexpected(String),
}
