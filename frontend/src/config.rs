use crate::session;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Where the report backend lives.
///
/// Resolved once at startup: a `api_url` entry in localStorage wins, then the
/// `API_URL` variable seen at build time, then [`DEFAULT_API_URL`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.is_empty() { DEFAULT_API_URL } else { trimmed };
        Self {
            base_url: base_url.to_string(),
        }
    }

    pub fn load() -> Self {
        let configured = session::stored_api_url().or_else(|| option_env!("API_URL").map(String::from));
        match configured {
            Some(url) => Self::new(&url),
            None => Self::default(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
