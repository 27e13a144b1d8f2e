/// A playable URL and the prefix it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayUrl {
    pub cdn_prefix: String,
    pub play_url: String,
}

pub trait CdnService: Send + Sync {
    fn build_play_url(&self, key: &str) -> PlayUrl;
}

/// Joins a fixed prefix and an object key.
#[derive(Debug, Clone)]
pub struct PrefixCdn {
    prefix: String,
}

impl PrefixCdn {
    /// A trailing `/` on `prefix` is dropped.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

impl CdnService for PrefixCdn {
    fn build_play_url(&self, key: &str) -> PlayUrl {
        let key = key.trim_start_matches('/');
        let play_url = if key.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, key)
        };
        PlayUrl {
            cdn_prefix: self.prefix.clone(),
            play_url,
        }
    }
}
