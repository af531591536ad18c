use crate::error::Result;
use url::Url;

/// The page's current address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    pub fn parse(href: &str) -> Result<Self> {
        Ok(Self { url: Url::parse(href)? })
    }

    /// Move to `target`, resolved against the current address
    pub fn navigate(&mut self, target: &str) -> Result<()> {
        self.url = self.url.join(target)?;
        Ok(())
    }

    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    /// Query string with its leading `?`, empty when absent
    pub fn search(&self) -> String {
        match self.url.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        }
    }

    /// Fragment with its leading `#`, empty when absent
    pub fn hash(&self) -> String {
        match self.url.fragment() {
            Some(f) if !f.is_empty() => format!("#{}", f),
            _ => String::new(),
        }
    }
}
