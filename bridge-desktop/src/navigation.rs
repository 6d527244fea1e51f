//! In-Process Navigation Context

use async_trait::async_trait;
use bridge_traits::{error::Result, navigation::Navigator};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Navigator implementation holding the location in process memory
///
/// Desktop hosts embedding a webview drive the real navigation themselves and
/// mirror the webview's address into this holder; test harnesses use it to
/// script authorization-callback locations. `assign` and `replace` differ
/// only in intent here (both swap the held URL), but callers must still
/// treat `assign` as terminal to stay portable to web hosts.
pub struct InProcessNavigator {
    location: RwLock<Url>,
}

impl InProcessNavigator {
    /// Create a navigator positioned at the given location
    pub fn new(location: Url) -> Self {
        Self {
            location: RwLock::new(location),
        }
    }
}

#[async_trait]
impl Navigator for InProcessNavigator {
    async fn current_location(&self) -> Result<Url> {
        Ok(self.location.read().await.clone())
    }

    async fn assign(&self, url: Url) -> Result<()> {
        debug!(url = %url, "Navigating");
        *self.location.write().await = url;
        Ok(())
    }

    async fn replace(&self, url: Url) -> Result<()> {
        debug!(url = %url, "Rewriting location");
        *self.location.write().await = url;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_location() {
        let nav = InProcessNavigator::new(Url::parse("https://app.example.com/home").unwrap());

        let location = nav.current_location().await.unwrap();
        assert_eq!(location.as_str(), "https://app.example.com/home");
    }

    #[tokio::test]
    async fn test_assign_and_replace() {
        let nav = InProcessNavigator::new(Url::parse("https://app.example.com/home").unwrap());

        nav.assign(Url::parse("https://auth.example.com/consent").unwrap())
            .await
            .unwrap();
        assert_eq!(
            nav.current_location().await.unwrap().as_str(),
            "https://auth.example.com/consent"
        );

        nav.replace(Url::parse("https://app.example.com/home?tab=drafts").unwrap())
            .await
            .unwrap();
        assert_eq!(
            nav.current_location().await.unwrap().as_str(),
            "https://app.example.com/home?tab=drafts"
        );
    }
}
