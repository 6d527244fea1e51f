//! Navigation Context Abstraction
//!
//! Provides access to the host's navigation context: the current location,
//! full navigations, and history rewrites.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// Navigation context trait
///
/// Abstracts the surface the application is embedded in:
/// - Web: `window.location` / History API
/// - Desktop: embedded webview navigation
/// - Tests: an in-process URL holder
///
/// The authorization flow depends on this capability twice: initiating
/// authorization transfers control to the authorization server with a full
/// navigation, and completing it reads the `code` query parameter off the
/// current location and then rewrites the visible location so a reload
/// cannot replay the code.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::navigation::Navigator;
///
/// async fn consent_code(nav: &dyn Navigator) -> Result<Option<String>> {
///     let location = nav.current_location().await?;
///     Ok(location
///         .query_pairs()
///         .find(|(k, _)| k == "code")
///         .map(|(_, v)| v.into_owned()))
/// }
/// ```
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Get the current location
    async fn current_location(&self) -> Result<Url>;

    /// Navigate to a URL (full navigation)
    ///
    /// On web hosts this unloads the current document; callers must treat it
    /// as a terminal step.
    async fn assign(&self, url: Url) -> Result<()>;

    /// Rewrite the visible location without triggering a navigation
    ///
    /// Mirrors `history.replaceState`: the document stays loaded, only the
    /// address changes.
    async fn replace(&self, url: Url) -> Result<()>;
}
