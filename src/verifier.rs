//! One-shot hand-off of the verifier (pin) from the interactive authorization
//! step back to the flow.
//!
//! The presenter showing the authorization page holds a [`VerifierSender`] and
//! feeds it whatever it observes after each navigation; the flow side awaits
//! the matching [`VerifierReceiver`]. Dropping or abandoning the sender
//! resolves the receiver with [`Error::Abandoned`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use url::Url;

use crate::{Error, Result, OAUTH_VERIFIER_KEY};

const PIN_MARKER: &str = r#"aria-labelledby="code-desc""#;
const CODE_OPEN: &str = "<code>";
const CODE_CLOSE: &str = "</code>";

pub fn verifier_channel() -> (VerifierSender, VerifierReceiver) {
    let (tx, rx) = oneshot::channel();
    (VerifierSender { tx: Some(tx) }, VerifierReceiver { rx })
}

#[derive(Debug)]
pub struct VerifierSender {
    tx: Option<oneshot::Sender<String>>,
}

impl VerifierSender {
    /// Look for a verifier in page content or a navigated url.
    ///
    /// Content without one is ignored, so this can be called for every event
    /// the presenter sees. Returns `true` only for the call that delivered.
    pub fn observe(&mut self, content: &str) -> bool {
        match extract_verifier(content) {
            Some(verifier) => self.deliver(verifier),
            None => false,
        }
    }

    /// Deliver a verifier typed in by the user. Blank input is ignored.
    pub fn deliver<T: AsRef<str>>(&mut self, verifier: T) -> bool {
        let verifier = verifier.as_ref().trim();
        if verifier.is_empty() {
            return false;
        }
        match self.tx.take() {
            Some(tx) => tx.send(verifier.to_string()).is_ok(),
            None => false,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.tx.is_none()
    }

    /// Tear down the interactive step without a verifier.
    pub fn abandon(self) {}
}

/// Resolves with the verifier, or [`Error::Abandoned`].
#[derive(Debug)]
pub struct VerifierReceiver {
    rx: oneshot::Receiver<String>,
}

impl Future for VerifierReceiver {
    type Output = Result<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| Error::Abandoned))
    }
}

/// Pull a verifier out of observed content.
///
/// Understands a callback url (or bare query string) carrying
/// `oauth_verifier`, and the pin page markup
/// `<kbd aria-labelledby="code-desc"><code>PIN</code></kbd>`.
pub fn extract_verifier(content: &str) -> Option<String> {
    from_url(content)
        .or_else(|| from_query(content))
        .or_else(|| from_pin_markup(content))
        .filter(|v| !v.is_empty())
}

fn from_url(content: &str) -> Option<String> {
    let url = Url::parse(content.trim()).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == OAUTH_VERIFIER_KEY)
        .map(|(_, v)| v.trim().to_string())
}

fn from_query(content: &str) -> Option<String> {
    let needle = format!("{}=", OAUTH_VERIFIER_KEY);
    let start = content.find(&needle)? + needle.len();
    let rest = &content[start..];
    let end = rest
        .find(|c: char| c == '&' || c == '"' || c == '\'' || c == '<' || c.is_whitespace())
        .unwrap_or(rest.len());
    let value = url::form_urlencoded::parse(format!("v={}", &rest[..end]).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())?;
    Some(value)
}

fn from_pin_markup(content: &str) -> Option<String> {
    let marker = content.find(PIN_MARKER)?;
    let after_marker = &content[marker..];
    let open = after_marker.find(CODE_OPEN)? + CODE_OPEN.len();
    let inner = &after_marker[open..];
    let close = inner.find(CODE_CLOSE)?;
    Some(inner[..close].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_pin_page() {
        let page = r#"<html><body><p id="code-desc">Enter this PIN</p>
            <kbd aria-labelledby="code-desc"><code> 1234567 </code></kbd></body></html>"#;
        assert_eq!(extract_verifier(page), Some("1234567".to_string()));
    }

    #[test]
    fn extracts_from_callback_url_and_query() {
        assert_eq!(
            extract_verifier("https://app.example/cb?oauth_token=rt1&oauth_verifier=v%201"),
            Some("v 1".to_string())
        );
        assert_eq!(
            extract_verifier("oauth_token=rt1&oauth_verifier=abc&x=1"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn irrelevant_content_yields_nothing() {
        assert_eq!(extract_verifier(""), None);
        assert_eq!(extract_verifier("<html><body>Sign in</body></html>"), None);
        assert_eq!(extract_verifier("https://app.example/cb?oauth_token=rt1"), None);
        assert_eq!(
            extract_verifier(r#"<kbd aria-labelledby="code-desc"><code></code></kbd>"#),
            None
        );
        assert_eq!(extract_verifier("oauth_verifier=&x=1"), None);
    }

    #[tokio::test]
    async fn only_a_verifier_resolves_the_receiver() {
        let (mut sender, receiver) = verifier_channel();
        assert!(!sender.observe("<html>loading</html>"));
        assert!(!sender.deliver("   "));
        assert!(!sender.is_delivered());
        assert!(sender.deliver("123456"));
        assert!(sender.is_delivered());
        assert!(!sender.deliver("654321"));
        assert_eq!(receiver.await.unwrap(), "123456");
    }

    #[tokio::test]
    async fn abandoning_resolves_with_abandoned() {
        let (sender, receiver) = verifier_channel();
        sender.abandon();
        assert!(matches!(receiver.await, Err(Error::Abandoned)));

        let (sender, receiver) = verifier_channel();
        drop(sender);
        assert!(matches!(receiver.await, Err(Error::Abandoned)));
    }
}
