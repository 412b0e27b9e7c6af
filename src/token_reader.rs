use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;

use crate::{Error, Result, TokenPair, TokenReaderError, TokenReaderResult};

const OAUTH_TOKEN_KEY: &str = "oauth_token";

const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";

/// Represents response of token acquisition.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    pub fn token_pair(&self) -> TokenPair {
        TokenPair::new(self.oauth_token.as_str(), self.oauth_token_secret.as_str())
    }
}

/// Status-aware body reading for `reqwest::Response`.
// this trait is sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    /// Read the raw body, failing with [`Error::Protocol`] outside 200-299.
    async fn successful_text(self) -> Result<String>;

    /// Read a url-encoded `oauth_token` / `oauth_token_secret` body.
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait]
impl TokenReader for Response {
    async fn successful_text(self) -> Result<String> {
        let status = self.status();
        let text = self.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(Error::Protocol {
                status: status.as_u16(),
                body: text,
            })
        }
    }

    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        let text = self.successful_text().await?;
        Ok(read_oauth_token(text)?)
    }
}

pub(crate) fn read_oauth_token(text: String) -> TokenReaderResult<TokenResponse> {
    let mut destructured = url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), _) if t.is_empty() => {
            Err(TokenReaderError::EmptyTokenValue(OAUTH_TOKEN_KEY, text))
        }
        (_, Some(s)) if s.is_empty() => Err(TokenReaderError::EmptyTokenValue(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
        (Some(t), Some(s)) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: s,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

mod private {
    use reqwest::Response;

    pub trait Sealed {}
    impl Sealed for Response {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_request_token_with_extra_fields() {
        let body = "oauth_token=NPcudxy0yU5T3tBzho7iCotZ3cnetKwcTIRlX0iwRl0\
                    &oauth_token_secret=veNRnAWe6inFuo8o2u8SLLZLjolYDmDP7SzL0YfYI\
                    &oauth_callback_confirmed=true";
        let parsed = read_oauth_token(body.to_string()).unwrap();
        assert_eq!(
            parsed.token_pair(),
            TokenPair::new(
                "NPcudxy0yU5T3tBzho7iCotZ3cnetKwcTIRlX0iwRl0",
                "veNRnAWe6inFuo8o2u8SLLZLjolYDmDP7SzL0YfYI"
            )
        );
        assert_eq!(parsed.remain.len(), 1);
        assert_eq!(
            parsed.remain.get("oauth_callback_confirmed").map(String::as_str),
            Some("true")
        );

        let derived = serde_urlencoded::from_str::<TokenResponse>(body).unwrap();
        assert_eq!(derived, parsed);
    }

    #[test]
    fn keeps_odd_but_present_values() {
        let parsed = read_oauth_token(
            "oauth_token==&oauth_token_secret=s&user_id=&&screen_name".to_string(),
        )
        .unwrap();
        assert_eq!(parsed.oauth_token, "=");
        assert_eq!(parsed.oauth_token_secret, "s");
        assert_eq!(parsed.remain.get("user_id").map(String::as_str), Some(""));
        assert_eq!(parsed.remain.get("screen_name").map(String::as_str), Some(""));
        assert_eq!(parsed.remain.len(), 2);
    }

    #[test]
    fn rejects_empty_token_or_secret() {
        for (body, empty) in [
            ("oauth_token=rt1&oauth_token_secret=", OAUTH_TOKEN_SECRET_KEY),
            ("oauth_token&oauth_token_secret=rts1", OAUTH_TOKEN_KEY),
            ("oauth_token=&oauth_token_secret=", OAUTH_TOKEN_KEY),
        ] {
            match read_oauth_token(body.to_string()) {
                Err(TokenReaderError::EmptyTokenValue(key, text)) => {
                    assert_eq!(key, empty);
                    assert_eq!(text, body);
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[test]
    fn decodes_escaped_values() {
        let parsed = read_oauth_token("oauth_token=rt%2F1&oauth_token_secret=s%3D".to_string())
            .unwrap();
        assert_eq!(parsed.token_pair(), TokenPair::new("rt/1", "s="));
    }

    #[test]
    fn reports_the_missing_key() {
        for (body, missing) in [
            ("oauth_token_secret=rts1", OAUTH_TOKEN_KEY),
            ("oauth_token=rt1", OAUTH_TOKEN_SECRET_KEY),
            ("<html>Whoa there!</html>", OAUTH_TOKEN_KEY),
        ] {
            match read_oauth_token(body.to_string()) {
                Err(TokenReaderError::TokenKeyNotFound(key, text)) => {
                    assert_eq!(key, missing);
                    assert_eq!(text, body);
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }
}
