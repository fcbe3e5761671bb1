use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{info, warn};

use common::FetchConfig;

use crate::error::FetchError;

/// Raw result of a successful GET.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// Body exactly as received, for parsers that sniff their own encoding.
    pub bytes: Vec<u8>,
    /// Body decoded with the charset of the `Content-Type` header (UTF-8 if absent).
    pub body: String,
    pub content_type: Option<String>,
}

impl FetchedPage {
    /// Whether the body is worth handing to an HTML/text extractor.
    /// A missing content-type is assumed to be HTML.
    pub fn is_textual(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.starts_with("text/") || ct.contains("html") || ct.contains("xml")
            }
        }
    }
}

/// HTTP GET with a browser-like identity, a bounded timeout and a size cap.
/// One instance is shared by every request; `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct ContentFetcher {
    client: Client,
    max_response_bytes: u64,
}

impl ContentFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build reqwest client: {}", e))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes(),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "fetch: non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size: len,
                    max: self.max_response_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
        {
            let size = (bytes.len() + chunk.len()) as u64;
            if size > self.max_response_bytes {
                warn!(url, size, "fetch: body exceeds size cap, aborting read");
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size,
                    max: self.max_response_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = decode_body(&bytes, content_type.as_deref());
        info!(url, bytes = bytes.len(), content_type = ?content_type, "fetch: page retrieved");

        Ok(FetchedPage {
            url: url.to_string(),
            bytes,
            body,
            content_type,
        })
    }
}

/// The `charset` parameter of a `Content-Type` value, if any.
fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode with the declared charset; a BOM wins, unknown labels fall back to UTF-8.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_of)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "fetch: body had malformed sequences");
    }
    text.into_owned()
}
