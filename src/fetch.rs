//! Encoding-aware page fetching.
//!
//! Legacy departmental sites routinely declare the wrong charset (GBK
//! pages served as ISO-8859-1, UTF-8 with a BOM, ...). [`Fetcher`] decodes
//! the raw body with an ordered list of candidate encodings and accepts the
//! first strict decoding that contains one of the caller's sanity markers.
//! When no candidate passes, the encoding is guessed from the bytes, with
//! the declared charset only breaking ties.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::{debug, instrument, warn};

use crate::error::ScrapeError;
use crate::session::Session;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One entry of the candidate list.
#[derive(Debug, Clone, Copy)]
pub enum Candidate {
    /// UTF-8 with an optional leading byte-order mark.
    Utf8Sig,
    Encoding(&'static Encoding),
}

impl Candidate {
    pub fn from_label(label: &str) -> Result<Self, ScrapeError> {
        let normalized = label.trim().to_ascii_lowercase();
        if normalized == "utf-8-sig" || normalized == "utf_8_sig" {
            return Ok(Candidate::Utf8Sig);
        }
        Encoding::for_label(normalized.as_bytes())
            .map(Candidate::Encoding)
            .ok_or_else(|| ScrapeError::UnknownEncoding(label.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Candidate::Utf8Sig => "utf-8-sig",
            Candidate::Encoding(enc) => enc.name(),
        }
    }

    /// Strict decode: `None` on any malformed sequence.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Candidate::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(|s| s.to_string())
            }
            Candidate::Encoding(enc) => enc
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

/// Parse a list of labels, failing on the first unknown one.
pub fn parse_candidates(labels: &[String]) -> Result<Vec<Candidate>, ScrapeError> {
    labels.iter().map(|l| Candidate::from_label(l)).collect()
}

/// Decode with the first candidate whose text contains any marker.
pub fn decode_with_candidates(
    bytes: &[u8],
    candidates: &[Candidate],
    markers: &[&str],
) -> Option<(Candidate, String)> {
    candidates.iter().find_map(|candidate| {
        let text = candidate.decode(bytes)?;
        if markers.iter().any(|m| text.contains(m)) {
            Some((*candidate, text))
        } else {
            None
        }
    })
}

/// Lossy decode with the encoding detected from the bytes themselves.
///
/// A BOM wins. Otherwise `chardetng` guesses, biased by the host's `tld`.
/// The `declared` charset is used only when the guess leaves malformed
/// sequences and the declared one decodes cleanly.
pub fn decode_apparent(
    bytes: &[u8],
    declared: Option<&str>,
    tld: Option<&str>,
) -> (&'static Encoding, String) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (encoding, text.into_owned());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(tld.map(str::as_bytes), true);
    let (text, had_errors) = guessed.decode_without_bom_handling(bytes);
    if had_errors {
        if let Some(encoding) = declared.and_then(|c| Encoding::for_label(c.trim().as_bytes())) {
            let (alt, alt_errors) = encoding.decode_without_bom_handling(bytes);
            if !alt_errors {
                return (encoding, alt.into_owned());
            }
        }
    }
    (guessed, text.into_owned())
}

/// Last label of the URL's host, when it is a plain lowercase name.
fn tld_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let label = parsed.host_str()?.rsplit('.').next()?.to_string();
    if !label.is_empty() && label.bytes().all(|b| b.is_ascii_lowercase()) {
        Some(label)
    } else {
        None
    }
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

struct RawPage {
    final_url: String,
    charset: Option<String>,
    bytes: Vec<u8>,
}

impl RawPage {
    fn decode(&self) -> String {
        let tld = tld_of(&self.final_url);
        let (encoding, text) = decode_apparent(&self.bytes, self.charset.as_deref(), tld.as_deref());
        debug!(encoding = encoding.name(), declared = ?self.charset, "decoded with detected encoding");
        text
    }
}

/// A fetched page after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects.
    pub final_url: String,
    pub text: String,
}

/// Owns the session so extractors can issue follow-up requests through the
/// same rate limiter and cookie jar.
pub struct Fetcher {
    session: Session,
    candidates: Vec<Candidate>,
}

impl Fetcher {
    pub fn new(session: Session, candidates: Vec<Candidate>) -> Self {
        Self {
            session,
            candidates,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// GET `url` and decode with the encoding detected from its body.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let raw = self.fetch_raw(url).await?;
        let text = raw.decode();
        Ok(FetchedPage {
            final_url: raw.final_url,
            text,
        })
    }

    /// GET `url` and decode with the candidate list, validating against
    /// `markers`.
    #[instrument(level = "debug", skip(self, markers))]
    pub async fn fetch_with_markers(
        &self,
        url: &str,
        markers: &[&str],
    ) -> Result<FetchedPage, ScrapeError> {
        let raw = self.fetch_raw(url).await?;
        let text = match decode_with_candidates(&raw.bytes, &self.candidates, markers) {
            Some((candidate, text)) => {
                debug!(encoding = candidate.name(), "decoded with candidate encoding");
                text
            }
            None => raw.decode(),
        };
        Ok(FetchedPage {
            final_url: raw.final_url,
            text,
        })
    }

    /// Re-fetch a page that was decoded with the wrong charset. On transport
    /// failure the already-fetched `html` is returned unchanged.
    pub async fn refetch_decoded(&self, url: &str, html: &str, markers: &[&str]) -> String {
        match self.fetch_with_markers(url, markers).await {
            Ok(page) => page.text,
            Err(e) => {
                warn!(%url, error = %e, "re-fetch failed, using page as first decoded");
                html.to_string()
            }
        }
    }

    async fn fetch_raw(&self, url: &str) -> Result<RawPage, ScrapeError> {
        let response = self.session.get(url).await?;
        let final_url = response.url().to_string();
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of)
            .map(|s| s.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;
        Ok(RawPage {
            final_url,
            charset,
            bytes: bytes.to_vec(),
        })
    }
}
