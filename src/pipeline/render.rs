//! Bulk render request: ask the remote endpoint for a ready-made PDF.
//!
//! One POST carries the magazine identity, the reader session identity, and
//! the full page-index list as indexed form fields (`pages[0]=0`,
//! `pages[1]=1`, …). The endpoint renders server-side and answers with the
//! raw document bytes; there is no pagination and no retry — a non-200
//! answer means the document cannot be produced and probing again will not
//! change that.

use crate::error::MagdownError;
use tracing::{debug, info};

/// Header profile of a stock browser session. The endpoint serves the HTML5
/// reader and answers differently to clients that do not look like one.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-GB,en;q=0.5";
const REFERER: &str = "https://pocketmags.com/";

/// Build the form body for a render request.
///
/// `pages[N] = index` for N = 0..count-1, plus the magazine and user/session
/// identifiers. Kept separate from the POST itself so tests can assert the
/// exact field layout without a network.
pub fn build_form(magazine_id: &str, user_id: &str, indices: &[u32]) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(indices.len() + 2);
    form.push(("magazineId".to_string(), magazine_id.to_string()));
    form.push(("userId".to_string(), user_id.to_string()));
    for (n, index) in indices.iter().enumerate() {
        form.push((format!("pages[{n}]"), index.to_string()));
    }
    form
}

/// Request one rendered document covering `indices` and return its bytes.
///
/// # Errors
/// - [`MagdownError::Transport`] when the request cannot complete.
/// - [`MagdownError::RenderFailed`] on any non-200 status.
/// - [`MagdownError::RenderNotPdf`] when the body lacks the `%PDF` magic —
///   typically an HTML error page served with status 200.
pub async fn fetch_document(
    client: &reqwest::Client,
    endpoint: &str,
    magazine_id: &str,
    user_id: &str,
    indices: &[u32],
) -> Result<Vec<u8>, MagdownError> {
    let form = build_form(magazine_id, user_id, indices);
    info!(pages = indices.len(), %endpoint, "requesting rendered document");

    let response = client
        .post(endpoint)
        .header("User-Agent", USER_AGENT)
        .header("Accept", ACCEPT)
        .header("Accept-Language", ACCEPT_LANGUAGE)
        .header("Referer", REFERER)
        .form(&form)
        .send()
        .await
        .map_err(|e| MagdownError::Transport {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(MagdownError::RenderFailed { status });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MagdownError::Transport {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(MagdownError::RenderNotPdf { magic });
    }

    debug!(len = bytes.len(), "document received");
    Ok(bytes)
}
