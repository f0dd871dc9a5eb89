//! Utility helpers used across the crate.
//!
//! HTTP metadata probes and filename extraction.
use crate::error::TransferError;
use crate::plan::{DEFAULT_FRAGMENT_SIZE, FetchTarget};
use percent_encoding::percent_decode_str;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap};
use sanitize_filename::sanitize;
use url::Url;

/// What a HEAD request tells us about a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    pub size: u64,
    /// Server advertised `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
}

impl RemoteInfo {
    /// Byte-range target for this file. Servers that do not accept ranges get
    /// a single fragment covering the whole file.
    pub fn into_target(self, url: &str, fragment_size: Option<u64>) -> FetchTarget {
        let fragment_size = if self.accepts_ranges {
            fragment_size.unwrap_or(DEFAULT_FRAGMENT_SIZE)
        } else {
            self.size.max(1)
        };
        FetchTarget::byte_range(url, self.size).with_fragment_size(fragment_size)
    }
}

/// Issues a HEAD request and reads `Content-Length` and `Accept-Ranges`.
///
/// # Errors
///
/// Returns an error if:
/// * The network request fails.
/// * The server returns a non-success status code.
/// * The server does not provide a parsable `Content-Length` header.
pub async fn probe_remote(
    url: &str,
    client: &reqwest::Client,
) -> Result<RemoteInfo, TransferError> {
    let response = client.head(url).send().await?;

    if !response.status().is_success() {
        return Err(TransferError::Status {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let headers = response.headers();
    let size = content_length(headers, url)?;
    let accepts_ranges = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

    Ok(RemoteInfo {
        size,
        accepts_ranges,
    })
}

/// Fetches the Content-Length of a URL using a HEAD request.
pub async fn get_file_size(url: &str, client: &reqwest::Client) -> Result<u64, TransferError> {
    probe_remote(url, client).await.map(|info| info.size)
}

fn content_length(headers: &HeaderMap, url: &str) -> Result<u64, TransferError> {
    headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| TransferError::MissingContentLength {
            url: url.to_string(),
        })?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| TransferError::InvalidContentLength {
            url: url.to_string(),
        })
}

/// Local filename for a download: the percent-decoded last path component of
/// `url`, with characters the filesystem rejects stripped out. Query strings
/// are ignored. Yields `output.bin` when nothing usable is left.
pub fn get_filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .map(|mut s| s.next_back().unwrap_or("").to_string())
        })
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().to_string())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_filename_extraction() {
        assert_eq!(
            get_filename_from_url("https://example.com/archive.zip"),
            "archive.zip"
        );

        // query parameters are ignored
        assert_eq!(
            get_filename_from_url("https://example.com/video.mp4?token=abc"),
            "video.mp4"
        );

        assert_eq!(
            get_filename_from_url("https://example.com/my%20episode%2001.mp4"),
            "my episode 01.mp4"
        );

        assert_eq!(get_filename_from_url("https://example.com/"), "output.bin");
        assert_eq!(get_filename_from_url("not a url"), "output.bin");
    }

    #[test]
    fn test_target_without_range_support_is_single_fragment() {
        let info = RemoteInfo {
            size: 10_000_000,
            accepts_ranges: false,
        };
        let fragments = info
            .into_target("http://x/f", Some(1024))
            .fragments()
            .unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].expected_size, Some(10_000_000));

        let info = RemoteInfo {
            accepts_ranges: true,
            ..info
        };
        let fragments = info.into_target("http://x/f", None).fragments().unwrap();
        assert_eq!(fragments.len(), 3);
    }

    #[tokio::test]
    async fn test_probe_remote_reads_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/file.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Accept-Ranges", "bytes")
                    .set_body_bytes(vec![0u8; 1234]),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let info = probe_remote(&format!("{}/file.bin", server.uri()), &client)
            .await
            .unwrap();
        assert_eq!(info.size, 1234);
        assert!(info.accepts_ranges);

        let err = get_file_size(&format!("{}/missing", server.uri()), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Status { status, .. } if status.as_u16() == 404));
    }
}
