use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::error::{IngestError, Result};

/// Represents a parsed source locator
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUri {
    Local(PathBuf),
    Http(Url),
}

impl SourceUri {
    /// Parse a URI string into a SourceUri
    pub fn parse(uri: &str) -> Result<Self> {
        // Try parsing as URL first
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "http" | "https" => {
                    if url.host_str().is_none() {
                        return Err(IngestError::source_unavailable(
                            uri,
                            "HTTP URI missing host",
                        ));
                    }
                    Ok(SourceUri::Http(url))
                }
                "file" => {
                    let path = url.to_file_path().map_err(|_| {
                        IngestError::source_unavailable(uri, "invalid file:// URI")
                    })?;
                    Ok(SourceUri::Local(path))
                }
                // A Windows drive letter parses as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceUri::Local(PathBuf::from(uri))),
                scheme => Err(IngestError::source_unavailable(
                    uri,
                    format!("unsupported URI scheme: {scheme}"),
                )),
            }
        } else {
            // Treat as local file path
            Ok(SourceUri::Local(PathBuf::from(uri)))
        }
    }

    /// Final path segment, used for logging and format hints
    pub fn file_name(&self) -> Option<&str> {
        match self {
            SourceUri::Local(path) => path.file_name().and_then(|n| n.to_str()),
            SourceUri::Http(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty()),
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUri::Local(path) => write!(f, "{}", path.display()),
            SourceUri::Http(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_uri() {
        let uri = SourceUri::parse(
            "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow/yellow_tripdata_2021-01.csv.gz",
        )
        .unwrap();
        assert!(matches!(uri, SourceUri::Http(_)));
        assert_eq!(uri.file_name(), Some("yellow_tripdata_2021-01.csv.gz"));
    }

    #[test]
    fn test_parse_local_path() {
        let uri = SourceUri::parse("/data/file.csv").unwrap();
        assert_eq!(uri, SourceUri::Local(PathBuf::from("/data/file.csv")));
        assert_eq!(uri.file_name(), Some("file.csv"));
    }

    #[test]
    fn test_parse_relative_path() {
        let uri = SourceUri::parse("data/file.csv").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_file_uri() {
        let uri = SourceUri::parse("file:///data/file.csv").unwrap();
        assert!(matches!(uri, SourceUri::Local(_)));
    }

    #[test]
    fn test_parse_unsupported_scheme() {
        let result = SourceUri::parse("s3://bucket/file.csv");
        assert!(matches!(
            result,
            Err(IngestError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_locator() {
        let uri = SourceUri::parse("https://example.com/data/zones.csv").unwrap();
        assert_eq!(uri.to_string(), "https://example.com/data/zones.csv");
    }
}
