//! Environment detection
//!
//! Tells whether this process runs on a GCE instance, so discovery can be
//! enabled without explicit configuration.

use super::http::GcpHttpClient;
use super::metadata::METADATA_ENDPOINT;
use std::path::Path;

const GOOGLE_INTERNAL_DOMAIN: &str = "google.internal";

fn file_mentions(path: &Path, needle: &str) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => content.contains(needle),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", path.display(), e);
            false
        }
    }
}

/// Whether the resolver or hosts file points at Google's internal DNS
pub fn google_internal_dns_configured() -> bool {
    file_mentions(Path::new("/etc/resolv.conf"), GOOGLE_INTERNAL_DOMAIN)
        || file_mentions(Path::new("/etc/hosts"), GOOGLE_INTERNAL_DOMAIN)
}

/// Whether the metadata endpoint answers with a non-empty body
pub async fn metadata_endpoint_available(http: &GcpHttpClient, endpoint: &str) -> bool {
    match http.get_text(endpoint, &[("Metadata-Flavor", "Google")]).await {
        Ok(body) => !body.is_empty(),
        Err(e) => {
            tracing::debug!("Metadata endpoint {} not available: {}", endpoint, e);
            false
        }
    }
}

/// Whether discovery can run here without configuration
pub async fn is_auto_detection_applicable(http: &GcpHttpClient) -> bool {
    google_internal_dns_configured() && metadata_endpoint_available(http, METADATA_ENDPOINT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mentions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"search c.my-project.internal google.internal\n").unwrap();

        assert!(file_mentions(file.path(), GOOGLE_INTERNAL_DOMAIN));
        assert!(!file_mentions(file.path(), "amazonaws.com"));
        assert!(!file_mentions(Path::new("/no/such/file"), GOOGLE_INTERNAL_DOMAIN));
    }
}
