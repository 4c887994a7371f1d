//! CMS/platform fingerprinting.
//!
//! Matches known path fragments and CDN hostnames in the initial response,
//! and records the well-known API endpoints for a matched platform.

use shared::Platform;

/// A matched platform with its well-known API endpoint paths
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformMatch {
    pub platform: Platform,
    pub api_endpoints: Vec<String>,
}

struct Fingerprint {
    platform: Platform,
    /// Substrings looked for in the response body
    body_markers: &'static [&'static str],
    /// Substrings looked for in header values (server, x-powered-by)
    header_markers: &'static [&'static str],
    api_endpoints: &'static [&'static str],
}

const FINGERPRINTS: &[Fingerprint] = &[
    Fingerprint {
        platform: Platform::WordPress,
        body_markers: &["/wp-content/", "/wp-includes/", "wp-json"],
        header_markers: &["wordpress"],
        api_endpoints: &[
            "/wp-json/wp/v2/posts",
            "/wp-json/wp/v2/pages",
            "/wp-json/wp/v2/categories",
        ],
    },
    Fingerprint {
        platform: Platform::Shopify,
        body_markers: &["cdn.shopify.com", "myshopify.com", "shopify-section"],
        header_markers: &["shopify"],
        api_endpoints: &["/products.json", "/collections.json"],
    },
    Fingerprint {
        platform: Platform::Drupal,
        body_markers: &["/sites/default/files", "drupal-settings-json", "data-drupal"],
        header_markers: &["drupal"],
        api_endpoints: &["/jsonapi", "/jsonapi/node/article"],
    },
    Fingerprint {
        platform: Platform::Ghost,
        body_markers: &["/ghost/api", "ghost.css", "casper"],
        header_markers: &["ghost"],
        api_endpoints: &["/ghost/api/content/posts"],
    },
    Fingerprint {
        platform: Platform::Wix,
        body_markers: &["wixstatic.com", "wix.com"],
        header_markers: &["x-wix"],
        api_endpoints: &[],
    },
    Fingerprint {
        platform: Platform::Squarespace,
        body_markers: &["squarespace.com", "sqsp.net"],
        header_markers: &["squarespace"],
        api_endpoints: &["/api/site/layout"],
    },
];

/// Detect a platform from the initial response body and selected header
/// values. First fingerprint to match wins.
pub fn detect(body: &str, header_values: &[String]) -> Option<PlatformMatch> {
    let body_lower = body.to_lowercase();
    let headers_lower: Vec<String> = header_values.iter().map(|h| h.to_lowercase()).collect();

    for fp in FINGERPRINTS {
        let body_hit = fp.body_markers.iter().any(|m| body_lower.contains(m));
        let header_hit = fp
            .header_markers
            .iter()
            .any(|m| headers_lower.iter().any(|h| h.contains(m)));

        if body_hit || header_hit {
            return Some(PlatformMatch {
                platform: fp.platform,
                api_endpoints: fp.api_endpoints.iter().map(|e| e.to_string()).collect(),
            });
        }
    }

    None
}

/// Goal-specific well-known paths for a platform, appended to priority URLs
pub fn well_known_paths(platform: Platform) -> Vec<&'static str> {
    match platform {
        Platform::WordPress => vec!["/blog", "/category/news"],
        Platform::Shopify => vec!["/collections/all"],
        Platform::Ghost => vec!["/rss"],
        Platform::Drupal => vec!["/node"],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_wordpress_from_body() {
        let body = r#"<link rel="stylesheet" href="/wp-content/themes/x/style.css">"#;
        let m = detect(body, &[]).unwrap();
        assert_eq!(m.platform, Platform::WordPress);
        assert!(m.api_endpoints.contains(&"/wp-json/wp/v2/posts".to_string()));
    }

    #[test]
    fn test_detect_shopify_from_cdn() {
        let body = r#"<img src="https://cdn.shopify.com/s/files/1/img.png">"#;
        let m = detect(body, &[]).unwrap();
        assert_eq!(m.platform, Platform::Shopify);
    }

    #[test]
    fn test_detect_from_header() {
        let m = detect("<html></html>", &["X-Wix-Request-Id".to_string()]).unwrap();
        assert_eq!(m.platform, Platform::Wix);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(detect("<html><body>plain</body></html>", &[]), None);
    }
}
