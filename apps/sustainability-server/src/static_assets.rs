use anyhow::Result;
use axum::extract::Request;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::middleware::{from_fn, Next};
use axum::response::{Html, Response};
use axum::Router;
use std::path::PathBuf;
use tower_http::services::{ServeDir, ServeFile};

const PLACEHOLDER_PAGE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Sustainability Dashboard</title>
  </head>
  <body style="font-family: system-ui; padding: 24px">
    <h1>Sustainability Dashboard</h1>
    <p>No dashboard build is configured. Pass <code>--static-root</code> or set <code>SUSTAINABILITY_STATIC_ROOT</code>. The API lives under <code>/api</code>.</p>
  </body>
</html>
"#;

/// Hashed bundle chunks emitted by the dashboard build.
const HASHED_ASSET_PREFIX: &str = "/assets/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachePolicy {
    Immutable,
    NoStore,
    Day,
}

impl CachePolicy {
    fn for_response(path: &str, content_type: &str) -> Self {
        if path.starts_with(HASHED_ASSET_PREFIX) {
            CachePolicy::Immutable
        } else if content_type.starts_with("text/html") {
            CachePolicy::NoStore
        } else {
            CachePolicy::Day
        }
    }

    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            CachePolicy::Immutable => "public, max-age=31536000, immutable",
            CachePolicy::NoStore => "no-store",
            CachePolicy::Day => "public, max-age=86400",
        })
    }
}

async fn cache_headers(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let policy = CachePolicy::for_response(&path, content_type);
    response
        .headers_mut()
        .entry(CACHE_CONTROL)
        .or_insert(policy.header_value());
    response
}

/// Dashboard build with client-side routes falling back to `index.html`; without
/// a build every path answers with a placeholder page.
pub fn service(static_root: Option<PathBuf>) -> Result<Router> {
    let Some(root) = static_root else {
        return Ok(Router::new().fallback(|| async { Html(PLACEHOLDER_PAGE) }));
    };
    let index = root.join("index.html");
    if !index.is_file() {
        anyhow::bail!("dashboard build at {} has no index.html", root.display());
    }
    let build = ServeDir::new(root).fallback(ServeFile::new(index));
    Ok(Router::new()
        .fallback_service(build)
        .layer(from_fn(cache_headers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let cache = resp
            .headers()
            .get(CACHE_CONTROL)
            .map(|value| value.to_str().unwrap().to_string());
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, cache, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn cache_policy_by_path_and_type() {
        assert_eq!(
            CachePolicy::for_response("/assets/index-3f2a.js", "text/javascript"),
            CachePolicy::Immutable
        );
        assert_eq!(
            CachePolicy::for_response("/kpi/energy", "text/html"),
            CachePolicy::NoStore
        );
        assert_eq!(
            CachePolicy::for_response("/favicon.ico", "image/x-icon"),
            CachePolicy::Day
        );
    }

    #[test]
    fn build_without_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(Some(dir.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("no index.html"));

        assert!(service(Some(PathBuf::from("/definitely/not/a/dashboard/build"))).is_err());
    }

    #[tokio::test]
    async fn client_routes_fall_back_to_index_and_assets_are_immutable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>dashboard</html>").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app-1a2b.js"), "console.log(1)").unwrap();

        let app = service(Some(dir.path().to_path_buf())).unwrap();

        let (status, cache, body) = get(app.clone(), "/kpi/energy").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("no-store"));
        assert_eq!(body, "<html>dashboard</html>");

        let (status, cache, body) = get(app, "/assets/app-1a2b.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("public, max-age=31536000, immutable"));
        assert_eq!(body, "console.log(1)");
    }

    #[tokio::test]
    async fn placeholder_served_without_build() {
        let (status, cache, body) = get(service(None).unwrap(), "/reports").await;
        assert_eq!(status, StatusCode::OK);
        assert!(cache.is_none());
        assert!(body.contains("Sustainability Dashboard"));
    }
}
