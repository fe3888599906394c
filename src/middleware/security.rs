use axum::Router;
use http::{header, HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

fn security_header_values() -> [(HeaderName, HeaderValue); 7] {
    [
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
    ]
}

/// Adds the browser hardening headers to every response that does not set them itself.
pub fn with_security_headers(mut router: Router) -> Router {
    for (name, value) in security_header_values() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_headers_on_success_and_error() {
        let app = with_security_headers(
            Router::new()
                .route("/api/items", get(|| async { "items" }))
                .route(
                    "/embed",
                    get(|| async { ([(header::X_FRAME_OPTIONS, "DENY")], "embed") }),
                ),
        );

        for uri in ["/api/items", "/missing"] {
            let res = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            for (name, value) in security_header_values() {
                assert_eq!(res.headers().get(&name), Some(&value), "{} on {}", name, uri);
            }
            if uri == "/missing" {
                assert_eq!(res.status(), StatusCode::NOT_FOUND);
            }
        }

        let res = app
            .oneshot(Request::builder().uri("/embed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");
    }
}
