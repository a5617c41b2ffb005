use crate::api::StepResponse;
use serde_json::Value;

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// Find the video URL in the final step's answer.
///
/// Lookup order: envelope `videoUrl`, `data.videoUrl`, `data.video_url`,
/// `data.data.video_url`, `data.url`. First non-empty string wins.
pub fn extract_video_url(resp: &StepResponse) -> Option<&str> {
    if let Some(url) = resp.video_url.as_deref().filter(|s| !s.trim().is_empty()) {
        return Some(url);
    }

    let data = resp.data.as_ref()?;
    non_empty(data.get("videoUrl"))
        .or_else(|| non_empty(data.get("video_url")))
        .or_else(|| non_empty(data.pointer("/data/video_url")))
        .or_else(|| non_empty(data.get("url")))
}

/// `true` when `url` starts with an RFC 3986 scheme followed by `://`,
/// in any letter case.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Make `url` absolute: server-relative paths get `origin`, scheme-less hosts
/// get `https://`. Absolute and protocol-relative URLs pass through.
pub fn normalize_video_url(url: &str, origin: &str) -> String {
    let url = url.trim();
    if url.starts_with('/') && !url.starts_with("//") {
        return format!("{}{}", origin.trim_end_matches('/'), url);
    }
    if url.starts_with("//") || has_scheme(url) {
        return url.to_string();
    }
    format!("https://{url}")
}

pub fn resolve_video_url(resp: &StepResponse, origin: &str) -> Option<String> {
    extract_video_url(resp).map(|url| normalize_video_url(url, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORIGIN: &str = "https://app.test";

    fn envelope(v: Value) -> StepResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn nested_video_url_is_found() {
        let resp = envelope(json!({
            "success": true,
            "data": {"data": {"video_url": "https://ex.com/a.mp4"}}
        }));
        assert_eq!(resolve_video_url(&resp, ORIGIN).as_deref(), Some("https://ex.com/a.mp4"));
    }

    #[test]
    fn top_level_relative_path_gets_origin() {
        let resp = envelope(json!({"success": true, "videoUrl": "/v/1.mp4"}));
        assert_eq!(resolve_video_url(&resp, ORIGIN).as_deref(), Some("https://app.test/v/1.mp4"));
    }

    #[test]
    fn lookup_order_is_respected() {
        let resp = envelope(json!({
            "success": true,
            "videoUrl": "",
            "data": {
                "video_url": "https://b.test/2.mp4",
                "data": {"video_url": "https://c.test/3.mp4"},
                "url": "https://d.test/4.mp4"
            }
        }));
        assert_eq!(extract_video_url(&resp), Some("https://b.test/2.mp4"));

        let resp = envelope(json!({
            "success": true,
            "data": {"videoUrl": "https://a.test/1.mp4", "video_url": "https://b.test/2.mp4"}
        }));
        assert_eq!(extract_video_url(&resp), Some("https://a.test/1.mp4"));

        let resp = envelope(json!({"success": true, "data": {"url": "cdn.test/5.mp4"}}));
        assert_eq!(resolve_video_url(&resp, ORIGIN).as_deref(), Some("https://cdn.test/5.mp4"));
    }

    #[test]
    fn missing_or_non_string_url_is_none() {
        let resp = envelope(json!({"success": true, "data": {"video_url": 42, "url": ""}}));
        assert_eq!(extract_video_url(&resp), None);
        assert_eq!(extract_video_url(&StepResponse::default()), None);
    }

    #[test]
    fn normalization_is_idempotent_on_absolute_urls() {
        let once = normalize_video_url("https://x.com/a.mp4", ORIGIN);
        let twice = normalize_video_url(&once, ORIGIN);
        assert_eq!(once, "https://x.com/a.mp4");
        assert_eq!(twice, once);
    }

    #[test]
    fn any_scheme_is_kept_regardless_of_case() {
        assert_eq!(normalize_video_url("HTTPS://x.com/a.mp4", ORIGIN), "HTTPS://x.com/a.mp4");
        assert_eq!(normalize_video_url("Http://x.com/a.mp4", ORIGIN), "Http://x.com/a.mp4");
        assert_eq!(normalize_video_url("s3://bucket/a.mp4", ORIGIN), "s3://bucket/a.mp4");
        assert_eq!(normalize_video_url("cdn.test/a.mp4", ORIGIN), "https://cdn.test/a.mp4");
        assert_eq!(
            normalize_video_url("cdn.test/a.mp4?next=http://x", ORIGIN),
            "https://cdn.test/a.mp4?next=http://x"
        );
    }

    #[test]
    fn protocol_relative_is_left_alone() {
        assert_eq!(normalize_video_url("//cdn.test/a.mp4", ORIGIN), "//cdn.test/a.mp4");
        assert_eq!(normalize_video_url("/a.mp4", "https://app.test/"), "https://app.test/a.mp4");
    }
}
