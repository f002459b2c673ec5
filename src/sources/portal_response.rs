//! Tolerant decoding of portal response bodies
//!
//! Stalker-style portals answer with plain JSON, JSON wrapped in a JS
//! callback (`name({...});`), or arbitrary text depending on vendor and
//! content-type. [`decode_portal_response`] never fails: text it cannot make
//! sense of is carried under the `js` field and flagged as opaque so callers
//! can still inspect it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

static CALLBACK_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*\w+\((\{.*\})\);?\s*$").expect("literal pattern"));

/// Decoded portal payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalResponse {
    body: Value,
    opaque: bool,
}

impl PortalResponse {
    /// The `js` envelope most portal actions answer with.
    pub fn js(&self) -> Option<&Value> {
        self.body.get("js").filter(|v| !v.is_null())
    }

    /// Look up a dotted path such as `js.token`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.body, |value, key| value.get(key))
            .filter(|v| !v.is_null())
    }

    /// Non-empty string at a dotted path; numbers are rendered as text.
    pub fn text(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Session token from `js.token`, falling back to a top-level `token`.
    pub fn token(&self) -> Option<String> {
        if self.opaque {
            return None;
        }
        self.text("js.token").or_else(|| self.text("token"))
    }

    /// True when the body was not JSON in any recognised shape.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }
}

/// Decode a portal body. Never fails.
///
/// Order: strict JSON, JS callback wrapper, outermost `{...}` block, then
/// the opaque sentinel `{"js": <text>}`.
pub fn decode_portal_response(text: &str) -> PortalResponse {
    if let Ok(body) = serde_json::from_str::<Value>(text.trim()) {
        return PortalResponse {
            body,
            opaque: false,
        };
    }

    if let Some(captures) = CALLBACK_WRAPPER.captures(text)
        && let Some(inner) = captures.get(1)
    {
        match serde_json::from_str::<Value>(inner.as_str()) {
            Ok(body) => {
                return PortalResponse {
                    body,
                    opaque: false,
                };
            }
            Err(e) => debug!("Failed to parse JS callback wrapper: {}", e),
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        match serde_json::from_str::<Value>(&text[start..=end]) {
            Ok(body) => {
                return PortalResponse {
                    body,
                    opaque: false,
                };
            }
            Err(e) => debug!("Failed to parse embedded JSON block: {}", e),
        }
    }

    PortalResponse {
        body: json!({ "js": text }),
        opaque: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn callback_wrapper_decodes_like_plain_json() {
        let wrapped = decode_portal_response(r#"callback({"js":{"token":"abc"}});"#);
        let plain = decode_portal_response(r#"{"js":{"token":"abc"}}"#);
        assert_eq!(wrapped, plain);
        assert_eq!(wrapped.token().as_deref(), Some("abc"));
        assert!(!wrapped.is_opaque());
    }

    #[rstest]
    #[case("<!-- stb -->\n{\"js\":{\"cmd\":\"ffmpeg http://x/1\"}}\n<!-- end -->")]
    #[case("  jsonp_1({\n\"js\": {\"cmd\": \"ffmpeg http://x/1\"}\n})  ")]
    fn extracts_embedded_objects(#[case] body: &str) {
        let decoded = decode_portal_response(body);
        assert_eq!(decoded.text("js.cmd").as_deref(), Some("ffmpeg http://x/1"));
    }

    #[test]
    fn unparseable_text_becomes_opaque_sentinel() {
        let decoded = decode_portal_response("Access denied {not json}");
        assert!(decoded.is_opaque());
        assert_eq!(
            decoded.js(),
            Some(&Value::String("Access denied {not json}".into()))
        );
        assert!(decoded.token().is_none());
    }

    #[test]
    fn top_level_token_is_accepted() {
        let decoded = decode_portal_response(r#"{"token":"t0"}"#);
        assert_eq!(decoded.token().as_deref(), Some("t0"));
        assert!(!decoded.is_opaque());
    }

    #[test]
    fn empty_token_is_ignored() {
        let decoded = decode_portal_response(r#"{"js":{"token":""}}"#);
        assert!(decoded.token().is_none());
        assert_eq!(decoded.field("js.token"), Some(&Value::String(String::new())));
    }
}
