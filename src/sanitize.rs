//! Input sanitization for tool arguments.
//!
//! Every string inside an argument object is stripped of executable and markup
//! content before it is hashed into a cache key or handed to a tool. Structure
//! is preserved: objects keep their keys, arrays their order, and non-string
//! scalars are returned untouched.
//!
//! Only HTML-shaped content is removed. Angle brackets that are not HTML
//! elements (`Vec<String>`, `a < b`) survive, since tool arguments routinely
//! carry source code.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Elements whose entire body is executable or embedded content.
static EXECUTABLE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<(script|style|iframe|object|embed|noscript|template)\b[^>]*>",
        r".*?</(script|style|iframe|object|embed|noscript|template)\s*>",
    ))
    .expect("valid executable block regex")
});

/// Opening, closing or self-closing tags of known HTML elements. The name must
/// be followed by whitespace, `/` or `>`, so `Option<String>` is not a tag.
/// Browsers accept `/` between attributes (`<img/src=x/onerror=...>`).
static MARKUP_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(a|abbr|applet|area|audio|b|base|basefont|bgsound|blink|body|br|button|",
        r"canvas|center|code|dialog|div|em|embed|font|form|frame|frameset|h[1-6]|head|hr|",
        r"html|i|iframe|img|input|isindex|keygen|label|layer|li|link|marquee|math|meta|",
        r"noscript|object|ol|option|p|param|pre|script|section|select|source|span|strong|",
        r"style|svg|table|tbody|td|template|textarea|th|title|tr|u|ul|video|xml)",
        r"(?:[\s/][^<>]*)?>",
    ))
    .expect("valid markup tag regex")
});

/// HTML comments, which can hide conditional script.
static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

/// Script-capable URI schemes.
static SCRIPT_URIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(javascript|vbscript|livescript)\s*:|data\s*:\s*text/html")
        .expect("valid uri regex")
});

/// Inline event handler attributes (`onclick="..."`) inside a tag that is not
/// a known element, e.g. `<x-widget onclick=...>`. The attribute may follow
/// whitespace or `/`. Outside a tag `on...=` is ordinary text (`let onset = 5`).
static EVENT_HANDLERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(<[a-z][a-z0-9-]*[^<>]*?)[\s/]+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s<>]+)"#,
    )
    .expect("valid event handler regex")
});

/// Strip executable and markup content from a single string.
pub fn sanitize_str(input: &str) -> String {
    let out = EXECUTABLE_BLOCKS.replace_all(input, "");
    let out = COMMENTS.replace_all(&out, "");
    let out = MARKUP_TAGS.replace_all(&out, "");
    let mut out = out.into_owned();
    // One handler per tag is removed per pass.
    while EVENT_HANDLERS.is_match(&out) {
        out = EVENT_HANDLERS.replace_all(&out, "$1").into_owned();
    }
    SCRIPT_URIS.replace_all(&out, "").into_owned()
}

/// Recursively sanitize every string value in `value`.
///
/// Object keys are left as they are: two keys that clean to the same text
/// would otherwise collide and drop an entry.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (key, sanitize_value(val)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}
