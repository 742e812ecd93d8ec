//! Extracting a master's device ID from its web interface.
//!
//! Vendors expose the ID in different places. The JSON endpoints carry a
//! `device_id` or `deviceId` field (some answer XML with a `<device_id>`
//! element instead); failing that, the ID can usually be found as six
//! dash-separated hex pairs on a status page.

use once_cell::sync::Lazy;
use regex::Regex;

/// Device-info endpoints, in the order they are tried.
pub const DEVICE_ID_PATHS: [&str; 6] = [
    "/iolink/deviceinfo",
    "/api/iolink/deviceinfo",
    "/deviceinfo",
    "/api/deviceinfo",
    "/api/iolink",
    "/iolink/api",
];

/// Pages searched for an ID pattern once the endpoints give nothing.
pub const STATUS_PAGES: [&str; 4] = ["/", "/index.html", "/status", "/info"];

static XML_DEVICE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<device_id>\s*([^<]*?)\s*</device_id>").unwrap());

// Most specific first: a labelled ID beats any hex sequence on the page.
static PAGE_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"device[_-]?id[:\s]*([0-9a-f]{2}(?:-[0-9a-f]{2}){5})").unwrap(),
        Regex::new(r"iolink[:\s]*([0-9a-f]{2}(?:-[0-9a-f]{2}){5})").unwrap(),
        Regex::new(r"([0-9a-f]{2}(?:-[0-9a-f]{2}){5})").unwrap(),
    ]
});

/// Device ID from a device-info response body (JSON or XML).
pub fn device_id_from_body(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let id = ["device_id", "deviceId"]
            .into_iter()
            .find_map(|field| json.get(field))
            .and_then(|value| match value {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty());
        if id.is_some() {
            return id;
        }
    }

    XML_DEVICE_ID
        .captures(body)
        .map(|caps| caps[1].to_string())
        .filter(|id| !id.is_empty())
}

/// Device ID found on an HTML status page, lowercased.
pub fn device_id_from_page(page: &str) -> Option<String> {
    let content = page.to_lowercase();
    PAGE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(&content))
        .map(|caps| caps[1].to_string())
}
