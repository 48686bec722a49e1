// src/utils/device.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::BROWSER_VENDOR_MARKER;

static TABLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ipad|tablet|kindle|silk|playbook")
        .expect("tablet pattern is valid")
});

static ANDROID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)android").expect("android pattern is valid"));

static MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)mobi|iphone|ipod|android|windows phone|blackberry|opera mini")
        .expect("mobile pattern is valid")
});

/// Coarse client device class recorded on each exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    SafeExamBrowser,
    Tablet,
    Mobile,
    Desktop,
    Unknown,
}

impl DeviceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceCategory::SafeExamBrowser => "safe_exam_browser",
            DeviceCategory::Tablet => "tablet",
            DeviceCategory::Mobile => "mobile",
            DeviceCategory::Desktop => "desktop",
            DeviceCategory::Unknown => "unknown",
        }
    }
}

/// Classifies a raw user-agent string.
pub fn classify_user_agent(user_agent: &str) -> DeviceCategory {
    let ua = user_agent.trim();
    if ua.is_empty() {
        return DeviceCategory::Unknown;
    }
    if ua.contains(BROWSER_VENDOR_MARKER) {
        return DeviceCategory::SafeExamBrowser;
    }
    let mobile = MOBILE_RE.is_match(ua);
    // Android tablets omit the "Mobile" token.
    let android_tablet = ANDROID_RE.is_match(ua) && !ua.to_ascii_lowercase().contains("mobile");
    if TABLET_RE.is_match(ua) || android_tablet {
        return DeviceCategory::Tablet;
    }
    if mobile {
        return DeviceCategory::Mobile;
    }
    DeviceCategory::Desktop
}
