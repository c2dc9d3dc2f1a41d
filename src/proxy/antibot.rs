//! Anti-bot request shaping
//!
//! Builds browser-like request descriptors for each probe attempt: a user
//! agent drawn from a pool of real browser fingerprints, matching Accept
//! headers for that browser family, a rotating Accept-Language and Referer,
//! and a randomized pre-request delay. Pure generator, no network I/O.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Mutex;
use std::time::Duration;

/// Bounds for the randomized pre-request delay, in milliseconds
const DELAY_MIN_MS: u64 = 300;
const DELAY_MAX_MS: u64 = 1200;

/// A user agent with the headers its browser family actually sends
struct BrowserProfile {
    user_agent: &'static str,
    accept: &'static str,
    sec_ch_ua: Option<&'static str>,
    platform: &'static str,
}

const ACCEPT_CHROME: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const ACCEPT_FIREFOX: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_SAFARI: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Google Chrome";v="120", " Not A;Brand";v="99", "Chromium";v="120""#),
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Google Chrome";v="119", " Not A;Brand";v="99", "Chromium";v="119""#),
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Google Chrome";v="120", " Not A;Brand";v="99", "Chromium";v="120""#),
        platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Google Chrome";v="120", " Not A;Brand";v="99", "Chromium";v="120""#),
        platform: "\"Linux\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
        accept: ACCEPT_FIREFOX,
        sec_ch_ua: None,
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.0; rv:120.0) Gecko/20100101 Firefox/120.0",
        accept: ACCEPT_FIREFOX,
        sec_ch_ua: None,
        platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:119.0) Gecko/20100101 Firefox/119.0",
        accept: ACCEPT_FIREFOX,
        sec_ch_ua: None,
        platform: "\"Linux\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        accept: ACCEPT_SAFARI,
        sec_ch_ua: None,
        platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Microsoft Edge";v="120", " Not A;Brand";v="99", "Chromium";v="120""#),
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/90.0.0.0",
        accept: ACCEPT_CHROME,
        sec_ch_ua: Some(r#""Opera";v="90", " Not A;Brand";v="99", "Chromium";v="120""#),
        platform: "\"Windows\"",
    },
];

const LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-US,en;q=0.9,fr;q=0.8",
    "en-GB,en;q=0.9",
    "en-CA,en;q=0.9,fr-CA;q=0.8",
    "en-AU,en;q=0.9",
    "en-IN,en;q=0.9",
];

const REFERERS: &[&str] = &[
    "https://www.google.com/search?q=best+electronics",
    "https://www.google.com/search?q=amazon+devices+sale",
    "https://www.bing.com/search?q=top+electronics+deals",
    "https://www.reddit.com/r/amazon/",
    "https://www.youtube.com/results?search_query=kindle+reviews",
    "https://www.amazon.com/s?k=electronics",
];

/// Request descriptor for one probe attempt
#[derive(Debug, Clone)]
pub struct ShapedRequest {
    pub headers: HeaderMap,
    pub delay: Duration,
}

/// Rotating header generator. One instance is shared across all workers;
/// the only state is the index of the last user agent issued, so two
/// consecutive attempts never carry the identical fingerprint.
#[derive(Debug, Default)]
pub struct HeaderShaper {
    last_profile: Mutex<Option<usize>>,
}

impl HeaderShaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self) -> ShapedRequest {
        let mut rng = rand::thread_rng();

        let mut index = rng.gen_range(0..PROFILES.len());
        {
            let mut last = self.last_profile.lock().unwrap_or_else(|e| e.into_inner());
            if *last == Some(index) {
                index = (index + 1) % PROFILES.len();
            }
            *last = Some(index);
        }
        let profile = &PROFILES[index];

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(profile.user_agent),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(profile.accept),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(LANGUAGES.choose(&mut rng).copied().unwrap_or(LANGUAGES[0])),
        );
        headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate, br"),
        );
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("document"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-user"),
            HeaderValue::from_static("?1"),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static(profile.platform),
        );
        if let Some(sec_ch_ua) = profile.sec_ch_ua {
            headers.insert(
                HeaderName::from_static("sec-ch-ua"),
                HeaderValue::from_static(sec_ch_ua),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-mobile"),
                HeaderValue::from_static("?0"),
            );
        }

        // Real users mostly arrive from somewhere, but not always
        if rng.gen_bool(0.8) {
            headers.insert(
                reqwest::header::REFERER,
                HeaderValue::from_static(REFERERS.choose(&mut rng).copied().unwrap_or(REFERERS[0])),
            );
            headers.insert(
                HeaderName::from_static("sec-fetch-site"),
                HeaderValue::from_static("cross-site"),
            );
        } else {
            headers.insert(
                HeaderName::from_static("sec-fetch-site"),
                HeaderValue::from_static("none"),
            );
        }
        if rng.gen_bool(0.3) {
            headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        }

        let delay = Duration::from_millis(rng.gen_range(DELAY_MIN_MS..=DELAY_MAX_MS));

        ShapedRequest { headers, delay }
    }
}
