//! Price visibility checking for fetched product pages
//!
//! Pure classification of an HTTP status + body into a probe outcome. A
//! block page can come back as a 200 with misleading content, so the block
//! signatures are checked before any price matching.

use crate::proxy::models::{FailureReason, ProbeOutcome};
use once_cell::sync::Lazy;
use regex::Regex;

/// Prices outside this range are treated as parse noise, not real prices
const MIN_PRICE: f64 = 1.0;
const MAX_PRICE: f64 = 10_000.0;

/// A real product page is hundreds of KB; block stubs are far smaller
const MIN_PLAUSIBLE_BODY_BYTES: usize = 2048;

/// Content markers of an anti-automation challenge page (matched against
/// the lowercased body)
const BLOCK_SIGNATURES: &[&str] = &[
    "captcha",
    "robot check",
    "api-services-support@amazon.com",
    "to discuss automated access",
    "enter the characters you see below",
];

/// Markers of a product that is genuinely sold without a visible price
const UNAVAILABLE_PATTERNS: &[&str] = &[
    "currently unavailable",
    "see price in cart",
    "pricing unavailable",
    "temporarily out of stock",
];

/// Price inside the offscreen span of an `a-price` block, the main price
/// region on current product pages
static OFFSCREEN_PRICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"class="[^"]*a-offscreen[^"]*"[^>]*>\s*(?:CDN|US|C)?\$\s*([\d,]+(?:\.\d+)?)"#,
    )
    .expect("Invalid offscreen price regex")
});

/// Legacy `priceblock_*` price ids still served on some page variants
static PRICEBLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"id="priceblock_(?:ourprice|dealprice|businessprice|saleprice)"[^>]*>\s*(?:CDN|US|C)?\$\s*([\d,]+(?:\.\d+)?)"#,
    )
    .expect("Invalid priceblock regex")
});

/// Classify one fetch attempt. Transport-level failures are mapped by the
/// scheduler before the body ever reaches this function.
pub fn check_price_visibility(status: u16, body: &str) -> ProbeOutcome {
    if !(200..300).contains(&status) {
        return ProbeOutcome::Fail(FailureReason::ProxyError);
    }

    let lowered = body.to_lowercase();
    if body.len() < MIN_PLAUSIBLE_BODY_BYTES
        || BLOCK_SIGNATURES.iter().any(|sig| lowered.contains(sig))
    {
        return ProbeOutcome::Fail(FailureReason::BotBlocked);
    }

    if UNAVAILABLE_PATTERNS.iter().any(|pat| lowered.contains(pat)) {
        return ProbeOutcome::Fail(FailureReason::NoPriceFound);
    }

    if find_price(body).is_some() {
        ProbeOutcome::Pass
    } else {
        ProbeOutcome::Fail(FailureReason::NoPriceFound)
    }
}

/// Find the first plausible price in the expected page regions. Malformed
/// or truncated HTML simply fails to match; nothing here can panic.
fn find_price(body: &str) -> Option<f64> {
    for regex in [&*OFFSCREEN_PRICE_REGEX, &*PRICEBLOCK_REGEX] {
        for caps in regex.captures_iter(body) {
            let raw = caps[1].replace(',', "");
            if let Ok(price) = raw.parse::<f64>() {
                if (MIN_PRICE..=MAX_PRICE).contains(&price) {
                    return Some(price);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A body large enough to clear the small-body heuristic
    fn product_page(price_markup: &str) -> String {
        format!(
            "<html><body><div id=\"dp\">{}</div>{}</body></html>",
            price_markup,
            "<p>product details</p>".repeat(200)
        )
    }

    #[test]
    fn test_visible_price_passes() {
        let body = product_page(
            r#"<span class="a-price"><span class="a-offscreen">$19.99</span></span>"#,
        );
        assert_eq!(check_price_visibility(200, &body), ProbeOutcome::Pass);
    }

    #[test]
    fn test_priceblock_variant_passes() {
        let body = product_page(r#"<span id="priceblock_dealprice">$49.99</span>"#);
        assert_eq!(check_price_visibility(200, &body), ProbeOutcome::Pass);
    }

    #[test]
    fn test_block_signature_beats_price() {
        // Even with a valid price present, the block marker wins
        let body = product_page(
            r#"<span class="a-offscreen">$19.99</span><h4>Robot Check</h4>"#,
        );
        assert_eq!(
            check_price_visibility(200, &body),
            ProbeOutcome::Fail(FailureReason::BotBlocked)
        );
    }

    #[test]
    fn test_small_body_is_blocked() {
        assert_eq!(
            check_price_visibility(200, "<html><body>ok</body></html>"),
            ProbeOutcome::Fail(FailureReason::BotBlocked)
        );
    }

    #[test]
    fn test_non_2xx_fails_as_proxy_error() {
        let body = product_page(r#"<span class="a-offscreen">$19.99</span>"#);
        assert_eq!(
            check_price_visibility(503, &body),
            ProbeOutcome::Fail(FailureReason::ProxyError)
        );
    }

    #[test]
    fn test_missing_price_fails() {
        let body = product_page("<span>no pricing markup here</span>");
        assert_eq!(
            check_price_visibility(200, &body),
            ProbeOutcome::Fail(FailureReason::NoPriceFound)
        );
    }

    #[test]
    fn test_unavailable_product_fails() {
        let body = product_page("<span>Currently unavailable.</span>");
        assert_eq!(
            check_price_visibility(200, &body),
            ProbeOutcome::Fail(FailureReason::NoPriceFound)
        );
    }

    #[test]
    fn test_out_of_range_price_not_counted() {
        let body = product_page(r#"<span class="a-offscreen">$0.01</span>"#);
        assert_eq!(
            check_price_visibility(200, &body),
            ProbeOutcome::Fail(FailureReason::NoPriceFound)
        );
    }

    #[test]
    fn test_thousands_separator_parsed() {
        let body = product_page(r#"<span class="a-offscreen">$1,299.00</span>"#);
        assert_eq!(check_price_visibility(200, &body), ProbeOutcome::Pass);
    }

    #[test]
    fn test_empty_body_is_blocked() {
        // The limiting case of an abnormally small body
        assert_eq!(
            check_price_visibility(200, ""),
            ProbeOutcome::Fail(FailureReason::BotBlocked)
        );
        assert_eq!(
            check_price_visibility(200, "   "),
            ProbeOutcome::Fail(FailureReason::BotBlocked)
        );
    }

    #[test]
    fn test_truncated_html_does_not_panic() {
        let body = format!("<html><div class=\"a-price\"><span class={}", "x".repeat(3000));
        assert_eq!(
            check_price_visibility(200, &body),
            ProbeOutcome::Fail(FailureReason::NoPriceFound)
        );
    }
}
