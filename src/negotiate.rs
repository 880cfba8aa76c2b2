//! Content negotiation for the `Accept` header family (RFC 7231 §5.3).
//!
//! Every function takes the raw header value and the server's offers in order
//! of preference, and returns the offer to use:
//!
//! - An absent or empty header accepts anything: the first offer wins.
//! - Each offer takes the quality of the most specific range that matches it.
//! - Offers are ranked by quality, then by the specificity of that range
//!   (exact, then subtype or prefix wildcard, then `*`), then by the order the
//!   server listed them in.
//! - `q=0` excludes an offer. If nothing is left, there is no match.
//! - Malformed entries, including out-of-range qualities, are skipped.
//!
//! ```rust
//! use axum_dispatch::negotiate;
//!
//! let accept = Some("application/json;q=0.8, text/html;q=1.0");
//! let chosen = negotiate::media_type(accept, &["application/json", "text/html"]);
//! assert_eq!(chosen, Some("text/html"));
//! ```

/// Quality in thousandths, `1000` being `q=1`.
pub type Quality = u16;

const MAX_QUALITY: Quality = 1000;

/// One entry of an `Accept`-family header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preference<'h> {
    token: &'h str,
    quality: Quality,
}

impl<'h> Preference<'h> {
    /// The range or token, parameters removed.
    pub fn token(&self) -> &'h str {
        self.token
    }

    /// Quality in thousandths.
    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// Parses a header value into its entries, in header order.
pub fn parse(header: &str) -> Vec<Preference<'_>> {
    header.split(',').filter_map(parse_entry).collect()
}

fn parse_entry(entry: &str) -> Option<Preference<'_>> {
    let mut parts = entry.split(';');
    let token = parts.next()?.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    let mut quality = MAX_QUALITY;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("q") {
            quality = parse_quality(value.trim())?;
        }
    }
    Some(Preference { token, quality })
}

fn parse_quality(value: &str) -> Option<Quality> {
    let (int, frac) = value.split_once('.').unwrap_or((value, ""));
    if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole = match int {
        "0" => 0,
        "1" => MAX_QUALITY,
        _ => return None,
    };
    let mut thousandths = 0;
    for (i, digit) in frac.bytes().enumerate() {
        thousandths += Quality::from(digit - b'0') * [100, 10, 1][i];
    }
    let quality = whole + thousandths;
    (quality <= MAX_QUALITY).then_some(quality)
}

/// Specificity of `range` for `offer`, or `None` when it does not match.
type Matcher = fn(range: &str, offer: &str) -> Option<u8>;

fn negotiate<'o>(header: Option<&str>, offers: &[&'o str], matches: Matcher) -> Option<&'o str> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return offers.first().copied();
    }
    let preferences = parse(header);
    if preferences.is_empty() {
        return offers.first().copied();
    }

    let mut best: Option<(Quality, u8, &'o str)> = None;
    for &offer in offers {
        let mut chosen: Option<(u8, Quality)> = None;
        for preference in &preferences {
            if let Some(specificity) = matches(preference.token, offer) {
                if chosen.is_none_or(|(current, _)| specificity > current) {
                    chosen = Some((specificity, preference.quality));
                }
            }
        }

        let Some((specificity, quality)) = chosen else {
            continue;
        };
        if quality == 0 {
            continue;
        }
        if best.is_none_or(|(q, s, _)| (quality, specificity) > (q, s)) {
            best = Some((quality, specificity, offer));
        }
    }
    best.map(|(_, _, offer)| offer)
}

fn split_media(value: &str) -> Option<(&str, &str)> {
    let essence = value.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    let (kind, subtype) = (kind.trim(), subtype.trim());
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((kind, subtype))
}

fn match_media(range: &str, offer: &str) -> Option<u8> {
    if range == "*" {
        return Some(0);
    }
    let (range_type, range_subtype) = split_media(range)?;
    let (offer_type, offer_subtype) = split_media(offer)?;

    match (range_type, range_subtype) {
        ("*", "*") => Some(0),
        ("*", _) => None,
        (t, "*") => t.eq_ignore_ascii_case(offer_type).then_some(1),
        (t, s) => (t.eq_ignore_ascii_case(offer_type) && s.eq_ignore_ascii_case(offer_subtype))
            .then_some(2),
    }
}

fn match_exact(range: &str, offer: &str) -> Option<u8> {
    if range == "*" {
        Some(0)
    } else {
        range.eq_ignore_ascii_case(offer).then_some(2)
    }
}

// RFC 4647 basic filtering: `en` also matches `en-US`.
fn match_language(range: &str, offer: &str) -> Option<u8> {
    if range == "*" {
        return Some(0);
    }
    if range.eq_ignore_ascii_case(offer) {
        return Some(2);
    }
    let prefix = offer.get(..range.len())?;
    (prefix.eq_ignore_ascii_case(range) && offer.as_bytes().get(range.len()) == Some(&b'-'))
        .then_some(1)
}

/// Negotiates against an `Accept` header. Offers are media types.
pub fn media_type<'o>(accept: Option<&str>, offers: &[&'o str]) -> Option<&'o str> {
    negotiate(accept, offers, match_media)
}

/// Negotiates against an `Accept-Charset` header.
pub fn charset<'o>(accept_charset: Option<&str>, offers: &[&'o str]) -> Option<&'o str> {
    negotiate(accept_charset, offers, match_exact)
}

/// Negotiates against an `Accept-Encoding` header.
pub fn encoding<'o>(accept_encoding: Option<&str>, offers: &[&'o str]) -> Option<&'o str> {
    negotiate(accept_encoding, offers, match_exact)
}

/// Negotiates against an `Accept-Language` header.
pub fn language<'o>(accept_language: Option<&str>, offers: &[&'o str]) -> Option<&'o str> {
    negotiate(accept_language, offers, match_language)
}
