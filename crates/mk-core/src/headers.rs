//! Header mediation
//!
//! Two pure transforms over the header list the host hands to a blocking
//! hook. Header names compare case-insensitively, values are replaced in
//! place, relative order is kept and no header is ever dropped.

use crate::config::{AcceptHeader, EffectiveConfig, GeneralSettings};
use crate::types::{Header, SchemeMask};
use crate::url::extract_scheme;

pub const USER_AGENT: &str = "User-Agent";
pub const DNT: &str = "DNT";

/// Alternate `Accept-Encoding` value for a request over `scheme`.
///
/// Both schemes currently get the same configured value. The scheme stays in
/// the signature so per-scheme negotiation can be added without touching
/// callers.
pub fn accept_encoding_for(general: &GeneralSettings, _scheme: SchemeMask) -> Option<&str> {
    general.alt_accept(AcceptHeader::AcceptEncoding)
}

/// Outbound leg: rewrite fingerprintable request headers and add `DNT: 1`.
pub fn mutate_request_headers(config: &EffectiveConfig, url: &str, mut headers: Vec<Header>) -> Vec<Header> {
    if !config.is_active() {
        return headers;
    }

    let flags = &config.flags;
    let general = &config.general;
    let scheme = extract_scheme(url).unwrap_or(SchemeMask::HTTP);

    let mut has_dnt = false;
    for header in headers.iter_mut() {
        if header.is(DNT) {
            has_dnt = true;
            continue;
        }

        if flags.mock_user_agent && header.is(USER_AGENT) {
            replace_value(header, &general.alt_user_agent);
            continue;
        }

        if !flags.mock_accept_header {
            continue;
        }

        let alt = if header.is(AcceptHeader::Accept.header_name()) {
            general.alt_accept(AcceptHeader::Accept)
        } else if header.is(AcceptHeader::AcceptEncoding.header_name()) {
            accept_encoding_for(general, scheme)
        } else if header.is(AcceptHeader::AcceptLanguage.header_name()) {
            general.alt_accept(AcceptHeader::AcceptLanguage)
        } else {
            None
        };

        if let Some(alt) = alt {
            replace_value(header, alt);
        }
    }

    if flags.enable_dnt && !has_dnt {
        headers.push(Header::new(DNT, "1"));
    }

    headers
}

/// Inbound leg: a reflected `User-Agent` response header is replaced too.
pub fn mutate_response_headers(config: &EffectiveConfig, mut headers: Vec<Header>) -> Vec<Header> {
    if !config.is_active() || !config.flags.mock_user_agent {
        return headers;
    }

    for header in headers.iter_mut().filter(|h| h.is(USER_AGENT)) {
        replace_value(header, &config.general.alt_user_agent);
    }

    headers
}

#[inline]
fn replace_value(header: &mut Header, value: &str) {
    if header.value != value {
        header.value.clear();
        header.value.push_str(value);
    }
}
