//! Hop-by-hop header filtering shared by the request and response paths.
use hyper::{
    HeaderMap,
    header::{self, HeaderName},
};

/// Headers that describe a single transport connection and must not be
/// forwarded (RFC 9110 section 7.6.1).
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Copy `source` minus hop-by-hop headers and any header listed in its
/// `Connection` value.
pub fn copy_end_to_end(source: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    let mut filtered = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) || listed.contains(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Strip hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    *headers = copy_end_to_end(headers);
}
