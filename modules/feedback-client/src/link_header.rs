//! Pagination metadata carried in response headers.

use std::collections::HashMap;

/// One entry of a `Link` header, e.g.
/// `<https://host/api/0/...?cursor=0:10:0>; rel="next"; results="true"; cursor="0:10:0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub href: String,
    /// `results` attribute. Absent means the server did not say.
    pub results: Option<bool>,
    pub cursor: Option<String>,
}

/// Parse a `Link` header into its entries keyed by `rel`.
/// Malformed entries are skipped.
pub fn parse_link_header(header: &str) -> HashMap<String, PageLink> {
    let mut links = HashMap::new();

    for entry in split_entries(header) {
        let mut parts = entry.split(';').map(str::trim);
        let Some(target) = parts.next() else {
            continue;
        };
        let Some(href) = target
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        else {
            continue;
        };

        let mut rel = None;
        let mut link = PageLink {
            href: href.to_string(),
            results: None,
            cursor: None,
        };

        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "rel" => rel = Some(value.to_string()),
                "results" => link.results = Some(value == "true"),
                "cursor" => link.cursor = Some(value.to_string()),
                _ => {}
            }
        }

        if let Some(rel) = rel {
            links.insert(rel, link);
        }
    }

    links
}

/// Split on commas that sit outside `<...>` and quoted values.
fn split_entries(header: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_angle = false;
    let mut in_quote = false;
    let mut begin = 0;

    for (i, c) in header.char_indices() {
        match c {
            '<' if !in_quote => in_angle = true,
            '>' if !in_quote => in_angle = false,
            '"' if !in_angle => in_quote = !in_quote,
            ',' if !in_angle && !in_quote => {
                entries.push(header[begin..i].trim());
                begin = i + 1;
            }
            _ => {}
        }
    }
    entries.push(header[begin..].trim());
    entries.retain(|e| !e.is_empty());
    entries
}

/// Whether the `Link` header advertises a next page with results.
pub fn has_next_page(header: Option<&str>) -> bool {
    header
        .map(parse_link_header)
        .and_then(|links| links.get("next").map(|next| next.results != Some(false)))
        .unwrap_or(false)
}

/// Decode an integer header value, falling back to `default`.
pub fn decode_integer(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
