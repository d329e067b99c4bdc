//! # XML Extraction
//!
//! Just enough XML for Trading API responses: find elements by tag name and
//! read their text. Trading responses are flat and well-formed, so plain
//! text scanning is sufficient.

/// Text of the first `<tag>` element, unescaped and trimmed.
///
/// Matches `<tag>` and `<tag attr="...">` but not `<tagSuffix>`.
pub fn element(xml: &str, tag: &str) -> Option<String> {
    let (_, inner_start, self_closing) = find_open_tag(xml, tag, 0)?;
    if self_closing {
        return Some(String::new());
    }
    let close = format!("</{tag}>");
    let after = &xml[inner_start..];
    let end = after.find(&close)?;
    Some(unescape(after[..end].trim()))
}

/// Raw inner content of every `<tag>` element, in document order.
///
/// Nested elements with the same name are not supported.
pub fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut from = 0;

    while let Some((_, inner_start, self_closing)) = find_open_tag(xml, tag, from) {
        if self_closing {
            out.push("");
            from = inner_start;
            continue;
        }
        let Some(end) = xml[inner_start..].find(&close) else {
            break;
        };
        out.push(&xml[inner_start..inner_start + end]);
        from = inner_start + end + close.len();
    }
    out
}

/// Value of `attr` on the first `<tag>` element.
pub fn attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let (tag_start, inner_start, _) = find_open_tag(xml, tag, 0)?;
    let open_tag = &xml[tag_start..inner_start];

    let needle = format!("{attr}=");
    let pos = open_tag.find(&needle)?;
    let rest = &open_tag[pos + needle.len()..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(unescape(&value[..end]))
}

/// Escapes text for use inside an element.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Resolves the predefined entities, numeric references and CDATA sections.
pub fn unescape(text: &str) -> String {
    if let Some(inner) = text
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        return inner.to_string();
    }
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        match decode_entity(entity) {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// `Ack` value of a Trading response (`Success`, `Warning`, `Failure`).
pub fn ack(xml: &str) -> Option<String> {
    element(xml, "Ack")
}

/// True when the response reports `Failure` (or `PartialFailure`).
pub fn is_failure(xml: &str) -> bool {
    matches!(ack(xml).as_deref(), Some("Failure") | Some("PartialFailure"))
}

/// First error message in a Trading response.
pub fn error_message(xml: &str) -> Option<String> {
    let errors = elements(xml, "Errors");
    let first = errors.first().copied().unwrap_or(xml);
    element(first, "LongMessage").or_else(|| element(first, "ShortMessage"))
}

/// Error codes of all `<Errors>` blocks.
pub fn error_codes(xml: &str) -> Vec<String> {
    elements(xml, "Errors")
        .into_iter()
        .filter_map(|block| element(block, "ErrorCode"))
        .collect()
}

// =============================================================================
// Helpers
// =============================================================================

/// Finds `<tag` at or after `from` followed by `>`, `/` or whitespace.
///
/// Returns `(tag_start, inner_start, self_closing)`.
fn find_open_tag(xml: &str, tag: &str, from: usize) -> Option<(usize, usize, bool)> {
    let open = format!("<{tag}");
    let mut search = from;

    while let Some(rel) = xml.get(search..)?.find(&open) {
        let tag_start = search + rel;
        let after_name = tag_start + open.len();
        match xml[after_name..].chars().next() {
            Some('>') => return Some((tag_start, after_name + 1, false)),
            Some(c) if c == '/' || c.is_whitespace() => {
                let close = xml[after_name..].find('>')?;
                let gt = after_name + close;
                let self_closing = xml[..gt].ends_with('/');
                return Some((tag_start, gt + 1, self_closing));
            }
            _ => search = after_name,
        }
    }
    None
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"<Item>
        <ItemID>110011</ItemID>
        <Title>Charizard &amp; Friends</Title>
        <SellingStatus>
            <CurrentPrice currencyID="USD">12.50</CurrentPrice>
            <ListingStatus>Active</ListingStatus>
        </SellingStatus>
        <PictureDetails/>
    </Item>"#;

    #[test]
    fn test_element() {
        assert_eq!(element(ITEM, "ItemID"), Some("110011".to_string()));
        assert_eq!(element(ITEM, "Title"), Some("Charizard & Friends".to_string()));
        assert_eq!(element(ITEM, "CurrentPrice"), Some("12.50".to_string()));
        assert_eq!(element(ITEM, "PictureDetails"), Some(String::new()));
        assert_eq!(element(ITEM, "Quantity"), None);
    }

    #[test]
    fn test_element_does_not_match_prefix() {
        // <Item> must not match <ItemID>
        let xml = "<ItemID>1</ItemID><Item><Title>x</Title></Item>";
        assert_eq!(elements(xml, "Item"), vec!["<Title>x</Title>"]);
    }

    #[test]
    fn test_elements() {
        let xml = "<ItemArray><Item><ItemID>1</ItemID></Item><Item><ItemID>2</ItemID></Item></ItemArray>";
        let items = elements(xml, "Item");
        assert_eq!(items.len(), 2);
        assert_eq!(element(items[1], "ItemID"), Some("2".to_string()));
    }

    #[test]
    fn test_attribute() {
        assert_eq!(
            attribute(ITEM, "CurrentPrice", "currencyID"),
            Some("USD".to_string())
        );
        assert_eq!(attribute(ITEM, "CurrentPrice", "missing"), None);
    }

    #[test]
    fn test_escape_unescape() {
        let raw = r#"Mox <Sapphire> "Revised" & 'more'"#;
        assert_eq!(unescape(&escape(raw)), raw);
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("&bogus; ok"), "&bogus; ok");
        assert_eq!(unescape("<![CDATA[<p>hi</p>]]>"), "<p>hi</p>");
    }

    #[test]
    fn test_failure_details() {
        let xml = r#"<GetItemResponse>
            <Ack>Failure</Ack>
            <Errors>
                <ShortMessage>Item not found.</ShortMessage>
                <LongMessage>The item ID is invalid.</LongMessage>
                <ErrorCode>17</ErrorCode>
            </Errors>
        </GetItemResponse>"#;
        assert!(is_failure(xml));
        assert_eq!(error_message(xml), Some("The item ID is invalid.".to_string()));
        assert_eq!(error_codes(xml), vec!["17".to_string()]);
    }
}
