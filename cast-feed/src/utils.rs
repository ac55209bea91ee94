use crate::types::Cast;

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// Normalize a channel id for comparison
pub fn normalize_channel(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Channel id of a cast, lowercased.
///
/// An explicit `channel` wins; otherwise the id is derived from `parent_url`.
/// Casts without either have no channel.
pub fn channel_id(cast: &Cast) -> Option<String> {
    if let Some(channel) = &cast.channel {
        let id = normalize_channel(&channel.id);
        if !id.is_empty() {
            return Some(id);
        }
    }
    cast.parent_url.as_deref().and_then(channel_id_from_parent_url)
}

/// Derive a channel id from a URL-like parent reference.
///
/// `https://warpcast.com/~/channel/memes` gives `memes`; anything else gives
/// its last non-empty path segment (`chain://eip155:1/erc721:0xabc` gives
/// `erc721:0xabc`).
pub fn channel_id_from_parent_url(parent_url: &str) -> Option<String> {
    let path = match url::Url::parse(parent_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => parent_url.to_string(),
    };

    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();

    let id = match segments.iter().position(|segment| *segment == "channel") {
        Some(index) if index + 1 < segments.len() => segments[index + 1],
        _ => segments.last().copied()?,
    };

    let id = normalize_channel(id);
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Image links found in a cast's text and embeds, deduplicated in first-seen order
pub fn image_urls(cast: &Cast) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let from_text = cast.text.split_whitespace().filter_map(image_link);
    let from_embeds = cast
        .embeds
        .iter()
        .filter_map(|embed| embed.url.as_deref())
        .filter(|url| image_link(url).is_some())
        .map(|url| url.to_string());

    for url in from_text.chain(from_embeds) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }

    urls
}

/// Longest `http(s)://...<image extension>` run inside a whitespace-free token
fn image_link(token: &str) -> Option<String> {
    let start = token.find("https://").or_else(|| token.find("http://"))?;
    let candidate = &token[start..];
    let scheme_len = if candidate.starts_with("https://") { 8 } else { 7 };

    // at least one character between the scheme and the extension
    let end = IMAGE_EXTENSIONS
        .iter()
        .filter_map(|ext| {
            candidate
                .rfind(ext)
                .filter(|index| *index > scheme_len)
                .map(|index| index + ext.len())
        })
        .max()?;

    Some(candidate[..end].to_string())
}
