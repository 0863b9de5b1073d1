// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::models::MessageId;

/// Build the permalink of a message.
///
/// # Examples
/// ```
/// use feed_scanner::utils::url::permalink;
///
/// assert_eq!(
///     permalink("https://t.me/", "some_channel", 42),
///     "https://t.me/some_channel/42"
/// );
/// ```
pub fn permalink(base: &str, channel: &str, message_id: MessageId) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), channel, message_id)
}

/// Build the preview page URL listing messages after `after`.
pub fn preview_page(base: &str, channel: &str, after: MessageId) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}/{}", base.trim_end_matches('/'), channel))?;
    url.query_pairs_mut()
        .append_pair("after", &after.to_string());
    Ok(url)
}

/// Collect decoded query values whose key matches one of `names`, ignoring case.
///
/// Values are trimmed and empty ones dropped.
pub fn query_values(url: &Url, names: &[String]) -> Vec<String> {
    url.query_pairs()
        .filter(|(key, _)| names.iter().any(|n| n.eq_ignore_ascii_case(key)))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Extract the message id from a `channel/123` post reference.
pub fn post_id(post_ref: &str) -> Option<MessageId> {
    post_ref.rsplit('/').next()?.trim().parse().ok()
}
