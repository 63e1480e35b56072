//! Live-notification embed rendering.

use helix_api::StreamRecord;

use crate::discord::{Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedImage};

/// Preview image dimensions substituted into the platform's template URL.
pub const PREVIEW_WIDTH: u32 = 440;
pub const PREVIEW_HEIGHT: u32 = 248;

pub fn stream_url(login: &str) -> String {
    format!("https://twitch.tv/{login}")
}

/// Fill the `{width}x{height}` placeholders in a preview template URL.
/// Empty templates (the platform omits them briefly after stream start)
/// render no preview.
pub fn render_preview_url(template: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    Some(
        template
            .replace("{width}", &PREVIEW_WIDTH.to_string())
            .replace("{height}", &PREVIEW_HEIGHT.to_string()),
    )
}

/// Render the notification embed for a live stream with a guild's accent
/// color.
pub fn live_embed(stream: &StreamRecord, accent_color: u32) -> Embed {
    let url = stream_url(&stream.user_login);

    let title = if stream.title.is_empty() {
        format!("{} is live", stream.user_name)
    } else {
        stream.title.clone()
    };

    let mut fields = Vec::new();
    if !stream.game_name.is_empty() {
        fields.push(EmbedField {
            name: "Game".to_string(),
            value: stream.game_name.clone(),
            inline: true,
        });
    }
    fields.push(EmbedField {
        name: "Viewers".to_string(),
        value: format_viewer_count(stream.viewer_count),
        inline: true,
    });

    Embed {
        title: Some(title),
        url: Some(url),
        description: None,
        color: Some(accent_color),
        timestamp: stream.started_at.map(|t| t.to_rfc3339()),
        author: Some(EmbedAuthor {
            name: format!("{} is now live!", stream.user_name),
            icon_url: (!stream.profile_image_url.is_empty())
                .then(|| stream.profile_image_url.clone()),
        }),
        thumbnail: None,
        image: render_preview_url(&stream.thumbnail_url).map(|url| EmbedImage { url }),
        fields,
        footer: Some(EmbedFooter {
            text: "Live on Twitch".to_string(),
        }),
    }
}

/// Group digits by thousands: 1234567 renders as "1,234,567".
pub fn format_viewer_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
