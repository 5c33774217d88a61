//! Text helpers for command responses and bot messages.

/// Team segment used when the target has no team (direct and group channels).
const REDIRECT_TEAM: &str = "_redirect";

pub fn permalink(site_url: &str, team_name: Option<&str>, post_id: &str) -> String {
    let team = team_name.filter(|t| !t.is_empty()).unwrap_or(REDIRECT_TEAM);
    format!("{}/{}/pl/{}", site_url.trim_end_matches('/'), team, post_id)
}

/// Returns the post id of a `<site_url>/<team>/pl/<id>` permalink, or the
/// input unchanged when it is not one.
pub fn post_id_from_link<'a>(input: &'a str, site_url: &str) -> &'a str {
    let site_url = site_url.trim_end_matches('/');
    if site_url.is_empty() {
        return input;
    }
    let Some(path) = input.strip_prefix(site_url) else {
        return input;
    };

    let mut segments = path.split('/');
    let (Some(""), Some(team), Some("pl"), Some(id), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return input;
    };

    let team_ok = !team.is_empty()
        && team
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let id_ok = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric());
    if team_ok && id_ok { id } else { input }
}

/// Flatten a message into a single summary line.
pub fn clean_message(message: &str) -> String {
    message
        .trim_start_matches(' ')
        .trim_start_matches('#')
        .trim_start_matches(' ')
        .replace("```", "")
        .replace('\n', " | ")
}

/// Cut to `max_chars` characters, appending `...` when anything was removed.
pub fn trim_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

pub fn clean_and_trim(message: &str, max_chars: usize) -> String {
    trim_message(&clean_message(message), max_chars)
}

pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text)
}

pub fn quote_block(text: &str) -> String {
    format!("> {}", text)
}

/// Fill a DM template. Literal `\n` sequences from config become newlines.
/// Placeholders are substituted in a single pass, so substituted values are
/// never rescanned.
pub fn render_template(template: &str, post_link: &str, executor: &str) -> String {
    let template = template.trim_start_matches(' ').replace("\\n", "\n");
    let mut out = String::with_capacity(template.len() + post_link.len());
    let mut rest = template.as_str();
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{executor}") {
            out.push_str(executor);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{postLink}") {
            out.push_str(post_link);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
