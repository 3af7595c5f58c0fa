/// Format a reply to a comment, quoting the comment being answered.
///
/// ```text
/// @login: message
///
/// <details>
///
/// In response to [this](url):
///
/// > original line 1
/// > original line 2
/// </details>
/// ```
pub fn format_reply(login: &str, message: &str, comment_body: &str, comment_url: &str) -> String {
    let quoted: Vec<String> = comment_body
        .lines()
        .map(|line| format!("> {}", line))
        .collect();

    format!(
        "@{}: {}\n\n<details>\n\nIn response to [this]({}):\n\n{}\n</details>",
        login,
        message,
        comment_url,
        quoted.join("\n")
    )
}
