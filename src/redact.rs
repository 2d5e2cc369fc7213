/// Replaces every occurrence of `token` in `message` with `[snip]`.
///
/// Backend messages can echo connection strings; the configured password is
/// snipped from every message before it is wrapped into a `ManipError`.
pub fn snip(message: &str, token: &str) -> String {
    if token.is_empty() {
        return message.to_string();
    }
    message.replace(token, "[snip]")
}
