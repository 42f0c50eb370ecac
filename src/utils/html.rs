/// Strips scripts, event handlers and other unsafe markup from rich text that clients
/// render as lesson bodies, keeping harmless formatting tags.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
