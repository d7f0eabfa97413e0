//! Common utility functions

/// Mask sensitive data for logging
///
/// Keys of eight characters or fewer are hidden entirely, longer ones keep
/// their first and last four characters.
pub fn mask_sensitive(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
