pub mod api;
pub mod events;
pub mod models;

/// Fixed id of the default channel every user is auto-admitted to.
pub const GENERAL_CHANNEL_ID: &str = "general";

/// Message content that starts with this prefix is a reference to an
/// uploaded file rather than plain text. The upload handler itself is
/// outside this system; the convention is shared with it.
pub const FILE_CONTENT_PREFIX: &str = "/files/";

/// Whether a message body is a file-reference token.
pub fn is_file_reference(content: &str) -> bool {
    content.starts_with(FILE_CONTENT_PREFIX)
}

/// Order-independent key identifying the DM channel for a pair of users.
/// Both participants derive the same key regardless of who initiates.
pub fn direct_hash(user_a: &str, user_b: &str) -> String {
    let mut pair = [user_a, user_b];
    pair.sort_unstable();
    pair.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_hash_is_order_independent() {
        assert_eq!(direct_hash("alice", "bob"), direct_hash("bob", "alice"));
        assert_eq!(direct_hash("alice", "bob"), "alice:bob");
    }

    #[test]
    fn file_reference_detection() {
        assert!(is_file_reference("/files/ab12/report.pdf"));
        assert!(!is_file_reference("hello /files/ inline"));
    }
}
