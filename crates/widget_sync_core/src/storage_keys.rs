pub const WIDGETS_PREFIX: &str = "widgets";
pub const DEAD_LETTER_PREFIX: &str = "dead-letter";

/// Lower-cases `owner` and replaces spaces with hyphens.
///
/// Owners that differ only in case or spacing map to the same segment.
pub fn normalize_owner(owner: &str) -> String {
    owner.to_lowercase().replace(' ', "-")
}

pub fn widget_object_key(owner: &str, widget_id: &str) -> String {
    format!("{WIDGETS_PREFIX}/{}/{widget_id}", normalize_owner(owner))
}

pub fn dead_letter_object_key(source_id: &str) -> String {
    format!("{DEAD_LETTER_PREFIX}/{}", source_id.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_owner_segment() {
        assert_eq!(normalize_owner("Test User"), "test-user");
        assert_eq!(normalize_owner("ALICE"), "alice");
        assert_eq!(normalize_owner(""), "");
    }

    #[test]
    fn owners_differing_in_case_and_spacing_collide() {
        assert_eq!(normalize_owner("Jane Doe"), normalize_owner("jane-doe"));
        assert_eq!(normalize_owner("JANE DOE"), normalize_owner("jane doe"));
    }

    #[test]
    fn builds_widget_key() {
        assert_eq!(widget_object_key("Jane Doe", "w1"), "widgets/jane-doe/w1");
    }

    #[test]
    fn builds_widget_key_for_missing_owner() {
        assert_eq!(widget_object_key("", "w1"), "widgets//w1");
    }

    #[test]
    fn builds_dead_letter_key() {
        assert_eq!(
            dead_letter_object_key("requests/0001.json"),
            "dead-letter/requests/0001.json"
        );
        assert_eq!(dead_letter_object_key("/abc"), "dead-letter/abc");
    }
}
