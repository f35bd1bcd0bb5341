//! Property-based tests for the pipeline's pure string-handling helpers,
//! in the donor's `tests/property_tests.rs` style: random inputs driving
//! invariants rather than example-by-example assertions.

use proptest::prelude::*;
use zoom_ingest::source::encode_uuid;
use zoom_ingest::strip_zero_width_space;

proptest! {
    // Property: the encoded uuid never carries a literal '/' into the URL
    // path segment, no matter how many slashes the input has (§4.2).
    #[test]
    fn encoded_uuid_never_contains_a_literal_slash(uuid in "[A-Za-z0-9/=_-]{0,64}") {
        let encoded = encode_uuid(&uuid);
        prop_assert!(!encoded.contains('/'));
    }

    // Property: encoding is idempotent on its own output — encoding an
    // already-encoded uuid a second time never reintroduces a raw slash.
    #[test]
    fn re_encoding_the_output_stays_slash_free(uuid in "[A-Za-z0-9/=_-]{0,64}") {
        let encoded = encode_uuid(&uuid);
        let re_encoded = encode_uuid(&encoded);
        prop_assert!(!re_encoded.contains('/'));
    }

    // Property: stripping zero-width spaces never lengthens a string and
    // removes every occurrence of U+200B (§4.2 sanitization invariant).
    #[test]
    fn strip_zero_width_space_removes_every_occurrence(
        prefix in "[A-Za-z0-9 ]{0,16}",
        suffix in "[A-Za-z0-9 ]{0,16}",
        count in 0usize..8,
    ) {
        let input = format!("{prefix}{}{suffix}", "\u{200b}".repeat(count));
        let stripped = strip_zero_width_space(&input);
        prop_assert!(!stripped.contains('\u{200b}'));
        prop_assert!(stripped.len() <= input.len());
    }
}
