use nanoid::nanoid;

/// Alphabet for request correlation ids (no ambiguous glyphs).
const REQUEST_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const REQUEST_ID_LENGTH: usize = 12;

/// Id sent as `x-request-id` and echoed in client logs.
pub fn generate_request_id() -> String {
    nanoid!(REQUEST_ID_LENGTH, REQUEST_ID_ALPHABET)
}
