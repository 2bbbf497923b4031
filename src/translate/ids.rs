//! Tool-call identifier codec.
//!
//! Chat Completions carries a single tool-call id. The Responses API carries a pair:
//! an item id prefixed `fc_` and a call id prefixed `call_`. This is the only place
//! in the crate that looks at those prefixes.

const FC_PREFIX: &str = "fc_";
const CALL_PREFIX: &str = "call_";

/// Paired Responses API identifiers for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdPair {
    pub fc_id: String,
    pub call_id: String,
}

/// Derive the `fc_`/`call_` pair for a tool-call id.
///
/// Ids that already carry one of the prefixes have the sibling derived by
/// substitution; bare ids get both prefixes. An empty id yields an empty pair.
pub fn encode(id: &str) -> IdPair {
    if id.is_empty() {
        return IdPair::default();
    }
    if let Some(rest) = id.strip_prefix(FC_PREFIX) {
        return IdPair {
            fc_id: id.to_string(),
            call_id: format!("{CALL_PREFIX}{rest}"),
        };
    }
    if let Some(rest) = id.strip_prefix(CALL_PREFIX) {
        return IdPair {
            fc_id: format!("{FC_PREFIX}{rest}"),
            call_id: id.to_string(),
        };
    }
    IdPair {
        fc_id: format!("{FC_PREFIX}{id}"),
        call_id: format!("{CALL_PREFIX}{id}"),
    }
}

/// Recover the prefix-free id from a Responses API pair.
///
/// Prefers stripping `fc_` from the item id, then `call_` from the call id, and
/// otherwise returns whichever input is non-empty unchanged.
pub fn decode(fc_id: &str, call_id: &str) -> String {
    if let Some(rest) = fc_id.strip_prefix(FC_PREFIX) {
        return rest.to_string();
    }
    if let Some(rest) = call_id.strip_prefix(CALL_PREFIX) {
        return rest.to_string();
    }
    if !fc_id.is_empty() {
        fc_id.to_string()
    } else {
        call_id.to_string()
    }
}

/// Convenience over optional wire fields.
pub fn decode_opt(fc_id: Option<&str>, call_id: Option<&str>) -> String {
    decode(fc_id.unwrap_or_default(), call_id.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_gets_both_prefixes() {
        let pair = encode("abc123");
        assert_eq!(pair.fc_id, "fc_abc123");
        assert_eq!(pair.call_id, "call_abc123");
        assert_eq!(decode(&pair.fc_id, &pair.call_id), "abc123");
    }

    #[test]
    fn test_round_trip_for_bare_ids() {
        for id in ["x", "toolu_01AbC", "9f2c-11", "fcx", "call"] {
            let pair = encode(id);
            assert_eq!(decode(&pair.fc_id, &pair.call_id), id, "id {id}");
        }
    }

    #[test]
    fn test_prefixed_ids_derive_sibling() {
        let pair = encode("call_xyz");
        assert_eq!(pair.fc_id, "fc_xyz");
        assert_eq!(pair.call_id, "call_xyz");

        let pair = encode("fc_xyz");
        assert_eq!(pair.fc_id, "fc_xyz");
        assert_eq!(pair.call_id, "call_xyz");

        // Idempotent: encoding an already-encoded id changes nothing.
        assert_eq!(encode(&encode("xyz").call_id), encode("xyz"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode(""), IdPair::default());
        assert_eq!(decode("", ""), "");
    }

    #[test]
    fn test_decode_fallbacks() {
        assert_eq!(decode("", "call_1"), "1");
        assert_eq!(decode("item_9", "call_1"), "1");
        assert_eq!(decode("item_9", ""), "item_9");
        assert_eq!(decode("", "raw"), "raw");
        assert_eq!(decode_opt(None, Some("call_q")), "q");
    }
}
