//! The static relation vocabulary with known inverses.
//!
//! Relation names are open string keys: any name a document declares is
//! stored on the graph. Only the names listed here participate in inverse
//! edge generation. Unrecognized relations pass through unchanged; this is
//! deliberate, so user vocabulary never corrupts the fixed inverse table.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// The relation that drives classification and hierarchy traversal.
pub const IS_A: &str = "is_a";

static RELATION_INVERSES: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("is_a", "has_instance"),
        ("has_instance", "is_a"),
        ("part_of", "has_part"),
        ("has_part", "part_of"),
        ("located_in", "location_of"),
        ("location_of", "located_in"),
        ("created_by", "creator_of"),
        ("creator_of", "created_by"),
        ("precedes", "follows"),
        ("follows", "precedes"),
        ("causes", "caused_by"),
        ("caused_by", "causes"),
        ("enables", "enabled_by"),
        ("enabled_by", "enables"),
        ("regulates", "regulated_by"),
        ("regulated_by", "regulates"),
        ("offers", "offered_by"),
        ("offered_by", "offers"),
    ])
});

/// Look up the inverse of a relation name, if one is defined.
pub fn inverse_of(relation: &str) -> Option<&'static str> {
    RELATION_INVERSES.get(relation).copied()
}

/// Whether the relation participates in inverse generation.
pub fn has_inverse(relation: &str) -> bool {
    RELATION_INVERSES.contains_key(relation)
}
