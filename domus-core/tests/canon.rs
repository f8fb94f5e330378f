use domus_core::canon::{canonicalize, canonicalize_address};

#[test]
fn unit_and_suffix_variants_share_a_key() {
    let (_, a) = canonicalize("123 Main Street, Apt 4B", "Springfield", "IL", "62704");
    let (_, b) = canonicalize("123 main st", "springfield", "il", "62704-1234");
    let (_, c) = canonicalize("123 MAIN ST #4B", "Springfield.", "Illinois", "62704");
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a.as_str(), "123 main st|springfield|il|62704");
}

#[test]
fn every_designator_truncates() {
    for unit in ["Apt 2", "Unit 7", "Ste 300", "Suite 12"] {
        let (addr, _) = canonicalize(&format!("9 Oak Avenue {unit}"), "Austin", "TX", "78701");
        assert_eq!(addr.line1, "9 OAK AVE", "designator {unit}");
    }
}

#[test]
fn suffixes_are_abbreviated_token_wise() {
    let (addr, _) = canonicalize("1 Streetview Boulevard", "X", "CA", "90001");
    assert_eq!(addr.line1, "1 STREETVIEW BLVD");

    let (addr, _) = canonicalize("77 Court Street", "X", "CA", "90001");
    assert_eq!(addr.line1, "77 CT ST");
}

#[test]
fn state_names_map_to_codes() {
    let (addr, _) = canonicalize("1 A St", "Los Angeles", "California", "90001");
    assert_eq!(addr.state, "CA");

    let (addr, _) = canonicalize("1 A St", "Charleston", " west   virginia ", "25301");
    assert_eq!(addr.state, "WV");

    let (addr, _) = canonicalize("1 A St", "Toronto", "Ontario", "M5V");
    assert_eq!(addr.state, "ONTARIO");
}

#[test]
fn punctuation_and_spacing_collapse() {
    let (addr, _) = canonicalize("  12-B   St. Mark's   Place ", "St. Louis", "mo", "63101");
    assert_eq!(addr.line1, "12 B ST MARK S PL");
    assert_eq!(addr.city, "ST LOUIS");
    assert_eq!(addr.state, "MO");
}

#[test]
fn empty_inputs_are_total() {
    let (addr, key) = canonicalize("", "", "", "");
    assert_eq!(addr.line1, "");
    assert_eq!(key.as_str(), "|||");
}

#[test]
fn output_is_a_fixed_point() {
    let (first, k1) = canonicalize("500 Lake Shore Drive, Suite 9", "Chicago", "Illinois", "60611-0001");
    let (second, k2) = canonicalize_address(&first);
    assert_eq!(first, second);
    assert_eq!(k1, k2);
}
