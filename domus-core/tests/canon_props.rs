use domus_core::canon::canonicalize;
use proptest::prelude::*;

fn street() -> impl Strategy<Value = String> {
    "[0-9]{1,5} [A-Za-z]{1,10}( [A-Za-z]{1,10})?( (Street|St|Road|Avenue|Drive|Lane|Court|Place))?"
}

fn unit() -> impl Strategy<Value = String> {
    ",? (Apt|Unit|Ste|Suite|apt|#) ?[0-9A-Z]{1,4}"
}

proptest! {
    #[test]
    fn canonicalization_is_idempotent(
        line in "[ -~]{0,40}",
        city in "[ -~]{0,20}",
        state in "[ -~]{0,16}",
        zip in "[ -~]{0,12}",
    ) {
        let (first, key) = canonicalize(&line, &city, &state, &zip);
        let (second, again) = canonicalize(&first.line1, &first.city, &first.state, &first.zip);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(key, again);
    }

    #[test]
    fn unit_suffix_does_not_change_key(base in street(), suffix in unit()) {
        let (_, plain) = canonicalize(&base, "Springfield", "IL", "62704");
        let (_, with_unit) = canonicalize(&format!("{base}{suffix}"), "Springfield", "IL", "62704");
        prop_assert_eq!(plain, with_unit);
    }

    #[test]
    fn casing_does_not_change_key(base in street()) {
        let (_, lower) = canonicalize(&base.to_lowercase(), "springfield", "il", "62704");
        let (_, upper) = canonicalize(&base.to_uppercase(), "SPRINGFIELD", "IL", "62704");
        prop_assert_eq!(lower, upper);
    }
}
