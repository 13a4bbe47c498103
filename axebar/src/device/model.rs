//! Bitaxe model names from board revision codes.

/// Inclusive board-version ranges and the model they belong to.
const MODELS: &[(u32, u32, &str)] = &[
    (100, 199, "Max"),
    (200, 299, "Ultra"),
    (300, 399, "Hex"),
    (400, 499, "Supra"),
    (600, 699, "Gamma"),
];

/// Model name for a reported board version, if it is a known one.
///
/// Non-numeric, negative and out-of-range codes have no model.
pub fn model_name(board_version: Option<&str>) -> Option<&'static str> {
    let code: u32 = board_version?.trim().parse().ok()?;
    MODELS
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&code))
        .map(|(_, _, name)| *name)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("100", "Max")]
    #[test_case("199", "Max")]
    #[test_case("204", "Ultra")]
    #[test_case("299", "Ultra")]
    #[test_case("300", "Hex")]
    #[test_case("402", "Supra")]
    #[test_case("499", "Supra")]
    #[test_case("600", "Gamma")]
    #[test_case("601", "Gamma")]
    #[test_case("699", "Gamma")]
    fn codes_in_range_map_to_model(code: &str, model: &str) {
        assert_eq!(model_name(Some(code)), Some(model));
    }

    #[test_case(Some("0") ; "zero")]
    #[test_case(Some("-150") ; "negative")]
    #[test_case(Some("99") ; "below first range")]
    #[test_case(Some("500") ; "gap between supra and gamma")]
    #[test_case(Some("599") ; "end of gap")]
    #[test_case(Some("700") ; "above last range")]
    #[test_case(Some("6O1") ; "letter o")]
    #[test_case(Some("") ; "empty")]
    #[test_case(Some("4.0") ; "decimal")]
    #[test_case(None ; "absent")]
    fn other_codes_have_no_model(code: Option<&str>) {
        assert_eq!(model_name(code), None);
    }
}
