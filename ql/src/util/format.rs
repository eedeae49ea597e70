use num_format::{CustomFormat, Grouping, ToFormattedString};

pub fn number_format() -> CustomFormat {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .minus_sign("-")
        .separator("_")
        .build()
        .unwrap_or_default()
}

/// `12345` => `"12_345"`
pub fn grouped(value: usize) -> String {
    value.to_formatted_string(&number_format())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1000, "1_000")]
    #[case(1_234_567, "1_234_567")]
    fn test_grouped(#[case] value: usize, #[case] expected: &str) {
        assert_eq!(grouped(value), expected);
    }
}
