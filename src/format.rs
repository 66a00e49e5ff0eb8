use alloy::primitives::{
    Address,
    U256,
    utils::format_ether,
};

pub const DEFAULT_PREFIX_LEN: usize = 6;
pub const DEFAULT_SUFFIX_LEN: usize = 4;

/// `0x8c9207BaA0Eb7bA6F969C6da3Dd1Ec672e22B8b5` -> `0x8c92...B8b5`
pub fn shorten_address(address: &str, start: usize, end: usize) -> String {
    if address.len() < start + end || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..start], &address[address.len() - end..])
}

pub fn short_address(address: &Address) -> String {
    shorten_address(
        &address.to_checksum(None),
        DEFAULT_PREFIX_LEN,
        DEFAULT_SUFFIX_LEN,
    )
}

/// Wei rendered as ETH without trailing zeros.
pub fn format_eth(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((whole, fractional)) => {
            let fractional = fractional.trim_end_matches('0');
            if fractional.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fractional}")
            }
        }
        None => full,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::utils::parse_ether;
    use proptest::prelude::*;

    #[test]
    fn shorten_address__full_address__keeps_head_and_tail() {
        let actual = shorten_address(
            "0x8c9207BaA0Eb7bA6F969C6da3Dd1Ec672e22B8b5",
            DEFAULT_PREFIX_LEN,
            DEFAULT_SUFFIX_LEN,
        );
        assert_eq!("0x8c92...B8b5", actual);
    }

    #[test]
    fn shorten_address__input_shorter_than_window__returned_unchanged() {
        assert_eq!("0x1234", shorten_address("0x1234", 6, 4));
        assert_eq!("", shorten_address("", 6, 4));
    }

    #[test]
    fn format_eth__trims_trailing_zeros() {
        assert_eq!("1", format_eth(parse_ether("1").unwrap()));
        assert_eq!("0.01", format_eth(parse_ether("0.01").unwrap()));
        assert_eq!("1.5", format_eth(parse_ether("1.50").unwrap()));
        assert_eq!("0", format_eth(U256::ZERO));
    }

    proptest! {
        #[test]
        fn shorten_address__long_ascii_input__has_fixed_shape(
            raw in "[0-9a-fA-F]{10,64}",
            start in 1usize..6,
            end in 1usize..4,
        ) {
            let actual = shorten_address(&raw, start, end);
            prop_assert_eq!(actual.len(), start + end + 3);
            prop_assert!(actual.starts_with(&raw[..start]));
            prop_assert!(actual.ends_with(&raw[raw.len() - end..]));
        }
    }
}
