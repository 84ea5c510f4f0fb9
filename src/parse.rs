//! Numeric parsing helpers for the command front-end.

use std::num::ParseIntError;
use std::str::FromStr;

/// Unsigned integer types parseable in an explicit radix.
pub trait FromStrRadix: Sized {
    fn from_str_radix(text: &str, radix: u32) -> Result<Self, ParseIntError>;
}

macro_rules! impl_from_str_radix {
    ($($ty:ty),*) => {
        $(
            impl FromStrRadix for $ty {
                fn from_str_radix(text: &str, radix: u32) -> Result<Self, ParseIntError> {
                    <$ty>::from_str_radix(text, radix)
                }
            }
        )*
    };
}

impl_from_str_radix!(u8, u16, u32, u64, i32);

/// Parse an integer in the given base. Base-16 input may carry a `0x` prefix.
pub fn parse_integer<T: FromStrRadix>(text: &str, base: u32) -> Option<T> {
    let digits = if base == 16 {
        text.strip_prefix("0x").unwrap_or(text)
    } else {
        text
    };
    T::from_str_radix(digits, base).ok()
}

pub fn parse_float<T: FromStr>(text: &str) -> Option<T> {
    text.parse().ok()
}

/// Parse a byte-vector literal of the form `[0xaa,0xbb,...]` with exactly
/// `N` elements.
pub fn parse_vector<const N: usize>(text: &str) -> Option<[u8; N]> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let mut bytes = [0u8; N];
    let mut count = 0;
    for element in inner.split(',') {
        if count == N {
            return None;
        }
        bytes[count] = parse_integer::<u8>(element.trim(), 16)?;
        count += 1;
    }
    (count == N).then_some(bytes)
}
