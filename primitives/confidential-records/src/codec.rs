//! Canonical fixed-width value encoding.
//!
//! Every field value is turned into a [`CanonicalValue`] before it is hashed,
//! encrypted or proved. The byte width depends only on the [`ValueKind`], so
//! ciphertext and proof sizes are predictable.
//!
//! ```text
//! kind             tag  width  layout
//! UnsignedInteger   1     8    u64 big-endian
//! Decimal           2     8    u64 big-endian, value * 10^6
//! ShortString       3    32    len(1) || utf8(len) || zero padding
//! Address           4    32    zero(12) || address(20)
//! Date              5     4    u32 big-endian YYYYMMDD
//! Digest            6    32    raw 32 bytes
//! ```

use core::fmt;
use core::str::FromStr;

use chrono::NaiveDate;
use parity_scale_codec::{Decode, Encode, Input, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional decimal digits kept by [`FixedDecimal`].
pub const DECIMAL_SCALE: u32 = 6;
const DECIMAL_UNIT: i128 = 1_000_000;

/// Byte budget for [`ValueKind::ShortString`] payloads (one byte is the length).
pub const SHORT_STRING_MAX: usize = 31;

const ADDRESS_LEN: usize = 20;
const ADDRESS_PAD: usize = 32 - ADDRESS_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{kind} value out of domain: {reason}")]
    OutOfDomain {
        kind: ValueKind,
        reason: &'static str,
    },
    #[error("raw value does not match kind {kind}")]
    KindMismatch { kind: ValueKind },
    #[error("{kind} expects {expected} bytes, got {actual}")]
    WidthMismatch {
        kind: ValueKind,
        expected: usize,
        actual: usize,
    },
}

fn out_of_domain(kind: ValueKind, reason: &'static str) -> CodecError {
    CodecError::OutOfDomain { kind, reason }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, TypeInfo, MaxEncodedLen, Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    #[codec(index = 1)]
    UnsignedInteger,
    #[codec(index = 2)]
    Decimal,
    #[codec(index = 3)]
    ShortString,
    #[codec(index = 4)]
    Address,
    #[codec(index = 5)]
    Date,
    #[codec(index = 6)]
    Digest,
}

impl ValueKind {
    pub const ALL: [ValueKind; 6] = [
        ValueKind::UnsignedInteger,
        ValueKind::Decimal,
        ValueKind::ShortString,
        ValueKind::Address,
        ValueKind::Date,
        ValueKind::Digest,
    ];

    /// Stable one-byte tag used in envelope headers.
    pub const fn tag(self) -> u8 {
        match self {
            ValueKind::UnsignedInteger => 1,
            ValueKind::Decimal => 2,
            ValueKind::ShortString => 3,
            ValueKind::Address => 4,
            ValueKind::Date => 5,
            ValueKind::Digest => 6,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ValueKind::UnsignedInteger),
            2 => Some(ValueKind::Decimal),
            3 => Some(ValueKind::ShortString),
            4 => Some(ValueKind::Address),
            5 => Some(ValueKind::Date),
            6 => Some(ValueKind::Digest),
            _ => None,
        }
    }

    /// Canonical byte width.
    pub const fn width(self) -> usize {
        match self {
            ValueKind::UnsignedInteger | ValueKind::Decimal => 8,
            ValueKind::Date => 4,
            ValueKind::ShortString | ValueKind::Address | ValueKind::Digest => 32,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::UnsignedInteger => "UnsignedInteger",
            ValueKind::Decimal => "Decimal",
            ValueKind::ShortString => "ShortString",
            ValueKind::Address => "Address",
            ValueKind::Date => "Date",
            ValueKind::Digest => "Digest",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exact decimal with [`DECIMAL_SCALE`] fractional digits, stored as
/// micro-units. Never goes through floating point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FixedDecimal {
    micros: i128,
}

impl FixedDecimal {
    pub const fn from_micros(micros: i128) -> Self {
        Self { micros }
    }

    pub fn from_integer(units: i128) -> Option<Self> {
        units.checked_mul(DECIMAL_UNIT).map(Self::from_micros)
    }

    pub const fn micros(&self) -> i128 {
        self.micros
    }
}

impl FromStr for FixedDecimal {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || out_of_domain(ValueKind::Decimal, "malformed decimal");
        let s = s.trim();
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if frac_part.len() > DECIMAL_SCALE as usize {
            return Err(out_of_domain(
                ValueKind::Decimal,
                "more than 6 fractional digits",
            ));
        }

        let too_large = || out_of_domain(ValueKind::Decimal, "decimal too large");
        let int = int_part.bytes().try_fold(0i128, |acc, b| {
            acc.checked_mul(10)?.checked_add(i128::from(b - b'0'))
        });
        let mut frac: i128 = 0;
        for i in 0..DECIMAL_SCALE as usize {
            let digit = frac_part.as_bytes().get(i).map_or(0, |b| b - b'0');
            frac = frac * 10 + i128::from(digit);
        }
        let micros = int
            .and_then(|i| i.checked_mul(DECIMAL_UNIT))
            .and_then(|i| i.checked_add(frac))
            .ok_or_else(too_large)?;

        Ok(Self::from_micros(if negative { -micros } else { micros }))
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.micros.unsigned_abs();
        let unit = DECIMAL_UNIT as u128;
        if self.micros < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}", abs / unit)?;
        let frac = abs % unit;
        if frac != 0 {
            let digits = format!("{:06}", frac);
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for FixedDecimal {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FixedDecimal> for String {
    fn from(value: FixedDecimal) -> Self {
        value.to_string()
    }
}

/// Un-canonicalized input value.
///
/// `Hex` carries `0x`-prefixed hex for both [`ValueKind::Address`] and
/// [`ValueKind::Digest`]; decoding yields lowercase digits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Integer(i128),
    Decimal(FixedDecimal),
    Text(String),
    Hex(String),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    pub fn hex(s: impl Into<String>) -> Self {
        RawValue::Hex(s.into())
    }
}

impl From<i128> for RawValue {
    fn from(v: i128) -> Self {
        RawValue::Integer(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v.into())
    }
}

impl From<u64> for RawValue {
    fn from(v: u64) -> Self {
        RawValue::Integer(v.into())
    }
}

impl From<FixedDecimal> for RawValue {
    fn from(v: FixedDecimal) -> Self {
        RawValue::Decimal(v)
    }
}

/// Fixed-width bytes of one value under a declared kind.
///
/// The width always equals `kind.width()`. Domain validity of the bytes is
/// *not* implied: use [`check_domain`] for that.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, TypeInfo)]
pub struct CanonicalValue {
    kind: ValueKind,
    bytes: Vec<u8>,
}

impl CanonicalValue {
    pub fn from_bytes(kind: ValueKind, bytes: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let bytes = bytes.into();
        if bytes.len() != kind.width() {
            return Err(CodecError::WidthMismatch {
                kind,
                expected: kind.width(),
                actual: bytes.len(),
            });
        }
        Ok(Self { kind, bytes })
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Decode for CanonicalValue {
    fn decode<I: Input>(input: &mut I) -> Result<Self, parity_scale_codec::Error> {
        let kind = ValueKind::decode(input)?;
        let bytes = Vec::<u8>::decode(input)?;
        Self::from_bytes(kind, bytes).map_err(|_| "canonical value width mismatch".into())
    }
}

/// Canonicalize `raw` under `kind`.
pub fn encode(kind: ValueKind, raw: &RawValue) -> Result<CanonicalValue, CodecError> {
    let bytes = match (kind, raw) {
        (ValueKind::UnsignedInteger, RawValue::Integer(v)) => {
            let v = u64::try_from(*v).map_err(|_| {
                out_of_domain(
                    kind,
                    if *v < 0 {
                        "negative integer"
                    } else {
                        "integer exceeds 64 bits"
                    },
                )
            })?;
            v.to_be_bytes().to_vec()
        }
        (ValueKind::Decimal, RawValue::Decimal(d)) => {
            let micros = d.micros();
            let v = u64::try_from(micros).map_err(|_| {
                out_of_domain(
                    kind,
                    if micros < 0 {
                        "negative decimal"
                    } else {
                        "decimal exceeds 64-bit micro-units"
                    },
                )
            })?;
            v.to_be_bytes().to_vec()
        }
        (ValueKind::ShortString, RawValue::Text(s)) => {
            if s.len() > SHORT_STRING_MAX {
                return Err(out_of_domain(kind, "string exceeds 31 bytes"));
            }
            let mut out = vec![0u8; kind.width()];
            out[0] = s.len() as u8;
            out[1..1 + s.len()].copy_from_slice(s.as_bytes());
            out
        }
        (ValueKind::Address, RawValue::Hex(s)) => {
            let addr = parse_hex::<ADDRESS_LEN>(kind, s)?;
            let mut out = vec![0u8; kind.width()];
            out[ADDRESS_PAD..].copy_from_slice(&addr);
            out
        }
        (ValueKind::Date, RawValue::Integer(v)) => {
            let v = u32::try_from(*v).map_err(|_| out_of_domain(kind, "date is not YYYYMMDD"))?;
            calendar_date(v)?;
            v.to_be_bytes().to_vec()
        }
        (ValueKind::Digest, RawValue::Hex(s)) => parse_hex::<32>(kind, s)?.to_vec(),
        _ => return Err(CodecError::KindMismatch { kind }),
    };
    Ok(CanonicalValue { kind, bytes })
}

/// Exact inverse of [`encode`] for in-domain values.
pub fn decode(value: &CanonicalValue) -> Result<RawValue, CodecError> {
    check_domain(value)?;
    let bytes = value.as_bytes();
    let raw = match value.kind() {
        ValueKind::UnsignedInteger => RawValue::Integer(be_u64(bytes).into()),
        ValueKind::Decimal => RawValue::Decimal(FixedDecimal::from_micros(be_u64(bytes).into())),
        ValueKind::ShortString => {
            let len = usize::from(bytes[0]);
            // UTF-8 validity was established by `check_domain`.
            let text = core::str::from_utf8(&bytes[1..1 + len])
                .map_err(|_| out_of_domain(value.kind(), "invalid utf-8"))?;
            RawValue::Text(text.to_owned())
        }
        ValueKind::Address => RawValue::Hex(format!("0x{}", hex::encode(&bytes[ADDRESS_PAD..]))),
        ValueKind::Date => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            RawValue::Integer(u32::from_be_bytes(b).into())
        }
        ValueKind::Digest => RawValue::Hex(format!("0x{}", hex::encode(bytes))),
    };
    Ok(raw)
}

/// Validate canonical bytes against their kind's domain constraint.
pub fn check_domain(value: &CanonicalValue) -> Result<(), CodecError> {
    let kind = value.kind();
    let bytes = value.as_bytes();
    if bytes.len() != kind.width() {
        return Err(CodecError::WidthMismatch {
            kind,
            expected: kind.width(),
            actual: bytes.len(),
        });
    }
    match kind {
        ValueKind::UnsignedInteger | ValueKind::Decimal | ValueKind::Digest => Ok(()),
        ValueKind::ShortString => {
            let len = usize::from(bytes[0]);
            if len > SHORT_STRING_MAX {
                return Err(out_of_domain(kind, "string exceeds 31 bytes"));
            }
            if bytes[1 + len..].iter().any(|b| *b != 0) {
                return Err(out_of_domain(kind, "non-zero padding"));
            }
            core::str::from_utf8(&bytes[1..1 + len])
                .map(|_| ())
                .map_err(|_| out_of_domain(kind, "invalid utf-8"))
        }
        ValueKind::Address => {
            if bytes[..ADDRESS_PAD].iter().any(|b| *b != 0) {
                return Err(out_of_domain(kind, "non-zero address padding"));
            }
            Ok(())
        }
        ValueKind::Date => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            calendar_date(u32::from_be_bytes(b)).map(|_| ())
        }
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(b)
}

fn parse_hex<const N: usize>(kind: ValueKind, s: &str) -> Result<[u8; N], CodecError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| out_of_domain(kind, "missing 0x prefix"))?;
    if digits.len() != N * 2 {
        return Err(out_of_domain(kind, "wrong hex length"));
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|_| out_of_domain(kind, "invalid hex digit"))?;
    Ok(out)
}

fn calendar_date(yyyymmdd: u32) -> Result<NaiveDate, CodecError> {
    let year = yyyymmdd / 10_000;
    let month = (yyyymmdd / 100) % 100;
    let day = yyyymmdd % 100;
    if !(1000..=9999).contains(&year) {
        return Err(out_of_domain(ValueKind::Date, "date is not YYYYMMDD"));
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| out_of_domain(ValueKind::Date, "not a calendar date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1111111111111111111111111111111111111111";
    const DIGEST: &str = "0xabc0000000000000000000000000000000000000000000000000000000000def";

    fn round_trip(kind: ValueKind, raw: RawValue) {
        let canonical = encode(kind, &raw).expect("encode");
        assert_eq!(canonical.as_bytes().len(), kind.width());
        assert_eq!(decode(&canonical).expect("decode"), raw);
    }

    #[test]
    fn round_trips_every_kind() {
        round_trip(ValueKind::UnsignedInteger, RawValue::Integer(0));
        round_trip(ValueKind::UnsignedInteger, RawValue::Integer(1000));
        round_trip(ValueKind::UnsignedInteger, RawValue::Integer(u64::MAX.into()));
        round_trip(ValueKind::Decimal, "4.25".parse::<FixedDecimal>().unwrap().into());
        round_trip(ValueKind::Decimal, FixedDecimal::from_micros(1).into());
        round_trip(ValueKind::ShortString, RawValue::text("NET30"));
        round_trip(ValueKind::ShortString, RawValue::text(""));
        round_trip(ValueKind::ShortString, RawValue::text("é".repeat(15)));
        round_trip(ValueKind::Address, RawValue::hex(ADDR));
        round_trip(ValueKind::Date, RawValue::Integer(20250601));
        round_trip(ValueKind::Date, RawValue::Integer(20240229));
        round_trip(ValueKind::Digest, RawValue::hex(DIGEST));
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = encode(ValueKind::ShortString, &RawValue::text("NET30")).unwrap();
        let b = encode(ValueKind::ShortString, &RawValue::text("NET30")).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a.as_bytes()[..6], &[5, b'N', b'E', b'T', b'3', b'0']);
    }

    #[test]
    fn negative_integer_is_out_of_domain() {
        let err = encode(ValueKind::UnsignedInteger, &RawValue::Integer(-5)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::OutOfDomain {
                kind: ValueKind::UnsignedInteger,
                ..
            }
        ));
        let too_big = RawValue::Integer(i128::from(u64::MAX) + 1);
        assert!(encode(ValueKind::UnsignedInteger, &too_big).is_err());
    }

    #[test]
    fn rejects_out_of_domain_inputs() {
        assert!(encode(ValueKind::ShortString, &RawValue::text("x".repeat(32))).is_err());
        assert!(encode(ValueKind::Address, &RawValue::hex("0x1234")).is_err());
        assert!(encode(ValueKind::Address, &RawValue::hex(&ADDR[2..])).is_err());
        assert!(encode(ValueKind::Address, &RawValue::hex(ADDR.replace('1', "g"))).is_err());
        assert!(encode(ValueKind::Date, &RawValue::Integer(20250230)).is_err());
        assert!(encode(ValueKind::Date, &RawValue::Integer(20251301)).is_err());
        assert!(encode(ValueKind::Date, &RawValue::Integer(101)).is_err());
        assert!(encode(ValueKind::Decimal, &FixedDecimal::from_micros(-1).into()).is_err());
    }

    #[test]
    fn mismatched_raw_variant_is_rejected() {
        let err = encode(ValueKind::Digest, &RawValue::Integer(1)).unwrap_err();
        assert_eq!(
            err,
            CodecError::KindMismatch {
                kind: ValueKind::Digest
            }
        );
    }

    #[test]
    fn address_decodes_lowercase() {
        let upper = "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD";
        let canonical = encode(ValueKind::Address, &RawValue::hex(upper)).unwrap();
        assert_eq!(
            decode(&canonical).unwrap(),
            RawValue::hex(upper.to_lowercase())
        );
        assert!(canonical.as_bytes()[..12].iter().all(|b| *b == 0));
    }

    #[test]
    fn check_domain_catches_crafted_bytes() {
        let mut bad_string = vec![0u8; 32];
        bad_string[0] = 2;
        bad_string[1] = b'o';
        bad_string[2] = b'k';
        bad_string[5] = 1;
        let v = CanonicalValue::from_bytes(ValueKind::ShortString, bad_string).unwrap();
        assert!(check_domain(&v).is_err());
        assert!(decode(&v).is_err());

        let bad_date =
            CanonicalValue::from_bytes(ValueKind::Date, 20251340u32.to_be_bytes()).unwrap();
        assert!(check_domain(&bad_date).is_err());

        let mut bad_addr = vec![0u8; 32];
        bad_addr[0] = 1;
        let v = CanonicalValue::from_bytes(ValueKind::Address, bad_addr).unwrap();
        assert!(check_domain(&v).is_err());
    }

    #[test]
    fn width_is_enforced() {
        let err = CanonicalValue::from_bytes(ValueKind::UnsignedInteger, vec![0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            CodecError::WidthMismatch {
                kind: ValueKind::UnsignedInteger,
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn fixed_decimal_parsing() {
        assert_eq!("4.25".parse::<FixedDecimal>().unwrap().micros(), 4_250_000);
        assert_eq!(".5".parse::<FixedDecimal>().unwrap().micros(), 500_000);
        assert_eq!("-1".parse::<FixedDecimal>().unwrap().micros(), -1_000_000);
        assert_eq!("0.000001".parse::<FixedDecimal>().unwrap().micros(), 1);
        assert!("0.0000001".parse::<FixedDecimal>().is_err());
        assert!("1e5".parse::<FixedDecimal>().is_err());
        assert!("".parse::<FixedDecimal>().is_err());
        assert!(".".parse::<FixedDecimal>().is_err());
        assert_eq!(FixedDecimal::from_micros(4_250_000).to_string(), "4.25");
        assert_eq!(FixedDecimal::from_micros(-7_000_000).to_string(), "-7");
    }

    #[test]
    fn fixed_decimal_serde_uses_strings() {
        let d: FixedDecimal = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(d.micros(), 12_500_000);
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"12.5\"");
        assert!(serde_json::from_str::<FixedDecimal>("\"abc\"").is_err());
    }

    #[test]
    fn scale_decode_rejects_wrong_width() {
        let good = encode(ValueKind::Date, &RawValue::Integer(20250601)).unwrap();
        let bytes = good.encode();
        assert_eq!(CanonicalValue::decode(&mut &bytes[..]).unwrap(), good);

        let forged = (ValueKind::Date, vec![0u8; 5]).encode();
        assert!(CanonicalValue::decode(&mut &forged[..]).is_err());
    }
}
