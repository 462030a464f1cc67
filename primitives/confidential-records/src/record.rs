//! Sealed records and their ledger payload.
//!
//! The ledger stores records opaquely as SCALE bytes: every byte string is
//! length-prefixed, so no side needs to know ciphertext or proof sizes up front.

use parity_scale_codec::{Decode, DecodeAll, Encode};
use scale_info::TypeInfo;
use thiserror::Error;

use crate::codec::{check_domain, CanonicalValue, CodecError, ValueKind};
use crate::schema::RecordKind;
use crate::PublicKeyBytes;

/// One sensitive field after encryption.
///
/// `ciphertext`: version(1) || kind(1) || limbs * (C(32) || D(32))
/// `proof`:      version(1) || limbs * 128 || aux * 32 || [relation(64)] || len(2) || range_proof
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct EncryptedField {
    pub ciphertext: Vec<u8>,
    pub public_key: PublicKeyBytes,
    pub proof: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub enum FieldValue {
    #[codec(index = 0)]
    Encrypted(EncryptedField),
    #[codec(index = 1)]
    Plain(CanonicalValue),
}

impl FieldValue {
    pub fn as_encrypted(&self) -> Option<&EncryptedField> {
        match self {
            FieldValue::Encrypted(field) => Some(field),
            FieldValue::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&CanonicalValue> {
        match self {
            FieldValue::Plain(value) => Some(value),
            FieldValue::Encrypted(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct RecordField {
    pub name: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{kind} expects {expected} fields, found {actual}")]
    FieldCount {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },
    #[error("field {position} should be `{expected}`, found `{actual}`")]
    FieldName {
        position: usize,
        expected: &'static str,
        actual: String,
    },
    #[error("field `{field}` must be encrypted")]
    ExpectedEncrypted { field: &'static str },
    #[error("field `{field}` must be plaintext")]
    ExpectedPlaintext { field: &'static str },
    #[error("field `{field}` holds a {actual} value, schema declares {expected}")]
    KindMismatch {
        field: &'static str,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("field `{field}`: {source}")]
    PlainValue {
        field: &'static str,
        #[source]
        source: CodecError,
    },
}

/// An immutable, ledger-submittable record.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct Record {
    kind: RecordKind,
    fields: Vec<RecordField>,
}

impl Record {
    /// Assemble a record from already-processed fields. Conformance to the
    /// kind's schema is not checked here; see [`Record::check_schema`].
    pub fn from_parts(kind: RecordKind, fields: Vec<RecordField>) -> Self {
        Self { kind, fields }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn encrypted(&self, name: &str) -> Option<&EncryptedField> {
        self.get(name).and_then(FieldValue::as_encrypted)
    }

    pub fn plain(&self, name: &str) -> Option<&CanonicalValue> {
        self.get(name).and_then(FieldValue::as_plain)
    }

    pub fn encrypted_fields(&self) -> impl Iterator<Item = (&str, &EncryptedField)> {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_encrypted().map(|e| (f.name.as_str(), e)))
    }

    /// Field names, order, sensitivity and plaintext domains must match the
    /// schema exactly. Encrypted payloads are left to the verifier.
    pub fn check_schema(&self) -> Result<(), SchemaError> {
        let schema = self.kind.schema();
        if schema.len() != self.fields.len() {
            return Err(SchemaError::FieldCount {
                kind: self.kind,
                expected: schema.len(),
                actual: self.fields.len(),
            });
        }
        for (position, (spec, field)) in schema.iter().zip(&self.fields).enumerate() {
            if spec.name != field.name {
                return Err(SchemaError::FieldName {
                    position,
                    expected: spec.name,
                    actual: field.name.clone(),
                });
            }
            match (&field.value, spec.is_sensitive()) {
                (FieldValue::Encrypted(_), true) => {}
                (FieldValue::Plain(value), false) => {
                    if value.kind() != spec.kind {
                        return Err(SchemaError::KindMismatch {
                            field: spec.name,
                            expected: spec.kind,
                            actual: value.kind(),
                        });
                    }
                    check_domain(value).map_err(|source| SchemaError::PlainValue {
                        field: spec.name,
                        source,
                    })?;
                }
                (FieldValue::Plain(_), true) => {
                    return Err(SchemaError::ExpectedEncrypted { field: spec.name })
                }
                (FieldValue::Encrypted(_), false) => {
                    return Err(SchemaError::ExpectedPlaintext { field: spec.name })
                }
            }
        }
        Ok(())
    }

    pub fn to_ledger_bytes(&self) -> Vec<u8> {
        self.encode()
    }

    /// Hand-off: the record is consumed into its ledger payload.
    pub fn into_ledger_bytes(self) -> Vec<u8> {
        self.encode()
    }

    /// Decode a ledger payload. Trailing bytes are rejected.
    pub fn from_ledger_bytes(bytes: &[u8]) -> Result<Self, parity_scale_codec::Error> {
        Self::decode_all(&mut &bytes[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, RawValue};

    fn digest() -> CanonicalValue {
        encode(ValueKind::Digest, &RawValue::hex(format!("0x{}", "ab".repeat(32)))).unwrap()
    }

    fn placeholder() -> FieldValue {
        FieldValue::Encrypted(EncryptedField {
            ciphertext: vec![1, 2, 3],
            public_key: [7u8; 32],
            proof: vec![4, 5],
        })
    }

    fn financing() -> Record {
        let invoice_id = encode(ValueKind::UnsignedInteger, &RawValue::Integer(42)).unwrap();
        Record::from_parts(
            RecordKind::FinancingRequest,
            vec![
                RecordField {
                    name: "requestedAmount".into(),
                    value: placeholder(),
                },
                RecordField {
                    name: "interestRate".into(),
                    value: placeholder(),
                },
                RecordField {
                    name: "invoiceId".into(),
                    value: FieldValue::Plain(invoice_id),
                },
                RecordField {
                    name: "requestHash".into(),
                    value: FieldValue::Plain(digest()),
                },
            ],
        )
    }

    #[test]
    fn ledger_bytes_round_trip() {
        let record = financing();
        let bytes = record.to_ledger_bytes();
        assert_eq!(Record::from_ledger_bytes(&bytes).unwrap(), record);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(Record::from_ledger_bytes(&trailing).is_err());
        assert!(Record::from_ledger_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn schema_check_accepts_conforming_layout() {
        assert_eq!(financing().check_schema(), Ok(()));
    }

    #[test]
    fn schema_check_rejects_sensitive_field_in_clear() {
        let mut fields = financing().fields().to_vec();
        fields[0].value =
            FieldValue::Plain(encode(ValueKind::UnsignedInteger, &RawValue::Integer(1)).unwrap());
        let record = Record::from_parts(RecordKind::FinancingRequest, fields);
        assert_eq!(
            record.check_schema(),
            Err(SchemaError::ExpectedEncrypted {
                field: "requestedAmount"
            })
        );
    }

    #[test]
    fn schema_check_rejects_reordered_or_missing_fields() {
        let mut fields = financing().fields().to_vec();
        fields.swap(2, 3);
        let record = Record::from_parts(RecordKind::FinancingRequest, fields.clone());
        assert!(matches!(
            record.check_schema(),
            Err(SchemaError::FieldName { position: 2, .. })
        ));

        fields.pop();
        let record = Record::from_parts(RecordKind::FinancingRequest, fields);
        assert!(matches!(
            record.check_schema(),
            Err(SchemaError::FieldCount { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn schema_check_rejects_wrong_plain_kind() {
        let mut fields = financing().fields().to_vec();
        fields[3].value = FieldValue::Plain(
            encode(ValueKind::UnsignedInteger, &RawValue::Integer(1)).unwrap(),
        );
        let record = Record::from_parts(RecordKind::FinancingRequest, fields);
        assert!(matches!(
            record.check_schema(),
            Err(SchemaError::KindMismatch {
                field: "requestHash",
                ..
            })
        ));
    }

    #[test]
    fn accessors_find_fields_by_name() {
        let record = financing();
        assert!(record.encrypted("interestRate").is_some());
        assert!(record.plain("interestRate").is_none());
        assert!(record.plain("invoiceId").is_some());
        assert!(record.get("missing").is_none());
        assert_eq!(record.encrypted_fields().count(), 2);
    }
}
