//! Record assembly: collect raw values, canonicalize, encrypt the sensitive
//! ones and seal an immutable [`Record`].

use confidential_records_primitives::{
    encode, CanonicalValue, CodecError, FieldValue, FixedDecimal, RawValue, Record, RecordField,
    RecordKind, ValueKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ProverConfig;
use crate::keys::SubmissionSession;
use crate::ProverError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{kind} is missing required field `{field}`")]
    IncompleteRecord {
        kind: RecordKind,
        field: &'static str,
    },
    #[error("field `{field}` rejected: {reason}")]
    FieldRejected {
        field: &'static str,
        #[source]
        reason: ProverError,
    },
    #[error("{kind} has no field `{field}`")]
    UnknownField { kind: RecordKind, field: String },
    #[error("field `{field}` set twice")]
    DuplicateField { field: &'static str },
    #[error("record input must be a JSON object")]
    NotAnObject,
    #[error("no secure randomness available")]
    EntropyUnavailable,
}

/// A record under construction. Sealing consumes it; a failed seal leaves
/// nothing behind and the caller starts over.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    kind: RecordKind,
    values: Vec<Option<RawValue>>,
}

impl RecordBuilder {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            values: vec![None; kind.schema().len()],
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn set(mut self, name: &str, raw: impl Into<RawValue>) -> Result<Self, BuildError> {
        let (idx, spec) = self.kind.field(name).ok_or_else(|| BuildError::UnknownField {
            kind: self.kind,
            field: name.to_owned(),
        })?;
        if self.values[idx].is_some() {
            return Err(BuildError::DuplicateField { field: spec.name });
        }
        self.values[idx] = Some(raw.into());
        Ok(self)
    }

    /// Map a loosely typed JSON object onto the kind's schema. Members are
    /// taken in schema order, so the first rejected field is the first one the
    /// schema names. `null` members count as absent; members outside the
    /// schema are rejected after every schema field converted.
    pub fn from_json(kind: RecordKind, json: &Value) -> Result<Self, BuildError> {
        let object = json.as_object().ok_or(BuildError::NotAnObject)?;
        let mut builder = Self::new(kind);
        for spec in kind.schema() {
            let Some(value) = object.get(spec.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let raw = raw_from_json(spec.kind, value).map_err(|e| BuildError::FieldRejected {
                field: spec.name,
                reason: ProverError::OutOfDomain(e),
            })?;
            builder = builder.set(spec.name, raw)?;
        }
        if let Some(name) = object.keys().find(|name| kind.field(name).is_none()) {
            return Err(BuildError::UnknownField {
                kind,
                field: name.clone(),
            });
        }
        Ok(builder)
    }

    /// Seal with a fresh OS-seeded session.
    pub fn seal(self, config: &ProverConfig) -> Result<Record, BuildError> {
        let (kind, values) = self.canonicalize()?;
        let session = SubmissionSession::new(config).map_err(|_| BuildError::EntropyUnavailable)?;
        assemble(kind, values, session)
    }

    /// Seal with a caller-provided session, which is consumed.
    pub fn seal_with(self, session: SubmissionSession) -> Result<Record, BuildError> {
        let (kind, values) = self.canonicalize()?;
        assemble(kind, values, session)
    }

    /// Completeness first, then per-field encoding in schema order.
    fn canonicalize(self) -> Result<(RecordKind, Vec<CanonicalValue>), BuildError> {
        let kind = self.kind;
        let schema = kind.schema();
        let missing = schema
            .iter()
            .zip(&self.values)
            .find_map(|(spec, raw)| raw.is_none().then_some(spec));
        if let Some(spec) = missing {
            log::warn!(target: "records-prover", "{kind} missing `{}`", spec.name);
            return Err(BuildError::IncompleteRecord {
                kind,
                field: spec.name,
            });
        }

        let values = schema
            .iter()
            .zip(self.values.into_iter().flatten())
            .map(|(spec, raw)| {
                encode(spec.kind, &raw).map_err(|e| {
                    log::warn!(target: "records-prover", "{kind}.{} rejected: {e}", spec.name);
                    BuildError::FieldRejected {
                        field: spec.name,
                        reason: ProverError::OutOfDomain(e),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((kind, values))
    }
}

fn assemble(
    kind: RecordKind,
    values: Vec<CanonicalValue>,
    mut session: SubmissionSession,
) -> Result<Record, BuildError> {
    let mut fields = Vec::with_capacity(values.len());
    for (spec, value) in kind.schema().iter().zip(values) {
        let value = if spec.is_sensitive() {
            let encrypted = session.encrypt_field(&value).map_err(|reason| {
                log::warn!(target: "records-prover", "{kind}.{} rejected: {reason}", spec.name);
                BuildError::FieldRejected {
                    field: spec.name,
                    reason,
                }
            })?;
            FieldValue::Encrypted(encrypted)
        } else {
            FieldValue::Plain(value)
        };
        fields.push(RecordField {
            name: spec.name.to_owned(),
            value,
        });
    }

    let record = Record::from_parts(kind, fields);
    log::info!(
        target: "records-prover",
        "sealed {kind} with {} encrypted of {} fields",
        record.encrypted_fields().count(),
        record.fields().len()
    );
    Ok(record)
}

fn raw_from_json(kind: ValueKind, value: &Value) -> Result<RawValue, CodecError> {
    let mismatch = || CodecError::KindMismatch { kind };
    match kind {
        ValueKind::UnsignedInteger | ValueKind::Date => match value {
            Value::Number(n) => n
                .as_i64()
                .map(RawValue::from)
                .or_else(|| n.as_u64().map(RawValue::from))
                .ok_or(CodecError::OutOfDomain {
                    kind,
                    reason: "not an integer",
                }),
            Value::String(s) => s.trim().parse::<i128>().map(RawValue::Integer).map_err(|_| {
                CodecError::OutOfDomain {
                    kind,
                    reason: "not an integer",
                }
            }),
            _ => Err(mismatch()),
        },
        ValueKind::Decimal => match value {
            Value::Number(n) => n.to_string().parse::<FixedDecimal>().map(RawValue::Decimal),
            Value::String(s) => s.parse::<FixedDecimal>().map(RawValue::Decimal),
            _ => Err(mismatch()),
        },
        ValueKind::ShortString => value.as_str().map(RawValue::text).ok_or_else(mismatch),
        ValueKind::Address | ValueKind::Digest => {
            value.as_str().map(RawValue::hex).ok_or_else(mismatch)
        }
    }
}

// ------------------------------- typed inputs -------------------------------

/// A typed input that maps onto one record schema.
pub trait RecordInput {
    const KIND: RecordKind;

    fn into_builder(self) -> Result<RecordBuilder, BuildError>;
}

/// Build and seal a record from a typed input.
pub fn build<I: RecordInput>(input: I, config: &ProverConfig) -> Result<Record, BuildError> {
    input.into_builder()?.seal(config)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    pub amount: i128,
    /// `YYYYMMDD`.
    pub due_date: i128,
    pub payment_terms: String,
    pub invoice_hash: String,
    pub buyer_address: String,
}

impl RecordInput for InvoiceInput {
    const KIND: RecordKind = RecordKind::Invoice;

    fn into_builder(self) -> Result<RecordBuilder, BuildError> {
        RecordBuilder::new(Self::KIND)
            .set("amount", self.amount)?
            .set("dueDate", self.due_date)?
            .set("paymentTerms", RawValue::Text(self.payment_terms))?
            .set("invoiceHash", RawValue::Hex(self.invoice_hash))?
            .set("buyerAddress", RawValue::Hex(self.buyer_address))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingRequestInput {
    pub requested_amount: i128,
    pub interest_rate: FixedDecimal,
    pub invoice_id: i128,
    pub request_hash: String,
}

impl RecordInput for FinancingRequestInput {
    const KIND: RecordKind = RecordKind::FinancingRequest;

    fn into_builder(self) -> Result<RecordBuilder, BuildError> {
        RecordBuilder::new(Self::KIND)
            .set("requestedAmount", self.requested_amount)?
            .set("interestRate", self.interest_rate)?
            .set("invoiceId", self.invoice_id)?
            .set("requestHash", RawValue::Hex(self.request_hash))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyChainEventInput {
    pub quantity: i128,
    pub quality_score: i128,
    /// Unix seconds.
    pub delivery_time: i128,
    pub invoice_id: i128,
    pub tracking_hash: String,
}

impl RecordInput for SupplyChainEventInput {
    const KIND: RecordKind = RecordKind::SupplyChainEvent;

    fn into_builder(self) -> Result<RecordBuilder, BuildError> {
        RecordBuilder::new(Self::KIND)
            .set("quantity", self.quantity)?
            .set("qualityScore", self.quality_score)?
            .set("deliveryTime", self.delivery_time)?
            .set("invoiceId", self.invoice_id)?
            .set("trackingHash", RawValue::Hex(self.tracking_hash))
    }
}
