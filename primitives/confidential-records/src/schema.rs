//! Fixed per-kind record schemas.

use parity_scale_codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

use crate::codec::ValueKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sensitivity {
    /// Encrypted and proved; travels as an `EncryptedField`.
    Sensitive,
    /// Canonicalized only (content hashes, counterparty addresses, references).
    Plaintext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub sensitivity: Sensitivity,
}

impl FieldSpec {
    const fn sensitive(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            sensitivity: Sensitivity::Sensitive,
        }
    }

    const fn plaintext(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            sensitivity: Sensitivity::Plaintext,
        }
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitivity == Sensitivity::Sensitive
    }
}

pub const INVOICE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::sensitive("amount", ValueKind::UnsignedInteger),
    FieldSpec::sensitive("dueDate", ValueKind::Date),
    FieldSpec::sensitive("paymentTerms", ValueKind::ShortString),
    FieldSpec::plaintext("invoiceHash", ValueKind::Digest),
    FieldSpec::plaintext("buyerAddress", ValueKind::Address),
];

pub const FINANCING_REQUEST_SCHEMA: &[FieldSpec] = &[
    FieldSpec::sensitive("requestedAmount", ValueKind::UnsignedInteger),
    FieldSpec::sensitive("interestRate", ValueKind::Decimal),
    // References an invoice already on the ledger; never resolved here.
    FieldSpec::plaintext("invoiceId", ValueKind::UnsignedInteger),
    FieldSpec::plaintext("requestHash", ValueKind::Digest),
];

pub const SUPPLY_CHAIN_EVENT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::sensitive("quantity", ValueKind::UnsignedInteger),
    FieldSpec::sensitive("qualityScore", ValueKind::UnsignedInteger),
    // Unix seconds.
    FieldSpec::sensitive("deliveryTime", ValueKind::UnsignedInteger),
    FieldSpec::plaintext("invoiceId", ValueKind::UnsignedInteger),
    FieldSpec::plaintext("trackingHash", ValueKind::Digest),
];

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, TypeInfo, MaxEncodedLen, Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    #[codec(index = 0)]
    Invoice,
    #[codec(index = 1)]
    FinancingRequest,
    #[codec(index = 2)]
    SupplyChainEvent,
}

impl RecordKind {
    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            RecordKind::Invoice => INVOICE_SCHEMA,
            RecordKind::FinancingRequest => FINANCING_REQUEST_SCHEMA,
            RecordKind::SupplyChainEvent => SUPPLY_CHAIN_EVENT_SCHEMA,
        }
    }

    /// Schema position and spec of `name`, if the schema declares it.
    pub fn field(self, name: &str) -> Option<(usize, &'static FieldSpec)> {
        self.schema()
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
    }

    pub fn sensitive_fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        self.schema().iter().filter(|spec| spec.is_sensitive())
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            RecordKind::Invoice => "Invoice",
            RecordKind::FinancingRequest => "FinancingRequest",
            RecordKind::SupplyChainEvent => "SupplyChainEvent",
        })
    }
}
