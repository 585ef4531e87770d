//! Structured invoice records built from normalized rows.

use serde::Serialize;

use crate::{
    data::clean_value,
    dataset::{ColumnRef, Row, TabularDataset},
};

/// Detail payload of an [`InvoiceRecord`]; every value is a cleaned string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceDetail {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "claimNumber")]
    pub claim_number: String,
    #[serde(rename = "contractNumber")]
    pub contract_number: String,
    pub insured: String,
    #[serde(rename = "stateOfLoss")]
    pub state_of_loss: String,
    #[serde(rename = "businessType")]
    pub business_type: String,
    pub txn: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub amount: String,
    #[serde(rename = "0to30Days")]
    pub days_0_to_30: String,
    #[serde(rename = "31to60Days")]
    pub days_31_to_60: String,
    #[serde(rename = "61to90Days")]
    pub days_61_to_90: String,
    #[serde(rename = "91+Days")]
    pub days_91_plus: String,
    #[serde(rename = "netBalance")]
    pub net_balance: String,
    pub mileage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRecord {
    #[serde(rename = "claimNumber")]
    pub claim_number: String,
    pub amount: String,
    #[serde(rename = "recJson")]
    pub rec_json: InvoiceDetail,
}

/// Source columns of the invoice template, resolved once per dataset. Any
/// column absent from the file reads as null.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceColumns {
    file: Option<ColumnRef>,
    claim: Option<ColumnRef>,
    contact: Option<ColumnRef>,
    insured: Option<ColumnRef>,
    state_of_loss: Option<ColumnRef>,
    business_type: Option<ColumnRef>,
    txn: Option<ColumnRef>,
    kind: Option<ColumnRef>,
    date: Option<ColumnRef>,
    amount: Option<ColumnRef>,
    days_0_to_30: Option<ColumnRef>,
    days_31_to_60: Option<ColumnRef>,
    days_61_to_90: Option<ColumnRef>,
    days_91_plus: Option<ColumnRef>,
    net_balance: Option<ColumnRef>,
    mileage: Option<ColumnRef>,
}

impl InvoiceColumns {
    pub fn resolve(dataset: &TabularDataset) -> Self {
        let col = |name: &str| dataset.column(name);
        InvoiceColumns {
            file: col("FILE #"),
            claim: col("CLAIM #"),
            contact: col("CONTACT"),
            insured: col("INSURED"),
            state_of_loss: col("STATE OF LOSS"),
            business_type: col("BUSINESS TYPE"),
            txn: col("TXN #"),
            kind: col("TYPE"),
            date: col("DATE"),
            amount: col("AMOUNT"),
            days_0_to_30: col("0-30 DAYS"),
            days_31_to_60: col("31-60 DAYS"),
            days_61_to_90: col("61-90 DAYS"),
            days_91_plus: col("91+ DAYS"),
            net_balance: col("NET BALANCE"),
            mileage: col("MILEAGE"),
        }
    }

    pub fn claim(&self) -> Option<ColumnRef> {
        self.claim
    }

    pub fn txn(&self) -> Option<ColumnRef> {
        self.txn
    }

    pub fn build(&self, row: &Row) -> InvoiceRecord {
        let value = |column: Option<ColumnRef>| clean_value(row.get_or_null(column));
        let detail = InvoiceDetail {
            file_name: value(self.file),
            claim_number: value(self.claim),
            contract_number: value(self.contact),
            insured: value(self.insured),
            state_of_loss: value(self.state_of_loss),
            business_type: value(self.business_type),
            txn: value(self.txn),
            kind: value(self.kind),
            date: value(self.date),
            amount: value(self.amount),
            days_0_to_30: value(self.days_0_to_30),
            days_31_to_60: value(self.days_31_to_60),
            days_61_to_90: value(self.days_61_to_90),
            days_91_plus: value(self.days_91_plus),
            net_balance: value(self.net_balance),
            mileage: value(self.mileage),
        };
        InvoiceRecord {
            claim_number: detail.claim_number.clone(),
            amount: detail.amount.clone(),
            rec_json: detail,
        }
    }
}
