use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use skyhold_shared::pii::{mask_card_number, Masked};

use crate::{CoreError, CoreResult};

/// Card number the simulated gateway always declines.
pub const DECLINED_TEST_CARD: &str = "4000000000000002";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    /// Paid at a sales desk.
    Cash,
    /// Confirmed by an administrator outside the gateway.
    Manual,
}

impl PaymentMethod {
    pub fn requires_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Manual => "MANUAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Some(PaymentMethod::DebitCard),
            "CASH" => Some(PaymentMethod::Cash),
            "MANUAL" => Some(PaymentMethod::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: Masked<String>,
    pub holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: Masked<String>,
}

impl CardDetails {
    fn digits(&self) -> String {
        self.number
            .expose()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect()
    }

    pub fn validate(&self, now: DateTime<Utc>) -> CoreResult<()> {
        let digits = self.digits();
        if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::Validation("invalid card number".to_string()));
        }
        let cvv = self.cvv.expose();
        if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::Validation("invalid CVV".to_string()));
        }
        if self.holder.trim().is_empty() {
            return Err(CoreError::Validation("card holder is required".to_string()));
        }
        if !(1..=12).contains(&self.expiry_month) {
            return Err(CoreError::Validation("invalid expiry month".to_string()));
        }
        if (self.expiry_year, self.expiry_month) < (now.year(), now.month()) {
            return Err(CoreError::Validation("card has expired".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
}

impl PaymentRequest {
    pub fn manual() -> Self {
        Self {
            method: PaymentMethod::Manual,
            card: None,
        }
    }

    pub fn validate(&self, now: DateTime<Utc>) -> CoreResult<()> {
        match (&self.card, self.method.requires_card()) {
            (Some(card), true) => card.validate(now),
            (None, true) => Err(CoreError::Validation(
                "card details are required for card payments".to_string(),
            )),
            (_, false) => Ok(()),
        }
    }

    /// `**** 4242`, when paid by card.
    pub fn masked_card(&self) -> Option<String> {
        self.card.as_ref().map(|c| mask_card_number(c.number.expose()))
    }
}

/// What gets persisted about a payment: never the full card number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub method: PaymentMethod,
    pub masked_card: Option<String>,
    pub reference: String,
    pub processed_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Charge `amount_cents` for the reservation identified by `reservation_code`.
    async fn charge(
        &self,
        reservation_code: &str,
        amount_cents: i64,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentReceipt>;
}

/// Gateway stand-in: accepts every valid request except [`DECLINED_TEST_CARD`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedPaymentAdapter;

#[async_trait]
impl PaymentAdapter for SimulatedPaymentAdapter {
    async fn charge(
        &self,
        reservation_code: &str,
        amount_cents: i64,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentReceipt> {
        request.validate(now)?;

        if let Some(card) = &request.card {
            if card.digits() == DECLINED_TEST_CARD {
                return Err(CoreError::PaymentDeclined(format!(
                    "card {} was declined",
                    mask_card_number(card.number.expose())
                )));
            }
        }

        tracing::info!(
            "Simulated {} payment of {} cents for reservation {}",
            request.method.as_str(),
            amount_cents,
            reservation_code
        );

        Ok(PaymentReceipt {
            method: request.method,
            masked_card: request.masked_card(),
            reference: format!("SIM-{}-{}", reservation_code, now.timestamp()),
            processed_at: now,
        })
    }
}
