use serde::Serialize;

pub const CHECKOUT_CURRENCY: &str = "INR";

/// Fee checkout parameters; present only when a checkout key is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub key: String,
    /// Fee in whole rupees.
    pub amount: u32,
}

/// What the hosted checkout widget is opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub key: String,
    /// Smallest currency unit (paise).
    pub amount: u64,
    pub currency: &'static str,
    pub name: String,
    pub description: String,
    pub prefill: CheckoutPrefill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Completed { payment_id: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub amount: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("checkout completed without a payment reference")]
    MissingReference,
}

/// Opens a payment checkout and reports how the applicant left it.
pub trait CheckoutGateway {
    fn open(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError>;
}

impl<G: CheckoutGateway + ?Sized> CheckoutGateway for &G {
    fn open(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        (**self).open(request)
    }
}

pub(crate) fn to_paise(rupees: u32) -> u64 {
    u64::from(rupees) * 100
}
