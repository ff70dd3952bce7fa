//! Client side of an application: collects details and documents, takes the
//! optional fee, and hands one payload to the intake handler.

pub mod encode;
pub mod flow;
pub mod form;
pub mod payment;
pub mod transport;

#[cfg(test)]
mod tests;

pub use encode::{encode_documents, encode_documents_async, EncodeError};
pub use flow::{ApplyFlow, ApplyStep, FlowError, FlowSettings};
pub use form::{ApplicantDetails, DocumentSlot, FieldError, FileSource, SelectedFile};
pub use payment::{
    CheckoutError, CheckoutGateway, CheckoutOutcome, CheckoutPrefill, CheckoutRequest,
    CheckoutSettings, PaymentReceipt, CHECKOUT_CURRENCY,
};
pub use transport::{HttpSubmissionTransport, SubmissionTransport, TransportError};
