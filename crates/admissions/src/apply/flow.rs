use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use super::encode::{encode_documents, encode_documents_async, EncodeError};
use super::form::{ApplicantDetails, DocumentSlot, FieldError, SelectedFile};
use super::payment::{
    to_paise, CheckoutError, CheckoutGateway, CheckoutOutcome, CheckoutPrefill, CheckoutRequest,
    CheckoutSettings, PaymentReceipt, CHECKOUT_CURRENCY,
};
use super::transport::{SubmissionTransport, TransportError};
use crate::config::{ApplyConfig, DEFAULT_MAX_FILE_BYTES};
use crate::intake::{ApplicationId, IntakeResponse, SubmissionPayload};

const CHECKOUT_DESCRIPTION: &str = "Application Fee";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    Details,
    Documents,
    Payment,
    Submitted,
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApplyStep::Details => "details",
            ApplyStep::Documents => "documents",
            ApplyStep::Payment => "payment",
            ApplyStep::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub institution: String,
    pub max_file_bytes: u64,
    pub checkout: Option<CheckoutSettings>,
}

impl FlowSettings {
    pub fn from_config(config: &ApplyConfig, institution: &str) -> Self {
        Self {
            institution: institution.to_string(),
            max_file_bytes: config.max_file_bytes,
            checkout: config.checkout_key.as_ref().map(|key| CheckoutSettings {
                key: key.clone(),
                amount: config.application_fee,
            }),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            institution: crate::config::DEFAULT_INSTITUTION.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            checkout: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{}", join_messages(.0))]
    InvalidDetails(Vec<FieldError>),
    #[error("Documents Required: please upload {}", join_labels(.0))]
    DocumentsRequired(Vec<DocumentSlot>),
    #[error("{slot} must be {} or smaller", megabytes(.limit))]
    FileTooLarge { slot: DocumentSlot, limit: u64 },
    #[error("{file} is not an accepted file type for {slot}")]
    UnsupportedFile { slot: DocumentSlot, file: String },
    #[error("unable to read {file}: {source}")]
    Unreadable {
        file: String,
        source: std::io::Error,
    },
    #[error("cannot {action} while at the {step} step")]
    WrongStep { action: &'static str, step: ApplyStep },
    #[error("no application fee checkout is configured")]
    PaymentNotConfigured,
    #[error("the application fee has not been paid")]
    PaymentRequired,
    #[error("Payment cancelled")]
    PaymentCancelled,
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Encoding(#[from] EncodeError),
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("application already submitted")]
    AlreadySubmitted,
}

impl FlowError {
    /// True when the applicant can fix the problem from the form itself.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            FlowError::InvalidDetails(_)
                | FlowError::DocumentsRequired(_)
                | FlowError::FileTooLarge { .. }
                | FlowError::UnsupportedFile { .. }
                | FlowError::PaymentCancelled
                | FlowError::PaymentRequired
        )
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_labels(slots: &[DocumentSlot]) -> String {
    slots
        .iter()
        .map(|slot| slot.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn megabytes(bytes: &u64) -> String {
    format!("{}MB", bytes / (1024 * 1024))
}

/// Multi-step application: details, documents, optional fee, then one submission.
#[derive(Debug)]
pub struct ApplyFlow {
    settings: FlowSettings,
    step: ApplyStep,
    details: ApplicantDetails,
    documents: BTreeMap<DocumentSlot, SelectedFile>,
    payment: Option<PaymentReceipt>,
    application_id: Option<ApplicationId>,
}

impl ApplyFlow {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            settings,
            step: ApplyStep::Details,
            details: ApplicantDetails::default(),
            documents: BTreeMap::new(),
            payment: None,
            application_id: None,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn step(&self) -> ApplyStep {
        self.step
    }

    pub fn details(&self) -> &ApplicantDetails {
        &self.details
    }

    /// Edits are re-validated on every forward transition and on submit.
    pub fn details_mut(&mut self) -> &mut ApplicantDetails {
        &mut self.details
    }

    pub fn document(&self, slot: DocumentSlot) -> Option<&SelectedFile> {
        self.documents.get(&slot)
    }

    pub fn payment(&self) -> Option<&PaymentReceipt> {
        self.payment.as_ref()
    }

    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.application_id.as_ref()
    }

    fn payment_enabled(&self) -> bool {
        self.settings.checkout.is_some()
    }

    pub fn continue_to_documents(&mut self) -> Result<ApplyStep, FlowError> {
        self.require_step("continue to documents", &[ApplyStep::Details])?;
        self.check_details()?;
        self.step = ApplyStep::Documents;
        Ok(self.step)
    }

    /// Places a file in its slot, replacing any earlier choice. A rejected file leaves the slot as it was.
    pub fn attach(&mut self, slot: DocumentSlot, file: SelectedFile) -> Result<(), FlowError> {
        self.require_step("attach documents", &[ApplyStep::Documents])?;

        let size = file.size().map_err(|source| FlowError::Unreadable {
            file: file.name.clone(),
            source,
        })?;
        if size > self.settings.max_file_bytes {
            return Err(FlowError::FileTooLarge {
                slot,
                limit: self.settings.max_file_bytes,
            });
        }
        if !slot.accepts(&file) {
            return Err(FlowError::UnsupportedFile {
                slot,
                file: file.name,
            });
        }

        self.documents.insert(slot, file);
        Ok(())
    }

    pub fn detach(&mut self, slot: DocumentSlot) -> Result<Option<SelectedFile>, FlowError> {
        self.require_step("remove documents", &[ApplyStep::Documents])?;
        Ok(self.documents.remove(&slot))
    }

    pub fn missing_documents(&self) -> Vec<DocumentSlot> {
        DocumentSlot::ALL
            .into_iter()
            .filter(|slot| !self.documents.contains_key(slot))
            .collect()
    }

    /// Moves to the fee step when a checkout is configured; otherwise the flow
    /// stays on documents, ready to submit.
    pub fn continue_from_documents(&mut self) -> Result<ApplyStep, FlowError> {
        self.require_step("continue from documents", &[ApplyStep::Documents])?;
        self.check_documents()?;
        if self.payment_enabled() {
            self.step = ApplyStep::Payment;
        }
        Ok(self.step)
    }

    pub fn checkout_request(&self) -> Result<CheckoutRequest, FlowError> {
        self.require_step("open checkout", &[ApplyStep::Payment])?;
        let checkout = self
            .settings
            .checkout
            .as_ref()
            .ok_or(FlowError::PaymentNotConfigured)?;

        Ok(CheckoutRequest {
            key: checkout.key.clone(),
            amount: to_paise(checkout.amount),
            currency: CHECKOUT_CURRENCY,
            name: self.settings.institution.clone(),
            description: CHECKOUT_DESCRIPTION.to_string(),
            prefill: CheckoutPrefill {
                name: self.details.name.trim().to_string(),
                email: self.details.email.trim().to_string(),
                contact: self.details.phone.trim().to_string(),
            },
        })
    }

    pub fn complete_checkout(
        &mut self,
        outcome: CheckoutOutcome,
    ) -> Result<&PaymentReceipt, FlowError> {
        self.require_step("record a payment", &[ApplyStep::Payment])?;
        let amount = self
            .settings
            .checkout
            .as_ref()
            .map(|checkout| checkout.amount)
            .ok_or(FlowError::PaymentNotConfigured)?;

        match outcome {
            CheckoutOutcome::Cancelled => {
                info!("fee checkout cancelled");
                Err(FlowError::PaymentCancelled)
            }
            CheckoutOutcome::Completed { payment_id } => {
                let payment_id = payment_id.trim().to_string();
                if payment_id.is_empty() {
                    return Err(CheckoutError::MissingReference.into());
                }
                info!(%payment_id, amount, "fee checkout completed");
                Ok(self.payment.insert(PaymentReceipt { payment_id, amount }))
            }
        }
    }

    /// Builds the checkout request, opens it through `gateway`, and records the outcome.
    pub fn pay<G: CheckoutGateway>(&mut self, gateway: G) -> Result<&PaymentReceipt, FlowError> {
        let request = self.checkout_request()?;
        let outcome = gateway.open(&request)?;
        self.complete_checkout(outcome)
    }

    pub fn back(&mut self) -> ApplyStep {
        self.step = match self.step {
            ApplyStep::Documents => ApplyStep::Details,
            ApplyStep::Payment => ApplyStep::Documents,
            other => other,
        };
        self.step
    }

    /// Assembles the outbound payload after re-checking every gate.
    pub fn payload(&self) -> Result<SubmissionPayload, FlowError> {
        let payload = self.submission_base()?;
        let files = encode_documents(self.selected_documents())?;
        Ok(SubmissionPayload { files, ..payload })
    }

    /// Gated payload with every field except the encoded documents.
    fn submission_base(&self) -> Result<SubmissionPayload, FlowError> {
        if self.step == ApplyStep::Submitted {
            return Err(FlowError::AlreadySubmitted);
        }
        let ready_step = if self.payment_enabled() {
            ApplyStep::Payment
        } else {
            ApplyStep::Documents
        };
        self.require_step("submit", &[ready_step])?;
        self.check_details()?;
        self.check_documents()?;
        let payment = if self.payment_enabled() {
            Some(self.payment.as_ref().ok_or(FlowError::PaymentRequired)?)
        } else {
            None
        };

        Ok(SubmissionPayload {
            name: self.details.name.trim().to_string(),
            email: self.details.email.trim().to_string(),
            phone: self.details.phone.trim().to_string(),
            course: self.details.course.trim().to_string(),
            institution: Some(self.settings.institution.clone()),
            consent: self.details.consent,
            payment_id: payment.map(|receipt| receipt.payment_id.clone()),
            application_fee: payment.map(|receipt| receipt.amount),
            ..SubmissionPayload::default()
        })
    }

    fn selected_documents(&self) -> impl Iterator<Item = (DocumentSlot, &SelectedFile)> + '_ {
        self.documents.iter().map(|(slot, file)| (*slot, file))
    }

    /// Sends the application once. Only a success acknowledgement completes the flow.
    pub async fn submit<T: SubmissionTransport>(
        &mut self,
        transport: &T,
    ) -> Result<ApplicationId, FlowError> {
        let payload = self.submission_base()?;
        let files = encode_documents_async(self.selected_documents()).await?;
        let payload = SubmissionPayload { files, ..payload };
        info!(
            course = %payload.course,
            documents = payload.files.len(),
            "submitting application"
        );

        match transport.send(&payload).await {
            Ok(IntakeResponse::Success { application_id }) => {
                info!(%application_id, "application accepted");
                self.step = ApplyStep::Submitted;
                self.application_id = Some(application_id.clone());
                Ok(application_id)
            }
            Ok(IntakeResponse::Error { message }) => {
                warn!(%message, "application rejected by intake");
                Err(FlowError::Rejected(message))
            }
            Err(err) => {
                warn!(error = %err, "application could not be delivered");
                Err(err.into())
            }
        }
    }

    fn require_step(&self, action: &'static str, allowed: &[ApplyStep]) -> Result<(), FlowError> {
        if self.step == ApplyStep::Submitted {
            return Err(FlowError::AlreadySubmitted);
        }
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(FlowError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    fn check_details(&self) -> Result<(), FlowError> {
        let errors = self.details.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FlowError::InvalidDetails(errors))
        }
    }

    fn check_documents(&self) -> Result<(), FlowError> {
        let missing = self.missing_documents();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FlowError::DocumentsRequired(missing))
        }
    }
}
