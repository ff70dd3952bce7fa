use std::future::Future;
use std::sync::Mutex;

use crate::apply::flow::{ApplyFlow, FlowSettings};
use crate::apply::form::{ApplicantDetails, DocumentSlot, SelectedFile};
use crate::apply::payment::{
    CheckoutError, CheckoutGateway, CheckoutOutcome, CheckoutRequest, CheckoutSettings,
};
use crate::apply::transport::{SubmissionTransport, TransportError};
use crate::intake::{ApplicationId, IntakeResponse, SubmissionPayload};

pub(super) const MAX_FILE_BYTES: u64 = 1024;

pub(super) fn details() -> ApplicantDetails {
    ApplicantDetails {
        name: "Rahul Sharma".to_string(),
        email: "rahul@example.com".to_string(),
        phone: "9876543210".to_string(),
        course: "bams".to_string(),
        consent: true,
    }
}

pub(super) fn free_settings() -> FlowSettings {
    FlowSettings {
        institution: "Wadeh Medical College and Hospital".to_string(),
        max_file_bytes: MAX_FILE_BYTES,
        checkout: None,
    }
}

pub(super) fn paid_settings() -> FlowSettings {
    FlowSettings {
        checkout: Some(CheckoutSettings {
            key: "rzp_test_wadeh".to_string(),
            amount: 500,
        }),
        ..free_settings()
    }
}

pub(super) fn file_for(slot: DocumentSlot) -> SelectedFile {
    match slot {
        DocumentSlot::Photo => SelectedFile::from_bytes("photo.jpg", "image/jpeg", b"jpeg".to_vec()),
        other => SelectedFile::from_bytes(
            format!("{}.pdf", other.key()),
            "application/pdf",
            format!("%PDF {}", other.key()).into_bytes(),
        ),
    }
}

/// A flow sitting at the documents step with valid details.
pub(super) fn at_documents(settings: FlowSettings) -> ApplyFlow {
    let mut flow = ApplyFlow::new(settings);
    *flow.details_mut() = details();
    flow.continue_to_documents().expect("details are valid");
    flow
}

/// A flow with every document attached, advanced past the documents step.
pub(super) fn ready(settings: FlowSettings) -> ApplyFlow {
    let mut flow = at_documents(settings);
    for slot in DocumentSlot::ALL {
        flow.attach(slot, file_for(slot)).expect("document accepted");
    }
    flow.continue_from_documents().expect("documents complete");
    flow
}

#[derive(Debug)]
pub(super) enum Reply {
    Accept(&'static str),
    Reject(&'static str),
    Unreachable,
}

/// Records every payload and answers with a fixed reply.
#[derive(Debug)]
pub(super) struct RecordingTransport {
    reply: Reply,
    sent: Mutex<Vec<SubmissionPayload>>,
}

impl RecordingTransport {
    pub(super) fn new(reply: Reply) -> Self {
        Self {
            reply,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn sent(&self) -> Vec<SubmissionPayload> {
        self.sent.lock().expect("transport mutex poisoned").clone()
    }
}

impl SubmissionTransport for RecordingTransport {
    fn send(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<IntakeResponse, TransportError>> + Send {
        self.sent
            .lock()
            .expect("transport mutex poisoned")
            .push(payload.clone());
        let outcome = match self.reply {
            Reply::Accept(id) => Ok(IntakeResponse::Success {
                application_id: ApplicationId(id.to_string()),
            }),
            Reply::Reject(message) => Ok(IntakeResponse::Error {
                message: message.to_string(),
            }),
            Reply::Unreachable => Err(TransportError::UnexpectedResponse {
                status: 502,
                body: "Bad Gateway".to_string(),
            }),
        };
        async move { outcome }
    }
}

/// Returns a scripted outcome and remembers the request it was opened with.
#[derive(Debug)]
pub(super) struct ScriptedCheckout {
    outcome: CheckoutOutcome,
    pub(super) opened: Mutex<Vec<CheckoutRequest>>,
}

impl ScriptedCheckout {
    pub(super) fn completing(payment_id: &str) -> Self {
        Self {
            outcome: CheckoutOutcome::Completed {
                payment_id: payment_id.to_string(),
            },
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn cancelling() -> Self {
        Self {
            outcome: CheckoutOutcome::Cancelled,
            opened: Mutex::new(Vec::new()),
        }
    }
}

impl CheckoutGateway for ScriptedCheckout {
    fn open(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        self.opened
            .lock()
            .expect("checkout mutex poisoned")
            .push(request.clone());
        Ok(self.outcome.clone())
    }
}
