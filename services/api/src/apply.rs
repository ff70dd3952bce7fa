use admissions::apply::{
    ApplyFlow, ApplyStep, CheckoutError, CheckoutGateway, CheckoutOutcome, CheckoutRequest,
    DocumentSlot, FlowError, FlowSettings, HttpSubmissionTransport, SelectedFile,
};
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::telemetry;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ApplyArgs {
    /// Applicant's full name
    #[arg(long)]
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) email: String,
    /// Ten digit mobile number
    #[arg(long)]
    pub(crate) phone: String,
    /// Program code, e.g. `bems`
    #[arg(long)]
    pub(crate) course: String,
    /// Agree to be contacted by the admissions office
    #[arg(long)]
    pub(crate) consent: bool,
    /// Document to attach as `slot=path` (marksheet, aadhar, signature, photo)
    #[arg(long = "file", value_parser = parse_document)]
    pub(crate) files: Vec<(DocumentSlot, PathBuf)>,
    /// Reference of an already completed fee payment
    #[arg(long)]
    pub(crate) payment_id: Option<String>,
    /// Override the configured intake endpoint
    #[arg(long)]
    pub(crate) endpoint: Option<String>,
}

pub(crate) fn parse_document(raw: &str) -> Result<(DocumentSlot, PathBuf), String> {
    let (slot, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected slot=path, got '{raw}'"))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("no path given for '{slot}'"));
    }
    Ok((slot.parse()?, PathBuf::from(path)))
}

/// Stands in for the hosted checkout widget: a reference passed on the
/// command line completes the payment, no reference cancels it.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceCheckout {
    pub(crate) payment_id: Option<String>,
}

impl CheckoutGateway for ReferenceCheckout {
    fn open(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        info!(
            amount = request.amount,
            currency = request.currency,
            description = %request.description,
            "fee checkout requested"
        );
        Ok(match &self.payment_id {
            Some(payment_id) => CheckoutOutcome::Completed {
                payment_id: payment_id.clone(),
            },
            None => CheckoutOutcome::Cancelled,
        })
    }
}

pub(crate) async fn run_apply(args: ApplyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let settings = FlowSettings::from_config(&config.apply, &config.intake.institution);
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.apply.endpoint.clone());

    let mut flow = prepare_flow(settings, args)?;
    let transport = HttpSubmissionTransport::new(endpoint).map_err(FlowError::from)?;
    let application_id = flow.submit(&transport).await?;

    println!("Application submitted successfully.");
    println!("Application ID: {application_id}");
    if let Some(receipt) = flow.payment() {
        println!("Payment ID: {} (Rs. {})", receipt.payment_id, receipt.amount);
    }
    Ok(())
}

/// Runs every step short of submission.
pub(crate) fn prepare_flow(settings: FlowSettings, args: ApplyArgs) -> Result<ApplyFlow, FlowError> {
    let mut flow = ApplyFlow::new(settings);
    {
        let details = flow.details_mut();
        details.name = args.name;
        details.email = args.email;
        details.phone = args.phone;
        details.course = args.course;
        details.consent = args.consent;
    }
    flow.continue_to_documents()?;

    for (slot, path) in args.files {
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        flow.attach(slot, SelectedFile::from_path(path, mime.essence_str()))?;
    }

    if flow.continue_from_documents()? == ApplyStep::Payment {
        flow.pay(ReferenceCheckout {
            payment_id: args.payment_id,
        })?;
    }
    Ok(flow)
}
