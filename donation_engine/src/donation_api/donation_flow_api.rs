use std::fmt::Debug;

use chrono::{DateTime, Utc};
use donate_common::{Kes, PhoneNumber};
use log::*;

use crate::{
    db_types::{Donation, DonationStatus, NewDonation, ProjectStatus},
    donation_api::{
        donation_objects::{
            CallbackDisposition,
            DonationFlowConfig,
            DonationInitiated,
            DonationQueryFilter,
            DonationWithProject,
            NewDonationRequest,
            PaymentCallback,
            PublicDonation,
            ReconciliationReport,
            StatusReport,
        },
        errors::DonationFlowError,
        settings_objects::{MAXIMUM_DONATION_KEY, MINIMUM_DONATION_KEY},
    },
    helpers::{sanitize_donor_name, validate_amount, DonationLimits},
    traits::{
        DonationLedger,
        PaymentProvider,
        PendingPush,
        ProviderStatus,
        PushRequest,
        Settlement,
        SettlementOutcome,
        SettingsManagement,
    },
};

/// `DonationFlowApi` is the primary API for the life of a donation: sending the payment prompt, applying the
/// provider's callbacks, answering status queries and draining the settlement outbox.
///
/// Every transition out of the in-flight states goes through [`DonationLedger::settle_donation`], so the callback
/// handler, status queries and the outbox worker can race freely. Whichever gets there first settles the donation
/// and the others become no-ops.
#[derive(Clone)]
pub struct DonationFlowApi<B, P> {
    db: B,
    provider: P,
    config: DonationFlowConfig,
}

impl<B, P: PaymentProvider> Debug for DonationFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DonationFlowApi ({} provider)", self.provider.name())
    }
}

impl<B, P> DonationFlowApi<B, P> {
    pub fn new(db: B, provider: P, config: DonationFlowConfig) -> Self {
        Self { db, provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &DonationFlowConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> DonationFlowApi<B, P>
where
    B: DonationLedger + SettingsManagement,
    P: PaymentProvider,
{
    /// The current donation limits. These come from the `minimum_donation` and `maximum_donation` settings. If either
    /// is missing or unreadable, or together they make no sense, the configured fallback applies.
    pub async fn donation_limits(&self) -> DonationLimits {
        let fallback = self.config.fallback_limits;
        let minimum = self.read_limit_setting(MINIMUM_DONATION_KEY).await;
        let maximum = self.read_limit_setting(MAXIMUM_DONATION_KEY).await;
        let limits = DonationLimits::new(minimum.unwrap_or(fallback.minimum), maximum.unwrap_or(fallback.maximum));
        if limits.is_consistent() {
            limits
        } else {
            warn!("🔄️ Donation limit settings are inconsistent ({} .. {}). Using {fallback:?}", limits.minimum, limits.maximum);
            fallback
        }
    }

    async fn read_limit_setting(&self, key: &str) -> Option<Kes> {
        match self.db.fetch_setting(key).await {
            Ok(Some(setting)) => {
                let value = setting.typed_value();
                let kes = value.as_i64().map(Kes::from).or_else(|| value.as_f64().and_then(|f| Kes::try_from(f).ok()));
                if kes.is_none() {
                    warn!("🔄️ The {key} setting ({}) is not a number. Ignoring it.", setting.setting_value);
                }
                kes
            },
            Ok(None) => None,
            Err(e) => {
                warn!("🔄️ Could not read the {key} setting. {e}");
                None
            },
        }
    }

    /// Validates a donation request, saves it as `pending` and sends the payment prompt to the donor's phone.
    ///
    /// Validation happens before anything touches the network. If the provider refuses or cannot be reached, the
    /// donation is marked `failed` and [`DonationFlowError::ProviderFailure`] is returned.
    pub async fn create_donation(&self, request: NewDonationRequest) -> Result<DonationInitiated, DonationFlowError> {
        let limits = self.donation_limits().await;
        let amount = validate_amount(request.amount, &limits)?;
        let phone = PhoneNumber::normalize(&request.phone_number)?;
        let donor_name = sanitize_donor_name(request.donor_name);
        let project =
            self.db.fetch_project(request.project_id).await?.ok_or(DonationFlowError::ProjectNotFound(request.project_id))?;
        if project.status != ProjectStatus::Active {
            return Err(DonationFlowError::ProjectNotActive(project.id));
        }
        let donation = self.db.insert_donation(NewDonation::new(project.id, amount, donor_name)).await?;
        info!("🔄️ Donation #{} of {amount} to project #{} created. Prompting {}", donation.id, project.id, phone.masked());
        let push = PushRequest {
            donation_id: donation.id,
            phone,
            amount,
            reference: format!("DONATION-{}", donation.id),
            description: format!("Donation to {}", project.title),
        };
        match self.provider.initiate_push(&push).await {
            Ok(accepted) => {
                let rc = &self.config.reconciliation;
                let next_check_at = donation.created_at + rc.settle_after_chrono();
                let expires_at = donation.created_at + rc.expire_after_chrono();
                let donation = self.db.record_push_accepted(donation.id, &accepted, next_check_at, expires_at).await?;
                debug!(
                    "🔄️ {} accepted the push for donation #{}. Checkout request {}",
                    self.provider.name(),
                    donation.id,
                    accepted.checkout_request_id
                );
                Ok(DonationInitiated {
                    donation_id: donation.id,
                    status: donation.status,
                    amount: donation.amount,
                    merchant_request_id: accepted.merchant_request_id,
                    checkout_request_id: accepted.checkout_request_id,
                    response_code: accepted.response_code,
                    response_description: accepted.response_description,
                    customer_message: accepted.customer_message,
                })
            },
            Err(e) => {
                warn!("🔄️ The {} push for donation #{} failed. {e}", self.provider.name(), donation.id);
                let reason = e.to_string();
                self.db.settle_donation(donation.id, Settlement::failed(reason.clone())).await?;
                Err(DonationFlowError::ProviderFailure { donation_id: donation.id, reason })
            },
        }
    }

    /// Reports the status of a donation, resolving it with the provider if the time is right.
    pub async fn check_status(
        &self,
        donation_id: i64,
        checkout_request_id: Option<&str>,
    ) -> Result<StatusReport, DonationFlowError> {
        self.check_status_at(donation_id, checkout_request_id, Utc::now()).await
    }

    /// [`Self::check_status`] with an explicit clock.
    ///
    /// In evaluation order:
    /// 1. An unknown donation is an error.
    /// 2. A terminal donation is reported as-is.
    /// 3. If a checkout request id is given, it must match the stored one, and the provider is asked about it
    ///    directly. The provider is only ever queried with the stored id, so a supplied id is ignored while the
    ///    donation has none.
    /// 4. Past the expiry threshold, the donation is marked `expired`.
    /// 5. Past the settle threshold, the provider is asked about the stored checkout request id.
    /// 6. Otherwise the donation is reported as `processing`, with the seconds left until step 5 applies.
    pub async fn check_status_at(
        &self,
        donation_id: i64,
        checkout_request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatusReport, DonationFlowError> {
        let donation = self.db.fetch_donation(donation_id).await?.ok_or(DonationFlowError::DonationNotFound(donation_id))?;
        if donation.status.is_terminal() {
            return Ok(StatusReport::for_donation(&donation, None));
        }
        let query_now = match (checkout_request_id, donation.checkout_request_id.as_deref()) {
            (Some(given), Some(stored)) if given != stored => {
                return Err(DonationFlowError::CheckoutMismatch(donation_id));
            },
            (Some(_), Some(_)) => true,
            (Some(given), None) => {
                debug!("🔄️ Donation #{donation_id} has no checkout request yet. Ignoring the supplied id {given}");
                false
            },
            (None, _) => false,
        };
        let donation = self.reconcile(donation, query_now, now).await?;
        if donation.status.is_terminal() {
            return Ok(StatusReport::for_donation(&donation, None));
        }
        let elapsed = now - donation.created_at;
        let remaining = (self.config.reconciliation.settle_after_chrono() - elapsed).num_seconds().max(0);
        Ok(StatusReport::for_donation(&donation, Some(remaining)))
    }

    /// Steps 3 to 5 of the status state machine. Returns the donation as it stands afterwards.
    async fn reconcile(
        &self,
        donation: Donation,
        query_now: bool,
        now: DateTime<Utc>,
    ) -> Result<Donation, DonationFlowError> {
        let stored = donation.checkout_request_id.clone();
        if let (true, Some(checkout_id)) = (query_now, stored.as_deref()) {
            if let Some(settled) = self.ask_provider(&donation, checkout_id, now).await? {
                return Ok(settled);
            }
        }
        let rc = &self.config.reconciliation;
        let elapsed = now - donation.created_at;
        if elapsed >= rc.expire_after_chrono() {
            let reason = format!("No confirmation received within {}s", rc.expire_after.as_secs());
            let outcome = self.db.settle_donation(donation.id, Settlement::expired(reason)).await?;
            if outcome.was_applied() {
                info!("🔄️ Donation #{} expired without confirmation", donation.id);
            }
            return Ok(outcome.into_donation());
        }
        if let (false, Some(checkout_id)) = (query_now, stored.as_deref()) {
            if elapsed >= rc.settle_after_chrono() {
                if let Some(settled) = self.ask_provider(&donation, checkout_id, now).await? {
                    return Ok(settled);
                }
            }
        }
        Ok(donation)
    }

    /// Asks the provider for the outcome of the push and applies it. Returns `None` if the provider has no final
    /// answer yet, or could not be asked.
    async fn ask_provider(
        &self,
        donation: &Donation,
        checkout_request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Donation>, DonationFlowError> {
        let pending = PendingPush {
            donation_id: donation.id,
            checkout_request_id: checkout_request_id.to_string(),
            amount: donation.amount,
            initiated_at: donation.created_at,
            checked_at: now,
        };
        let status = match self.provider.query_push(&pending).await {
            Ok(status) => status,
            Err(e) => {
                warn!("🔄️ Could not query {} about donation #{}. {e}", self.provider.name(), donation.id);
                return Ok(None);
            },
        };
        trace!("🔄️ {} reports {status:?} for donation #{}", self.provider.name(), donation.id);
        let settlement = match status {
            ProviderStatus::InProgress => return Ok(None),
            ProviderStatus::Settled { receipt } => Settlement::completed(receipt),
            ProviderStatus::Cancelled { description } => Settlement::cancelled(description),
            ProviderStatus::Failed { code, description } => Settlement::failed(format!("{description} ({code})")),
        };
        let outcome = self.db.settle_donation(donation.id, settlement).await?;
        if let SettlementOutcome::Settled(d) = &outcome {
            info!("🔄️ Donation #{} resolved as {} after querying {}", d.id, d.status, self.provider.name());
        }
        Ok(Some(outcome.into_donation()))
    }

    /// Applies a result callback from the provider.
    ///
    /// A successful payment whose reported amount differs from the donation's is marked `failed` and not credited.
    /// Unknown correlation ids and repeated deliveries change nothing.
    pub async fn process_callback(&self, callback: PaymentCallback) -> Result<CallbackDisposition, DonationFlowError> {
        let Some(donation) = self.db.fetch_donation_by_checkout_id(&callback.checkout_request_id).await? else {
            warn!("🔄️ Callback for unknown checkout request {} ignored", callback.checkout_request_id);
            return Ok(CallbackDisposition::UnknownCheckout(callback.checkout_request_id));
        };
        if donation.status.is_terminal() {
            debug!("🔄️ Donation #{} is already {}. Duplicate callback ignored", donation.id, donation.status);
            return Ok(CallbackDisposition::Duplicate(donation));
        }
        let status = ProviderStatus::from_result_code(callback.result_code, &callback.result_desc, callback.receipt);
        let settlement = match status {
            ProviderStatus::Settled { receipt } => match callback.amount.map(Kes::try_from) {
                Some(Ok(paid)) if paid != donation.amount => {
                    warn!(
                        "🔄️ Donation #{} expected {} but the provider reported {paid}. Marking it failed",
                        donation.id, donation.amount
                    );
                    Settlement::failed(format!("Amount mismatch. Expected {}, received {paid}", donation.amount))
                },
                Some(Err(e)) => Settlement::failed(format!("Amount mismatch. {e}")),
                _ => Settlement::completed(receipt),
            },
            ProviderStatus::Cancelled { description } => Settlement::cancelled(description),
            ProviderStatus::Failed { code, description } => Settlement::failed(format!("{description} ({code})")),
            ProviderStatus::InProgress => return Ok(CallbackDisposition::Duplicate(donation)),
        };
        let outcome = self.db.settle_donation(donation.id, settlement).await?;
        Ok(match outcome {
            SettlementOutcome::Settled(d) => {
                info!("🔄️ Callback settled donation #{} as {}", d.id, d.status);
                CallbackDisposition::Applied(d)
            },
            SettlementOutcome::NoOp(d) => CallbackDisposition::Duplicate(d),
        })
    }

    /// Applies the provider's timeout notification. The matching in-flight donation is marked `expired`.
    pub async fn process_timeout(&self, checkout_request_id: &str) -> Result<CallbackDisposition, DonationFlowError> {
        let Some(donation) = self.db.fetch_donation_by_checkout_id(checkout_request_id).await? else {
            warn!("🔄️ Timeout for unknown checkout request {checkout_request_id} ignored");
            return Ok(CallbackDisposition::UnknownCheckout(checkout_request_id.to_string()));
        };
        let outcome = self.db.settle_donation(donation.id, Settlement::expired("The payment request timed out")).await?;
        Ok(match outcome {
            SettlementOutcome::Settled(d) => {
                info!("🔄️ Donation #{} expired on provider timeout", d.id);
                CallbackDisposition::Applied(d)
            },
            SettlementOutcome::NoOp(d) => CallbackDisposition::Duplicate(d),
        })
    }

    /// Drains the settlement outbox: every task due at `now` is resolved or pushed back by one poll interval.
    ///
    /// Errors on individual tasks are logged and counted. They never abort the drain.
    pub async fn reconcile_due(&self, now: DateTime<Utc>) -> Result<ReconciliationReport, DonationFlowError> {
        let rc = self.config.reconciliation;
        let tasks = self.db.fetch_due_tasks(now, rc.batch_size).await?;
        let mut report = ReconciliationReport::default();
        for task in tasks {
            let donation = match self.db.fetch_donation(task.donation_id).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    warn!("🔄️ Reconciliation task #{} points at missing donation #{}", task.id, task.donation_id);
                    report.errors += 1;
                    continue;
                },
                Err(e) => {
                    error!("🔄️ Could not fetch donation #{} for reconciliation. {e}", task.donation_id);
                    report.errors += 1;
                    continue;
                },
            };
            if donation.status.is_terminal() {
                if let Err(e) = self.db.delete_task_for_donation(donation.id).await {
                    error!("🔄️ Could not remove the stale task for donation #{}. {e}", donation.id);
                    report.errors += 1;
                }
                continue;
            }
            match self.reconcile(donation, false, now).await {
                Ok(d) if d.status.is_terminal() => report.record(d.status),
                Ok(d) => {
                    let next = now + rc.poll_interval_chrono();
                    match self.db.reschedule_task(task.id, next).await {
                        Ok(()) => report.record(d.status),
                        Err(e) => {
                            error!("🔄️ Could not reschedule task #{}. {e}", task.id);
                            report.errors += 1;
                        },
                    }
                },
                Err(e) => {
                    error!("🔄️ Reconciliation of donation #{} failed. {e}", task.donation_id);
                    report.errors += 1;
                },
            }
        }
        Ok(report)
    }

    /// Manually marks an in-flight donation `completed`, crediting its project.
    pub async fn confirm_donation(
        &self,
        donation_id: i64,
        receipt: Option<String>,
        confirmed_by: &str,
    ) -> Result<Donation, DonationFlowError> {
        let mut settlement = Settlement::completed(receipt);
        settlement.result_desc = Some(format!("Confirmed manually by {confirmed_by}"));
        let donation = self.settle_manually(donation_id, settlement).await?;
        info!("🔄️ Donation #{donation_id} confirmed manually by {confirmed_by}");
        Ok(donation)
    }

    /// Manually moves an in-flight donation into a terminal state. Moving it to `completed` is a confirmation.
    pub async fn update_donation_status(
        &self,
        donation_id: i64,
        status: DonationStatus,
        receipt: Option<String>,
        changed_by: &str,
    ) -> Result<Donation, DonationFlowError> {
        let settlement = match status {
            DonationStatus::Completed => return self.confirm_donation(donation_id, receipt, changed_by).await,
            DonationStatus::Pending | DonationStatus::Processing => {
                return Err(DonationFlowError::InvalidTargetStatus(status))
            },
            status => Settlement { status, receipt: None, result_desc: Some(format!("Set to {status} by {changed_by}")) },
        };
        let donation = self.settle_manually(donation_id, settlement).await?;
        info!("🔄️ Donation #{donation_id} manually set to {status} by {changed_by}");
        Ok(donation)
    }

    async fn settle_manually(&self, donation_id: i64, settlement: Settlement) -> Result<Donation, DonationFlowError> {
        match self.db.settle_donation(donation_id, settlement).await? {
            SettlementOutcome::Settled(d) => Ok(d),
            SettlementOutcome::NoOp(d) => Err(DonationFlowError::AlreadySettled { id: d.id, status: d.status }),
        }
    }

    pub async fn fetch_donation(&self, donation_id: i64) -> Result<Donation, DonationFlowError> {
        self.db.fetch_donation(donation_id).await?.ok_or(DonationFlowError::DonationNotFound(donation_id))
    }

    /// The full (admin) view of donations, newest first.
    pub async fn search_donations(
        &self,
        query: DonationQueryFilter,
    ) -> Result<Vec<DonationWithProject>, DonationFlowError> {
        let donations = self.db.search_donations(query).await?;
        Ok(donations)
    }

    /// The anonymized view of donations, newest first.
    pub async fn public_donations(&self, query: DonationQueryFilter) -> Result<Vec<PublicDonation>, DonationFlowError> {
        let donations = self.db.search_donations(query).await?;
        Ok(donations.into_iter().map(PublicDonation::from).collect())
    }
}
