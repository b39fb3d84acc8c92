use chrono::Duration;
use donation_engine::{
    db_types::{DonationStatus, Kes, NewDonation},
    donation_objects::DonationQueryFilter,
    test_utils::teardown,
    traits::{ProviderStatus, PushAccepted, Settlement},
    DonationFlowError,
    DonationLedger,
    ProjectApi,
    ProjectManagement,
};

mod support;
use support::*;

#[tokio::test]
async fn processing_inside_the_settle_window() {
    let db = new_db().await;
    let project = new_project(&db, "Clean Water Initiative").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::Settled { receipt: Some("NOPE".into()) });
    let api = scripted_flow(&db, provider.clone());
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();

    let report = api.check_status_at(donation.id, None, donation.created_at + Duration::seconds(10)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Processing);
    assert_eq!(report.remaining_seconds, Some(20));
    // The provider is not asked before the window closes
    assert!(provider.queries().is_empty());
    teardown(db).await;
}

#[tokio::test]
async fn simulated_provider_completes_after_the_window() {
    let db = new_db().await;
    let project = new_project(&db, "Education for All").await;
    let api = simulated_flow(&db);
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();

    let report = api.check_status_at(donation.id, None, donation.created_at + Duration::seconds(31)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Completed);
    let settled = db.fetch_donation(donation.id).await.unwrap().unwrap();
    assert!(settled.mpesa_receipt.unwrap().starts_with("SIM"));
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(500));
    // Asking again changes nothing
    let report = api.check_status_at(donation.id, None, donation.created_at + Duration::seconds(600)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Completed);
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(500));
    teardown(db).await;
}

#[tokio::test]
async fn unanswered_donations_expire() {
    let db = new_db().await;
    let project = new_project(&db, "Community Food Bank").await;
    let api = simulated_flow(&db);
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();

    let report = api.check_status_at(donation.id, None, donation.created_at + Duration::seconds(301)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Expired);
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(0));
    assert!(db.fetch_task_for_donation(donation.id).await.unwrap().is_none());
    teardown(db).await;
}

#[tokio::test]
async fn explicit_checkout_id_queries_the_provider() {
    let db = new_db().await;
    let project = new_project(&db, "Healthcare Mobile Clinic").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::Cancelled { description: "Request cancelled by user".into() });
    let api = scripted_flow(&db, provider.clone());
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();

    let err = api.check_status(donation.id, Some("ws_CO_SOMEONE_ELSE")).await.unwrap_err();
    assert!(matches!(err, DonationFlowError::CheckoutMismatch(id) if id == donation.id));

    let report = api
        .check_status_at(donation.id, Some(&initiated.checkout_request_id), donation.created_at + Duration::seconds(2))
        .await
        .unwrap();
    assert_eq!(report.status, DonationStatus::Cancelled);
    assert_eq!(provider.queries(), vec![initiated.checkout_request_id.clone()]);
    teardown(db).await;
}

#[tokio::test]
async fn foreign_checkout_id_is_ignored_before_the_push_is_recorded() {
    let db = new_db().await;
    let project = new_project(&db, "Clean Water Initiative").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::Settled { receipt: Some("PAIDELSEWHERE".into()) });
    let api = scripted_flow(&db, provider.clone());
    let donation = db.insert_donation(NewDonation::new(project.id, Kes::from(1_000_000), None)).await.unwrap();
    assert!(donation.checkout_request_id.is_none());

    let foreign = Some("ws_CO_SOMEONE_ELSES_PAID_CHECKOUT");
    let report = api.check_status_at(donation.id, foreign, donation.created_at + Duration::seconds(1)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Processing);
    // Past the settle window there is still no stored id to ask about
    let report = api.check_status_at(donation.id, foreign, donation.created_at + Duration::seconds(45)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Processing);
    assert!(provider.queries().is_empty());
    assert_eq!(db.fetch_donation(donation.id).await.unwrap().unwrap().status, DonationStatus::Pending);
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(0));
    teardown(db).await;
}

#[tokio::test]
async fn status_check_during_an_in_flight_push() {
    let db = new_db().await;
    let project = new_project(&db, "Education for All").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::Settled { receipt: Some("PAIDELSEWHERE".into()) })
        .with_push_delay(std::time::Duration::from_millis(500));
    let api = scripted_flow(&db, provider.clone());
    let check = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let filter = DonationQueryFilter { project_id: Some(project.id), ..Default::default() };
        let id = db.search_donations(filter).await.unwrap()[0].donation.id;
        api.check_status(id, Some("ws_CO_SOMEONE_ELSES_PAID_CHECKOUT")).await.unwrap()
    };
    let (initiated, report) = tokio::join!(api.create_donation(donation_request(project.id, 1_000.0)), check);
    let initiated = initiated.unwrap();
    assert_eq!(report.status, DonationStatus::Processing);
    assert!(provider.queries().is_empty());

    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Pending);
    assert_eq!(donation.checkout_request_id, Some(initiated.checkout_request_id));
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(0));
    teardown(db).await;
}

#[tokio::test]
async fn late_push_acceptance_leaves_settled_donations_alone() {
    let db = new_db().await;
    let project = new_project(&db, "Community Food Bank").await;
    let donation = db.insert_donation(NewDonation::new(project.id, Kes::from(500), None)).await.unwrap();
    db.settle_donation(donation.id, Settlement::expired("The payment request timed out")).await.unwrap();

    let accepted = PushAccepted {
        merchant_request_id: "MR-LATE".into(),
        checkout_request_id: "ws_CO_LATE".into(),
        response_code: "0".into(),
        response_description: "Success. Request accepted for processing".into(),
        customer_message: "Success. Request accepted for processing".into(),
    };
    let next_check_at = donation.created_at + Duration::seconds(30);
    let expires_at = donation.created_at + Duration::seconds(300);
    let current = db.record_push_accepted(donation.id, &accepted, next_check_at, expires_at).await.unwrap();
    assert_eq!(current.status, DonationStatus::Expired);
    assert!(current.checkout_request_id.is_none());
    assert!(current.merchant_request_id.is_none());
    assert!(db.fetch_task_for_donation(donation.id).await.unwrap().is_none());
    assert!(db.fetch_donation_by_checkout_id("ws_CO_LATE").await.unwrap().is_none());

    let err = db.record_push_accepted(9999, &accepted, next_check_at, expires_at).await.unwrap_err();
    assert!(matches!(err, donation_engine::LedgerError::DonationNotFound(9999)));
    teardown(db).await;
}

#[tokio::test]
async fn provider_errors_fall_through() {
    let db = new_db().await;
    let project = new_project(&db, "Youth Skills Training").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::InProgress);
    provider.set_query_error("connection reset");
    let api = scripted_flow(&db, provider.clone());
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();

    let report = api.check_status_at(donation.id, None, donation.created_at + Duration::seconds(45)).await.unwrap();
    assert_eq!(report.status, DonationStatus::Processing);
    assert_eq!(report.remaining_seconds, Some(0));
    assert_eq!(provider.queries().len(), 1);

    let report = api.check_status(donation.id, None).await;
    assert!(report.is_ok());
    assert_eq!(api.check_status(9999, None).await.unwrap_err().to_string(), "Donation 9999 does not exist");
    teardown(db).await;
}

#[tokio::test]
async fn worker_drains_due_tasks() {
    let db = new_db().await;
    let project = new_project(&db, "Clean Water Initiative").await;
    let api = simulated_flow(&db);
    let a = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let b = api.create_donation(donation_request(project.id, 250.0)).await.unwrap();
    let created = db.fetch_donation(b.donation_id).await.unwrap().unwrap().created_at;

    let report = api.reconcile_due(created + Duration::seconds(5)).await.unwrap();
    assert!(report.is_empty());

    let report = api.reconcile_due(created + Duration::seconds(40)).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.errors, 0);
    for id in [a.donation_id, b.donation_id] {
        assert!(db.fetch_task_for_donation(id).await.unwrap().is_none());
        assert_eq!(db.fetch_donation(id).await.unwrap().unwrap().status, DonationStatus::Completed);
    }
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(750));

    let drift = ProjectApi::new(db.clone()).recalculate_project_totals().await.unwrap();
    assert!(drift.is_empty());
    teardown(db).await;
}

#[tokio::test]
async fn unresolved_tasks_are_rescheduled_then_expired() {
    let db = new_db().await;
    let project = new_project(&db, "Education for All").await;
    let provider = ScriptedProvider::accepting(ProviderStatus::InProgress);
    let api = scripted_flow(&db, provider);
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let created = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap().created_at;

    let now = created + Duration::seconds(31);
    let report = api.reconcile_due(now).await.unwrap();
    assert_eq!(report.still_pending, 1);
    let task = db.fetch_task_for_donation(initiated.donation_id).await.unwrap().unwrap();
    assert_eq!(task.attempts, 1);
    assert_eq!(task.next_check_at, now + Duration::seconds(15));

    // Not due yet
    let report = api.reconcile_due(now + Duration::seconds(5)).await.unwrap();
    assert!(report.is_empty());

    let report = api.reconcile_due(created + Duration::seconds(301)).await.unwrap();
    assert_eq!(report.expired, 1);
    assert!(db.fetch_task_for_donation(initiated.donation_id).await.unwrap().is_none());
    teardown(db).await;
}

#[tokio::test]
async fn callback_and_worker_race() {
    let db = new_db().await;
    let project = new_project(&db, "Community Food Bank").await;
    let api = simulated_flow(&db);
    let initiated = api.create_donation(donation_request(project.id, 400.0)).await.unwrap();
    let created = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap().created_at;
    let callback = donation_engine::donation_objects::PaymentCallback {
        merchant_request_id: initiated.merchant_request_id.clone(),
        checkout_request_id: initiated.checkout_request_id.clone(),
        result_code: 0,
        result_desc: "The service request is processed successfully.".into(),
        receipt: Some("RACE123".into()),
        amount: Some(400.0),
        phone_number: None,
        transaction_date: None,
    };
    let (cb, worker) = tokio::join!(api.process_callback(callback), api.reconcile_due(created + Duration::seconds(60)));
    cb.unwrap();
    worker.unwrap();
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(400));
    teardown(db).await;
}

#[tokio::test]
async fn drift_is_repaired() {
    let db = new_db().await;
    let project = new_project(&db, "Healthcare Mobile Clinic").await;
    let api = simulated_flow(&db);
    let initiated = api.create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let created = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap().created_at;
    api.reconcile_due(created + Duration::seconds(31)).await.unwrap();

    sqlx::query("UPDATE projects SET current_amount = 12345 WHERE id = $1")
        .bind(project.id)
        .execute(db.pool())
        .await
        .unwrap();
    let drift = ProjectApi::new(db.clone()).recalculate_project_totals().await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].stored_amount, Kes::from(12345));
    assert_eq!(drift[0].computed_amount, Kes::from(500));
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(500));
    teardown(db).await;
}
