use actix_web::{http::StatusCode, test::TestRequest, web};
use donation_engine::{
    db_types::DonationStatus,
    donation_objects::DonationFlowConfig,
    test_utils::teardown,
    traits::ProviderError,
    DonationFlowApi,
    DonationLedger,
    ProjectApi,
    SimulatedProvider,
    SqliteDatabase,
    StatsApi,
};
use serde_json::json;

use super::{
    helpers::{donation_request, json, new_db, new_project, send_request, simulated_flow},
    mocks::MockProvider,
};
use crate::routes::{
    health,
    CreateDonationRoute,
    DonationStatusRoute,
    GetProjectRoute,
    ListDonationsRoute,
    ListProjectsRoute,
    PlatformStatsRoute,
};

fn public_api(db: &SqliteDatabase) -> impl FnOnce(&mut web::ServiceConfig) {
    let flow_api = simulated_flow(db);
    let project_api = ProjectApi::new(db.clone());
    let stats_api = StatsApi::new(db.clone());
    move |cfg| {
        cfg.app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(project_api))
            .app_data(web::Data::new(stats_api))
            .service(health)
            .service(
                web::scope("/api")
                    .service(ListProjectsRoute::<SqliteDatabase>::new())
                    .service(GetProjectRoute::<SqliteDatabase>::new())
                    .service(DonationStatusRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(CreateDonationRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(ListDonationsRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(PlatformStatsRoute::<SqliteDatabase>::new()),
            );
    }
}

#[actix_web::test]
async fn health_check() {
    let db = new_db().await;
    let (status, body) = send_request(TestRequest::get().uri("/health"), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    teardown(db).await;
}

#[actix_web::test]
async fn create_donation() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let req = TestRequest::post().uri("/api/donations").set_json(json!({
        "project_id": project.id,
        "amount": 500,
        "phone_number": "0712345678",
        "donor_name": "Amina",
        "donor_email": "amina@example.com"
    }));
    let (status, body) = send_request(req, public_api(&db)).await;
    assert_eq!(status, StatusCode::CREATED);
    let body = json(&body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], 500);
    assert!(body["checkout_request_id"].as_str().unwrap().starts_with("ws_CO_"));

    let id = body["donation_id"].as_i64().unwrap();
    let donation = db.fetch_donation(id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Pending);
    assert_eq!(donation.donor_name.as_deref(), Some("Amina"));
    // Contact details are never stored, so they cannot come back out of the public feed either
    let (status, body) = send_request(TestRequest::get().uri("/api/donations"), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let feed = json(&body);
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["donor_name"], "Amina");
    assert!(feed[0]["phone_number"].is_null());
    assert!(feed[0]["donor_email"].is_null());
    assert_eq!(feed[0]["mpesa_transaction_id"], "PENDING");
    teardown(db).await;
}

#[actix_web::test]
async fn invalid_donations_are_rejected() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let cases = [
        (json!({"project_id": project.id, "amount": 5, "phone_number": "0712345678"}), StatusCode::BAD_REQUEST),
        (json!({"project_id": project.id, "amount": 500, "phone_number": "12345"}), StatusCode::BAD_REQUEST),
        (json!({"project_id": 999, "amount": 500, "phone_number": "0712345678"}), StatusCode::NOT_FOUND),
        (json!({"project_id": project.id, "phone_number": "0712345678"}), StatusCode::BAD_REQUEST),
    ];
    for (payload, expected) in cases {
        let req = TestRequest::post().uri("/api/donations").set_json(&payload);
        let (status, body) = send_request(req, public_api(&db)).await;
        assert_eq!(status, expected, "{payload} gave {body}");
        assert!(json(&body)["error"].is_string());
    }
    let donations = db.search_donations(Default::default()).await.unwrap();
    assert!(donations.is_empty(), "No donation should have been recorded");
    teardown(db).await;
}

#[actix_web::test]
async fn provider_failure_marks_donation_failed() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let mut provider = MockProvider::new();
    provider.expect_name().return_const("mock");
    provider
        .expect_initiate_push()
        .times(1)
        .returning(|_| Err(ProviderError::Unreachable("connection refused".into())));
    let flow_api = DonationFlowApi::new(db.clone(), provider, DonationFlowConfig::default());
    let configure = move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(flow_api))
            .service(web::scope("/api").service(CreateDonationRoute::<SqliteDatabase, MockProvider>::new()));
    };
    let req = TestRequest::post().uri("/api/donations").set_json(json!({
        "project_id": project.id,
        "amount": 250,
        "phone_number": "+254712345678"
    }));
    let (status, body) = send_request(req, configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(&body);
    let id = body["donation_id"].as_i64().expect("donation_id is missing");
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    let donation = db.fetch_donation(id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Failed);
    teardown(db).await;
}

#[actix_web::test]
async fn status_of_a_fresh_donation() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let initiated = simulated_flow(&db).create_donation(donation_request(project.id, 100.0)).await.unwrap();
    let uri = format!("/api/donations/status?donation_id={}", initiated.donation_id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "processing");
    assert!(body["remaining_seconds"].as_i64().unwrap() <= 30);

    let uri = format!("/api/donations/status?donation_id={}&checkout_request_id=ws_CO_other", initiated.donation_id);
    let (status, _) = send_request(TestRequest::get().uri(&uri), public_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send_request(TestRequest::get().uri("/api/donations/status?donation_id=404"), public_api(&db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_request(TestRequest::get().uri("/api/donations/status"), public_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    teardown(db).await;
}

#[actix_web::test]
async fn projects_and_stats() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    new_project(&db, "School desks").await;
    let (status, body) = send_request(TestRequest::get().uri("/api/projects"), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().unwrap().len(), 2);

    let uri = format!("/api/projects/{}", project.id);
    let (status, body) = send_request(TestRequest::get().uri(&uri), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["title"], "Water for Kibera");
    assert_eq!(body["recent_donations"], json!([]));

    let (status, _) = send_request(TestRequest::get().uri("/api/projects/999"), public_api(&db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_request(TestRequest::get().uri("/api/stats"), public_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["total_projects"], 2);
    teardown(db).await;
}
