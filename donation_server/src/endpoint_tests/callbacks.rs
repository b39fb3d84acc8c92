use actix_web::{http::StatusCode, test::TestRequest, web};
use donate_common::Secret;
use donation_engine::{
    db_types::{DonationStatus, Kes},
    test_utils::teardown,
    DonationLedger,
    ProjectManagement,
    SimulatedProvider,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{
    donation_request,
    json,
    new_db,
    new_project,
    send_request,
    signed_callback,
    simulated_flow,
    CALLBACK_SECRET,
};
use crate::{
    middleware::{HmacMiddlewareFactory, CALLBACK_SIGNATURE_HEADER},
    routes::{MpesaCallbackRoute, MpesaTimeoutRoute},
};

fn mpesa_api(db: &SqliteDatabase) -> impl FnOnce(&mut web::ServiceConfig) {
    let flow_api = simulated_flow(db);
    move |cfg| {
        cfg.app_data(web::Data::new(flow_api)).service(
            web::scope("/mpesa")
                .wrap(HmacMiddlewareFactory::new(CALLBACK_SIGNATURE_HEADER, Secret::new(CALLBACK_SECRET.into()), true))
                .service(MpesaCallbackRoute::<SqliteDatabase, SimulatedProvider>::new())
                .service(MpesaTimeoutRoute::<SqliteDatabase, SimulatedProvider>::new()),
        );
    }
}

fn post_callback(body: &str) -> TestRequest {
    signed_callback(TestRequest::post().uri("/mpesa/callback"), body)
}

fn stk_callback(checkout_request_id: &str, result_code: i64, amount: i64) -> String {
    let metadata = if result_code == 0 {
        json!({"Item": [
            {"Name": "Amount", "Value": amount},
            {"Name": "MpesaReceiptNumber", "Value": "QKT1234XYZ"},
            {"Name": "TransactionDate", "Value": 20240601120000_i64},
            {"Name": "PhoneNumber", "Value": 254712345678_i64}
        ]})
    } else {
        json!(null)
    };
    let mut callback = json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": checkout_request_id,
        "ResultCode": result_code,
        "ResultDesc": if result_code == 0 { "The service request is processed successfully." } else { "Request failed" }
    });
    if !metadata.is_null() {
        callback["CallbackMetadata"] = metadata;
    }
    json!({"Body": {"stkCallback": callback}}).to_string()
}

#[actix_web::test]
async fn unsigned_callbacks_are_forbidden() {
    let db = new_db().await;
    let body = stk_callback("ws_CO_unknown", 0, 100);
    let req = TestRequest::post().uri("/mpesa/callback").set_payload(body.clone());
    let (status, response) = send_request(req, mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json(&response)["error"].as_str().unwrap().contains("signature"));

    let req = TestRequest::post()
        .uri("/mpesa/callback")
        .insert_header((CALLBACK_SIGNATURE_HEADER, "bm90IGEgc2lnbmF0dXJl"))
        .set_payload(body);
    let (status, _) = send_request(req, mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    teardown(db).await;
}

#[actix_web::test]
async fn successful_callback_credits_the_project_once() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let initiated = simulated_flow(&db).create_donation(donation_request(project.id, 500.0)).await.unwrap();
    let body = stk_callback(&initiated.checkout_request_id, 0, 500);

    for _ in 0..2 {
        let req = signed_callback(TestRequest::post().uri("/mpesa/callback"), &body);
        let (status, response) = send_request(req, mpesa_api(&db)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&response), json!({"ResultCode": 0, "ResultDesc": "Accepted"}));
    }
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Completed);
    assert_eq!(donation.mpesa_receipt.as_deref(), Some("QKT1234XYZ"));
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(500));
    teardown(db).await;
}

#[actix_web::test]
async fn cancelled_and_mismatched_callbacks() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let flow = simulated_flow(&db);
    let cancelled = flow.create_donation(donation_request(project.id, 300.0)).await.unwrap();
    let short_paid = flow.create_donation(donation_request(project.id, 300.0)).await.unwrap();

    let body = stk_callback(&cancelled.checkout_request_id, 1032, 0);
    let (status, _) = send_request(post_callback(&body), mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = stk_callback(&short_paid.checkout_request_id, 0, 30);
    let (status, _) = send_request(post_callback(&body), mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::OK);

    let donation = db.fetch_donation(cancelled.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Cancelled);
    let donation = db.fetch_donation(short_paid.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Failed);
    let project = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.current_amount, Kes::from(0));
    teardown(db).await;
}

#[actix_web::test]
async fn unknown_and_malformed_callbacks_are_acknowledged() {
    let db = new_db().await;
    let body = stk_callback("ws_CO_does_not_exist", 0, 100);
    let (status, response) = send_request(post_callback(&body), mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["ResultCode"], 0);

    let (status, response) = send_request(post_callback("{not json"), mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["ResultDesc"], "Accepted");
    teardown(db).await;
}

#[actix_web::test]
async fn timeout_notification_expires_the_donation() {
    let db = new_db().await;
    let project = new_project(&db, "Water for Kibera").await;
    let initiated = simulated_flow(&db).create_donation(donation_request(project.id, 100.0)).await.unwrap();
    let body = stk_callback(&initiated.checkout_request_id, 1037, 0);
    let req = signed_callback(TestRequest::put().uri("/mpesa/callback"), &body);
    let (status, _) = send_request(req, mpesa_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Expired);
    // A late result callback cannot revive it
    let body = stk_callback(&initiated.checkout_request_id, 0, 100);
    send_request(post_callback(&body), mpesa_api(&db)).await;
    let donation = db.fetch_donation(initiated.donation_id).await.unwrap().unwrap();
    assert_eq!(donation.status, DonationStatus::Expired);
    teardown(db).await;
}
