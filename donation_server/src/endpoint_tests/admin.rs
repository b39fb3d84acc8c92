use actix_web::{http::StatusCode, test::TestRequest, web};
use donation_engine::{
    db_types::{DonationStatus, Kes},
    test_utils::teardown,
    DonationLedger,
    ProjectApi,
    ProjectManagement,
    SettingsApi,
    SimulatedProvider,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{
    admin_token,
    auth_api,
    donation_request,
    json,
    new_db,
    new_project,
    send_request,
    simulated_flow,
    ADMIN_PASSWORD,
};
use crate::{
    middleware::{AdminSessionMiddlewareFactory, SESSION_TOKEN_HEADER},
    routes::{
        admin_me,
        AdminConfirmDonationRoute,
        AdminCreateProjectRoute,
        AdminDeleteProjectRoute,
        AdminGetSettingsRoute,
        AdminListDonationsRoute,
        AdminLoginRoute,
        AdminLogoutRoute,
        AdminRecalculateTotalsRoute,
        AdminResetSettingsRoute,
        AdminUpdateDonationStatusRoute,
        AdminUpdateProjectRoute,
        AdminUpdateSettingsRoute,
    },
};

fn admin_api(db: &SqliteDatabase) -> impl FnOnce(&mut web::ServiceConfig) {
    let auth = auth_api(db);
    let flow_api = simulated_flow(db);
    let project_api = ProjectApi::new(db.clone());
    let settings_api = SettingsApi::new(db.clone());
    move |cfg| {
        cfg.app_data(web::Data::new(auth.clone()))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(project_api))
            .app_data(web::Data::new(settings_api))
            .service(AdminLoginRoute::<SqliteDatabase>::new())
            .service(
                web::scope("/api/admin")
                    .wrap(AdminSessionMiddlewareFactory::new(auth))
                    .service(AdminLogoutRoute::<SqliteDatabase>::new())
                    .service(admin_me)
                    .service(AdminRecalculateTotalsRoute::<SqliteDatabase>::new())
                    .service(AdminCreateProjectRoute::<SqliteDatabase>::new())
                    .service(AdminUpdateProjectRoute::<SqliteDatabase>::new())
                    .service(AdminDeleteProjectRoute::<SqliteDatabase>::new())
                    .service(AdminListDonationsRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(AdminConfirmDonationRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(AdminUpdateDonationStatusRoute::<SqliteDatabase, SimulatedProvider>::new())
                    .service(AdminGetSettingsRoute::<SqliteDatabase>::new())
                    .service(AdminUpdateSettingsRoute::<SqliteDatabase>::new())
                    .service(AdminResetSettingsRoute::<SqliteDatabase>::new()),
            );
    }
}

fn authed(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((SESSION_TOKEN_HEADER, token))
}

#[actix_web::test]
async fn admin_routes_need_a_session() {
    let db = new_db().await;
    let (status, body) = send_request(TestRequest::get().uri("/api/admin/me"), admin_api(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["error"], "Authentication Error. No session token was provided.");

    let req = authed(TestRequest::get().uri("/api/admin/settings"), "not-a-real-token");
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["error"], "Authentication Error. The session token is invalid or has expired.");

    let req = TestRequest::post().uri("/api/admin/projects").set_json(json!({"title": "Sneaky"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    teardown(db).await;
}

#[actix_web::test]
async fn login_and_logout() {
    let db = new_db().await;
    auth_api(&db).ensure_admin("admin", "admin@donateanon.com", ADMIN_PASSWORD).await.unwrap();

    let req = TestRequest::post().uri("/api/admin/login").set_json(json!({"username": "admin", "password": "nope"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::post().uri("/api/admin/login").set_json(json!({"username": "", "password": ""}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/api/admin/login")
        .set_json(json!({"username": "admin", "password": ADMIN_PASSWORD}));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["admin"]["username"], "admin");
    let token = body["token"].as_str().unwrap().to_string();

    // Bearer tokens are accepted too
    let req = TestRequest::get().uri("/api/admin/me").insert_header(("Authorization", format!("Bearer {token}")));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["email"], "admin@donateanon.com");

    let (status, _) = send_request(authed(TestRequest::post().uri("/api/admin/logout"), &token), admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_request(authed(TestRequest::get().uri("/api/admin/me"), &token), admin_api(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    teardown(db).await;
}

#[actix_web::test]
async fn manage_projects() {
    let db = new_db().await;
    let token = admin_token(&db).await;
    let req = authed(TestRequest::post().uri("/api/admin/projects"), &token).set_json(json!({
        "title": "Solar for Turkana",
        "description": "Solar panels for three schools",
        "target_amount": 120000,
        "category": "Education"
    }));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::CREATED);
    let body = json(&body);
    assert_eq!(body["status"], "active");
    assert_eq!(body["current_amount"], 0);
    let id = body["id"].as_i64().unwrap();

    let uri = format!("/api/admin/projects/{id}");
    let update = json!({"status": "paused", "target_amount": 90000});
    let req = authed(TestRequest::put().uri(&uri), &token).set_json(update);
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "paused");
    let req = authed(TestRequest::put().uri(&uri), &token).set_json(json!({"status": "archived"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = authed(TestRequest::put().uri("/api/admin/projects/999"), &token).set_json(json!({"title": "Ghost"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = authed(TestRequest::post().uri("/api/admin/projects/recalculate"), &token);
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!([]));

    let (status, _) = send_request(authed(TestRequest::delete().uri(&uri), &token), admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(db.fetch_project(id).await.unwrap().is_none());
    teardown(db).await;
}

#[actix_web::test]
async fn manage_donations() {
    let db = new_db().await;
    let token = admin_token(&db).await;
    let project = new_project(&db, "Water for Kibera").await;
    let flow = simulated_flow(&db);
    let first = flow.create_donation(donation_request(project.id, 700.0)).await.unwrap();
    let second = flow.create_donation(donation_request(project.id, 200.0)).await.unwrap();

    let uri = format!("/api/admin/donations/{}/confirm", first.donation_id);
    let req = authed(TestRequest::post().uri(&uri), &token).set_json(json!({"mpesa_receipt": "QKMANUAL01"}));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "completed");
    // Confirming twice is a conflict, and the project is only credited once
    let (status, _) = send_request(authed(TestRequest::post().uri(&uri), &token), admin_api(&db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let project_now = db.fetch_project(project.id).await.unwrap().unwrap();
    assert_eq!(project_now.current_amount, Kes::from(700));
    // A receipt can only settle one donation
    let third = flow.create_donation(donation_request(project.id, 300.0)).await.unwrap();
    let uri = format!("/api/admin/donations/{}/confirm", third.donation_id);
    let req = authed(TestRequest::post().uri(&uri), &token).set_json(json!({"mpesa_receipt": "QKMANUAL01"}));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["error"], "The M-Pesa receipt QKMANUAL01 is already recorded against another donation");
    assert_eq!(db.fetch_donation(third.donation_id).await.unwrap().unwrap().status, DonationStatus::Pending);

    let uri = format!("/api/admin/donations/{}/status", second.donation_id);
    let req = authed(TestRequest::post().uri(&uri), &token).set_json(json!({"status": "pending"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = authed(TestRequest::post().uri(&uri), &token).set_json(json!({"status": "cancelled"}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(db.fetch_donation(second.donation_id).await.unwrap().unwrap().status, DonationStatus::Cancelled);

    let req = authed(TestRequest::get().uri("/api/admin/donations?status=completed"), &token);
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["mpesa_receipt"], "QKMANUAL01");
    assert_eq!(body[0]["project_title"], "Water for Kibera");
    let req = authed(TestRequest::get().uri("/api/admin/donations?status=lost"), &token);
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    teardown(db).await;
}

#[actix_web::test]
async fn manage_settings() {
    let db = new_db().await;
    let token = admin_token(&db).await;
    let req = authed(TestRequest::get().uri("/api/admin/settings"), &token);
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["minimum_donation"], 10);

    let req = authed(TestRequest::put().uri("/api/admin/settings"), &token)
        .set_json(json!({"settings": {"minimum_donation": 50, "platform_name": "Harambee"}}));
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["minimum_donation"], 50);
    assert_eq!(body["platform_name"], "Harambee");

    let req = authed(TestRequest::put().uri("/api/admin/settings"), &token)
        .set_json(json!({"settings": {"maximum_donation": "lots"}}));
    let (status, _) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = authed(TestRequest::post().uri("/api/admin/settings/reset"), &token);
    let (status, body) = send_request(req, admin_api(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["minimum_donation"], 10);
    assert_eq!(body["platform_name"], "DonateAnon");
    teardown(db).await;
}
