use actix_web::{http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::Duration;
use donation_engine::{
    db_types::{Kes, NewProject, Project},
    donation_objects::{DonationFlowConfig, NewDonationRequest},
    test_utils::{prepare_test_env, random_db_path},
    AdminAuthApi,
    DonationFlowApi,
    ProjectManagement,
    SimulatedProvider,
    SqliteDatabase,
};
use log::debug;

use crate::{
    helpers::calculate_hmac,
    middleware::CALLBACK_SIGNATURE_HEADER,
    server::{json_config, query_config},
};

pub const CALLBACK_SECRET: &str = "callback-test-secret";
pub const ADMIN_PASSWORD: &str = "s3cure-pass";

pub async fn new_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

pub async fn new_project(db: &SqliteDatabase, title: &str) -> Project {
    let project = NewProject::new(title, "Clean water for everyone", Kes::from(50_000), "Health & Environment");
    db.insert_project(project).await.expect("Error inserting project")
}

pub fn simulated_flow(db: &SqliteDatabase) -> DonationFlowApi<SqliteDatabase, SimulatedProvider> {
    DonationFlowApi::new(db.clone(), SimulatedProvider::default(), DonationFlowConfig::default())
}

/// A cheap bcrypt cost keeps the admin tests fast.
pub fn auth_api(db: &SqliteDatabase) -> AdminAuthApi<SqliteDatabase> {
    AdminAuthApi::new(db.clone(), Duration::hours(1)).with_hash_cost(4)
}

/// Creates the admin account and returns a live session token for it.
pub async fn admin_token(db: &SqliteDatabase) -> String {
    let api = auth_api(db);
    api.ensure_admin("admin", "admin@donateanon.com", ADMIN_PASSWORD).await.expect("Error creating admin");
    api.login("admin", ADMIN_PASSWORD).await.expect("Error logging in").token
}

pub fn donation_request(project_id: i64, amount: f64) -> NewDonationRequest {
    NewDonationRequest {
        project_id,
        amount,
        phone_number: "0712345678".into(),
        donor_name: Some("Amina".into()),
        donor_email: Some("amina@example.com".into()),
    }
}

pub fn signed_callback(req: TestRequest, body: &str) -> TestRequest {
    let signature = calculate_hmac(CALLBACK_SECRET, body.as_bytes());
    req.insert_header((CALLBACK_SIGNATURE_HEADER, signature)).set_payload(body.to_string())
}

/// Sends `req` to an app built by `configure` and returns the status and body. Errors raised by middleware are
/// rendered the same way the server would render them.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).app_data(query_config()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = actix_web::body::to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
