use std::{net::IpAddr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use donation_engine::{AdminAuthApi, DonationFlowApi, ProjectApi, SettingsApi, SqliteDatabase, StatsApi};
use futures::{future::ok, FutureExt};
use log::*;

use crate::{
    config::ServerConfig,
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::get_remote_ip,
    integrations::mpesa::PaymentBackend,
    middleware::{AdminSessionMiddlewareFactory, HmacMiddlewareFactory, CALLBACK_SIGNATURE_HEADER},
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        admin_me,
        admin_mpesa_check,
        health,
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
        CreateDonationRoute,
        DonationStatusRoute,
        GetProjectRoute,
        ListDonationsRoute,
        ListProjectsRoute,
        MpesaCallbackRoute,
        MpesaTimeoutRoute,
        PlatformStatsRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    prepare_database(&config, &db).await?;
    let provider = PaymentBackend::from_config(&config)?;
    let _worker = start_reconciliation_worker(db.clone(), provider.clone(), config.donation_flow_config());
    let srv = create_server_instance(config, db, provider)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Runs the migrations, creates the bootstrap admin and seeds the sample projects, as configured.
pub async fn prepare_database(config: &ServerConfig, db: &SqliteDatabase) -> Result<(), ServerError> {
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    info!("🚀️ Database migrations are up to date");
    match &config.bootstrap_admin {
        Some(admin) => {
            let api = AdminAuthApi::new(db.clone(), config.session_lifetime);
            match api.ensure_admin(&admin.username, &admin.email, admin.password.reveal()).await {
                Ok(Some(identity)) => info!("🚀️ Created admin account '{}'", identity.username),
                Ok(None) => debug!("🚀️ An admin account already exists"),
                Err(e) => warn!("🚀️ Could not create the admin account. {e}"),
            }
        },
        None => debug!("🚀️ No bootstrap admin is configured"),
    }
    if config.seed_sample_projects {
        let count = ProjectApi::new(db.clone())
            .seed_sample_projects()
            .await
            .map_err(|e| ServerError::InitializeError(format!("Could not seed the sample projects. {e}")))?;
        if count > 0 {
            info!("🚀️ Seeded {count} sample projects");
        }
    }
    Ok(())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: PaymentBackend,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let flow_api = DonationFlowApi::new(db.clone(), provider.clone(), config.donation_flow_config());
        let project_api = ProjectApi::new(db.clone());
        let settings_api = SettingsApi::new(db.clone());
        let stats_api = StatsApi::new(db.clone());
        let auth_api = AdminAuthApi::new(db.clone(), config.session_lifetime);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("donate::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(project_api))
            .app_data(web::Data::new(settings_api))
            .app_data(web::Data::new(stats_api))
            .app_data(web::Data::new(auth_api.clone()))
            .app_data(web::Data::new(provider.clone()));
        // Routes that require an admin session
        let admin_scope = web::scope("/api/admin")
            .wrap(AdminSessionMiddlewareFactory::new(auth_api))
            .service(AdminLogoutRoute::<SqliteDatabase>::new())
            .service(admin_me)
            .service(AdminRecalculateTotalsRoute::<SqliteDatabase>::new())
            .service(AdminCreateProjectRoute::<SqliteDatabase>::new())
            .service(AdminUpdateProjectRoute::<SqliteDatabase>::new())
            .service(AdminDeleteProjectRoute::<SqliteDatabase>::new())
            .service(AdminListDonationsRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(AdminConfirmDonationRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(AdminUpdateDonationStatusRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(AdminGetSettingsRoute::<SqliteDatabase>::new())
            .service(AdminUpdateSettingsRoute::<SqliteDatabase>::new())
            .service(AdminResetSettingsRoute::<SqliteDatabase>::new())
            .service(admin_mpesa_check);
        let public_scope = web::scope("/api")
            .service(ListProjectsRoute::<SqliteDatabase>::new())
            .service(GetProjectRoute::<SqliteDatabase>::new())
            .service(DonationStatusRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(CreateDonationRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(ListDonationsRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(PlatformStatsRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let mpesa_whitelist = config.callback.whitelist.clone();
        let mpesa_scope = web::scope("/mpesa")
            .wrap(HmacMiddlewareFactory::new(
                CALLBACK_SIGNATURE_HEADER,
                config.callback.hmac_secret.clone(),
                config.callback.hmac_checks,
            ))
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                if is_whitelisted(peer_ip, mpesa_whitelist.as_deref()) {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .service(MpesaCallbackRoute::<SqliteDatabase, PaymentBackend>::new())
            .service(MpesaTimeoutRoute::<SqliteDatabase, PaymentBackend>::new());
        // The login route must be registered before the admin scope, which would otherwise claim it
        app.service(health)
            .service(AdminLoginRoute::<SqliteDatabase>::new())
            .service(admin_scope)
            .service(public_scope)
            .service(mpesa_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Returns JSON error bodies for payloads that cannot be deserialized.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|e, _| ServerError::InvalidRequestBody(e.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|e, _| ServerError::InvalidRequestPath(e.to_string()).into())
}

/// With no whitelist every peer is allowed. With a whitelist, the peer must be on it.
pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if allowed {
                debug!("🔐️ M-Pesa callback from {ip}");
            } else {
                warn!("🔐️ M-Pesa callback from {ip}, which is not whitelisted. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("🔐️ No IP address found in M-Pesa remote peer request, denying access.");
            false
        },
    }
}
