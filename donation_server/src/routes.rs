//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use donation_engine::{
    db_types::{AdminIdentity, NewProject},
    donation_objects::{CallbackDisposition, ManualStatusUpdate, NewDonationRequest},
    project_objects::ProjectQueryFilter,
    traits::{
        AdminAuthManagement,
        DonationLedger,
        DonationStatistics,
        PaymentProvider,
        ProjectManagement,
        SettingsManagement,
    },
    AdminAuthApi,
    DonationFlowApi,
    ProjectApi,
    SettingsApi,
    StatsApi,
};
use log::*;
use mpesa_tools::StkCallbackEnvelope;

use crate::{
    data_objects::{
        AdminDonationQuery,
        CallbackAck,
        ConfirmDonationParams,
        DonationListQuery,
        JsonResponse,
        LoginRequest,
        ProjectUpdateParams,
        SettingsUpdate,
        StatusQuery,
    },
    errors::{AuthError, ServerError},
    integrations::mpesa::{payment_callback_from_stk, PaymentBackend},
    middleware::session_token,
};

/// Storage that can drive the donation flow: the ledger plus the settings that hold the donation limits.
pub trait DonationBackend: DonationLedger + SettingsManagement {}

impl<T: DonationLedger + SettingsManagement> DonationBackend for T {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Projects  ----------------------------------------------------
route!(list_projects => Get "/projects" impl ProjectManagement);
/// Lists projects, newest first. Only active projects are listed unless `status` says otherwise (`status=all` lists
/// every project). Filter by `category`, and cap the result with `limit` (at most 100).
pub async fn list_projects<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    query: web::Query<ProjectQueryFilter>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET projects {query:?}");
    let projects = api.list_projects(query).await?;
    Ok(HttpResponse::Ok().json(projects))
}

route!(get_project => Get "/projects/{id}" impl ProjectManagement);
/// A single project with its ten most recent completed donations. Donor details are anonymized.
pub async fn get_project<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET project {id}");
    let project = api.fetch_project(id).await?;
    Ok(HttpResponse::Ok().json(project))
}

//----------------------------------------------   Donations  ----------------------------------------------------
route!(create_donation => Post "/donations" impl DonationBackend, PaymentProvider);
/// Starts a donation. The donor's phone receives a payment prompt and the donation is `pending` until the
/// provider settles it.
///
/// The phone number and e-mail address in the request are used for the prompt only. They are never stored.
pub async fn create_donation<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    body: web::Json<NewDonationRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST donation of {} to project {}", request.amount, request.project_id);
    let result = api.create_donation(request).await.map_err(|e| {
        debug!("💻️ Donation could not be started. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(result))
}

route!(list_donations => Get "/donations" impl DonationBackend, PaymentProvider);
/// Public donation feed, newest first. Contact details are always `null` and receipts are masked.
pub async fn list_donations<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    query: web::Query<DonationListQuery>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET donations {query:?}");
    let donations = api.public_donations(query.into()).await?;
    Ok(HttpResponse::Ok().json(donations))
}

route!(donation_status => Get "/donations/status" impl DonationBackend, PaymentProvider);
/// Reports where a donation is, resolving it with the provider when it is time to.
pub async fn donation_status<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, ServerError> {
    let StatusQuery { donation_id, checkout_request_id } = query.into_inner();
    trace!("💻️ GET status for donation {donation_id}");
    let report = api.check_status(donation_id, checkout_request_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Stats  ----------------------------------------------------
route!(platform_stats => Get "/stats" impl DonationStatistics);
pub async fn platform_stats<B: DonationStatistics>(api: web::Data<StatsApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET stats");
    let stats = api.fetch_stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

//----------------------------------------------   M-Pesa callbacks  ----------------------------------------------
route!(mpesa_callback => Post "/callback" impl DonationBackend, PaymentProvider);
/// Route handler for the STK push result callback.
///
/// M-Pesa retries callbacks that are not acknowledged, so this handler *always* responds with
/// `{"ResultCode":0,"ResultDesc":"Accepted"}`. Anything that goes wrong is logged instead. Repeated deliveries are
/// harmless, since a donation can only be settled once.
///
/// The signature check happens in the `HmacMiddleware` before we get here.
pub async fn mpesa_callback<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    body: web::Bytes,
) -> HttpResponse {
    trace!("💻️ Received M-Pesa callback");
    let envelope = match serde_json::from_slice::<StkCallbackEnvelope>(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("💻️ Could not parse M-Pesa callback. {e}. {}", String::from_utf8_lossy(&body));
            return HttpResponse::Ok().json(CallbackAck::accepted());
        },
    };
    let callback = payment_callback_from_stk(envelope.into_callback());
    let checkout = callback.checkout_request_id.clone();
    match api.process_callback(callback).await {
        Ok(CallbackDisposition::Applied(d)) => {
            info!("💻️ Callback for {checkout} settled donation #{} as {}", d.id, d.status)
        },
        Ok(CallbackDisposition::Duplicate(d)) => {
            debug!("💻️ Callback for {checkout} changed nothing. Donation #{} is {}", d.id, d.status)
        },
        Ok(CallbackDisposition::UnknownCheckout(_)) => warn!("💻️ Callback for unknown checkout request {checkout}"),
        Err(e) => error!("💻️ Could not process the callback for {checkout}. {e}"),
    }
    HttpResponse::Ok().json(CallbackAck::accepted())
}

route!(mpesa_timeout => Put "/callback" impl DonationBackend, PaymentProvider);
/// Route handler for the timeout notification. The in-flight donation for the checkout request is marked `expired`.
/// Like the result callback, it is always acknowledged.
pub async fn mpesa_timeout<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    body: web::Bytes,
) -> HttpResponse {
    trace!("💻️ Received M-Pesa timeout notification");
    match serde_json::from_slice::<StkCallbackEnvelope>(&body) {
        Ok(envelope) => {
            let checkout = envelope.into_callback().checkout_request_id;
            match api.process_timeout(&checkout).await {
                Ok(CallbackDisposition::Applied(d)) => info!("💻️ Donation #{} expired on timeout notification", d.id),
                Ok(_) => debug!("💻️ Timeout notification for {checkout} changed nothing"),
                Err(e) => error!("💻️ Could not process the timeout notification for {checkout}. {e}"),
            }
        },
        Err(e) => warn!("💻️ Could not parse M-Pesa timeout notification. {e}"),
    }
    HttpResponse::Ok().json(CallbackAck::accepted())
}

//----------------------------------------------   Admin auth  ----------------------------------------------------
route!(admin_login => Post "/api/admin/login" impl AdminAuthManagement);
/// Exchanges an admin username and password for a session token.
///
/// Send the token back in the `donate_session_token` header (or as a bearer token) on `/api/admin` requests.
pub async fn admin_login<A: AdminAuthManagement>(
    api: web::Data<AdminAuthApi<A>>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServerError> {
    let LoginRequest { username, password } = body.into_inner();
    if username.trim().is_empty() || password.is_empty() {
        return Err(ServerError::ValidationError("Username and password are required".into()));
    }
    debug!("💻️ POST admin login for {username}");
    let login = api.login(&username, &password).await?;
    Ok(HttpResponse::Ok().json(login))
}

route!(admin_logout => Post "/logout" impl AdminAuthManagement);
pub async fn admin_logout<A: AdminAuthManagement>(
    req: HttpRequest,
    api: web::Data<AdminAuthApi<A>>,
    admin: web::ReqData<AdminIdentity>,
) -> Result<HttpResponse, ServerError> {
    let token = session_token(req.headers()).ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
    api.logout(&token).await?;
    debug!("💻️ Admin {} logged out", admin.username);
    Ok(HttpResponse::Ok().json(JsonResponse::success("Logged out")))
}

#[get("/me")]
pub async fn admin_me(admin: web::ReqData<AdminIdentity>) -> impl Responder {
    trace!("💻️ GET me for {}", admin.username);
    HttpResponse::Ok().json(admin.into_inner())
}

//----------------------------------------------   Admin projects  ------------------------------------------------
route!(admin_create_project => Post "/projects" impl ProjectManagement);
pub async fn admin_create_project<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    admin: web::ReqData<AdminIdentity>,
    body: web::Json<NewProject>,
) -> Result<HttpResponse, ServerError> {
    let project = body.into_inner();
    debug!("💻️ POST project '{}' by {}", project.title, admin.username);
    let project = api.create_project(project).await?;
    Ok(HttpResponse::Created().json(project))
}

route!(admin_update_project => Put "/projects/{id}" impl ProjectManagement);
pub async fn admin_update_project<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    admin: web::ReqData<AdminIdentity>,
    path: web::Path<i64>,
    body: web::Json<ProjectUpdateParams>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PUT project {id} by {}", admin.username);
    let update = body.into_inner().into_update().map_err(ServerError::ValidationError)?;
    let project = api.update_project(id, update).await?;
    Ok(HttpResponse::Ok().json(project))
}

route!(admin_delete_project => Delete "/projects/{id}" impl ProjectManagement);
pub async fn admin_delete_project<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    admin: web::ReqData<AdminIdentity>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ DELETE project {id} by {}", admin.username);
    api.delete_project(id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Project {id} deleted"))))
}

route!(admin_recalculate_totals => Post "/projects/recalculate" impl ProjectManagement);
/// Recomputes every project's total from its completed donations. Returns the projects whose stored total was wrong.
pub async fn admin_recalculate_totals<B: ProjectManagement>(
    api: web::Data<ProjectApi<B>>,
    admin: web::ReqData<AdminIdentity>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST recalculate project totals by {}", admin.username);
    let drift = api.recalculate_project_totals().await?;
    Ok(HttpResponse::Ok().json(drift))
}

//----------------------------------------------   Admin donations  -----------------------------------------------
route!(admin_list_donations => Get "/donations" impl DonationBackend, PaymentProvider);
/// The full donation list, including correlation ids and receipts. Filter by `project_id` and a comma-separated
/// `status` list.
pub async fn admin_list_donations<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    query: web::Query<AdminDonationQuery>,
) -> Result<HttpResponse, ServerError> {
    let filter = query.into_inner().into_filter().map_err(ServerError::ValidationError)?;
    debug!("💻️ GET admin donations {filter:?}");
    let donations = api.search_donations(filter).await?;
    Ok(HttpResponse::Ok().json(donations))
}

route!(admin_confirm_donation => Post "/donations/{id}/confirm" impl DonationBackend, PaymentProvider);
/// Marks an in-flight donation `completed` and credits its project. Settled donations cannot be confirmed (409).
pub async fn admin_confirm_donation<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    admin: web::ReqData<AdminIdentity>,
    path: web::Path<i64>,
    body: Option<web::Json<ConfirmDonationParams>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let receipt = body.and_then(|b| b.into_inner().mpesa_receipt);
    info!("💻️ POST confirm donation {id} by {}", admin.username);
    let donation = api.confirm_donation(id, receipt, &admin.username).await?;
    Ok(HttpResponse::Ok().json(donation))
}

route!(admin_update_donation_status => Post "/donations/{id}/status" impl DonationBackend, PaymentProvider);
/// Moves an in-flight donation into a terminal state. Only `completed` credits the project.
pub async fn admin_update_donation_status<B: DonationBackend, P: PaymentProvider>(
    api: web::Data<DonationFlowApi<B, P>>,
    admin: web::ReqData<AdminIdentity>,
    path: web::Path<i64>,
    body: web::Json<ManualStatusUpdate>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let ManualStatusUpdate { status, mpesa_receipt } = body.into_inner();
    info!("💻️ POST status {status} for donation {id} by {}", admin.username);
    let donation = api.update_donation_status(id, status, mpesa_receipt, &admin.username).await?;
    Ok(HttpResponse::Ok().json(donation))
}

//----------------------------------------------   Admin settings  ------------------------------------------------
route!(admin_get_settings => Get "/settings" impl SettingsManagement);
pub async fn admin_get_settings<B: SettingsManagement>(
    api: web::Data<SettingsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET settings");
    let settings = api.fetch_settings().await?;
    Ok(HttpResponse::Ok().json(settings))
}

route!(admin_update_settings => Put "/settings" impl SettingsManagement);
/// Upserts the given settings in one go. Each value's type follows its JSON type.
pub async fn admin_update_settings<B: SettingsManagement>(
    api: web::Data<SettingsApi<B>>,
    admin: web::ReqData<AdminIdentity>,
    body: web::Json<SettingsUpdate>,
) -> Result<HttpResponse, ServerError> {
    let update = body.into_inner();
    info!("💻️ PUT {} settings by {}", update.settings.len(), admin.username);
    let settings = api.update_settings(update.settings).await?;
    Ok(HttpResponse::Ok().json(settings))
}

route!(admin_reset_settings => Post "/settings/reset" impl SettingsManagement);
pub async fn admin_reset_settings<B: SettingsManagement>(
    api: web::Data<SettingsApi<B>>,
    admin: web::ReqData<AdminIdentity>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ POST settings reset by {}", admin.username);
    let settings = api.reset_settings().await?;
    Ok(HttpResponse::Ok().json(settings))
}

//----------------------------------------------   Admin M-Pesa check  --------------------------------------------
/// Verifies the payment provider credentials. In live mode this fetches a fresh OAuth token from Daraja.
#[get("/mpesa/check")]
pub async fn admin_mpesa_check(backend: web::Data<PaymentBackend>) -> impl Responder {
    debug!("💻️ GET mpesa check ({} mode)", backend.mode());
    HttpResponse::Ok().json(backend.check_credentials().await)
}
