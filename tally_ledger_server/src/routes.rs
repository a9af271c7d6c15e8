//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database calls) must
//! be expressed as a future or asynchronous function so that worker threads can interleave other requests.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use tally_ledger_engine::{
    db_types::{ContractId, NewContract, ValueKind},
    traits::{EntryQueryFilter, LedgerBackend, Pagination},
    AccountManagement,
    ContractFlowApi,
    LedgerApi,
    PurchaseFlowApi,
};

use crate::{
    data_objects::{
        AccountRequest,
        PurchaseRequest,
        PurchaseResponse,
        RegisterContractRequest,
        TransitionRequest,
        VerifyRequest,
    },
    errors::ServerError,
    gateway::{CheckoutGateway, HostedCheckout},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds+)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
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

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(account => Post "/account" impl LedgerBackend);
/// Resolves (or lazily creates) the account id for an owner and value kind. Called by the identity collaborator
/// when a user first touches the ledger.
pub async fn account<B: LedgerBackend>(
    body: web::Json<AccountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let AccountRequest { owner_id, kind } = body.into_inner();
    trace!("💻️ Account lookup for {owner_id} ({kind})");
    let account_id = api.account_id_for_owner(&owner_id, kind).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "account_id": account_id })))
}

route!(balance => Get "/balance/{account_id}" impl AccountManagement);
pub async fn balance<B: AccountManagement>(
    path: web::Path<i64>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    trace!("💻️ Balance request for account #{account_id}");
    let balance = api.balance(account_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(history => Get "/history/{account_id}" impl AccountManagement);
pub async fn history<B: AccountManagement>(
    path: web::Path<i64>,
    pagination: web::Query<Pagination>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    trace!("💻️ History request for account #{account_id}");
    let filter = EntryQueryFilter::default().with_account_id(account_id);
    let entries = api.history(filter, pagination.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(packages => Get "/packages/{kind}" impl AccountManagement);
pub async fn packages<B: AccountManagement>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let kind = path
        .into_inner()
        .parse::<ValueKind>()
        .map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    let packages = api.packages(kind).await?;
    Ok(HttpResponse::Ok().json(packages))
}

//----------------------------------------------   Purchases  ----------------------------------------------------
route!(purchase => Post "/purchase" impl LedgerBackend);
/// Creates a purchase session and a gateway checkout for it. The gateway interaction happens between the two
/// database writes, never inside either, so a slow gateway cannot stall concurrent ledger operations.
pub async fn purchase<B: LedgerBackend>(
    body: web::Json<PurchaseRequest>,
    api: web::Data<PurchaseFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    gateway: web::Data<HostedCheckout>,
) -> Result<HttpResponse, ServerError> {
    let PurchaseRequest { account_id, package_id } = body.into_inner();
    debug!("💻️ Purchase request from account #{account_id} for package #{package_id}");
    let session = api.new_session(account_id, package_id).await?;
    let package = ledger
        .package(package_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Package #{package_id}")))?;
    let intent = gateway.new_checkout(&session, &package);
    let session = api.attach_checkout(session.id, &intent.external_ref).await?;
    let response = PurchaseResponse {
        session_id: session.id,
        external_ref: intent.external_ref,
        redirect_url: intent.redirect_url,
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(verify_purchase => Post "/purchase/verify" impl LedgerBackend);
/// Synchronous completion path, called by the UI when the user returns from the payment page. The caller fetches
/// the canonical paid amount from the gateway's status API before calling this.
pub async fn verify_purchase<B: LedgerBackend>(
    body: web::Json<VerifyRequest>,
    api: web::Data<PurchaseFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let VerifyRequest { external_ref, amount } = body.into_inner();
    debug!("💻️ Verify request for checkout [{external_ref}]");
    let entry = api.confirm(&external_ref, amount).await?;
    Ok(HttpResponse::Ok().json(entry))
}

//----------------------------------------------   Contracts  ----------------------------------------------------
route!(register_contract => Post "/contract" impl LedgerBackend);
pub async fn register_contract<B: LedgerBackend>(
    body: web::Json<RegisterContractRequest>,
    api: web::Data<ContractFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ Registering contract {} for escrow tracking", req.contract_id);
    let contract = api
        .register_contract(NewContract {
            contract_id: req.contract_id,
            client_account_id: req.client_account_id,
            freelancer_account_id: req.freelancer_account_id,
            amount: req.amount,
        })
        .await?;
    Ok(HttpResponse::Ok().json(contract))
}

route!(transition => Post "/contract/{contract_id}/transition" impl LedgerBackend);
/// Invoked by the contract CRUD collaborator on accept/complete/cancel/admin-resolve actions.
pub async fn transition<B: LedgerBackend>(
    path: web::Path<String>,
    body: web::Json<TransitionRequest>,
    api: web::Data<ContractFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let contract_id = ContractId::from(path.into_inner());
    let TransitionRequest { event } = body.into_inner();
    debug!("💻️ Transition {event} requested for contract {contract_id}");
    let outcome = api.transition(&contract_id, event).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
