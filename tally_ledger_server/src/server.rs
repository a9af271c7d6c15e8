use std::time::Duration;

use actix_web::{
    dev::{Server, Service},
    error::ErrorForbidden,
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::{info, warn};
use tally_ledger_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    ContractFlowApi,
    LedgerApi,
    PurchaseFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    expiry_worker::start_expiry_worker,
    gateway::HostedCheckout,
    gateway_routes::GatewayWebhookRoute,
    helpers::get_remote_ip,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        AccountRoute,
        BalanceRoute,
        HistoryRoute,
        PackagesRoute,
        PurchaseRoute,
        RegisterContractRoute,
        TransitionRoute,
        VerifyPurchaseRoute,
    },
};

pub const GATEWAY_HMAC_HEADER: &str = "X-Tally-Hmac-SHA256";

pub async fn run_server(config: ServerConfig) -> Result<(), crate::errors::ServerError> {
    run_server_with_hooks(config, EventHooks::default()).await
}

/// Runs the server with event hooks attached, e.g. to feed the notification collaborator. Blocks until shutdown.
pub async fn run_server_with_hooks(
    config: ServerConfig,
    hooks: EventHooks,
) -> Result<(), crate::errors::ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| crate::errors::ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| crate::errors::ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(32, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _expiry = start_expiry_worker(db.clone(), producers.clone(), config.session_timeout);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| crate::errors::ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, crate::errors::ServerError> {
    let srv = HttpServer::new(move || {
        let ledger_api = LedgerApi::new(db.clone());
        let purchase_api = PurchaseFlowApi::new(db.clone(), producers.clone());
        let contract_api = ContractFlowApi::new(db.clone(), producers.clone());
        let checkout = HostedCheckout::new(&config.gateway);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tally::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(purchase_api))
            .app_data(web::Data::new(contract_api))
            .app_data(web::Data::new(checkout));
        // Routes for the marketplace collaborators. The trusted identity layer in front of this service supplies
        // and checks user identity; these endpoints take explicit account ids.
        let api_scope = web::scope("/api")
            .service(AccountRoute::<SqliteDatabase>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(HistoryRoute::<SqliteDatabase>::new())
            .service(PackagesRoute::<SqliteDatabase>::new())
            .service(PurchaseRoute::<SqliteDatabase>::new())
            .service(VerifyPurchaseRoute::<SqliteDatabase>::new())
            .service(RegisterContractRoute::<SqliteDatabase>::new())
            .service(TransitionRoute::<SqliteDatabase>::new());
        let gateway_whitelist = config.gateway.whitelist.clone();
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let hmac = HmacMiddlewareFactory::new(
            GATEWAY_HMAC_HEADER,
            config.gateway.hmac_secret.clone(),
            config.gateway.hmac_checks,
        );
        let gateway_scope = web::scope("/gateway")
            .wrap(hmac)
            .wrap_fn(move |req, srv| {
                // Check the gateway IP against the whitelist, if one is configured. Behind a reverse proxy the
                // forwarded-header switches decide which source yields the real caller address.
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                let whitelisted = match (peer_ip, &gateway_whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("Gateway webhook from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("No IP address found in gateway peer request, denying access.");
                        false
                    },
                };
                if whitelisted {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(ErrorForbidden("Peer is not a recognised gateway address"))).boxed_local()
                }
            })
            .service(GatewayWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
