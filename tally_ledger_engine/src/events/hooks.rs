use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    ContractActivatedEvent,
    ContractSettledEvent,
    EventHandler,
    EventProducer,
    Handler,
    PurchaseConfirmedEvent,
    SessionClosedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_confirmed_producer: Vec<EventProducer<PurchaseConfirmedEvent>>,
    pub session_closed_producer: Vec<EventProducer<SessionClosedEvent>>,
    pub contract_activated_producer: Vec<EventProducer<ContractActivatedEvent>>,
    pub contract_settled_producer: Vec<EventProducer<ContractSettledEvent>>,
}

pub struct EventHandlers {
    pub on_purchase_confirmed: Option<EventHandler<PurchaseConfirmedEvent>>,
    pub on_session_closed: Option<EventHandler<SessionClosedEvent>>,
    pub on_contract_activated: Option<EventHandler<ContractActivatedEvent>>,
    pub on_contract_settled: Option<EventHandler<ContractSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_confirmed = hooks.on_purchase_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_session_closed = hooks.on_session_closed.map(|f| EventHandler::new(buffer_size, f));
        let on_contract_activated = hooks.on_contract_activated.map(|f| EventHandler::new(buffer_size, f));
        let on_contract_settled = hooks.on_contract_settled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_purchase_confirmed, on_session_closed, on_contract_activated, on_contract_settled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_confirmed {
            result.purchase_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_session_closed {
            result.session_closed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_contract_activated {
            result.contract_activated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_contract_settled {
            result.contract_settled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_purchase_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_session_closed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_contract_activated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_contract_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_purchase_confirmed: Option<Handler<PurchaseConfirmedEvent>>,
    pub on_session_closed: Option<Handler<SessionClosedEvent>>,
    pub on_contract_activated: Option<Handler<ContractActivatedEvent>>,
    pub on_contract_settled: Option<Handler<ContractSettledEvent>>,
}

impl EventHooks {
    pub fn on_purchase_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_session_closed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SessionClosedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_session_closed = Some(Arc::new(f));
        self
    }

    pub fn on_contract_activated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ContractActivatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_contract_activated = Some(Arc::new(f));
        self
    }

    pub fn on_contract_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ContractSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_contract_settled = Some(Arc::new(f));
        self
    }
}
