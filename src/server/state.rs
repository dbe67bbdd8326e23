use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::JwtValidator;
use crate::broadcast::{
    BatchDispatcher, ConfirmConfig, ConfirmationQueue, DeliveryConfirmer, DispatchConfig,
    NotificationOrchestrator, RecipientRemediator, RecipientResolver,
};
use crate::config::Settings;
use crate::directory::RecipientDirectory;
use crate::providers::{EmailTransport, PushClient};

/// Shared application state.
///
/// Provider clients are constructed once at process start and injected
/// here; no component reaches for a global handle.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub directory: Arc<dyn RecipientDirectory>,
    pub orchestrator: Arc<NotificationOrchestrator>,
    pub dispatcher: Arc<BatchDispatcher>,
    pub remediator: Arc<RecipientRemediator>,
    pub confirmation_queue: Arc<ConfirmationQueue>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        directory: Arc<dyn RecipientDirectory>,
        push_client: Arc<dyn PushClient>,
        email_transport: Arc<dyn EmailTransport>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));

        let remediator = Arc::new(RecipientRemediator::new(directory.clone()));
        let dispatcher = Arc::new(BatchDispatcher::new(
            push_client.clone(),
            email_transport,
            remediator.clone(),
            DispatchConfig::from_settings(&settings.push, &settings.email, &settings.broadcast),
        ));
        let confirmer = Arc::new(DeliveryConfirmer::new(
            push_client,
            ConfirmConfig::from_settings(&settings.push, &settings.broadcast),
        ));
        let confirmation_queue = Arc::new(ConfirmationQueue::new());

        let orchestrator = Arc::new(NotificationOrchestrator::new(
            RecipientResolver::new(directory.clone()),
            dispatcher.clone(),
            confirmer,
            remediator.clone(),
            confirmation_queue.clone(),
            Duration::from_secs(settings.broadcast.receipt_delay_seconds),
        ));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            directory,
            orchestrator,
            dispatcher,
            remediator,
            confirmation_queue,
            start_time: Instant::now(),
        }
    }
}
