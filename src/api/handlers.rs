//! HTTP trigger handlers.
//!
//! Every broadcast endpoint answers as soon as submission completes.
//! Downstream delivery failures never surface here; the request only
//! fails on payload validation or when the recipient directory is
//! unreachable during resolution.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::json;

use crate::broadcast::{AudienceSelector, BroadcastMessage, SubmissionSummary};
use crate::error::Result;
use crate::server::AppState;
use crate::template::{render_event_email, render_notification_email, EventEmailFields};

use super::models::{
    AckResponse, BroadcastResponse, EventCreatedRequest, MembershipRequestNotification,
    RegisterPushTokenRequest, RemovePushTokenRequest, UnsubscribeEmailRequest,
    UserNotificationRequest,
};

fn broadcast_response(summary: SubmissionSummary) -> Json<BroadcastResponse> {
    Json(BroadcastResponse {
        attempted: summary.attempted,
        rejected_immediately: summary.rejected_immediately,
        timestamp: Utc::now(),
    })
}

/// New-event trigger: announce to all active push and email subscribers.
#[tracing::instrument(
    name = "http.event_created",
    skip(state, request),
    fields(title = %request.title)
)]
pub async fn event_created(
    State(state): State<AppState>,
    Json(request): Json<EventCreatedRequest>,
) -> Result<Json<BroadcastResponse>> {
    if request.title.trim().is_empty() || request.details.trim().is_empty() {
        return Err(crate::error::AppError::Validation(
            "Title and details are required".to_string(),
        ));
    }
    if request.end_time <= request.start_time {
        return Err(crate::error::AppError::Validation(
            "End time must be after start time".to_string(),
        ));
    }

    let email_html = render_event_email(&EventEmailFields {
        title: request.title.clone(),
        details: request.details.clone(),
        starts_at: request.start_time,
        ends_at: request.end_time,
        location_name: request.location.name.clone(),
        location_address: request.location.formatted_address.clone(),
    });

    let message = BroadcastMessage::new(
        format!("New Event: {}", request.title),
        request.details.clone(),
    )
    .with_data(json!({
        "type": "event.created",
        "title": request.title,
        "start_time": request.start_time,
    }))
    .with_email(format!("New Event: {}", request.title), email_html);

    let summary = state
        .orchestrator
        .broadcast(message, AudienceSelector::AllSubscribers)
        .await?;

    Ok(broadcast_response(summary))
}

/// New-membership-request trigger: notify admins over push.
#[tracing::instrument(name = "http.membership_request", skip(state, request))]
pub async fn membership_request(
    State(state): State<AppState>,
    Json(request): Json<MembershipRequestNotification>,
) -> Result<Json<BroadcastResponse>> {
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(crate::error::AppError::Validation(
            "First and last name are required".to_string(),
        ));
    }

    let message = BroadcastMessage::new(
        "New membership request",
        format!(
            "{} {} requested to join the club",
            request.first_name.trim(),
            request.last_name.trim()
        ),
    )
    .with_data(json!({"type": "membership.requested"}));

    let summary = state
        .orchestrator
        .broadcast(message, AudienceSelector::AdminsOnly)
        .await?;

    Ok(broadcast_response(summary))
}

/// Direct notification to one member's registered addresses.
#[tracing::instrument(
    name = "http.notify_user",
    skip(state, request),
    fields(user_id = %request.user_id)
)]
pub async fn notify_user(
    State(state): State<AppState>,
    Json(request): Json<UserNotificationRequest>,
) -> Result<Json<BroadcastResponse>> {
    if request.title.trim().is_empty() || request.body.trim().is_empty() {
        return Err(crate::error::AppError::Validation(
            "Title and body are required".to_string(),
        ));
    }

    let email_html = render_notification_email(&request.title, &request.body);
    let message = BroadcastMessage::new(request.title.clone(), request.body.clone())
        .with_data(request.data.clone())
        .with_email(request.title.clone(), email_html);

    let summary = state
        .orchestrator
        .broadcast(message, AudienceSelector::SingleUser(request.user_id))
        .await?;

    Ok(broadcast_response(summary))
}

/// Save or replace a member's push token. Most-recent registration wins
/// and re-registering reactivates a previously deactivated token.
#[tracing::instrument(
    name = "http.register_push_token",
    skip(state, request),
    fields(user_id = %request.user_id)
)]
pub async fn register_push_token(
    State(state): State<AppState>,
    Json(request): Json<RegisterPushTokenRequest>,
) -> Result<Json<AckResponse>> {
    if request.token.trim().is_empty() {
        return Err(crate::error::AppError::Validation(
            "Push token is required".to_string(),
        ));
    }

    state
        .directory
        .register_push_token(request.user_id, request.token.trim())
        .await?;

    Ok(Json(AckResponse {
        message: "Push token saved".to_string(),
    }))
}

/// Deactivate a member's push token. The row is kept so a later
/// registration can reactivate it.
#[tracing::instrument(
    name = "http.remove_push_token",
    skip(state, request),
    fields(user_id = %request.user_id)
)]
pub async fn remove_push_token(
    State(state): State<AppState>,
    Json(request): Json<RemovePushTokenRequest>,
) -> Result<Json<AckResponse>> {
    state
        .directory
        .set_push_token_active(request.user_id, false)
        .await?;

    Ok(Json(AckResponse {
        message: "Push token removed".to_string(),
    }))
}

/// Opt a member out of announcement emails.
#[tracing::instrument(
    name = "http.unsubscribe_email",
    skip(state, request),
    fields(user_id = %request.user_id)
)]
pub async fn unsubscribe_email(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeEmailRequest>,
) -> Result<Json<AckResponse>> {
    state
        .directory
        .set_email_subscribed(request.user_id, false)
        .await?;

    Ok(Json(AckResponse {
        message: "Unsubscribed from announcement emails".to_string(),
    }))
}
