//! Request and response models for the HTTP triggers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geocoded event location, as resolved by the location proxy upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLocation {
    pub name: String,
    pub formatted_address: String,
}

/// Fired once when a new event has been created.
#[derive(Debug, Deserialize)]
pub struct EventCreatedRequest {
    pub title: String,
    pub details: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: EventLocation,
}

/// Fired when someone requests to join the club; notifies admins.
#[derive(Debug, Deserialize)]
pub struct MembershipRequestNotification {
    pub first_name: String,
    pub last_name: String,
}

/// Direct notification to a single member.
#[derive(Debug, Deserialize)]
pub struct UserNotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPushTokenRequest {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RemovePushTokenRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeEmailRequest {
    pub user_id: Uuid,
}

/// Submission summary returned to trigger callers. Delivery confirmation
/// happens later, off the request path.
#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub attempted: usize,
    pub rejected_immediately: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: String,
}
