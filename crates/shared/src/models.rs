//! Data models for the swwap marketplace API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Users ---

/// The account record the backend returns and the client persists locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_verified: bool,
}

/// Partial update merged into the in-memory user record.
///
/// Only fields that are `Some` are applied; everything else keeps its
/// current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl UserRecord {
    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(verified) = patch.email_verified {
            self.email_verified = verified;
        }
    }
}

// --- Listings ---

/// Item condition as the backend spells it on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Condition {
    New,
    #[serde(rename = "Like New")]
    LikeNew,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub category: String,
    pub condition: Condition,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub location: GeoLocation,
    /// Categories or specific items the owner would trade for.
    pub interested_in: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Listing payload for creation; the backend assigns `id`, `userId`
/// and `createdAt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub category: String,
    pub condition: Condition,
    pub location: GeoLocation,
    pub interested_in: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial listing update; only set fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interested_in: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

// --- Swaps ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapProposal {
    pub id: String,
    pub proposer_id: String,
    pub receiver_id: String,
    pub proposed_item_id: String,
    pub requested_item_id: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

// --- Auth wire types ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration payload. The confirm-password field is validated
/// client-side and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_uses_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&Condition::LikeNew).unwrap(),
            "\"Like New\""
        );
        assert_eq!(
            serde_json::from_str::<Condition>("\"Poor\"").unwrap(),
            Condition::Poor
        );
    }

    #[test]
    fn listing_deserializes_from_backend_shape() {
        let body = r#"{
            "id": "l1",
            "title": "Road bike",
            "description": "Aluminium frame",
            "images": ["https://img.example/1.jpg"],
            "category": "sports",
            "condition": "Like New",
            "userId": "u1",
            "createdAt": "2024-05-01T12:00:00Z",
            "location": {"latitude": 55.6, "longitude": 12.5, "address": "Copenhagen"},
            "interestedIn": ["electronics"]
        }"#;
        let listing: Listing = serde_json::from_str(body).unwrap();
        assert_eq!(listing.user_id, "u1");
        assert_eq!(listing.condition, Condition::LikeNew);
        assert!(listing.tags.is_empty());
    }

    #[test]
    fn user_patch_merges_only_set_fields() {
        let mut user = UserRecord {
            id: "u1".into(),
            email: "a@b.com".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            email_verified: false,
        };
        user.apply(UserPatch {
            last_name: Some("Lovelace".into()),
            ..UserPatch::default()
        });
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
    }
}
