//! Data models for the user summary aggregator.
//!
//! This module contains the upstream DTOs decoded from the user and posts
//! resources, and the merged summary handed back to callers.

use serde::{Deserialize, Serialize};

/// A user's profile as returned by the upstream users resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Upstream identifier of the user.
    pub id: i64,
    /// Name shown to end users.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Contact email address.
    pub email: String,
}

/// A single post; only the owner matters downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Post {
    /// Identifier of the user who owns the post.
    #[serde(rename = "userId")]
    pub owner_user_id: i64,
}

/// The merged result of one aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Display name copied from the profile.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Email copied from the profile.
    pub email: String,
    /// Number of posts returned for the user.
    pub post_count: usize,
}

impl UserSummary {
    /// Merge a profile and its posts into a summary.
    ///
    /// The posts resource is queried with a user-scoping parameter, so every
    /// returned post is counted without re-filtering by owner.
    pub fn merge(profile: UserProfile, posts: &[Post]) -> Self {
        Self {
            display_name: profile.display_name,
            email: profile.email,
            post_count: posts.len(),
        }
    }
}
