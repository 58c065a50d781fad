//! Query response rendering.
//!
//! This module turns a [`QueryResponse`] into the text written to stdout:
//! the JSON envelope as-is, or a short human-readable form.

use crate::query::QueryResponse;
use anyhow::{Context, Result};

/// Generate the JSON envelope, pretty-printed.
pub fn generate_json_report(response: &QueryResponse) -> Result<String> {
    serde_json::to_string_pretty(response).context("Failed to serialize query response")
}

/// Generate a plain-text rendering.
pub fn generate_text_report(response: &QueryResponse) -> String {
    let mut output = String::new();

    if let Some(summary) = &response.data.user_summary {
        output.push_str(&format!("Name:       {}\n", summary.display_name));
        output.push_str(&format!("Email:      {}\n", summary.email));
        output.push_str(&format!("Post count: {}\n", summary.post_count));
    }

    for error in &response.errors {
        output.push_str(&format!("Error: {}\n", error.message));
    }

    output
}
