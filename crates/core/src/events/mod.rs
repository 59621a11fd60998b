//! Webhook event delivery (spec.md §4.7). Every object finalize/delete/
//! metadata-update triggers, for each matching notification config on the
//! bucket, a synchronous JSON POST to the config's webhook URL.

use crate::kv::{Bucket, Event, EventType};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// Dispatches `event` to every notification config on `bucket` whose
/// `objectNamePrefix` (if any) matches. Delivery happens synchronously
/// within the request that triggered it (spec.md §4.7: "simplicity; the
/// guide documents this"); failures are logged, never propagated.
pub async fn dispatch(http_client: &reqwest::Client, bucket: &Bucket, event: &Event) {
    for config in &bucket.notification_configs {
        if let Some(prefix) = &config.object_name_prefix {
            if !event.object_name.starts_with(prefix.as_str()) {
                continue;
            }
        }

        let payload = json!({
            "kind": "storage#objectChangeNotification",
            "bucket": event.bucket,
            "object": event.object_name,
            "eventType": event_type_str(event.event_type),
            "generation": event.generation,
            "metadata": event.metadata,
        });

        deliver_with_retry(http_client, &config.webhook_url, &payload).await;
    }
}

fn event_type_str(event_type: EventType) -> &'static str {
    match event_type {
        EventType::ObjectFinalize => "OBJECT_FINALIZE",
        EventType::ObjectDelete => "OBJECT_DELETE",
        EventType::ObjectMetadataUpdate => "OBJECT_METADATA_UPDATE",
    }
}

/// POSTs `payload` with a 5-second timeout; on failure (non-2xx or
/// timeout), retries exactly once, immediately (spec.md §4.7 step 4; §9
/// open question resolves "no backoff").
async fn deliver_with_retry(client: &reqwest::Client, url: &str, payload: &serde_json::Value) {
    for attempt in 1..=2 {
        match client
            .post(url)
            .timeout(Duration::from_secs(5))
            .json(payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => return,
            Ok(resp) => {
                tracing::warn!(url, status = %resp.status(), attempt, "webhook delivery got a non-2xx response");
            }
            Err(err) => {
                tracing::warn!(url, %err, attempt, "webhook delivery failed");
            }
        }
    }
    tracing::warn!(url, "webhook delivery exhausted retries, giving up");
}

pub fn new_event(
    bucket: &str,
    object_name: &str,
    event_type: EventType,
    generation: i64,
    metadata: HashMap<String, String>,
) -> Event {
    Event {
        bucket: bucket.to_string(),
        object_name: object_name.to_string(),
        event_type,
        generation,
        metadata,
        timestamp: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::NotificationConfig;

    fn bucket_with_webhook(url: &str, prefix: Option<&str>) -> Bucket {
        Bucket {
            id: "id-1".into(),
            name: "b1".into(),
            project_id: "p1".into(),
            location: "US".into(),
            storage_class: "STANDARD".into(),
            versioning_enabled: false,
            cors_rules: vec![],
            notification_configs: vec![NotificationConfig {
                id: "n1".into(),
                webhook_url: url.to_string(),
                object_name_prefix: prefix.map(str::to_string),
                event_types: vec![],
            }],
            lifecycle_rules: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivery_to_unreachable_host_does_not_panic() {
        let client = reqwest::Client::new();
        let bucket = bucket_with_webhook("http://127.0.0.1:1/never-listens", None);
        let event = new_event("b1", "f.txt", EventType::ObjectFinalize, 1, HashMap::new());
        dispatch(&client, &bucket, &event).await;
    }

    #[tokio::test]
    async fn prefix_mismatch_skips_delivery() {
        let client = reqwest::Client::new();
        let bucket = bucket_with_webhook("http://127.0.0.1:1/never-listens", Some("logs/"));
        let event = new_event("b1", "images/cat.png", EventType::ObjectFinalize, 1, HashMap::new());
        // Would hang/err if it tried to deliver; prefix mismatch means it returns immediately.
        dispatch(&client, &bucket, &event).await;
    }
}
