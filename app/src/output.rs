use dietdash_core::{ApiCode, Envelope, GatewayError};

/// Pretty JSON for stdout.
pub fn render(envelope: &Envelope) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|_| format!("{envelope:?}"))
}

/// One line describing an application-level failure, or `None` on success.
pub fn failure_summary(envelope: &Envelope) -> Option<String> {
    if envelope.is_success() {
        return None;
    }
    let message = if envelope.message.trim().is_empty() {
        envelope
            .api_code()
            .map(ApiCode::default_message)
            .unwrap_or("request failed")
            .to_string()
    } else {
        envelope.message.clone()
    };
    Some(match &envelope.error {
        Some(detail) => format!("error {}: {message} ({detail})", envelope.code),
        None => format!("error {}: {message}", envelope.code),
    })
}

/// Text for an error that never produced an envelope.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<GatewayError>() {
        Some(gateway) => gateway.user_message(),
        None => err.to_string(),
    }
}
