use tracing::{info, warn};

/// Structured record of staff actions executed against a game server.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn staff_pm(&self, staff: &str, target: &str, message: &str) {
        info!(target: "audit", event = "staff_pm", staff, target_license = target, message);
    }

    pub fn kick(&self, staff: &str, target: &str, reason: &str) {
        info!(target: "audit", event = "kick", staff, target_license = target, reason);
    }

    pub fn revive(&self, staff: &str, target: &str) {
        info!(target: "audit", event = "revive", staff, target_license = target);
    }

    pub fn unload(&self, staff: &str, target: &str, character_id: &str, message: &str) {
        info!(target: "audit", event = "unload", staff, target_license = target, character_id, message);
    }

    pub fn action_failed(&self, action: &str, target: Option<&str>, reason: &str) {
        warn!(target: "audit", event = "action_failed", action, target_license = target.unwrap_or(""), reason);
    }
}
