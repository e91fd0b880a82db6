use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::commands::executor::RemoteExecutor;
use crate::panel::config::PanelConfig;
use crate::panel::server::fix_api_url;
use crate::security::audit_log::AuditLogger;
use crate::transport::{Method, RemoteCommandRequest, RemoteCommandResult, ReqwestTransport, Transport};

const MSG_EMPTY: &str = "Your message cannot be empty";
const MSG_OFFLINE: &str = "Player is offline.";

/// Where a player is currently connected, as resolved by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineStatus {
    /// Server address the player is connected to
    pub server: Option<String>,
    /// In-game source id
    pub source: Option<u32>,
}

impl OnlineStatus {
    pub fn online(server: impl Into<String>, source: u32) -> Self {
        Self {
            server: Some(server.into()),
            source: Some(source),
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> bool {
        self.server.is_some() && self.source.is_some()
    }

    fn target(&self) -> Option<(&str, u32)> {
        match (&self.server, self.source) {
            (Some(server), Some(source)) => Some((server.as_str(), source)),
            _ => None,
        }
    }
}

/// Data files served by the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFile {
    Queue,
    Jobs,
    Vehicles,
    ExclusiveDealership,
    Models,
    Api,
}

impl DataFile {
    pub fn path(&self) -> &'static str {
        match self {
            DataFile::Queue => "queue.json",
            DataFile::Jobs => "jobs.json",
            DataFile::Vehicles => "vehicles.json",
            DataFile::ExclusiveDealership => "exclusiveDealership.json",
            DataFile::Models => "models.json",
            DataFile::Api => "api.json",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            DataFile::Api => Duration::from_secs(1),
            _ => Duration::from_secs(3),
        }
    }
}

impl FromStr for DataFile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim_end_matches(".json") {
            "queue" => Ok(DataFile::Queue),
            "jobs" => Ok(DataFile::Jobs),
            "vehicles" => Ok(DataFile::Vehicles),
            "exclusiveDealership" | "edm" => Ok(DataFile::ExclusiveDealership),
            "models" => Ok(DataFile::Models),
            "api" => Ok(DataFile::Api),
            other => Err(anyhow::anyhow!("unknown data file: {}", other)),
        }
    }
}

/// Staff actions executed on game servers through the control API.
#[derive(Debug, Clone)]
pub struct ServerActions<T = ReqwestTransport> {
    executor: RemoteExecutor<T>,
    audit: AuditLogger,
    hide_ban_creator: bool,
    default_timeout: Duration,
}

impl ServerActions<ReqwestTransport> {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(RemoteExecutor::from_config(config))
            .hide_ban_creator(config.hide_ban_creator)
            .default_timeout(config.default_timeout())
    }
}

impl<T: Transport> ServerActions<T> {
    pub fn new(executor: RemoteExecutor<T>) -> Self {
        Self {
            executor,
            audit: AuditLogger::new(),
            hide_ban_creator: false,
            default_timeout: crate::transport::DEFAULT_TIMEOUT,
        }
    }

    pub fn hide_ban_creator(mut self, hide: bool) -> Self {
        self.hide_ban_creator = hide;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn executor(&self) -> &RemoteExecutor<T> {
        &self.executor
    }

    fn request(&self, server: &str, route: &str) -> RemoteCommandRequest {
        RemoteCommandRequest::new(fix_api_url(server), route).timeout(self.default_timeout)
    }

    /// Private message from a staff member to an online player.
    pub async fn staff_pm(
        &self,
        staff_license: &str,
        target_license: &str,
        status: &OnlineStatus,
        message: &str,
    ) -> RemoteCommandResult {
        if message.is_empty() {
            return RemoteCommandResult::failure(MSG_EMPTY);
        }
        let Some((server, source)) = status.target() else {
            return RemoteCommandResult::failure(MSG_OFFLINE);
        };

        let req = self
            .request(server, "execute/staffPrivateMessage")
            .param("licenseIdentifier", staff_license)
            .param("targetSource", source)
            .param("message", message);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            self.audit.staff_pm(staff_license, target_license, message);
            return result.with_message("Staff Message has been sent successfully.");
        }
        self.audit.action_failed("staff_pm", Some(target_license), result.message());
        result
    }

    pub async fn staff_chat(&self, server: &str, staff_license: &str, message: &str) -> RemoteCommandResult {
        if message.is_empty() {
            return RemoteCommandResult::failure(MSG_EMPTY);
        }

        let req = self
            .request(server, "execute/staffChatMessage")
            .param("licenseIdentifier", staff_license)
            .param("message", message);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            return result.with_message("Staff Chat Message has been sent successfully.");
        }
        result
    }

    pub async fn server_announcement(&self, server: &str, message: &str) -> RemoteCommandResult {
        if message.is_empty() {
            return RemoteCommandResult::failure(format!("{}.", MSG_EMPTY));
        }

        let req = self
            .request(server, "execute/announcementMessage")
            .param("announcementMessage", message);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            result.with_message("Server Announcement has been posted successfully.")
        } else {
            result.with_message("Failed to post server announcement.")
        }
    }

    pub async fn kick_player(
        &self,
        staff_license: &str,
        staff_name: &str,
        target_license: &str,
        status: &OnlineStatus,
        reason: &str,
    ) -> RemoteCommandResult {
        let Some((server, _)) = status.target() else {
            return RemoteCommandResult::failure(MSG_OFFLINE);
        };

        let kicked_by = if self.hide_ban_creator { "a staff member" } else { staff_name };

        let req = self
            .request(server, "execute/kickPlayer")
            .param("licenseIdentifier", target_license)
            .param(
                "reason",
                format!("You have been kicked by {} for reason `{}`", kicked_by, reason),
            )
            .param("removeReconnectPriority", false);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            self.audit.kick(staff_license, target_license, reason);
            return result.with_message("Kicked player from the server.");
        }
        self.audit.action_failed("kick", Some(target_license), result.message());
        result
    }

    pub async fn revive_player(
        &self,
        staff_license: &str,
        target_license: &str,
        status: &OnlineStatus,
    ) -> RemoteCommandResult {
        let Some((server, source)) = status.target() else {
            return RemoteCommandResult::failure(MSG_OFFLINE);
        };

        let req = self.request(server, "execute/revivePlayer").param("targetSource", source);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            self.audit.revive(staff_license, target_license);
            return result.with_message("Revived player.");
        }
        self.audit.action_failed("revive", Some(target_license), result.message());
        result
    }

    pub async fn update_tattoos(
        &self,
        target_license: &str,
        status: &OnlineStatus,
        character_id: &str,
    ) -> RemoteCommandResult {
        let Some((server, _)) = status.target() else {
            return RemoteCommandResult::success("Player is offline, no refresh needed.", None);
        };

        let req = self
            .request(server, "execute/refreshTattoos")
            .param("licenseIdentifier", target_license)
            .param("characterId", character_id);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            return result.with_message("Updated tattoo data for player.");
        }
        result
    }

    /// Refresh character data in-game. Offline players are `NotExecuted`.
    pub async fn update_character(
        &self,
        target_license: &str,
        status: &OnlineStatus,
        character_id: &str,
    ) -> RemoteCommandResult {
        let Some((server, _)) = status.target() else {
            debug!(target_license, "player offline, character refresh skipped");
            return RemoteCommandResult::NotExecuted;
        };

        let req = self
            .request(server, "execute/refreshCharacter")
            .param("licenseIdentifier", target_license)
            .param("characterId", character_id);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            return result.with_message("Updated character data for player.");
        }
        result
    }

    pub async fn unload_character(
        &self,
        staff_license: &str,
        target_license: &str,
        status: &OnlineStatus,
        character_id: &str,
        message: &str,
    ) -> RemoteCommandResult {
        let Some((server, _)) = status.target() else {
            return RemoteCommandResult::success("Player is offline, no unload needed.", None);
        };

        let req = self
            .request(server, "execute/unloadCharacter")
            .param("licenseIdentifier", target_license)
            .param("characterId", character_id)
            .param("message", message);

        let result = self.executor.execute(&req).await;
        if result.is_success() {
            self.audit.unload(staff_license, target_license, character_id, message);
            return result.with_message("Unloaded players character.");
        }
        self.audit.action_failed("unload", Some(target_license), result.message());
        result
    }

    pub async fn update_queue_position(
        &self,
        server: &str,
        license: &str,
        target_position: i64,
    ) -> RemoteCommandResult {
        let req = self
            .request(server, "execute/setQueuePosition")
            .method(Method::Patch)
            .param("licenseIdentifier", license)
            .param("targetPosition", target_position);

        self.executor.execute(&req).await
    }

    pub async fn create_screenshot(
        &self,
        server: &str,
        source: u32,
        draw_html: bool,
        lifespan_secs: u32,
    ) -> RemoteCommandResult {
        let req = self
            .request(server, "execute/createScreenshot")
            .param("serverId", source)
            .param("lifespan", lifespan_secs)
            .param("drawHTML", draw_html);

        self.executor.execute(&req).await
    }

    /// Record a clip; the request timeout stretches with the duration.
    pub async fn create_screen_capture(&self, server: &str, source: u32, duration_secs: u32) -> RemoteCommandResult {
        let req = self
            .request(server, "execute/createScreenshot")
            .param("serverId", source)
            .param("lifespan", 60 * 60u32)
            .param("fps", 30u32)
            .param("duration", i64::from(duration_secs) * 1000)
            .timeout(Duration::from_secs(u64::from(duration_secs) + 15));

        self.executor.execute(&req).await
    }

    /// Fetch one of the JSON data files. `None` when the call failed or
    /// carried no data.
    pub async fn fetch_data(&self, server: &str, file: DataFile) -> Option<Value> {
        let req = self
            .request(server, file.path())
            .method(Method::Get)
            .timeout(file.timeout());

        self.executor.execute(&req).await.into_data()
    }

    pub async fn crafting_recipes(&self, server: &str) -> Option<String> {
        let req = self
            .request(server, "crafting.txt")
            .method(Method::Get)
            .timeout(Duration::from_secs(3))
            .text();

        match self.executor.execute(&req).await {
            RemoteCommandResult::Success { message, .. } => Some(message),
            _ => None,
        }
    }
}
