use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::PushoverConfig;
use crate::error::{Result, WatchError};
use crate::gate::Notification;

pub const WATCHER_TITLE: &str = "Uhrforum Watcher";
pub const NEW_POST_TITLE: &str = "New UhrForum Post";
pub const STARTUP_MESSAGE: &str = "Watcher is active and monitoring the RSS feed.";

/// Delivers push messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, message: &str) -> Result<()>;

    async fn send_startup(&self) -> Result<()> {
        self.send(WATCHER_TITLE, STARTUP_MESSAGE).await
    }

    async fn send_new_post(&self, post: &Notification) -> Result<()> {
        self.send(NEW_POST_TITLE, &new_post_message(post)).await
    }

    async fn send_error(&self, error: &str) -> Result<()> {
        self.send(WATCHER_TITLE, &format!("Error occured: {}", error))
            .await
    }
}

pub fn new_post_message(post: &Notification) -> String {
    format!("New Post: {}\nLink: {}", post.title, post.link)
}

#[derive(Debug, Deserialize)]
struct PushoverReply {
    #[serde(default)]
    request: Option<String>,
}

/// Pushover message API client.
#[derive(Debug, Clone)]
pub struct PushoverNotifier {
    client: Client,
    token: String,
    user_key: String,
    endpoint: Url,
}

impl PushoverNotifier {
    pub fn new(client: Client, config: &PushoverConfig) -> Self {
        Self {
            client,
            token: config.token.clone(),
            user_key: config.user_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<()> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", message),
            ("title", title),
        ];
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::NotifyStatus {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<PushoverReply>().await {
            Ok(reply) => info!(
                title,
                request = reply.request.as_deref().unwrap_or("-"),
                "notification delivered"
            ),
            Err(err) => debug!(title, error = %err, "notification delivered, reply not understood"),
        }
        Ok(())
    }
}
