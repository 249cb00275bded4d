//! School backend HTTP client.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::types::{
    AttendanceHistory, AttendanceSummary, Contact, ConversationId, ConversationResponse,
    ConversationSummary, ConversationsResponse, CreateConversationRequest, LoginRequest,
    LoginResponse, MarkReadResult, Meeting, MeetingsResponse, Message, MessageResponse,
    MessagesResponse, SendMessageRequest, UnreadCountResponse, User, UserId, UserRole,
    UsersResponse,
};

/// Error body returned by the backend on failure.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self, status: StatusCode) -> String {
        self.error
            .or(self.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
    }
}

/// Client for the school backend REST API.
///
/// Cloning is cheap; clones share the HTTP connection pool and the bearer
/// token.
#[derive(Clone)]
pub struct SchoolClient {
    http: Client,
    config: ClientConfig,
    token: Arc<RwLock<Option<SecretString>>>,
}

impl SchoolClient {
    /// Create a client. No network traffic happens until the first call.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attach a bearer token to subsequent requests.
    pub async fn set_auth_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(SecretString::from(token.into()));
    }

    /// Stop sending a bearer token.
    pub async fn clear_auth_token(&self) {
        *self.token.write().await = None;
    }

    /// Current bearer token, if any.
    pub async fn auth_token(&self) -> Option<SecretString> {
        self.token.read().await.clone()
    }

    /// Whether a bearer token is set.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Log in and keep the returned token for subsequent requests.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ClientError> {
        let url = self.config.login_url();
        debug!("Login: {}", url);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(ClientError::Http)?;

        let status = response.status();
        let body: LoginResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(ClientError::Http(e)),
            Err(_) => {
                return Err(ClientError::LoginFailed(
                    status.canonical_reason().unwrap_or("login failed").to_string(),
                ))
            }
        };

        if !status.is_success() || !body.success {
            let message = body.message.unwrap_or_else(|| "Login failed".to_string());
            return Err(ClientError::LoginFailed(message));
        }

        let token = body
            .token
            .ok_or_else(|| ClientError::LoginFailed("response carried no token".to_string()))?;
        let user = body
            .user
            .ok_or_else(|| ClientError::LoginFailed("response carried no user".to_string()))?;

        self.set_auth_token(token).await;
        info!("Logged in as {} ({})", user.username, user.role);
        Ok(user)
    }

    /// Check the current token with the backend.
    ///
    /// Returns `Ok(false)` if the backend rejects it.
    pub async fn verify(&self) -> Result<bool, ClientError> {
        if !self.is_authenticated().await {
            return Ok(false);
        }
        match self.get_json::<serde_json::Value>(&self.config.verify_url()).await {
            Ok(_) => Ok(true),
            Err(ClientError::Auth(reason)) => {
                debug!("Token rejected: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Log out. The local token is cleared even if the backend call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .post_json::<(), serde_json::Value>(&self.config.logout_url(), None)
            .await;
        self.clear_auth_token().await;
        if let Err(ref e) = result {
            warn!("Logout call failed: {}", e);
        }
        result.map(|_| ())
    }

    /// List the current user's conversations, most recently active first.
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        let resp: ConversationsResponse = self.get_json(&self.config.conversations_url()).await?;
        Ok(resp.conversations)
    }

    /// Fetch the first page of a conversation's history, oldest first.
    pub async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, ClientError> {
        let resp: MessagesResponse = self.get_json(&self.config.messages_url(conversation_id)).await?;
        Ok(resp.messages)
    }

    /// Fetch one page of a conversation's history.
    pub async fn messages_page(
        &self,
        conversation_id: ConversationId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, ClientError> {
        let url = format!(
            "{}?page={}&limit={}",
            self.config.messages_url(conversation_id),
            page.max(1),
            limit
        );
        let resp: MessagesResponse = self.get_json(&url).await?;
        Ok(resp.messages)
    }

    /// Post a message and return the server's copy of it.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, ClientError> {
        let resp: MessageResponse = self
            .post_json(
                &self.config.messages_url(conversation_id),
                Some(&SendMessageRequest { content }),
            )
            .await?;
        Ok(resp.message)
    }

    /// Mark every message addressed to the current user in a conversation as read.
    pub async fn mark_read(&self, conversation_id: ConversationId) -> Result<MarkReadResult, ClientError> {
        self.post_json::<(), _>(&self.config.mark_read_url(conversation_id), None)
            .await
    }

    /// Total number of unread messages across conversations.
    pub async fn unread_count(&self) -> Result<u64, ClientError> {
        let resp: UnreadCountResponse = self.get_json(&self.config.unread_count_url()).await?;
        Ok(resp.count)
    }

    /// Open (or reuse) a conversation with another account.
    pub async fn create_conversation(
        &self,
        participant_id: UserId,
        participant_role: UserRole,
    ) -> Result<ConversationSummary, ClientError> {
        let body = CreateConversationRequest {
            participant_id,
            participant_type: participant_role,
        };
        let resp: ConversationResponse = self
            .post_json(&self.config.conversations_url(), Some(&body))
            .await?;
        Ok(resp.conversation)
    }

    /// Search the school's accounts to start a conversation with.
    pub async fn search_users(&self, query: &str) -> Result<Vec<Contact>, ClientError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let resp: UsersResponse = self.get_json(&self.config.user_search_url(query.trim())).await?;
        Ok(resp.users)
    }

    /// Today's attendance and totals for the parent's student.
    pub async fn attendance_summary(&self) -> Result<AttendanceSummary, ClientError> {
        self.get_json(&self.config.attendance_summary_url()).await
    }

    /// Most recent attendance records, newest first.
    pub async fn attendance_history(&self, limit: u32) -> Result<AttendanceHistory, ClientError> {
        self.get_json(&self.config.attendance_history_url(limit)).await
    }

    /// Meetings visible to the current user.
    pub async fn meetings(&self) -> Result<Vec<Meeting>, ClientError> {
        let resp: MeetingsResponse = self.get_json(&self.config.meetings_url()).await?;
        Ok(resp.into_meetings())
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_ref() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R, ClientError> {
        debug!("GET {}", url);
        let request = self.authorize(self.http.get(url)).await;
        let response = request.send().await.map_err(ClientError::Http)?;
        Self::handle_response(response).await
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<&B>,
    ) -> Result<R, ClientError> {
        debug!("POST {}", url);
        let mut request = self.http.post(url);
        request = match body {
            Some(body) => request.json(body),
            None => request.json(&serde_json::json!({})),
        };
        let request = self.authorize(request).await;
        let response = request.send().await.map_err(ClientError::Http)?;
        Self::handle_response(response).await
    }

    async fn handle_response<R: DeserializeOwned>(response: Response) -> Result<R, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(ClientError::Http);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .unwrap_or_default()
            .into_message(status);

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth(message));
        }

        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for SchoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchoolClient")
            .field("config", &self.config)
            .finish()
    }
}
