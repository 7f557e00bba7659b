use std::time::Duration;

use bytes::Bytes;
use reqwest::{RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use huddle_types::api::{
    CreateChannelRequest, CreateConversationRequest, CreateMessageRequest, CreateWorkspaceRequest,
    ErrorBody, IdResponse, JoinWorkspaceRequest, ListMessagesQuery, LoginRequest, LoginResponse,
    MemberWithUser, MessagePage, MessageResponse, RegisterRequest, RegisterResponse,
    ToggleReactionRequest, ToggleReactionResponse, UpdateChannelRequest, UpdateMemberRequest,
    UpdateMessageRequest, UpdateWorkspaceRequest, UploadResponse, UploadUrlResponse,
    WorkspaceInfo,
};
use huddle_types::models::{Channel, Member, Role, User, Workspace};

use crate::error::{Error, Result};

/// Client for one Huddle server, optionally signed in.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    /// Base URL, e.g. "http://localhost:3000".
    base_url: String,
    token: Option<String>,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or(Error::NotSignedIn)?;
        Ok(builder.bearer_auth(token))
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Error bodies are `{ "error": ... }`; fall back to the status text
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authed(self.http.get(self.url(path)))?.send().await?;
        Self::handle_response(response).await
    }

    async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .authed(self.http.post(self.url(path)))?
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authed(self.http.post(self.url(path)))?.send().await?;
        Self::handle_response(response).await
    }

    async fn patch<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Uuid> {
        let response = self
            .authed(self.http.patch(self.url(path)))?
            .json(body)
            .send()
            .await?;
        Self::handle_response::<IdResponse>(response).await.map(|r| r.id)
    }

    async fn delete(&self, path: &str) -> Result<Uuid> {
        let response = self.authed(self.http.delete(self.url(path)))?.send().await?;
        Self::handle_response::<IdResponse>(response).await.map(|r| r.id)
    }

    // -- Auth --

    /// Create an account and sign in as it.
    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&RegisterRequest {
                name: name.into(),
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;
        let registered: RegisterResponse = Self::handle_response(response).await?;
        self.token = Some(registered.token);
        Ok(registered.user_id)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;
        let login: LoginResponse = Self::handle_response(response).await?;
        self.token = Some(login.token.clone());
        Ok(login)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        self.get("/users/me").await
    }

    // -- Workspaces --

    pub async fn create_workspace(&self, name: &str) -> Result<Uuid> {
        let created: IdResponse = self
            .post("/workspaces", &CreateWorkspaceRequest { name: name.into() })
            .await?;
        Ok(created.id)
    }

    pub async fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.get("/workspaces").await
    }

    pub async fn workspace(&self, id: Uuid) -> Result<Option<Workspace>> {
        self.get(&format!("/workspaces/{id}")).await
    }

    pub async fn workspace_info(&self, id: Uuid) -> Result<Option<WorkspaceInfo>> {
        self.get(&format!("/workspaces/{id}/info")).await
    }

    pub async fn update_workspace(&self, id: Uuid, name: &str) -> Result<Uuid> {
        self.patch(
            &format!("/workspaces/{id}"),
            &UpdateWorkspaceRequest { name: name.into() },
        )
        .await
    }

    pub async fn delete_workspace(&self, id: Uuid) -> Result<Uuid> {
        self.delete(&format!("/workspaces/{id}")).await
    }

    pub async fn reset_join_code(&self, id: Uuid) -> Result<Uuid> {
        let reset: IdResponse = self.post_empty(&format!("/workspaces/{id}/join-code")).await?;
        Ok(reset.id)
    }

    pub async fn join_workspace(&self, id: Uuid, join_code: &str) -> Result<Uuid> {
        let joined: IdResponse = self
            .post(
                &format!("/workspaces/{id}/join"),
                &JoinWorkspaceRequest {
                    join_code: join_code.into(),
                },
            )
            .await?;
        Ok(joined.id)
    }

    // -- Channels --

    pub async fn channels(&self, workspace_id: Uuid) -> Result<Vec<Channel>> {
        self.get(&format!("/workspaces/{workspace_id}/channels")).await
    }

    pub async fn create_channel(&self, workspace_id: Uuid, name: &str) -> Result<Uuid> {
        let created: IdResponse = self
            .post(
                &format!("/workspaces/{workspace_id}/channels"),
                &CreateChannelRequest { name: name.into() },
            )
            .await?;
        Ok(created.id)
    }

    pub async fn channel(&self, id: Uuid) -> Result<Option<Channel>> {
        self.get(&format!("/channels/{id}")).await
    }

    pub async fn update_channel(&self, id: Uuid, name: &str) -> Result<Uuid> {
        self.patch(
            &format!("/channels/{id}"),
            &UpdateChannelRequest { name: name.into() },
        )
        .await
    }

    pub async fn delete_channel(&self, id: Uuid) -> Result<Uuid> {
        self.delete(&format!("/channels/{id}")).await
    }

    // -- Members --

    pub async fn members(&self, workspace_id: Uuid) -> Result<Vec<MemberWithUser>> {
        self.get(&format!("/workspaces/{workspace_id}/members")).await
    }

    pub async fn current_member(&self, workspace_id: Uuid) -> Result<Option<Member>> {
        self.get(&format!("/workspaces/{workspace_id}/members/me")).await
    }

    pub async fn member(&self, id: Uuid) -> Result<Option<MemberWithUser>> {
        self.get(&format!("/members/{id}")).await
    }

    pub async fn update_member(&self, id: Uuid, role: Role) -> Result<Uuid> {
        self.patch(&format!("/members/{id}"), &UpdateMemberRequest { role })
            .await
    }

    pub async fn remove_member(&self, id: Uuid) -> Result<Uuid> {
        self.delete(&format!("/members/{id}")).await
    }

    // -- Conversations --

    pub async fn create_or_get_conversation(
        &self,
        workspace_id: Uuid,
        member_id: Uuid,
    ) -> Result<Uuid> {
        let conversation: IdResponse = self
            .post(
                &format!("/workspaces/{workspace_id}/conversations"),
                &CreateConversationRequest { member_id },
            )
            .await?;
        Ok(conversation.id)
    }

    // -- Messages --

    pub async fn messages(&self, query: &ListMessagesQuery) -> Result<MessagePage> {
        let response = self
            .authed(self.http.get(self.url("/messages")))?
            .query(query)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn message(&self, id: Uuid) -> Result<Option<MessageResponse>> {
        self.get(&format!("/messages/{id}")).await
    }

    /// Post a message as-is. See [`Client::send_message`] for sending with
    /// an image that still has to be uploaded.
    pub async fn create_message(
        &self,
        workspace_id: Uuid,
        req: &CreateMessageRequest,
    ) -> Result<Uuid> {
        let created: IdResponse = self
            .post(&format!("/workspaces/{workspace_id}/messages"), req)
            .await?;
        Ok(created.id)
    }

    pub async fn update_message(&self, id: Uuid, body: &str) -> Result<Uuid> {
        self.patch(
            &format!("/messages/{id}"),
            &UpdateMessageRequest { body: body.into() },
        )
        .await
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<Uuid> {
        self.delete(&format!("/messages/{id}")).await
    }

    pub async fn toggle_reaction(
        &self,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<ToggleReactionResponse> {
        self.post(
            &format!("/messages/{message_id}/reactions"),
            &ToggleReactionRequest {
                emoji: emoji.into(),
            },
        )
        .await
    }

    // -- Upload --

    pub async fn generate_upload_url(&self) -> Result<UploadUrlResponse> {
        self.post_empty("/upload/url").await
    }

    /// POST raw bytes to an upload URL. The URL carries its own token.
    pub async fn upload_to(&self, url: &str, content_type: &str, data: Bytes) -> Result<Uuid> {
        let response = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::handle_response(response).await?;
        Ok(uploaded.storage_id)
    }
}
