use std::future::Future;

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use huddle_types::api::CreateMessageRequest;

use crate::client::Client;
use crate::error::Result;

pub const UPLOAD_ATTEMPTS: usize = 3;

/// Run `op` up to `attempts` times, back to back, until it succeeds.
/// Every failure is treated alike. `None` once all attempts failed.
pub async fn with_retries<T, F, Fut>(attempts: usize, mut op: F) -> Option<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Some(value),
            Err(e) => warn!("Attempt {}/{} failed: {}", attempt, attempts, e),
        }
    }
    None
}

/// An image picked for a message, not uploaded yet.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub content_type: String,
    pub data: Bytes,
}

impl Client {
    /// Upload an image, fetching a fresh upload URL for each attempt.
    pub async fn upload_image(&self, image: &ImageAttachment) -> Option<Uuid> {
        with_retries(UPLOAD_ATTEMPTS, |_| async move {
            let target = self.generate_upload_url().await?;
            self.upload_to(&target.url, &image.content_type, image.data.clone())
                .await
        })
        .await
    }

    /// Upload `image` if there is one, then post the message. An image that
    /// cannot be uploaded is dropped and the text is sent on its own.
    pub async fn send_message(
        &self,
        workspace_id: Uuid,
        mut req: CreateMessageRequest,
        image: Option<&ImageAttachment>,
    ) -> Result<Uuid> {
        if let Some(image) = image {
            req.image = self.upload_image(image).await;
            if req.image.is_none() {
                warn!("Image upload failed after {} attempts, sending without it", UPLOAD_ATTEMPTS);
            }
        }
        self.create_message(workspace_id, &req).await
    }
}
