use huddle_types::api::{ListMessagesQuery, MessagePage, MessageResponse};

use crate::client::Client;
use crate::error::Result;

pub const DEFAULT_BATCH_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerStatus {
    LoadingFirstPage,
    CanLoadMore,
    LoadingMore,
    Exhausted,
}

/// Walks a message feed backwards in time, one page per "load more".
///
/// Loaded messages accumulate newest first. A live update for the feed is
/// handled by [`MessagePager::reset`] and loading again.
#[derive(Debug)]
pub struct MessagePager {
    query: ListMessagesQuery,
    status: PagerStatus,
    messages: Vec<MessageResponse>,
    cursor: Option<String>,
    /// A request from `next_query` has not been applied yet.
    pending: bool,
}

impl MessagePager {
    /// `query` selects the feed; its `cursor` is ignored and `limit` becomes
    /// the batch size.
    pub fn new(mut query: ListMessagesQuery) -> Self {
        query.cursor = None;
        query.limit = Some(query.limit.unwrap_or(DEFAULT_BATCH_SIZE));
        Self {
            query,
            status: PagerStatus::LoadingFirstPage,
            messages: Vec::new(),
            cursor: None,
            pending: false,
        }
    }

    pub fn status(&self) -> PagerStatus {
        self.status
    }

    pub fn messages(&self) -> &[MessageResponse] {
        &self.messages
    }

    pub fn reset(&mut self) {
        self.status = PagerStatus::LoadingFirstPage;
        self.messages.clear();
        self.cursor = None;
        self.pending = false;
    }

    /// The query for the next page, or `None` when the feed is exhausted or
    /// a page is already in flight.
    pub fn next_query(&mut self) -> Option<ListMessagesQuery> {
        if self.pending {
            return None;
        }
        match self.status {
            PagerStatus::Exhausted | PagerStatus::LoadingMore => return None,
            PagerStatus::CanLoadMore => self.status = PagerStatus::LoadingMore,
            PagerStatus::LoadingFirstPage => {}
        }
        self.pending = true;
        Some(ListMessagesQuery {
            cursor: self.cursor.clone(),
            ..self.query.clone()
        })
    }

    /// Record the outcome of the request built by [`MessagePager::next_query`].
    pub fn apply(&mut self, page: Result<MessagePage>) -> Result<()> {
        self.pending = false;
        match page {
            Ok(page) => {
                self.messages.extend(page.page);
                self.cursor = page.continue_cursor;
                self.status = if page.is_done || self.cursor.is_none() {
                    PagerStatus::Exhausted
                } else {
                    PagerStatus::CanLoadMore
                };
                Ok(())
            }
            // The first page may be requested again after a failure
            Err(e) => {
                if self.status == PagerStatus::LoadingMore {
                    self.status = PagerStatus::CanLoadMore;
                }
                Err(e)
            }
        }
    }

    /// Fetch the next page. A no-op when nothing more can be loaded.
    pub async fn load_more(&mut self, client: &Client) -> Result<()> {
        let Some(query) = self.next_query() else {
            return Ok(());
        };
        let page = client.messages(&query).await;
        self.apply(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use huddle_types::models::{Member, Role, User};
    use uuid::Uuid;

    fn message(body: &str) -> MessageResponse {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            image: None,
            created_at: Utc::now(),
        };
        let member = Member {
            id: Uuid::new_v4(),
            workspace_id: Uuid::nil(),
            user_id: user.id,
            role: Role::Member,
            created_at: Utc::now(),
        };
        MessageResponse {
            id: Uuid::new_v4(),
            workspace_id: Uuid::nil(),
            member_id: member.id,
            body: body.into(),
            image: None,
            channel_id: Some(Uuid::nil()),
            conversation_id: None,
            parent_message_id: None,
            created_at: Utc::now(),
            updated_at: None,
            member,
            user,
            reactions: vec![],
            thread_count: 0,
            thread_image: None,
            thread_name: None,
            thread_timestamp: None,
        }
    }

    fn page(bodies: &[&str], cursor: Option<&str>) -> MessagePage {
        MessagePage {
            page: bodies.iter().map(|b| message(b)).collect(),
            is_done: cursor.is_none(),
            continue_cursor: cursor.map(String::from),
        }
    }

    #[test]
    fn walks_pages_until_exhausted() {
        let mut pager = MessagePager::new(ListMessagesQuery {
            channel_id: Some(Uuid::nil()),
            cursor: Some("stale".into()),
            ..Default::default()
        });
        assert_eq!(pager.status(), PagerStatus::LoadingFirstPage);

        let first = pager.next_query().unwrap();
        assert_eq!(first.cursor, None);
        assert_eq!(first.limit, Some(DEFAULT_BATCH_SIZE));
        // The first page is requested once
        assert!(pager.next_query().is_none());
        assert_eq!(pager.status(), PagerStatus::LoadingFirstPage);
        pager.apply(Ok(page(&["c", "b"], Some("k1")))).unwrap();
        assert_eq!(pager.status(), PagerStatus::CanLoadMore);

        let second = pager.next_query().unwrap();
        assert_eq!(second.cursor.as_deref(), Some("k1"));
        assert_eq!(pager.status(), PagerStatus::LoadingMore);
        // No second request while one is in flight
        assert!(pager.next_query().is_none());

        pager.apply(Ok(page(&["a"], None))).unwrap();
        assert_eq!(pager.status(), PagerStatus::Exhausted);
        assert!(pager.next_query().is_none());

        let bodies: Vec<&str> = pager.messages().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["c", "b", "a"]);

        pager.reset();
        assert_eq!(pager.status(), PagerStatus::LoadingFirstPage);
        assert!(pager.messages().is_empty());
        assert_eq!(pager.next_query().unwrap().cursor, None);
    }

    #[test]
    fn failed_load_can_be_retried() {
        let mut pager = MessagePager::new(ListMessagesQuery::default());
        pager.next_query().unwrap();
        pager.apply(Ok(page(&["b"], Some("k1")))).unwrap();

        pager.next_query().unwrap();
        let err = pager.apply(Err(Error::NotSignedIn));
        assert!(err.is_err());
        assert_eq!(pager.status(), PagerStatus::CanLoadMore);
        assert_eq!(pager.next_query().unwrap().cursor.as_deref(), Some("k1"));
    }

    #[test]
    fn failed_first_page_can_be_retried() {
        let mut pager = MessagePager::new(ListMessagesQuery::default());
        pager.next_query().unwrap();
        assert!(pager.apply(Err(Error::NotSignedIn)).is_err());
        assert_eq!(pager.status(), PagerStatus::LoadingFirstPage);

        let retry = pager.next_query().unwrap();
        assert_eq!(retry.cursor, None);
        assert!(pager.next_query().is_none());
    }
}
