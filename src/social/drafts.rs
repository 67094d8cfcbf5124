// Drafts - author-scoped unsent post text
use crate::db::{self, models::Draft};
use crate::error::{AppError, AppResult};
use crate::social::domain::{DraftId, UserId};
use crate::social::store::DynContentStore;
use crate::social::text;

#[derive(Clone)]
pub struct Drafts {
    store: DynContentStore,
}

impl Drafts {
    pub fn new(store: DynContentStore) -> Self {
        Self { store }
    }

    /// Drafts are not length-checked; only blank text is refused.
    pub async fn save(&self, author: &UserId, body: &str) -> AppResult<Draft> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("Draft text is required".into()));
        }

        let extracted = text::extract(body);
        let mentions = self
            .store
            .find_users_by_handles(&extracted.mentions)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        let now = db::now();
        let draft = Draft {
            id: DraftId::generate(),
            author_id: author.clone(),
            text: body.to_string(),
            urls: extracted.urls,
            hashtags: extracted.hashtags,
            mentions,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_draft(&draft).await?;
        Ok(draft)
    }

    /// Newest first.
    pub async fn list(&self, author: &UserId) -> AppResult<Vec<Draft>> {
        Ok(self.store.list_drafts(author).await?)
    }

    pub async fn delete(&self, author: &UserId, id: &DraftId) -> AppResult<()> {
        if self.store.delete_draft(id, author).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Draft not found".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::testing::Fixture;

    #[tokio::test]
    async fn save_extracts_and_resolves() {
        let fx = Fixture::new();
        let drafts = Drafts::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        let draft = drafts
            .save(&alice.id, "later @bob https://a.com #wip")
            .await
            .unwrap();
        assert_eq!(draft.urls, vec!["https://a.com"]);
        assert_eq!(draft.hashtags, vec!["wip"]);
        assert_eq!(draft.mentions, vec![bob.id]);

        assert_eq!(drafts.list(&alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_draft_is_rejected() {
        let fx = Fixture::new();
        let drafts = Drafts::new(fx.store.clone());
        let alice = fx.user("alice").await;

        let result = drafts.save(&alice.id, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let fx = Fixture::new();
        let drafts = Drafts::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let draft = drafts.save(&alice.id, "mine").await.unwrap();

        let by_bob = drafts.delete(&bob.id, &draft.id).await;
        assert!(matches!(by_bob, Err(AppError::NotFound(_))));

        drafts.delete(&alice.id, &draft.id).await.unwrap();
        assert!(drafts.list(&alice.id).await.unwrap().is_empty());
    }
}
