// Profiles - registration, profile views and edits
use crate::db::models::{NewUser, ProfilePatch, User};
use crate::error::{AppError, AppResult};
use crate::social::domain::{self, UserId};
use crate::social::graph::SocialGraph;
use crate::social::store::{DynContentStore, PostQuery};
use crate::social::views::{AuthorSummary, ProfileView};

pub const MAX_BIO_LENGTH: usize = 160;

#[derive(Clone)]
pub struct Profiles {
    store: DynContentStore,
    graph: SocialGraph,
}

impl Profiles {
    pub fn new(store: DynContentStore) -> Self {
        Self {
            graph: SocialGraph::new(store.clone()),
            store,
        }
    }

    /// Binds a handle to an external identity. Duplicate handles conflict.
    pub async fn register(&self, new_user: NewUser) -> AppResult<User> {
        domain::validate_handle(&new_user.handle)?;
        if let Some(url) = &new_user.avatar_url {
            validate_image_url(url, "avatar")?;
        }
        if self
            .store
            .find_user_by_identity(&new_user.provider, &new_user.provider_account_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Identity already registered".into()));
        }

        let user = self.store.insert_user(&new_user).await?;
        tracing::info!(user = %user.id, handle = %user.handle, "User registered");
        Ok(user)
    }

    pub async fn find(&self, id: &UserId) -> AppResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn view(&self, viewer: &UserId, handle: &str) -> AppResult<ProfileView> {
        let user = self
            .store
            .find_user_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        self.build_view(viewer, user).await
    }

    pub async fn me(&self, viewer: &UserId) -> AppResult<ProfileView> {
        let user = self.find(viewer).await?;
        self.build_view(viewer, user).await
    }

    /// Applies a profile edit. Empty URLs clear the field; the bio is cut
    /// to its maximum length rather than refused.
    pub async fn update(&self, viewer: &UserId, mut patch: ProfilePatch) -> AppResult<ProfileView> {
        if let Some(url) = &patch.avatar_url {
            validate_image_url(url, "avatar")?;
        }
        if let Some(url) = &patch.banner_url {
            validate_image_url(url, "banner")?;
        }
        if let Some(bio) = patch.bio.take() {
            patch.bio = Some(bio.chars().take(MAX_BIO_LENGTH).collect());
        }

        self.store.update_profile(viewer, &patch).await?;
        self.me(viewer).await
    }

    async fn build_view(&self, viewer: &UserId, user: User) -> AppResult<ProfileView> {
        let posts_count = self
            .store
            .count_posts(&PostQuery::top_level().by_authors(vec![user.id.clone()]))
            .await?;
        let is_following = self.graph.is_following(viewer, &user.id).await?;

        Ok(ProfileView {
            author: AuthorSummary::from(&user),
            banner_url: user.banner_url,
            bio: user.bio,
            followers_count: user.followers_count,
            following_count: user.following_count,
            posts_count,
            created_at: user.created_at,
            is_following,
            is_own_profile: &user.id == viewer,
        })
    }
}

fn validate_image_url(raw: &str, field: &str) -> AppResult<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || domain::is_valid_image_ref(trimmed) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid {} URL. Must be a valid http:// or https:// URL or an uploaded file.",
            field
        )))
    }
}
