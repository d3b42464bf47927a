use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    AboutSection, AboutSubsection, Audio, ContactMessage, ContactMessageRequest,
    CreateCollectionRequest, CreateVideoRequest, CurrentNasheen, Event, GalleryCollection,
    GalleryImage, NewAudio, NewPublication, Photo, PhotoCollection, PreviousNasheen, Publication,
    User, Video,
};

/// RepositoryError
///
/// Failure of the persistence layer. Rendered as a generic 500 at the HTTP boundary.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("referenced {0} does not exist")]
    MissingParent(&'static str),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Persistence contract used by the handlers. "Active" filtering and ordering are the
/// repository's responsibility so every implementation returns the same view.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    // --- About ---
    /// Active sections ordered by `(order, id)`.
    async fn list_about_sections(&self) -> RepoResult<Vec<AboutSection>>;
    async fn get_about_section(&self, id: i64) -> RepoResult<Option<AboutSection>>;
    /// Active subsections belonging to any of `section_ids`.
    async fn list_about_subsections(&self, section_ids: &[i64]) -> RepoResult<Vec<AboutSubsection>>;
    /// The newest active record.
    async fn get_current_nasheen(&self) -> RepoResult<Option<CurrentNasheen>>;
    /// Active records ordered by `(order, id)`.
    async fn list_previous_nasheen(&self) -> RepoResult<Vec<PreviousNasheen>>;

    // --- Events ---
    /// Active events ordered by `(order, id)`.
    async fn list_events(&self) -> RepoResult<Vec<Event>>;
    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>>;

    // --- Publications ---
    async fn list_publications(&self) -> RepoResult<Vec<Publication>>;
    async fn get_publication(&self, id: i64) -> RepoResult<Option<Publication>>;
    async fn create_publication(&self, publication: NewPublication) -> RepoResult<Publication>;
    /// Overwrites the editable columns of `publication.id`. `None` when the row is gone.
    async fn update_publication(&self, publication: Publication) -> RepoResult<Option<Publication>>;
    /// Returns the removed row so its stored files can be cleaned up.
    async fn delete_publication(&self, id: i64) -> RepoResult<Option<Publication>>;

    // --- Gallery ---
    async fn list_gallery_collections(&self) -> RepoResult<Vec<GalleryCollection>>;
    async fn get_gallery_collection(&self, id: i64) -> RepoResult<Option<GalleryCollection>>;
    async fn create_gallery_collection(&self, req: CreateCollectionRequest) -> RepoResult<GalleryCollection>;
    async fn update_gallery_collection(&self, collection: GalleryCollection) -> RepoResult<Option<GalleryCollection>>;
    /// Images belonging to any of `collection_ids`, ordered by id.
    async fn list_gallery_images(&self, collection_ids: &[i64]) -> RepoResult<Vec<GalleryImage>>;
    async fn add_gallery_image(&self, collection_id: i64, image: String) -> RepoResult<GalleryImage>;
    /// Deletes the collection and its images. Returns the removed images, or `None` when
    /// the collection does not exist.
    async fn delete_gallery_collection(&self, id: i64) -> RepoResult<Option<Vec<GalleryImage>>>;

    // --- Photos ---
    /// Collections newest first.
    async fn list_photo_collections(&self) -> RepoResult<Vec<PhotoCollection>>;
    async fn get_photo_collection(&self, id: i64) -> RepoResult<Option<PhotoCollection>>;
    async fn create_photo_collection(&self, collection: PhotoCollection) -> RepoResult<PhotoCollection>;
    async fn update_photo_collection(&self, collection: PhotoCollection) -> RepoResult<Option<PhotoCollection>>;
    /// Deletes the collection and its photos. Returns the removed photos, or `None` when
    /// the collection does not exist.
    async fn delete_photo_collection(&self, id: i64) -> RepoResult<Option<Vec<Photo>>>;
    /// Photos of the given collections, or all photos when `collection_ids` is `None`.
    async fn list_photos(&self, collection_ids: Option<&[i64]>) -> RepoResult<Vec<Photo>>;
    async fn get_photo(&self, id: i64) -> RepoResult<Option<Photo>>;
    async fn create_photo(&self, collection_id: i64, image: String) -> RepoResult<Photo>;
    /// Moves and/or re-points a photo. Fails with `MissingParent` for an unknown collection.
    async fn update_photo(&self, photo: Photo) -> RepoResult<Option<Photo>>;
    async fn delete_photo(&self, id: i64) -> RepoResult<Option<Photo>>;

    // --- Audio / Video ---
    /// Newest first.
    async fn list_audios(&self) -> RepoResult<Vec<Audio>>;
    async fn create_audio(&self, audio: NewAudio) -> RepoResult<Audio>;
    /// Newest first.
    async fn list_videos(&self) -> RepoResult<Vec<Video>>;
    async fn create_video(&self, video: CreateVideoRequest) -> RepoResult<Video>;

    // --- Contact ---
    async fn create_contact_message(&self, message: ContactMessageRequest) -> RepoResult<ContactMessage>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are checked at runtime; the schema lives in
/// `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_about_sections(&self) -> RepoResult<Vec<AboutSection>> {
        let sections = sqlx::query_as::<_, AboutSection>(
            r#"
            SELECT id, title_en, title_ur, content_en, content_ur, "order", default_open, is_active
            FROM about_sections
            WHERE is_active
            ORDER BY "order", id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    async fn get_about_section(&self, id: i64) -> RepoResult<Option<AboutSection>> {
        let section = sqlx::query_as::<_, AboutSection>(
            r#"
            SELECT id, title_en, title_ur, content_en, content_ur, "order", default_open, is_active
            FROM about_sections
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(section)
    }

    async fn list_about_subsections(&self, section_ids: &[i64]) -> RepoResult<Vec<AboutSubsection>> {
        let subsections = sqlx::query_as::<_, AboutSubsection>(
            r#"
            SELECT id, section_id, title_en, title_ur, content_en, content_ur, "order", is_active
            FROM about_subsections
            WHERE is_active AND section_id = ANY($1)
            ORDER BY "order", id
            "#,
        )
        .bind(section_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(subsections)
    }

    async fn get_current_nasheen(&self) -> RepoResult<Option<CurrentNasheen>> {
        let nasheen = sqlx::query_as::<_, CurrentNasheen>(
            r#"
            SELECT id, name_en, name_ur, description_en, description_ur, image, is_active, created_at
            FROM current_nasheen
            WHERE is_active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(nasheen)
    }

    async fn list_previous_nasheen(&self) -> RepoResult<Vec<PreviousNasheen>> {
        let lineage = sqlx::query_as::<_, PreviousNasheen>(
            r#"
            SELECT id, name_en, name_ur, "order", is_present, is_active
            FROM previous_nasheen
            WHERE is_active
            ORDER BY "order", id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lineage)
    }

    async fn list_events(&self) -> RepoResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r#"SELECT * FROM events WHERE is_active ORDER BY "order", id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_publications(&self) -> RepoResult<Vec<Publication>> {
        let publications =
            sqlx::query_as::<_, Publication>("SELECT * FROM publications ORDER BY id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(publications)
    }

    async fn get_publication(&self, id: i64) -> RepoResult<Option<Publication>> {
        let publication = sqlx::query_as::<_, Publication>("SELECT * FROM publications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(publication)
    }

    async fn create_publication(&self, p: NewPublication) -> RepoResult<Publication> {
        let publication = sqlx::query_as::<_, Publication>(
            r#"
            INSERT INTO publications
                (title_en, title_ur, file, cover, description_en, description_ur, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(p.title_en)
        .bind(p.title_ur)
        .bind(p.file)
        .bind(p.cover)
        .bind(p.description_en)
        .bind(p.description_ur)
        .bind(p.category)
        .fetch_one(&self.pool)
        .await?;
        Ok(publication)
    }

    async fn update_publication(&self, p: Publication) -> RepoResult<Option<Publication>> {
        let publication = sqlx::query_as::<_, Publication>(
            r#"
            UPDATE publications
            SET title_en = $2, title_ur = $3, file = $4, cover = $5,
                description_en = $6, description_ur = $7, category = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(p.id)
        .bind(p.title_en)
        .bind(p.title_ur)
        .bind(p.file)
        .bind(p.cover)
        .bind(p.description_en)
        .bind(p.description_ur)
        .bind(p.category)
        .fetch_optional(&self.pool)
        .await?;
        Ok(publication)
    }

    async fn delete_publication(&self, id: i64) -> RepoResult<Option<Publication>> {
        let removed =
            sqlx::query_as::<_, Publication>("DELETE FROM publications WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(removed)
    }

    async fn list_gallery_collections(&self) -> RepoResult<Vec<GalleryCollection>> {
        let collections =
            sqlx::query_as::<_, GalleryCollection>("SELECT * FROM gallery_collections ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(collections)
    }

    async fn get_gallery_collection(&self, id: i64) -> RepoResult<Option<GalleryCollection>> {
        let collection =
            sqlx::query_as::<_, GalleryCollection>("SELECT * FROM gallery_collections WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(collection)
    }

    async fn create_gallery_collection(&self, req: CreateCollectionRequest) -> RepoResult<GalleryCollection> {
        let collection = sqlx::query_as::<_, GalleryCollection>(
            "INSERT INTO gallery_collections (name_en, name_ur) VALUES ($1, $2) RETURNING *",
        )
        .bind(req.name_en)
        .bind(req.name_ur)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    async fn update_gallery_collection(&self, c: GalleryCollection) -> RepoResult<Option<GalleryCollection>> {
        let collection = sqlx::query_as::<_, GalleryCollection>(
            "UPDATE gallery_collections SET name_en = $2, name_ur = $3 WHERE id = $1 RETURNING *",
        )
        .bind(c.id)
        .bind(c.name_en)
        .bind(c.name_ur)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    async fn list_gallery_images(&self, collection_ids: &[i64]) -> RepoResult<Vec<GalleryImage>> {
        let images = sqlx::query_as::<_, GalleryImage>(
            "SELECT * FROM gallery_images WHERE collection_id = ANY($1) ORDER BY id",
        )
        .bind(collection_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn add_gallery_image(&self, collection_id: i64, image: String) -> RepoResult<GalleryImage> {
        let image = sqlx::query_as::<_, GalleryImage>(
            "INSERT INTO gallery_images (collection_id, image) VALUES ($1, $2) RETURNING *",
        )
        .bind(collection_id)
        .bind(image)
        .fetch_one(&self.pool)
        .await?;
        Ok(image)
    }

    async fn delete_gallery_collection(&self, id: i64) -> RepoResult<Option<Vec<GalleryImage>>> {
        let mut tx = self.pool.begin().await?;

        let images = sqlx::query_as::<_, GalleryImage>(
            "DELETE FROM gallery_images WHERE collection_id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM gallery_collections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(images))
    }

    async fn list_photo_collections(&self) -> RepoResult<Vec<PhotoCollection>> {
        let collections = sqlx::query_as::<_, PhotoCollection>(
            "SELECT * FROM photo_collections ORDER BY created_at DESC NULLS LAST, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(collections)
    }

    async fn get_photo_collection(&self, id: i64) -> RepoResult<Option<PhotoCollection>> {
        let collection =
            sqlx::query_as::<_, PhotoCollection>("SELECT * FROM photo_collections WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(collection)
    }

    async fn create_photo_collection(&self, c: PhotoCollection) -> RepoResult<PhotoCollection> {
        let collection = sqlx::query_as::<_, PhotoCollection>(
            "INSERT INTO photo_collections (name_en, name_ur, created_at) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(c.name_en)
        .bind(c.name_ur)
        .bind(c.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    async fn update_photo_collection(&self, c: PhotoCollection) -> RepoResult<Option<PhotoCollection>> {
        let collection = sqlx::query_as::<_, PhotoCollection>(
            r#"
            UPDATE photo_collections SET name_en = $2, name_ur = $3, created_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(c.name_en)
        .bind(c.name_ur)
        .bind(c.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    async fn delete_photo_collection(&self, id: i64) -> RepoResult<Option<Vec<Photo>>> {
        let mut tx = self.pool.begin().await?;

        let photos =
            sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE collection_id = $1 RETURNING *")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM photo_collections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(photos))
    }

    async fn list_photos(&self, collection_ids: Option<&[i64]>) -> RepoResult<Vec<Photo>> {
        let photos = match collection_ids {
            Some(ids) => {
                sqlx::query_as::<_, Photo>(
                    "SELECT * FROM photos WHERE collection_id = ANY($1) ORDER BY id",
                )
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Photo>("SELECT * FROM photos ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(photos)
    }

    async fn get_photo(&self, id: i64) -> RepoResult<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(photo)
    }

    async fn create_photo(&self, collection_id: i64, image: String) -> RepoResult<Photo> {
        let photo = sqlx::query_as::<_, Photo>(
            "INSERT INTO photos (collection_id, image) VALUES ($1, $2) RETURNING *",
        )
        .bind(collection_id)
        .bind(image)
        .fetch_one(&self.pool)
        .await
        .map_err(missing_collection)?;
        Ok(photo)
    }

    async fn update_photo(&self, p: Photo) -> RepoResult<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(
            "UPDATE photos SET collection_id = $2, image = $3 WHERE id = $1 RETURNING *",
        )
        .bind(p.id)
        .bind(p.collection_id)
        .bind(p.image)
        .fetch_optional(&self.pool)
        .await
        .map_err(missing_collection)?;
        Ok(photo)
    }

    async fn delete_photo(&self, id: i64) -> RepoResult<Option<Photo>> {
        let removed = sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(removed)
    }

    async fn list_audios(&self) -> RepoResult<Vec<Audio>> {
        let audios = sqlx::query_as::<_, Audio>("SELECT * FROM audios ORDER BY date DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(audios)
    }

    async fn create_audio(&self, a: NewAudio) -> RepoResult<Audio> {
        let audio = sqlx::query_as::<_, Audio>(
            r#"
            INSERT INTO audios (english_title, urdu_title, audio_file, category, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(a.english_title)
        .bind(a.urdu_title)
        .bind(a.audio_file)
        .bind(a.category)
        .bind(a.date)
        .fetch_one(&self.pool)
        .await?;
        Ok(audio)
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>("SELECT * FROM videos ORDER BY date DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn create_video(&self, v: CreateVideoRequest) -> RepoResult<Video> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (english_title, urdu_title, youtube_url, category, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(v.english_title)
        .bind(v.urdu_title)
        .bind(v.youtube_url)
        .bind(v.category)
        .bind(v.date)
        .fetch_one(&self.pool)
        .await?;
        Ok(video)
    }

    async fn create_contact_message(&self, m: ContactMessageRequest) -> RepoResult<ContactMessage> {
        let message = sqlx::query_as::<_, ContactMessage>(
            r#"
            INSERT INTO contact_messages (name, email, phone_number, subject, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(m.name)
        .bind(m.email)
        .bind(m.phone_number)
        .bind(m.subject)
        .bind(m.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }
}

fn missing_collection(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::MissingParent("collection")
        }
        _ => RepositoryError::Database(e),
    }
}

/// MemoryStore
///
/// Tables held by [`InMemoryRepository`]. Public so tests can seed rows directly.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub users: Vec<User>,
    pub about_sections: Vec<AboutSection>,
    pub about_subsections: Vec<AboutSubsection>,
    pub current_nasheen: Vec<CurrentNasheen>,
    pub previous_nasheen: Vec<PreviousNasheen>,
    pub events: Vec<Event>,
    pub publications: Vec<Publication>,
    pub gallery_collections: Vec<GalleryCollection>,
    pub gallery_images: Vec<GalleryImage>,
    pub photo_collections: Vec<PhotoCollection>,
    pub photos: Vec<Photo>,
    pub audios: Vec<Audio>,
    pub videos: Vec<Video>,
    pub contact_messages: Vec<ContactMessage>,
    last_id: i64,
}

impl MemoryStore {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// InMemoryRepository
///
/// `Repository` kept in process memory, for tests and database-less local runs.
/// Mirrors the filtering and ordering of [`PostgresRepository`].
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    pub store: RwLock<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns its id.
    pub async fn add_user(&self, email: &str, role: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
        };
        let id = user.id;
        self.store.write().await.users.push(user);
        id
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_about_sections(&self) -> RepoResult<Vec<AboutSection>> {
        let store = self.store.read().await;
        let mut sections: Vec<_> = store
            .about_sections
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        sections.sort_by_key(|s| (s.order, s.id));
        Ok(sections)
    }

    async fn get_about_section(&self, id: i64) -> RepoResult<Option<AboutSection>> {
        let store = self.store.read().await;
        Ok(store
            .about_sections
            .iter()
            .find(|s| s.id == id && s.is_active)
            .cloned())
    }

    async fn list_about_subsections(&self, section_ids: &[i64]) -> RepoResult<Vec<AboutSubsection>> {
        let store = self.store.read().await;
        let mut subsections: Vec<_> = store
            .about_subsections
            .iter()
            .filter(|s| s.is_active && section_ids.contains(&s.section_id))
            .cloned()
            .collect();
        subsections.sort_by_key(|s| (s.order, s.id));
        Ok(subsections)
    }

    async fn get_current_nasheen(&self) -> RepoResult<Option<CurrentNasheen>> {
        let store = self.store.read().await;
        Ok(store
            .current_nasheen
            .iter()
            .filter(|n| n.is_active)
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn list_previous_nasheen(&self) -> RepoResult<Vec<PreviousNasheen>> {
        let store = self.store.read().await;
        let mut lineage: Vec<_> = store
            .previous_nasheen
            .iter()
            .filter(|n| n.is_active)
            .cloned()
            .collect();
        lineage.sort_by_key(|n| (n.order, n.id));
        Ok(lineage)
    }

    async fn list_events(&self) -> RepoResult<Vec<Event>> {
        let store = self.store.read().await;
        let mut events: Vec<_> = store.events.iter().filter(|e| e.is_active).cloned().collect();
        events.sort_by_key(|e| (e.order, e.id));
        Ok(events)
    }

    async fn get_event(&self, id: i64) -> RepoResult<Option<Event>> {
        let store = self.store.read().await;
        Ok(store
            .events
            .iter()
            .find(|e| e.id == id && e.is_active)
            .cloned())
    }

    async fn list_publications(&self) -> RepoResult<Vec<Publication>> {
        let store = self.store.read().await;
        let mut publications = store.publications.clone();
        publications.sort_by_key(|p| std::cmp::Reverse(p.id));
        Ok(publications)
    }

    async fn get_publication(&self, id: i64) -> RepoResult<Option<Publication>> {
        let store = self.store.read().await;
        Ok(store.publications.iter().find(|p| p.id == id).cloned())
    }

    async fn create_publication(&self, p: NewPublication) -> RepoResult<Publication> {
        let mut store = self.store.write().await;
        let publication = Publication {
            id: store.next_id(),
            title_en: p.title_en,
            title_ur: p.title_ur,
            file: p.file,
            cover: p.cover,
            description_en: p.description_en,
            description_ur: p.description_ur,
            category: p.category,
        };
        store.publications.push(publication.clone());
        Ok(publication)
    }

    async fn update_publication(&self, p: Publication) -> RepoResult<Option<Publication>> {
        let mut store = self.store.write().await;
        let Some(row) = store.publications.iter_mut().find(|row| row.id == p.id) else {
            return Ok(None);
        };
        *row = p;
        Ok(Some(row.clone()))
    }

    async fn delete_publication(&self, id: i64) -> RepoResult<Option<Publication>> {
        let mut store = self.store.write().await;
        let index = store.publications.iter().position(|p| p.id == id);
        Ok(index.map(|i| store.publications.remove(i)))
    }

    async fn list_gallery_collections(&self) -> RepoResult<Vec<GalleryCollection>> {
        let store = self.store.read().await;
        let mut collections = store.gallery_collections.clone();
        collections.sort_by_key(|c| c.id);
        Ok(collections)
    }

    async fn get_gallery_collection(&self, id: i64) -> RepoResult<Option<GalleryCollection>> {
        let store = self.store.read().await;
        Ok(store.gallery_collections.iter().find(|c| c.id == id).cloned())
    }

    async fn create_gallery_collection(&self, req: CreateCollectionRequest) -> RepoResult<GalleryCollection> {
        let mut store = self.store.write().await;
        let collection = GalleryCollection {
            id: store.next_id(),
            name_en: req.name_en,
            name_ur: req.name_ur,
        };
        store.gallery_collections.push(collection.clone());
        Ok(collection)
    }

    async fn update_gallery_collection(&self, c: GalleryCollection) -> RepoResult<Option<GalleryCollection>> {
        let mut store = self.store.write().await;
        let Some(row) = store.gallery_collections.iter_mut().find(|row| row.id == c.id) else {
            return Ok(None);
        };
        *row = c;
        Ok(Some(row.clone()))
    }

    async fn list_gallery_images(&self, collection_ids: &[i64]) -> RepoResult<Vec<GalleryImage>> {
        let store = self.store.read().await;
        let mut images: Vec<_> = store
            .gallery_images
            .iter()
            .filter(|i| i.collection_id.is_some_and(|c| collection_ids.contains(&c)))
            .cloned()
            .collect();
        images.sort_by_key(|i| i.id);
        Ok(images)
    }

    async fn add_gallery_image(&self, collection_id: i64, image: String) -> RepoResult<GalleryImage> {
        let mut store = self.store.write().await;
        if !store.gallery_collections.iter().any(|c| c.id == collection_id) {
            return Err(RepositoryError::MissingParent("gallery collection"));
        }
        let image = GalleryImage {
            id: store.next_id(),
            collection_id: Some(collection_id),
            image,
        };
        store.gallery_images.push(image.clone());
        Ok(image)
    }

    async fn delete_gallery_collection(&self, id: i64) -> RepoResult<Option<Vec<GalleryImage>>> {
        let mut store = self.store.write().await;
        let Some(index) = store.gallery_collections.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        store.gallery_collections.remove(index);
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut store.gallery_images)
            .into_iter()
            .partition(|i| i.collection_id == Some(id));
        store.gallery_images = kept;
        Ok(Some(removed))
    }

    async fn list_photo_collections(&self) -> RepoResult<Vec<PhotoCollection>> {
        let store = self.store.read().await;
        let mut collections = store.photo_collections.clone();
        // Newest first, undated last.
        collections.sort_by(|a, b| match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
        Ok(collections)
    }

    async fn get_photo_collection(&self, id: i64) -> RepoResult<Option<PhotoCollection>> {
        let store = self.store.read().await;
        Ok(store.photo_collections.iter().find(|c| c.id == id).cloned())
    }

    async fn create_photo_collection(&self, c: PhotoCollection) -> RepoResult<PhotoCollection> {
        let mut store = self.store.write().await;
        let collection = PhotoCollection {
            id: store.next_id(),
            ..c
        };
        store.photo_collections.push(collection.clone());
        Ok(collection)
    }

    async fn update_photo_collection(&self, c: PhotoCollection) -> RepoResult<Option<PhotoCollection>> {
        let mut store = self.store.write().await;
        let Some(row) = store.photo_collections.iter_mut().find(|row| row.id == c.id) else {
            return Ok(None);
        };
        *row = c;
        Ok(Some(row.clone()))
    }

    async fn delete_photo_collection(&self, id: i64) -> RepoResult<Option<Vec<Photo>>> {
        let mut store = self.store.write().await;
        let Some(index) = store.photo_collections.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        store.photo_collections.remove(index);
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut store.photos)
            .into_iter()
            .partition(|p| p.collection_id == id);
        store.photos = kept;
        Ok(Some(removed))
    }

    async fn list_photos(&self, collection_ids: Option<&[i64]>) -> RepoResult<Vec<Photo>> {
        let store = self.store.read().await;
        let mut photos: Vec<_> = store
            .photos
            .iter()
            .filter(|p| collection_ids.is_none_or(|ids| ids.contains(&p.collection_id)))
            .cloned()
            .collect();
        photos.sort_by_key(|p| p.id);
        Ok(photos)
    }

    async fn get_photo(&self, id: i64) -> RepoResult<Option<Photo>> {
        let store = self.store.read().await;
        Ok(store.photos.iter().find(|p| p.id == id).cloned())
    }

    async fn create_photo(&self, collection_id: i64, image: String) -> RepoResult<Photo> {
        let mut store = self.store.write().await;
        if !store.photo_collections.iter().any(|c| c.id == collection_id) {
            return Err(RepositoryError::MissingParent("collection"));
        }
        let photo = Photo {
            id: store.next_id(),
            collection_id,
            image,
        };
        store.photos.push(photo.clone());
        Ok(photo)
    }

    async fn update_photo(&self, p: Photo) -> RepoResult<Option<Photo>> {
        let mut store = self.store.write().await;
        if !store.photo_collections.iter().any(|c| c.id == p.collection_id) {
            return Err(RepositoryError::MissingParent("collection"));
        }
        let Some(row) = store.photos.iter_mut().find(|row| row.id == p.id) else {
            return Ok(None);
        };
        *row = p;
        Ok(Some(row.clone()))
    }

    async fn delete_photo(&self, id: i64) -> RepoResult<Option<Photo>> {
        let mut store = self.store.write().await;
        let index = store.photos.iter().position(|p| p.id == id);
        Ok(index.map(|i| store.photos.remove(i)))
    }

    async fn list_audios(&self) -> RepoResult<Vec<Audio>> {
        let store = self.store.read().await;
        let mut audios = store.audios.clone();
        audios.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(audios)
    }

    async fn create_audio(&self, a: NewAudio) -> RepoResult<Audio> {
        let mut store = self.store.write().await;
        let audio = Audio {
            id: store.next_id(),
            english_title: a.english_title,
            urdu_title: a.urdu_title,
            audio_file: a.audio_file,
            category: a.category,
            date: a.date,
        };
        store.audios.push(audio.clone());
        Ok(audio)
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        let store = self.store.read().await;
        let mut videos = store.videos.clone();
        videos.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(videos)
    }

    async fn create_video(&self, v: CreateVideoRequest) -> RepoResult<Video> {
        let mut store = self.store.write().await;
        let video = Video {
            id: store.next_id(),
            english_title: v.english_title,
            urdu_title: v.urdu_title,
            youtube_url: v.youtube_url,
            category: v.category,
            date: v.date,
        };
        store.videos.push(video.clone());
        Ok(video)
    }

    async fn create_contact_message(&self, m: ContactMessageRequest) -> RepoResult<ContactMessage> {
        let mut store = self.store.write().await;
        let message = ContactMessage {
            id: store.next_id(),
            name: m.name,
            email: m.email,
            phone_number: m.phone_number,
            subject: m.subject,
            message: m.message,
            created_at: Utc::now(),
        };
        store.contact_messages.push(message.clone());
        Ok(message)
    }
}
