use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{Method, StatusCode},
};
use chrono::{NaiveDate, Utc};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    models::{
        AboutSectionResponse, AudioForm, AudioResponse, ContactMessageRequest,
        CreateCollectionRequest, CreatePhotoCollectionRequest, CreateVideoRequest,
        CurrentNasheenResponse, DEFAULT_COVER_KEY, EventResponse, GalleryCollection,
        GalleryCollectionResponse, ImageForm, ImageResponse, MEDIA_CATEGORIES, NewAudio,
        NewPublication, PUBLICATION_CATEGORIES, Photo, PhotoCollection, PhotoCollectionResponse,
        PhotoForm, PhotoUpdateForm, PreviousNasheen, Publication, PublicationForm,
        PublicationResponse, PublicationUpdateForm, REQUIRED_MESSAGE, UpdateCollectionRequest,
        Video, choice_message,
    },
    response::{ApiError, ApiJson, ApiPath, ApiResponse, FieldErrors, ok, success},
    storage::StorageState,
    uploads::{MultipartForm, check, push_error, store_upload},
    validation::{AUDIO_FILE, COVER_IMAGE, GALLERY_IMAGE, PDF_DOCUMENT},
};

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

const DATE_FORMAT_MESSAGE: &str =
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

fn found<T>(row: Option<T>) -> Result<T, ApiError> {
    row.ok_or(ApiError::NotFound)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Removes stored objects after their rows are gone. Failures leave orphans behind and
/// are only logged.
async fn discard_objects(storage: &StorageState, keys: impl IntoIterator<Item = String>) {
    for key in keys {
        if let Err(e) = storage.delete_object(&key).await {
            tracing::warn!(key = %key, error = %e, "Could not delete stored object");
        }
    }
}

// --- About ---

/// list_about_sections
///
/// [Public Route] Active about-page sections with their active subsections.
#[utoipa::path(
    get,
    path = "/api/about/sections/",
    responses((status = 200, description = "About sections", body = [AboutSectionResponse]))
)]
pub async fn list_about_sections(
    State(state): State<AppState>,
) -> ApiResult<Vec<AboutSectionResponse>> {
    let sections = state.repo.list_about_sections().await?;
    let ids: Vec<i64> = sections.iter().map(|s| s.id).collect();
    let subsections = state.repo.list_about_subsections(&ids).await?;

    let response = sections
        .into_iter()
        .map(|section| AboutSectionResponse::new(section, subsections.clone()))
        .collect();
    Ok(ok(response))
}

/// get_about_section
///
/// [Public Route] A single active section.
#[utoipa::path(
    get,
    path = "/api/about/sections/{id}/",
    params(("id" = i64, Path, description = "Section id")),
    responses(
        (status = 200, description = "About section", body = AboutSectionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_about_section(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<AboutSectionResponse> {
    let section = found(state.repo.get_about_section(id).await?)?;
    let subsections = state.repo.list_about_subsections(&[id]).await?;
    Ok(ok(AboutSectionResponse::new(section, subsections)))
}

/// get_current_nasheen
///
/// [Public Route] The current Masnad-e-Nasheen, or `null` when none is active.
#[utoipa::path(
    get,
    path = "/api/about/current-nasheen/",
    responses((status = 200, description = "Current nasheen", body = CurrentNasheenResponse))
)]
pub async fn get_current_nasheen(
    State(state): State<AppState>,
) -> ApiResult<Option<CurrentNasheenResponse>> {
    let current = state.repo.get_current_nasheen().await?.map(|n| CurrentNasheenResponse {
        id: n.id,
        name_en: n.name_en,
        name_ur: n.name_ur,
        description_en: n.description_en,
        description_ur: n.description_ur,
        image: n.image.map(|key| state.storage.public_url(&key)),
    });
    Ok(ok(current))
}

/// list_previous_nasheen
///
/// [Public Route] The lineage tree in succession order.
#[utoipa::path(
    get,
    path = "/api/about/previous-nasheen/",
    responses((status = 200, description = "Lineage", body = [PreviousNasheen]))
)]
pub async fn list_previous_nasheen(
    State(state): State<AppState>,
) -> ApiResult<Vec<PreviousNasheen>> {
    Ok(ok(state.repo.list_previous_nasheen().await?))
}

// --- Events ---

/// list_events
///
/// [Public Route] Active events for the calendar.
#[utoipa::path(
    get,
    path = "/api/events/",
    responses((status = 200, description = "Events", body = [EventResponse]))
)]
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<EventResponse>> {
    let events = state.repo.list_events().await?;
    Ok(ok(events.into_iter().map(EventResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}/",
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<EventResponse> {
    let event = found(state.repo.get_event(id).await?)?;
    Ok(ok(event.into()))
}

// --- Publications ---

fn publication_response(storage: &StorageState, p: Publication) -> PublicationResponse {
    PublicationResponse {
        id: p.id,
        file: storage.public_url(&p.file),
        cover: storage.public_url(&p.cover),
        title_en: p.title_en,
        title_ur: p.title_ur,
        description_en: p.description_en,
        description_ur: p.description_ur,
        category: p.category,
    }
}

#[utoipa::path(
    get,
    path = "/api/publications/publications/",
    responses((status = 200, description = "Publications", body = [PublicationResponse]))
)]
pub async fn list_publications(
    State(state): State<AppState>,
) -> ApiResult<Vec<PublicationResponse>> {
    let publications = state.repo.list_publications().await?;
    Ok(ok(publications
        .into_iter()
        .map(|p| publication_response(&state.storage, p))
        .collect()))
}

#[utoipa::path(
    get,
    path = "/api/publications/publications/{id}/",
    params(("id" = i64, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Publication", body = PublicationResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_publication(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<PublicationResponse> {
    let publication = found(state.repo.get_publication(id).await?)?;
    Ok(ok(publication_response(&state.storage, publication)))
}

/// create_publication
///
/// [Admin Route] Multipart upload of a publication. `file` must pass the PDF policy and the
/// optional `cover` the cover-image policy. Text fields are checked before any file is
/// stored.
#[utoipa::path(
    post,
    path = "/api/publications/publications/",
    request_body(content = PublicationForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = PublicationResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_publication(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<PublicationResponse> {
    user.require_admin()?;
    let mut form = MultipartForm::collect(multipart?).await?;

    let mut errors = FieldErrors::new();
    let title_en = form.required("title_en", &mut errors);
    let title_ur = form.required("title_ur", &mut errors);
    let description_en = form.required("description_en", &mut errors);
    let description_ur = form.required("description_ur", &mut errors);
    let category = form.required("category", &mut errors);
    if !category.is_empty() && !PUBLICATION_CATEGORIES.contains(&category.as_str()) {
        push_error(&mut errors, "category", choice_message(&category));
    }
    let file = form.take_file("file");
    if file.is_none() {
        push_error(&mut errors, "file", "No file was submitted.");
    }
    check(errors)?;
    let Some(file) = file else {
        return Err(ApiError::field("file", "No file was submitted."));
    };

    let cover = match form.take_file("cover") {
        Some(cover) => {
            Some(store_upload(&state, "cover", cover, &COVER_IMAGE, "publications/covers").await?)
        }
        None => None,
    };
    let file = match store_upload(&state, "file", file, &PDF_DOCUMENT, "publications").await {
        Ok(key) => key,
        Err(e) => {
            discard_objects(&state.storage, cover).await;
            return Err(e);
        }
    };

    let publication = state
        .repo
        .create_publication(NewPublication {
            title_en,
            title_ur,
            file,
            cover: cover.unwrap_or_else(|| DEFAULT_COVER_KEY.to_string()),
            description_en,
            description_ur,
            category,
        })
        .await?;

    tracing::info!(publication_id = publication.id, user_id = %user.id, "Publication created");
    Ok(success(
        Some(publication_response(&state.storage, publication)),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

/// delete_publication
///
/// [Admin Route] Deletes the row and its stored files. The shared default cover is kept.
#[utoipa::path(
    delete,
    path = "/api/publications/publications/{id}/",
    params(("id" = i64, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_publication(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    let removed = found(state.repo.delete_publication(id).await?)?;

    let mut keys = vec![removed.file];
    if removed.cover != DEFAULT_COVER_KEY {
        keys.push(removed.cover);
    }
    discard_objects(&state.storage, keys).await;

    tracing::info!(publication_id = id, user_id = %user.id, "Publication deleted");
    Ok(success(None, "Deleted successfully", StatusCode::OK))
}

/// A text part of an update form: required on `PUT`, optional on `PATCH`.
fn updated_text(
    form: &MultipartForm,
    name: &str,
    partial: bool,
    errors: &mut FieldErrors,
) -> Option<String> {
    if partial {
        form.text(name).map(str::to_string)
    } else {
        Some(form.required(name, errors))
    }
}

/// update_publication
///
/// [Admin Route] `PUT` replaces every text field, `PATCH` only those sent. A sent `file` or
/// `cover` goes through the same policies as on create, and the object it replaces is
/// removed once the row is saved.
#[utoipa::path(
    put,
    path = "/api/publications/publications/{id}/",
    params(("id" = i64, Path, description = "Publication id")),
    request_body(content = PublicationUpdateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = PublicationResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_publication(
    user: AuthUser,
    State(state): State<AppState>,
    method: Method,
    ApiPath(id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<PublicationResponse> {
    user.require_admin()?;
    let existing = found(state.repo.get_publication(id).await?)?;
    let mut form = MultipartForm::collect(multipart?).await?;
    let partial = method == Method::PATCH;

    let mut errors = FieldErrors::new();
    let title_en = updated_text(&form, "title_en", partial, &mut errors);
    let title_ur = updated_text(&form, "title_ur", partial, &mut errors);
    let description_en = updated_text(&form, "description_en", partial, &mut errors);
    let description_ur = updated_text(&form, "description_ur", partial, &mut errors);
    let category = updated_text(&form, "category", partial, &mut errors);
    if let Some(category) = category.as_deref().filter(|c| !c.is_empty()) {
        if !PUBLICATION_CATEGORIES.contains(&category) {
            push_error(&mut errors, "category", choice_message(category));
        }
    }
    check(errors)?;

    let file = match form.take_file("file") {
        Some(file) => Some(store_upload(&state, "file", file, &PDF_DOCUMENT, "publications").await?),
        None => None,
    };
    let cover = match form.take_file("cover") {
        Some(cover) => {
            match store_upload(&state, "cover", cover, &COVER_IMAGE, "publications/covers").await {
                Ok(key) => Some(key),
                Err(e) => {
                    discard_objects(&state.storage, file).await;
                    return Err(e);
                }
            }
        }
        None => None,
    };

    let updated = Publication {
        id,
        title_en: title_en.unwrap_or_else(|| existing.title_en.clone()),
        title_ur: title_ur.unwrap_or_else(|| existing.title_ur.clone()),
        file: file.clone().unwrap_or_else(|| existing.file.clone()),
        cover: cover.clone().unwrap_or_else(|| existing.cover.clone()),
        description_en: description_en.unwrap_or_else(|| existing.description_en.clone()),
        description_ur: description_ur.unwrap_or_else(|| existing.description_ur.clone()),
        category: category.unwrap_or_else(|| existing.category.clone()),
    };
    let saved = match state.repo.update_publication(updated).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            discard_objects(&state.storage, file.into_iter().chain(cover)).await;
            return Err(ApiError::NotFound);
        }
        Err(e) => {
            discard_objects(&state.storage, file.into_iter().chain(cover)).await;
            return Err(e.into());
        }
    };

    let mut replaced = Vec::new();
    if file.is_some() {
        replaced.push(existing.file);
    }
    if cover.is_some() && existing.cover != DEFAULT_COVER_KEY {
        replaced.push(existing.cover);
    }
    discard_objects(&state.storage, replaced).await;

    tracing::info!(publication_id = id, user_id = %user.id, "Publication updated");
    Ok(ok(publication_response(&state.storage, saved)))
}

// --- Gallery ---

fn image_responses<'a>(
    storage: &StorageState,
    images: impl Iterator<Item = (i64, &'a str)>,
) -> Vec<ImageResponse> {
    images
        .map(|(id, key)| ImageResponse {
            id,
            image: storage.public_url(key),
        })
        .collect()
}

async fn gallery_responses(
    state: &AppState,
    collections: Vec<GalleryCollection>,
) -> Result<Vec<GalleryCollectionResponse>, ApiError> {
    let ids: Vec<i64> = collections.iter().map(|c| c.id).collect();
    let images = state.repo.list_gallery_images(&ids).await?;

    Ok(collections
        .into_iter()
        .map(|c| GalleryCollectionResponse {
            images: image_responses(
                &state.storage,
                images
                    .iter()
                    .filter(|i| i.collection_id == Some(c.id))
                    .map(|i| (i.id, i.image.as_str())),
            ),
            id: c.id,
            name_en: c.name_en,
            name_ur: c.name_ur,
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/gallery/",
    responses((status = 200, description = "Gallery collections", body = [GalleryCollectionResponse]))
)]
pub async fn list_gallery_collections(
    State(state): State<AppState>,
) -> ApiResult<Vec<GalleryCollectionResponse>> {
    let collections = state.repo.list_gallery_collections().await?;
    Ok(ok(gallery_responses(&state, collections).await?))
}

#[utoipa::path(
    get,
    path = "/api/gallery/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Gallery collection", body = GalleryCollectionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_gallery_collection(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<GalleryCollectionResponse> {
    let collection = found(state.repo.get_gallery_collection(id).await?)?;
    let mut responses = gallery_responses(&state, vec![collection]).await?;
    found(responses.pop()).map(ok)
}

/// Validates a collection update. `PUT` treats missing names as blank so they are reported.
fn checked_update(
    method: &Method,
    mut payload: UpdateCollectionRequest,
) -> Result<UpdateCollectionRequest, ApiError> {
    if *method == Method::PUT {
        payload.name_en.get_or_insert_with(String::new);
        payload.name_ur.get_or_insert_with(String::new);
    }
    payload.validate()?;
    Ok(payload)
}

/// create_gallery_collection
///
/// [Admin Route] Creates an empty gallery collection.
#[utoipa::path(
    post,
    path = "/api/gallery/",
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Created", body = GalleryCollectionResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_gallery_collection(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCollectionRequest>,
) -> ApiResult<GalleryCollectionResponse> {
    user.require_admin()?;
    payload.validate()?;

    let c = state.repo.create_gallery_collection(payload).await?;
    Ok(success(
        Some(GalleryCollectionResponse {
            id: c.id,
            name_en: c.name_en,
            name_ur: c.name_ur,
            images: vec![],
        }),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

/// upload_gallery_image
///
/// [Admin Route] Adds one `image` (gallery-image policy) to a collection.
#[utoipa::path(
    post,
    path = "/api/gallery/{id}/images/",
    params(("id" = i64, Path, description = "Collection id")),
    request_body(content = ImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = ImageResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn upload_gallery_image(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImageResponse> {
    user.require_admin()?;
    found(state.repo.get_gallery_collection(id).await?)?;

    let mut form = MultipartForm::collect(multipart?).await?;
    let file = form
        .take_file("image")
        .ok_or_else(|| ApiError::field("image", "No file was submitted."))?;
    let key = store_upload(&state, "image", file, &GALLERY_IMAGE, "gallery/images").await?;

    let image = match state.repo.add_gallery_image(id, key.clone()).await {
        Ok(image) => image,
        Err(e) => {
            discard_objects(&state.storage, [key]).await;
            return Err(e.into());
        }
    };

    Ok(success(
        Some(ImageResponse {
            id: image.id,
            image: state.storage.public_url(&image.image),
        }),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/gallery/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_gallery_collection(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    let images = found(state.repo.delete_gallery_collection(id).await?)?;
    discard_objects(&state.storage, images.into_iter().map(|i| i.image)).await;
    Ok(success(None, "Deleted successfully", StatusCode::OK))
}

/// update_gallery_collection
///
/// [Admin Route] Renames a gallery collection. Images are untouched.
#[utoipa::path(
    put,
    path = "/api/gallery/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    request_body = UpdateCollectionRequest,
    responses(
        (status = 200, description = "Updated", body = GalleryCollectionResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_gallery_collection(
    user: AuthUser,
    State(state): State<AppState>,
    method: Method,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateCollectionRequest>,
) -> ApiResult<GalleryCollectionResponse> {
    user.require_admin()?;
    let existing = found(state.repo.get_gallery_collection(id).await?)?;
    let payload = checked_update(&method, payload)?;

    let updated = GalleryCollection {
        id,
        name_en: payload.name_en.unwrap_or(existing.name_en),
        name_ur: payload.name_ur.unwrap_or(existing.name_ur),
    };
    let saved = found(state.repo.update_gallery_collection(updated).await?)?;
    let mut responses = gallery_responses(&state, vec![saved]).await?;
    found(responses.pop()).map(ok)
}

// --- Photos ---

async fn photo_collection_responses(
    state: &AppState,
    collections: Vec<PhotoCollection>,
) -> Result<Vec<PhotoCollectionResponse>, ApiError> {
    let ids: Vec<i64> = collections.iter().map(|c| c.id).collect();
    let photos = state.repo.list_photos(Some(&ids)).await?;

    Ok(collections
        .into_iter()
        .map(|c| PhotoCollectionResponse {
            images: image_responses(
                &state.storage,
                photos
                    .iter()
                    .filter(|p| p.collection_id == c.id)
                    .map(|p| (p.id, p.image.as_str())),
            ),
            id: c.id,
            name_en: c.name_en,
            name_ur: c.name_ur,
            created_at: c.created_at,
        })
        .collect())
}

fn photo_response(storage: &StorageState, photo: &Photo) -> ImageResponse {
    ImageResponse {
        id: photo.id,
        image: storage.public_url(&photo.image),
    }
}

/// list_photo_collections
///
/// [Public Route] Photo collections, newest first, each with its photos.
#[utoipa::path(
    get,
    path = "/api/photos/collections/",
    responses((status = 200, description = "Photo collections", body = [PhotoCollectionResponse]))
)]
pub async fn list_photo_collections(
    State(state): State<AppState>,
) -> ApiResult<Vec<PhotoCollectionResponse>> {
    let collections = state.repo.list_photo_collections().await?;
    Ok(ok(photo_collection_responses(&state, collections).await?))
}

#[utoipa::path(
    get,
    path = "/api/photos/collections/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Photo collection", body = PhotoCollectionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_photo_collection(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<PhotoCollectionResponse> {
    let collection = found(state.repo.get_photo_collection(id).await?)?;
    let mut responses = photo_collection_responses(&state, vec![collection]).await?;
    found(responses.pop()).map(ok)
}

/// create_photo_collection
///
/// [Admin Route] Creates an empty photo collection dated today unless `created_at` is given.
#[utoipa::path(
    post,
    path = "/api/photos/collections/",
    request_body = CreatePhotoCollectionRequest,
    responses(
        (status = 201, description = "Created", body = PhotoCollectionResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_photo_collection(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreatePhotoCollectionRequest>,
) -> ApiResult<PhotoCollectionResponse> {
    user.require_admin()?;
    payload.validate()?;

    let c = state
        .repo
        .create_photo_collection(PhotoCollection {
            id: 0,
            name_en: payload.name_en,
            name_ur: payload.name_ur,
            created_at: Some(payload.created_at.unwrap_or_else(|| Utc::now().date_naive())),
        })
        .await?;

    Ok(success(
        Some(PhotoCollectionResponse {
            id: c.id,
            name_en: c.name_en,
            name_ur: c.name_ur,
            created_at: c.created_at,
            images: vec![],
        }),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

#[utoipa::path(
    put,
    path = "/api/photos/collections/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    request_body = UpdateCollectionRequest,
    responses(
        (status = 200, description = "Updated", body = PhotoCollectionResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_photo_collection(
    user: AuthUser,
    State(state): State<AppState>,
    method: Method,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateCollectionRequest>,
) -> ApiResult<PhotoCollectionResponse> {
    user.require_admin()?;
    let existing = found(state.repo.get_photo_collection(id).await?)?;
    let payload = checked_update(&method, payload)?;

    let updated = PhotoCollection {
        id,
        name_en: payload.name_en.unwrap_or(existing.name_en),
        name_ur: payload.name_ur.unwrap_or(existing.name_ur),
        created_at: payload.created_at.or(existing.created_at),
    };
    let saved = found(state.repo.update_photo_collection(updated).await?)?;
    let mut responses = photo_collection_responses(&state, vec![saved]).await?;
    found(responses.pop()).map(ok)
}

/// delete_photo_collection
///
/// [Admin Route] Deletes the collection together with its photos and their stored objects.
#[utoipa::path(
    delete,
    path = "/api/photos/collections/{id}/",
    params(("id" = i64, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_photo_collection(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    let photos = found(state.repo.delete_photo_collection(id).await?)?;
    discard_objects(&state.storage, photos.into_iter().map(|p| p.image)).await;

    tracing::info!(collection_id = id, user_id = %user.id, "Photo collection deleted");
    Ok(success(None, "Deleted successfully", StatusCode::OK))
}

#[utoipa::path(
    get,
    path = "/api/photos/photos/",
    responses((status = 200, description = "Photos", body = [ImageResponse]))
)]
pub async fn list_photos(State(state): State<AppState>) -> ApiResult<Vec<ImageResponse>> {
    let photos = state.repo.list_photos(None).await?;
    Ok(ok(photos.iter().map(|p| photo_response(&state.storage, p)).collect()))
}

#[utoipa::path(
    get,
    path = "/api/photos/photos/{id}/",
    params(("id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo", body = ImageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ImageResponse> {
    let photo = found(state.repo.get_photo(id).await?)?;
    Ok(ok(photo_response(&state.storage, &photo)))
}

/// Reads the `collection` part and checks that it names an existing photo collection.
/// An absent part is only an error when `optional` is false.
async fn collection_field(
    state: &AppState,
    form: &MultipartForm,
    optional: bool,
    errors: &mut FieldErrors,
) -> Result<Option<i64>, ApiError> {
    match form.text("collection").map(str::parse::<i64>) {
        None => {
            if !optional {
                push_error(errors, "collection", REQUIRED_MESSAGE);
            }
            Ok(None)
        }
        Some(Err(_)) => {
            push_error(errors, "collection", "Incorrect type. Expected pk value, received str.");
            Ok(None)
        }
        Some(Ok(id)) => {
            if state.repo.get_photo_collection(id).await?.is_some() {
                Ok(Some(id))
            } else {
                push_error(
                    errors,
                    "collection",
                    format!("Invalid pk \"{id}\" - object does not exist."),
                );
                Ok(None)
            }
        }
    }
}

/// create_photo
///
/// [Admin Route] Multipart `collection` (id) + `image` (gallery-image policy).
#[utoipa::path(
    post,
    path = "/api/photos/photos/",
    request_body(content = PhotoForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = ImageResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_photo(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImageResponse> {
    user.require_admin()?;
    let mut form = MultipartForm::collect(multipart?).await?;

    let mut errors = FieldErrors::new();
    let collection_id = collection_field(&state, &form, false, &mut errors).await?;
    let file = form.take_file("image");
    if file.is_none() {
        push_error(&mut errors, "image", "No file was submitted.");
    }
    check(errors)?;

    let (Some(collection_id), Some(file)) = (collection_id, file) else {
        return Err(ApiError::Internal("photo form passed validation incomplete".into()));
    };

    let key = store_upload(&state, "image", file, &GALLERY_IMAGE, "photos").await?;
    let photo = match state.repo.create_photo(collection_id, key.clone()).await {
        Ok(photo) => photo,
        Err(e) => {
            discard_objects(&state.storage, [key]).await;
            return Err(e.into());
        }
    };

    Ok(success(
        Some(photo_response(&state.storage, &photo)),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/photos/photos/{id}/",
    params(("id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_photo(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    user.require_admin()?;
    let photo = found(state.repo.delete_photo(id).await?)?;
    discard_objects(&state.storage, [photo.image]).await;
    Ok(success(None, "Deleted successfully", StatusCode::OK))
}

/// update_photo
///
/// [Admin Route] Moves a photo to another collection and/or replaces its `image`. `PUT`
/// needs `collection`; the image is optional either way.
#[utoipa::path(
    put,
    path = "/api/photos/photos/{id}/",
    params(("id" = i64, Path, description = "Photo id")),
    request_body(content = PhotoUpdateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = ImageResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_photo(
    user: AuthUser,
    State(state): State<AppState>,
    method: Method,
    ApiPath(id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImageResponse> {
    user.require_admin()?;
    let existing = found(state.repo.get_photo(id).await?)?;
    let mut form = MultipartForm::collect(multipart?).await?;

    let mut errors = FieldErrors::new();
    let partial = method == Method::PATCH;
    let collection_id = collection_field(&state, &form, partial, &mut errors).await?;
    check(errors)?;

    let image = match form.take_file("image") {
        Some(file) => Some(store_upload(&state, "image", file, &GALLERY_IMAGE, "photos").await?),
        None => None,
    };
    let updated = Photo {
        id,
        collection_id: collection_id.unwrap_or(existing.collection_id),
        image: image.clone().unwrap_or_else(|| existing.image.clone()),
    };
    let saved = match state.repo.update_photo(updated).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            discard_objects(&state.storage, image).await;
            return Err(ApiError::NotFound);
        }
        Err(e) => {
            discard_objects(&state.storage, image).await;
            return Err(e.into());
        }
    };
    if image.is_some() {
        discard_objects(&state.storage, [existing.image]).await;
    }

    Ok(ok(photo_response(&state.storage, &saved)))
}

// --- Audio / Video ---

/// list_audios
///
/// [Public Route] Audio recordings, newest first, with absolute `audioUrl`s.
#[utoipa::path(
    get,
    path = "/api/video-audios/audios/",
    responses((status = 200, description = "Audios", body = [AudioResponse]))
)]
pub async fn list_audios(State(state): State<AppState>) -> ApiResult<Vec<AudioResponse>> {
    let audios = state.repo.list_audios().await?;
    Ok(ok(audios
        .into_iter()
        .map(|a| AudioResponse {
            id: a.id,
            audio_url: state.storage.public_url(&a.audio_file),
            english_title: a.english_title,
            urdu_title: a.urdu_title,
            category: a.category,
            date: a.date,
        })
        .collect()))
}

/// create_audio
///
/// [Admin Route] Multipart upload of an audio recording (`audio_file`, audio policy).
#[utoipa::path(
    post,
    path = "/api/video-audios/audios/",
    request_body(content = AudioForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = AudioResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_audio(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<AudioResponse> {
    user.require_admin()?;
    let mut form = MultipartForm::collect(multipart?).await?;

    let mut errors = FieldErrors::new();
    let english_title = form.required("english_title", &mut errors);
    let urdu_title = form.required("urdu_title", &mut errors);
    let category = form.required("category", &mut errors);
    if !category.is_empty() && !MEDIA_CATEGORIES.contains(&category.as_str()) {
        push_error(&mut errors, "category", choice_message(&category));
    }
    let raw_date = form.required("date", &mut errors);
    let date = parse_date(&raw_date);
    if !raw_date.is_empty() && date.is_none() {
        push_error(&mut errors, "date", DATE_FORMAT_MESSAGE);
    }
    let file = form.take_file("audio_file");
    if file.is_none() {
        push_error(&mut errors, "audio_file", "No file was submitted.");
    }
    check(errors)?;

    let (Some(date), Some(file)) = (date, file) else {
        return Err(ApiError::Internal("audio form passed validation incomplete".into()));
    };

    let audio_file = store_upload(&state, "audio_file", file, &AUDIO_FILE, "audios").await?;
    let audio = match state
        .repo
        .create_audio(NewAudio {
            english_title,
            urdu_title,
            audio_file: audio_file.clone(),
            category,
            date,
        })
        .await
    {
        Ok(audio) => audio,
        Err(e) => {
            discard_objects(&state.storage, [audio_file]).await;
            return Err(e.into());
        }
    };

    Ok(success(
        Some(AudioResponse {
            id: audio.id,
            audio_url: state.storage.public_url(&audio.audio_file),
            english_title: audio.english_title,
            urdu_title: audio.urdu_title,
            category: audio.category,
            date: audio.date,
        }),
        "Created successfully",
        StatusCode::CREATED,
    ))
}

#[utoipa::path(
    get,
    path = "/api/video-audios/videos/",
    responses((status = 200, description = "Videos", body = [Video]))
)]
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Vec<Video>> {
    Ok(ok(state.repo.list_videos().await?))
}

/// create_video
///
/// [Admin Route] Registers a YouTube video. The URL must mention a YouTube domain.
#[utoipa::path(
    post,
    path = "/api/video-audios/videos/",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Created", body = Video),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_video(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateVideoRequest>,
) -> ApiResult<Video> {
    user.require_admin()?;
    payload.validate()?;

    let video = state.repo.create_video(payload).await?;
    Ok(success(Some(video), "Created successfully", StatusCode::CREATED))
}

// --- Contact ---

/// validate_contact
///
/// Trims every field and checks the contact form. `phone_number` is the only optional field.
pub fn validate_contact(req: ContactMessageRequest) -> Result<ContactMessageRequest, ApiError> {
    let req = req.trimmed();
    req.validate()?;
    Ok(req)
}

/// send_contact_message
///
/// [Public Route] Stores a contact form submission. Notification delivery is left to
/// whoever reads the `contact_messages` table; the submission is also logged.
#[utoipa::path(
    post,
    path = "/contact/send-message/",
    request_body = ContactMessageRequest,
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn send_contact_message(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ContactMessageRequest>,
) -> ApiResult<()> {
    let message = validate_contact(payload)?;
    let saved = state.repo.create_contact_message(message).await?;

    tracing::info!(
        message_id = saved.id,
        subject = %saved.subject,
        "Contact form submission stored"
    );
    Ok(success(
        None,
        "Your message has been sent successfully",
        StatusCode::CREATED,
    ))
}
