use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const BLANK_MESSAGE: &str = "This field may not be blank.";
const YOUTUBE_DOMAINS: [&str; 3] = ["youtube.com", "youtu.be", "www.youtube.com"];

// --- Field checks used by the `Validate` derives ---

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed(REQUIRED_MESSAGE)));
    }
    Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed(BLANK_MESSAGE)));
    }
    Ok(())
}

/// A blank address only gets the blank message.
fn email_address(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if value.validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("email").with_message(Cow::Borrowed("Enter a valid email address.")))
}

/// Message for a value outside a fixed list of choices.
pub fn choice_message(value: &str) -> String {
    format!("\"{value}\" is not a valid choice.")
}

fn media_category(value: &str) -> Result<(), ValidationError> {
    required(value)?;
    if MEDIA_CATEGORIES.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::new("invalid_choice").with_message(Cow::Owned(choice_message(value))))
}

fn youtube_url(value: &str) -> Result<(), ValidationError> {
    required(value)?;
    if YOUTUBE_DOMAINS.iter().any(|d| value.contains(d)) {
        return Ok(());
    }
    Err(ValidationError::new("youtube_url")
        .with_message(Cow::Borrowed("Please provide a valid YouTube URL")))
}

// --- Identity ---

/// User
///
/// Account resolved during authentication. Only `admin` may write content.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// Bilingual
///
/// An English/Urdu pair in the shape the frontend renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Bilingual {
    pub english: String,
    pub urdu: String,
}

// --- About ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct AboutSection {
    pub id: i64,
    pub title_en: String,
    pub title_ur: String,
    pub content_en: String,
    pub content_ur: String,
    pub order: i32,
    pub default_open: bool,
    pub is_active: bool,
}

/// AboutSubsection
///
/// Nested entry of an about section (e.g. "Daily Zikr").
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AboutSubsection {
    pub id: i64,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub section_id: i64,
    pub title_en: String,
    pub title_ur: String,
    pub content_en: String,
    pub content_ur: String,
    pub order: i32,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub is_active: bool,
}

/// AboutSectionResponse
///
/// An active section with its active subsections ordered by `(order, id)`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AboutSectionResponse {
    pub id: i64,
    pub title_en: String,
    pub title_ur: String,
    pub content_en: String,
    pub content_ur: String,
    pub order: i32,
    pub default_open: bool,
    pub subsections: Vec<AboutSubsection>,
}

impl AboutSectionResponse {
    pub fn new(section: AboutSection, mut subsections: Vec<AboutSubsection>) -> Self {
        subsections.retain(|s| s.section_id == section.id && s.is_active);
        subsections.sort_by_key(|s| (s.order, s.id));
        Self {
            id: section.id,
            title_en: section.title_en,
            title_ur: section.title_ur,
            content_en: section.content_en,
            content_ur: section.content_ur,
            order: section.order,
            default_open: section.default_open,
            subsections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct CurrentNasheen {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    pub description_en: String,
    pub description_ur: String,
    /// Storage key of the profile image.
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// CurrentNasheenResponse
///
/// The current head of the lineage, with an absolute image URL.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CurrentNasheenResponse {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    pub description_en: String,
    pub description_ur: String,
    pub image: Option<String>,
}

/// PreviousNasheen
///
/// One entry of the lineage tree, in succession order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PreviousNasheen {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    pub order: i32,
    pub is_present: bool,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub is_active: bool,
}

// --- Events ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title_en: String,
    pub title_ur: String,
    pub description_en: String,
    pub description_ur: String,
    /// `daily`, `weekly`, `monthly`, `yearly` or `one_time`.
    pub recurring_type: String,
    /// 0 = Sunday ... 6 = Saturday.
    pub day_of_week: Option<i32>,
    pub week_of_month: Option<i32>,
    pub event_date: Option<NaiveDate>,
    pub event_time: Option<NaiveTime>,
    pub date_text_en: String,
    pub date_text_ur: String,
    /// `high`, `medium`, `low` or `default`.
    pub priority: String,
    pub is_active: bool,
    pub order: i32,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            id: 0,
            title_en: String::new(),
            title_ur: String::new(),
            description_en: String::new(),
            description_ur: String::new(),
            recurring_type: "one_time".to_string(),
            day_of_week: None,
            week_of_month: None,
            event_date: None,
            event_time: None,
            date_text_en: String::new(),
            date_text_ur: String::new(),
            priority: "default".to_string(),
            is_active: true,
            order: 0,
        }
    }
}

const DAYS_EN: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];
const DAYS_UR: [&str; 7] = ["اتوار", "پیر", "منگل", "بدھ", "جمعرات", "جمعہ", "ہفتہ"];
const THURSDAY: i32 = 4;

fn day_name(days: &[&'static str; 7], day: Option<i32>) -> Option<&'static str> {
    day.and_then(|d| usize::try_from(d).ok())
        .and_then(|d| days.get(d).copied())
}

impl Event {
    /// date_text
    ///
    /// The human-readable schedule. Stored texts are used when both languages are set;
    /// otherwise each missing language is generated from the recurrence fields.
    pub fn date_text(&self) -> Bilingual {
        let english = if self.date_text_en.is_empty() {
            self.generated_date_text_en()
        } else {
            self.date_text_en.clone()
        };
        let urdu = if self.date_text_ur.is_empty() {
            self.generated_date_text_ur()
        } else {
            self.date_text_ur.clone()
        };
        Bilingual { english, urdu }
    }

    fn generated_date_text_en(&self) -> String {
        match self.recurring_type.as_str() {
            "daily" => "Daily".to_string(),
            "weekly" => day_name(&DAYS_EN, self.day_of_week)
                .map(|day| format!("Every {day}"))
                .unwrap_or_else(|| "Weekly".to_string()),
            "monthly" => match (self.day_of_week, self.week_of_month) {
                (Some(THURSDAY), Some(1)) => "First Thursday of every month".to_string(),
                (Some(THURSDAY), Some(_)) => "Thursday of every month".to_string(),
                _ => "Monthly".to_string(),
            },
            "one_time" => match self.event_date {
                Some(date) => date.format("%B %d, %Y").to_string(),
                None => "Ongoing".to_string(),
            },
            _ => "Ongoing".to_string(),
        }
    }

    fn generated_date_text_ur(&self) -> String {
        match self.recurring_type.as_str() {
            "daily" => "روزانہ".to_string(),
            "weekly" => day_name(&DAYS_UR, self.day_of_week)
                .map(|day| format!("ہر {day}"))
                .unwrap_or_else(|| "ہفتہ وار".to_string()),
            "monthly" => match (self.day_of_week, self.week_of_month) {
                (Some(THURSDAY), Some(1)) => "ہر مہینے کی پہلی جمعرات".to_string(),
                (Some(THURSDAY), Some(_)) => "ہر مہینے کا جمعرات".to_string(),
                _ => "ماہانہ".to_string(),
            },
            "one_time" => match self.event_date {
                Some(date) => date.format("%d/%m/%Y").to_string(),
                None => "جاری".to_string(),
            },
            _ => "جاری".to_string(),
        }
    }
}

/// EventResponse
///
/// Event in the shape of the frontend calendar: bilingual `title`, `date` and `description`
/// objects plus the raw recurrence fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EventResponse {
    pub id: i64,
    pub title: Bilingual,
    pub date: Bilingual,
    pub description: Bilingual,
    pub recurring_type: String,
    pub day_of_week: Option<i32>,
    pub week_of_month: Option<i32>,
    #[ts(type = "string | null")]
    pub event_date: Option<NaiveDate>,
    #[ts(type = "string | null")]
    pub event_time: Option<NaiveTime>,
    pub priority: String,
    pub order: i32,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        let date = event.date_text();
        Self {
            id: event.id,
            title: Bilingual {
                english: event.title_en,
                urdu: event.title_ur,
            },
            date,
            description: Bilingual {
                english: event.description_en,
                urdu: event.description_ur,
            },
            recurring_type: event.recurring_type,
            day_of_week: event.day_of_week,
            week_of_month: event.week_of_month,
            event_date: event.event_date,
            event_time: event.event_time,
            priority: event.priority,
            order: event.order,
        }
    }
}

// --- Publications ---

pub const PUBLICATION_CATEGORIES: [&str; 3] = ["book", "risala", "other"];

/// Storage key used when a publication is created without a cover.
pub const DEFAULT_COVER_KEY: &str = "publications/covers/default.png";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Publication {
    pub id: i64,
    pub title_en: String,
    pub title_ur: String,
    /// Storage key of the PDF.
    pub file: String,
    /// Storage key of the cover image.
    pub cover: String,
    pub description_en: String,
    pub description_ur: String,
    pub category: String,
}

/// NewPublication
///
/// Validated publication fields plus the storage keys of its already stored files.
#[derive(Debug, Clone, Default)]
pub struct NewPublication {
    pub title_en: String,
    pub title_ur: String,
    pub file: String,
    pub cover: String,
    pub description_en: String,
    pub description_ur: String,
    pub category: String,
}

/// PublicationResponse
///
/// Publication with absolute `file` and `cover` URLs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationResponse {
    pub id: i64,
    pub title_en: String,
    pub title_ur: String,
    pub file: String,
    pub cover: String,
    pub description_en: String,
    pub description_ur: String,
    pub category: String,
}

// --- Gallery ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct GalleryCollection {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct GalleryImage {
    pub id: i64,
    pub collection_id: Option<i64>,
    pub image: String,
}

/// ImageResponse
///
/// Image entry of a gallery or photo collection, with an absolute URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ImageResponse {
    pub id: i64,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GalleryCollectionResponse {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    pub images: Vec<ImageResponse>,
}

/// CreateCollectionRequest
///
/// Body of `POST /api/gallery/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCollectionRequest {
    #[schema(example = "Urs 2024")]
    #[validate(custom(function = "required"))]
    pub name_en: String,
    #[validate(custom(function = "required"))]
    pub name_ur: String,
}

/// UpdateCollectionRequest
///
/// Body of `PUT`/`PATCH /api/gallery/{id}/` and `/api/photos/collections/{id}/`. Absent
/// members keep their stored value on `PATCH`; `PUT` needs both names. `created_at` only
/// applies to photo collections.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateCollectionRequest {
    #[serde(default)]
    #[validate(custom(function = "required"))]
    pub name_en: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "required"))]
    pub name_ur: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDate>,
}

// --- Photos ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct PhotoCollection {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    pub created_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Photo {
    pub id: i64,
    pub collection_id: i64,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PhotoCollectionResponse {
    pub id: i64,
    pub name_en: String,
    pub name_ur: String,
    #[ts(type = "string | null")]
    pub created_at: Option<NaiveDate>,
    pub images: Vec<ImageResponse>,
}

/// CreatePhotoCollectionRequest
///
/// Body of `POST /api/photos/collections/`. `created_at` defaults to today.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreatePhotoCollectionRequest {
    #[validate(custom(function = "required"))]
    pub name_en: String,
    #[validate(custom(function = "required"))]
    pub name_ur: String,
    #[ts(type = "string | null")]
    pub created_at: Option<NaiveDate>,
}

// --- Audio / Video ---

pub const MEDIA_CATEGORIES: [&str; 3] = ["Bayaan", "Dhikr", "Event"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Audio {
    pub id: i64,
    pub english_title: String,
    pub urdu_title: String,
    /// Storage key of the audio file.
    pub audio_file: String,
    pub category: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct NewAudio {
    pub english_title: String,
    pub urdu_title: String,
    pub audio_file: String,
    pub category: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AudioResponse {
    pub id: i64,
    pub english_title: String,
    pub urdu_title: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
    pub category: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
}

/// Video
///
/// YouTube-hosted recording. Also the response shape, with `youtube_url` exposed as
/// `youtubeUrl`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Video {
    pub id: i64,
    pub english_title: String,
    pub urdu_title: String,
    #[serde(rename = "youtubeUrl")]
    pub youtube_url: String,
    pub category: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
}

/// CreateVideoRequest
///
/// Body of `POST /api/video-audios/videos/`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateVideoRequest {
    #[validate(custom(function = "required"))]
    pub english_title: String,
    #[validate(custom(function = "required"))]
    pub urdu_title: String,
    #[serde(rename = "youtubeUrl", alias = "youtube_url")]
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[validate(custom(function = "youtube_url"))]
    pub youtube_url: String,
    #[validate(custom(function = "media_category"))]
    pub category: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
}

// --- Multipart forms (documentation only) ---

/// PublicationForm
///
/// Multipart body of `POST /api/publications/publications/`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PublicationForm {
    pub title_en: String,
    pub title_ur: String,
    pub description_en: String,
    pub description_ur: String,
    #[schema(example = "book")]
    pub category: String,
    /// PDF, at most 50 MB.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// JPG, PNG or WebP, at most 5 MB.
    #[schema(value_type = Option<String>, format = Binary)]
    pub cover: Option<Vec<u8>>,
}

/// PublicationUpdateForm
///
/// Multipart body of `PUT`/`PATCH /api/publications/publications/{id}/`. On `PATCH` every
/// part is optional; `PUT` needs every text part. Files are only replaced when sent.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PublicationUpdateForm {
    pub title_en: Option<String>,
    pub title_ur: Option<String>,
    pub description_en: Option<String>,
    pub description_ur: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub cover: Option<Vec<u8>>,
}

/// PhotoUpdateForm
///
/// Multipart body of `PUT`/`PATCH /api/photos/photos/{id}/`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PhotoUpdateForm {
    pub collection: Option<i64>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// ImageForm
///
/// Multipart body of `POST /api/gallery/{id}/images/`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ImageForm {
    /// JPG, PNG, GIF or WebP, at most 5 MB.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// PhotoForm
///
/// Multipart body of `POST /api/photos/photos/`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PhotoForm {
    pub collection: i64,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// AudioForm
///
/// Multipart body of `POST /api/video-audios/audios/`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct AudioForm {
    pub english_title: String,
    pub urdu_title: String,
    #[schema(example = "Bayaan")]
    pub category: String,
    #[schema(example = "2024-11-21")]
    pub date: String,
    /// MP3, WAV, M4A or OGG, at most 100 MB.
    #[schema(value_type = String, format = Binary)]
    pub audio_file: Vec<u8>,
}

// --- Contact ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// ContactMessageRequest
///
/// Body of `POST /contact/send-message/`. `phone_number` is optional.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct ContactMessageRequest {
    #[serde(default)]
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Ensure this field has no more than 100 characters.")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(
        custom(function = "email_address"),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub phone_number: String,
    #[serde(default)]
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "Ensure this field has no more than 200 characters.")
    )]
    pub subject: String,
    #[serde(default)]
    #[validate(
        custom(function = "not_blank"),
        length(max = 5000, message = "Ensure this field has no more than 5000 characters.")
    )]
    pub message: String,
}

impl ContactMessageRequest {
    /// Strips surrounding whitespace from every field before validation.
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}
