//! Data models for contents and schedules.
//!
//! Defines the content row, the schedule row, and the closed enums for
//! post types, platforms and lifecycle statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of post to publish. Drives which upload action the dispatcher takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Photo,
    Video,
    Reel,
    Album,
    Story,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Photo => "photo",
            PostType::Video => "video",
            PostType::Reel => "reel",
            PostType::Album => "album",
            PostType::Story => "story",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(PostType::Photo),
            "video" => Some(PostType::Video),
            "reel" => Some(PostType::Reel),
            "album" => Some(PostType::Album),
            "story" => Some(PostType::Story),
            _ => None,
        }
    }
}

/// Target publishing platform. One platform per content/schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Tiktok,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "instagram" => Some(Platform::Instagram),
            "tiktok" => Some(Platform::Tiktok),
            _ => None,
        }
    }
}

/// Lifecycle status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Uploaded,
    Scheduled,
    Published,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Uploaded => "uploaded",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
            ContentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(ContentStatus::Uploaded),
            "scheduled" => Some(ContentStatus::Scheduled),
            "published" => Some(ContentStatus::Published),
            "failed" => Some(ContentStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle status of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Recurring,
    Completed, // terminal
    Failed,    // terminal
}

impl ScheduleStatus {
    /// Returns true if this schedule still participates in evaluation.
    pub fn is_active(&self) -> bool {
        matches!(self, ScheduleStatus::Pending | ScheduleStatus::Recurring)
    }

    /// Returns true if this is a terminal state (Completed or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Recurring => "recurring",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScheduleStatus::Pending),
            "recurring" => Some(ScheduleStatus::Recurring),
            "completed" => Some(ScheduleStatus::Completed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// A unit of publishable material.
#[derive(Debug, Clone)]
pub struct Content {
    /// Unique identifier (UUID)
    pub id: String,
    /// Comma-joined ordered list of file paths. Albums hold more than one.
    pub file_path: String,
    /// Caption text, may be empty. Never mutated by the scheduler core.
    pub caption: String,
    /// Kind of post
    pub post_type: PostType,
    /// Target platform
    pub platform: Platform,
    /// Lifecycle status
    pub status: ContentStatus,
    /// When the content was registered
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Create a new content item in the Uploaded state.
    pub fn new(
        file_paths: &[&str],
        caption: impl Into<String>,
        post_type: PostType,
        platform: Platform,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: file_paths.join(","),
            caption: caption.into(),
            post_type,
            platform,
            status: ContentStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }

    /// The ordered file path list, split out of the comma-joined column.
    pub fn file_paths(&self) -> Vec<String> {
        self.file_path
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Replace the caption, returning the modified copy. Used by the
    /// executor to build the transient day-counter variant.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

/// A single unit of scheduled work: a one-shot publish intent or a standing
/// daily recurrence descriptor.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Unique identifier (UUID)
    pub id: String,
    /// Owning content
    pub content_id: String,
    /// Target platform for this firing
    pub platform: Platform,
    /// Current status in the state machine
    pub status: ScheduleStatus,
    /// Absolute fire instant (pending schedules only)
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Recurrence hour of day, 0-23 (recurring schedules only)
    pub hour: Option<u32>,
    /// Recurrence minute, 0-59 (recurring schedules only)
    pub minute: Option<u32>,
    /// Whether to prefix captions with "Day {day_counter}" on each firing
    pub use_day_counter: bool,
    /// Sequence day, incremented on every successful recurring firing
    pub day_counter: i64,
    /// When the schedule last fired successfully (recurring only)
    pub last_run_at: Option<DateTime<Utc>>,
    /// Reason of the most recent failure, if any
    pub error_message: Option<String>,
    /// Number of failed firings
    pub retry_count: i64,
    /// When the schedule was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Create a one-shot schedule firing at an absolute instant.
    pub fn one_time(
        content_id: impl Into<String>,
        platform: Platform,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id: content_id.into(),
            platform,
            status: ScheduleStatus::Pending,
            scheduled_time: Some(scheduled_time),
            hour: None,
            minute: None,
            use_day_counter: false,
            day_counter: 1,
            last_run_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a standing schedule firing once per day at hour:minute.
    pub fn daily(content_id: impl Into<String>, platform: Platform, hour: u32, minute: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id: content_id.into(),
            platform,
            status: ScheduleStatus::Recurring,
            scheduled_time: None,
            hour: Some(hour),
            minute: Some(minute),
            use_day_counter: false,
            day_counter: 1,
            last_run_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enable the day-counter caption prefix, starting at `start_day`.
    pub fn with_day_counter(mut self, start_day: i64) -> Self {
        self.use_day_counter = true;
        self.day_counter = start_day;
        self
    }

    /// Returns true if the schedule still participates in evaluation.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Aggregate counts over the store, for dashboards and the startup report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_contents: i64,
    pub published_contents: i64,
    pub pending_schedules: i64,
    pub recurring_schedules: i64,
    pub completed_schedules: i64,
    pub failed_schedules: i64,
}
