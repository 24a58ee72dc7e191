use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::metadata::MetadataMapping;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use time::{OffsetDateTime, UtcOffset};

/// Shape filesystem times are rendered in before normalization.
const FS_DATE_FORMAT: &[time::format_description::FormatItem] = time::macros::format_description!(
    "[year][month][day] [hour]:[minute]:[second].[subsecond digits:6]"
);

/// Length of the base name: `YYYYMMDD_HHMMSS`.
const BASE_NAME_LEN: usize = 15;

/// Metadata date fields, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    DateTimeOriginal,
    MediaCreateDate,
    CreateDate,
    ModifyDate,
}

impl DateField {
    pub const PRIORITY: [DateField; 4] = [
        DateField::DateTimeOriginal,
        DateField::MediaCreateDate,
        DateField::CreateDate,
        DateField::ModifyDate,
    ];

    /// exiftool tag name, as used in its JSON output.
    pub fn tag(&self) -> &'static str {
        match self {
            DateField::DateTimeOriginal => "DateTimeOriginal",
            DateField::MediaCreateDate => "MediaCreateDate",
            DateField::CreateDate => "CreateDate",
            DateField::ModifyDate => "ModifyDate",
        }
    }

    /// exiftool human readable label, as printed without `-json`.
    pub fn label(&self) -> &'static str {
        match self {
            DateField::DateTimeOriginal => "Date/Time Original",
            DateField::MediaCreateDate => "Media Create Date",
            DateField::CreateDate => "Create Date",
            DateField::ModifyDate => "Modify Date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Metadata(DateField),
    Filesystem,
}

/// A date reduced to filesystem-safe pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    /// Full normalized value, sub-second part included.
    pub date_value: String,
    /// `date_value` truncated to whole seconds.
    pub base_name: String,
    pub year: String,
    pub month: String,
    pub source: DateSource,
}

/// Normalize a raw date string and split it into name and path pieces.
///
/// `.` and spaces become `_`, colons are dropped:
/// `2021:05:04 12:30:45.123` -> `20210504_123045_123`.
pub fn normalize(raw: &str) -> (String, String, String, String) {
    let date_value = raw
        .trim()
        .replace('.', "_")
        .replace(' ', "_")
        .replace(':', "");
    let base_name: String = date_value.chars().take(BASE_NAME_LEN).collect();
    let year: String = date_value.chars().take(4).collect();
    let month: String = date_value.chars().skip(4).take(2).collect();
    (date_value, base_name, year, month)
}

/// Whether a normalized value starts with a usable `YYYYMM`.
fn has_year_month(date_value: &str) -> bool {
    let head: Vec<char> = date_value.chars().take(6).collect();
    head.len() == 6 && head.iter().all(|c| c.is_ascii_digit()) && !date_value.starts_with("0000")
}

/// Get the local timezone offset, falling back to UTC if unavailable.
fn get_local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Render the earlier of the two filesystem times in the shape dates are normalized from.
pub fn filesystem_date(modified: Option<SystemTime>, created: Option<SystemTime>) -> Result<String> {
    let chosen = match (modified, created) {
        (Some(m), Some(c)) => {
            if m < c {
                m
            } else {
                c
            }
        }
        (Some(t), None) | (None, Some(t)) => t,
        (None, None) => {
            log::warn!("No filesystem times available, using current time");
            SystemTime::now()
        }
    };

    OffsetDateTime::from(chosen)
        .to_offset(get_local_offset())
        .format(FS_DATE_FORMAT)
        .map_err(|e| MediaSortError::Other(format!("Failed to format date: {}", e)))
}

/// Picks the authoritative capture date of a media file.
pub struct DateResolver;

impl DateResolver {
    /// First usable metadata date, by priority.
    pub fn pick(metadata: &MetadataMapping) -> Option<(DateField, String)> {
        for field in DateField::PRIORITY {
            let value = metadata
                .get(field.tag())
                .or_else(|| metadata.get(field.label()))
                .map(str::trim);

            let Some(value) = value else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            let (date_value, ..) = normalize(value);
            if !has_year_month(&date_value) {
                log::warn!("Ignoring unusable {} value {:?}", field.tag(), value);
                continue;
            }

            return Some((field, value.to_string()));
        }
        None
    }

    /// Resolve using metadata, falling back to the given filesystem times.
    pub fn resolve_with_times(
        metadata: &MetadataMapping,
        modified: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Result<ResolvedDate> {
        let (raw, source) = match Self::pick(metadata) {
            Some((field, value)) => (value, DateSource::Metadata(field)),
            None => (filesystem_date(modified, created)?, DateSource::Filesystem),
        };

        log::debug!("Raw date {:?} from {:?}", raw, source);

        let (date_value, base_name, year, month) = normalize(&raw);
        Ok(ResolvedDate {
            date_value,
            base_name,
            year,
            month,
            source,
        })
    }

    /// Resolve the date of the file at `path`.
    ///
    /// A missing date field is not an error: it is logged and the filesystem
    /// times of `path` are used instead.
    pub fn resolve(metadata: &MetadataMapping, path: &Path) -> Result<ResolvedDate> {
        if Self::pick(metadata).is_some() {
            return Self::resolve_with_times(metadata, None, None);
        }

        log::warn!(
            "{}",
            MediaSortError::MissingDateField(path.to_path_buf())
        );
        let info = fs::metadata(path)?;
        Self::resolve_with_times(metadata, info.modified().ok(), info.created().ok())
    }
}
