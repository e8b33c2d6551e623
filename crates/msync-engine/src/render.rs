//! Rendering of source records into mirror drafts.

use chrono::{NaiveDate, NaiveTime};

use msync_core::fingerprint::ContentHash;
use msync_core::record::{MirrorDraft, MirrorRecord, MirrorTiming, SourceRecord, SyncMetadata};
use msync_core::types::OriginTag;

use crate::config::EngineConfig;

/// Placeholder replaced by the source id in the link template.
const LINK_ID_PLACEHOLDER: &str = "{id}";

/// Renders the mirror-side fields of a source record.
#[derive(Debug, Clone)]
pub struct MirrorRenderer {
    title_marker: String,
    default_start_time: NaiveTime,
    default_duration: chrono::Duration,
    time_zone: String,
    source_link_template: Option<String>,
}

impl MirrorRenderer {
    /// Create a renderer from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            title_marker: config.title_marker.clone(),
            default_start_time: config.default_start_time,
            default_duration: chrono::Duration::minutes(i64::from(config.default_duration_mins)),
            time_zone: config.time_zone.clone(),
            source_link_template: config.source_link_template.clone(),
        }
    }

    /// Title shown on the mirror: marker, project, subject.
    pub fn title(&self, source: &SourceRecord) -> String {
        match source.project.as_deref().filter(|p| !p.is_empty()) {
            Some(project) => format!("{} [{}] {}", self.title_marker, project, source.title),
            None => format!("{} {}", self.title_marker, source.title),
        }
    }

    /// Description shown on the mirror, ending with the category and back-link.
    pub fn description(&self, source: &SourceRecord) -> String {
        let mut lines = vec![
            source.description.clone(),
            String::new(),
            format!("Type: {}", source.category),
        ];
        if let Some(template) = &self.source_link_template {
            lines.push(template.replace(LINK_ID_PLACEHOLDER, source.id.as_str()));
        }
        lines.join("\n")
    }

    /// Timing on `date`, keeping the display form of the existing mirror.
    pub fn timing(&self, date: NaiveDate, existing: Option<&MirrorRecord>) -> MirrorTiming {
        match existing.and_then(|record| record.timing.as_ref()) {
            Some(timing) => timing.moved_to(date),
            None => {
                let start = date.and_time(self.default_start_time);
                MirrorTiming::Timed {
                    start,
                    end: start + self.default_duration,
                    time_zone: self.time_zone.clone(),
                }
            }
        }
    }

    /// The full draft for `source` on `date`, stamped as authoritative.
    pub fn render(
        &self,
        source: &SourceRecord,
        date: NaiveDate,
        existing: Option<&MirrorRecord>,
    ) -> MirrorDraft {
        let title = self.title(source);
        let timing = self.timing(date, existing);
        let content_hash = ContentHash::compute(timing.date(), &title);

        MirrorDraft {
            title,
            description: self.description(source),
            timing,
            metadata: SyncMetadata {
                origin: OriginTag::Authoritative,
                content_hash,
                source_id: source.id.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msync_core::ids::{MirrorId, RevisionToken};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn source() -> SourceRecord {
        SourceRecord::new(42_u64, "Beta release", "Milestone", RevisionToken::from(3))
            .with_date(date(2024, 1, 10))
            .with_project("Apollo")
            .with_description("Ship to pilot customers")
    }

    #[test]
    fn test_title_with_and_without_project() {
        let renderer = MirrorRenderer::new(&EngineConfig::default());
        assert_eq!(renderer.title(&source()), "🎯 [Apollo] Beta release");

        let mut bare = source();
        bare.project = None;
        assert_eq!(renderer.title(&bare), "🎯 Beta release");
    }

    #[test]
    fn test_description_with_link() {
        let config = EngineConfig::default()
            .with_source_link_template("https://pm.example.com/work_packages/{id}");
        let renderer = MirrorRenderer::new(&config);
        assert_eq!(
            renderer.description(&source()),
            "Ship to pilot customers\n\nType: Milestone\nhttps://pm.example.com/work_packages/42"
        );
    }

    #[test]
    fn test_new_mirror_gets_default_window() {
        let renderer = MirrorRenderer::new(&EngineConfig::default());
        let timing = renderer.timing(date(2024, 1, 10), None);
        assert_eq!(
            timing,
            MirrorTiming::Timed {
                start: date(2024, 1, 10).and_hms_opt(12, 0, 0).unwrap(),
                end: date(2024, 1, 10).and_hms_opt(13, 0, 0).unwrap(),
                time_zone: "Australia/Melbourne".to_string(),
            }
        );
    }

    #[test]
    fn test_existing_display_form_preserved() {
        let renderer = MirrorRenderer::new(&EngineConfig::default());
        let existing = MirrorRecord {
            id: MirrorId::from("milestonev23432"),
            title: "🎯 [Apollo] Beta release".to_string(),
            description: String::new(),
            timing: Some(MirrorTiming::AllDay {
                date: date(2024, 1, 3),
            }),
            metadata: None,
        };
        let timing = renderer.timing(date(2024, 1, 10), Some(&existing));
        assert_eq!(
            timing,
            MirrorTiming::AllDay {
                date: date(2024, 1, 10)
            }
        );
    }

    #[test]
    fn test_render_stamps_authoritative_fingerprint() {
        let renderer = MirrorRenderer::new(&EngineConfig::default());
        let draft = renderer.render(&source(), date(2024, 1, 10), None);
        assert_eq!(draft.metadata.origin, OriginTag::Authoritative);
        assert_eq!(draft.metadata.source_id, source().id);
        assert_eq!(draft.metadata.content_hash, draft.fingerprint());
    }
}
