//! Companion profile document.
//!
//! The profile is the single persisted document: identity, relationship
//! progress, dialogue cache, diary and the saved timer values used to
//! resume. Field names are camelCase so the document stays compatible with
//! existing exports.

mod export;
mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::companion::DialogueCache;
use crate::timer::SessionSnapshot;

pub use export::{export_file_name, export_json, write_export};
pub use store::{JsonProfileStore, MemoryProfileStore, ProfileStore, PROFILE_FILE};

/// Highest relationship level.
pub const MAX_LEVEL: u32 = 10;

/// Diary entries kept, newest first.
pub const DIARY_CAPACITY: usize = 10;

/// XP required to leave `level`.
pub fn max_xp_for_level(level: u32) -> u32 {
    100 * level.max(1)
}

/// Style hints per trigger family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueStyles {
    #[serde(default)]
    pub late: String,
    #[serde(default)]
    pub gift: String,
    #[serde(default)]
    pub lazy: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    #[serde(default)]
    pub distractions: u32,
    #[serde(default)]
    pub clicks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: String,
    pub date: String,
    pub content: String,
    pub distractions: u32,
    pub clicks: u32,
    pub level_at_time: u32,
}

impl DiaryEntry {
    pub fn new(
        content: impl Into<String>,
        date: impl Into<String>,
        stats: CycleStats,
        level: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: now.timestamp_millis().to_string(),
            date: date.into(),
            content: content.into(),
            distractions: stats.distractions,
            clicks: stats.clicks,
            level_at_time: level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurpriseNote {
    pub id: String,
    pub level: u32,
    pub content: String,
    pub date: String,
}

fn default_level() -> u32 {
    1
}

fn default_max_xp() -> u32 {
    max_xp_for_level(1)
}

fn default_volume() -> u8 {
    1
}

/// The full persisted profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub honorific: String,
    #[serde(default)]
    pub image_src: Option<String>,
    #[serde(default)]
    pub pending_image_src: Option<String>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub char_gender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_trait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_job: Option<String>,
    #[serde(default)]
    pub personality: Vec<String>,
    #[serde(default)]
    pub selected_dialogue_styles: DialogueStyles,
    #[serde(default)]
    pub is_sound_enabled: bool,
    /// 1..=4
    #[serde(default = "default_volume")]
    pub sound_volume: u8,

    #[serde(default)]
    pub xp: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_max_xp")]
    pub max_xp_for_next_level: u32,

    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub total_focus_minutes: u32,
    #[serde(default)]
    pub total_completed_cycles: u32,
    #[serde(default)]
    pub received_notes: Vec<SurpriseNote>,

    #[serde(default)]
    pub dialogue_cache: DialogueCache,
    #[serde(default)]
    pub initial_greeting: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_task: Option<String>,
    #[serde(default)]
    pub cycle_stats: CycleStats,
    #[serde(default)]
    pub diary_history: Vec<DiaryEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_time_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_is_break: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_session_in_cycle: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_phase_total: Option<u32>,

    /// Fields this version does not know about, kept so a load/save cycle
    /// never drops data.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            user_name: String::new(),
            name: String::new(),
            honorific: String::new(),
            image_src: None,
            pending_image_src: None,
            gender: String::new(),
            char_gender: String::new(),
            species_trait: None,
            char_job: None,
            user_job: None,
            personality: Vec::new(),
            selected_dialogue_styles: DialogueStyles::default(),
            is_sound_enabled: false,
            sound_volume: default_volume(),
            xp: 0,
            level: default_level(),
            max_xp_for_next_level: default_max_xp(),
            streak: 0,
            total_focus_minutes: 0,
            total_completed_cycles: 0,
            received_notes: Vec::new(),
            dialogue_cache: DialogueCache::default(),
            initial_greeting: String::new(),
            today_task: None,
            cycle_stats: CycleStats::default(),
            diary_history: Vec::new(),
            last_active: None,
            saved_time_left: None,
            saved_is_break: None,
            saved_session_in_cycle: None,
            saved_is_active: None,
            saved_phase_total: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl ProfileSnapshot {
    /// Saved timer values for [`crate::timer::TimerEngine::restore`].
    pub fn session(&self) -> SessionSnapshot {
        SessionSnapshot {
            saved_time_left: self.saved_time_left,
            saved_is_active: self.saved_is_active,
            saved_is_break: self.saved_is_break,
            saved_session_in_cycle: self.saved_session_in_cycle,
            saved_phase_total: self.saved_phase_total,
            completed_cycles: self.total_completed_cycles,
        }
    }

    /// Add XP, levelling up while the threshold is met. Returns the number
    /// of levels gained.
    pub fn award_xp(&mut self, amount: u32) -> u32 {
        let start = self.level;
        self.xp = self.xp.saturating_add(amount);
        while self.level < MAX_LEVEL && self.xp >= self.max_xp_for_next_level {
            self.xp -= self.max_xp_for_next_level;
            self.level += 1;
            self.max_xp_for_next_level = max_xp_for_level(self.level);
        }
        if self.level >= MAX_LEVEL {
            self.xp = self.xp.min(self.max_xp_for_next_level);
        }
        self.level - start
    }

    /// Operator control. Clamps to `1..=MAX_LEVEL` and clears XP.
    pub fn set_level(&mut self, level: u32) {
        self.level = level.clamp(1, MAX_LEVEL);
        self.xp = 0;
        self.max_xp_for_next_level = max_xp_for_level(self.level);
    }

    /// Prepend an entry, keeping the newest [`DIARY_CAPACITY`].
    pub fn push_diary(&mut self, entry: DiaryEntry) {
        self.diary_history.insert(0, entry);
        self.diary_history.truncate(DIARY_CAPACITY);
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Partial update with merge semantics: `None` leaves a field untouched.
///
/// `image_src` and `pending_image_src` are doubly optional so that a
/// caller can clear them (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_image_src: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_xp_for_next_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_focus_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_completed_cycles: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_cache: Option<DialogueCache>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_stats: Option<CycleStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diary_history: Option<Vec<DiaryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_time_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_is_break: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_session_in_cycle: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_phase_total: Option<u32>,
}

macro_rules! take_newer {
    ($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $( if $other.$field.is_some() { $self.$field = $other.$field; } )+
    };
}

macro_rules! apply_fields {
    ($update:ident, $profile:ident, $($field:ident),+ $(,)?) => {
        $( if let Some(value) = $update.$field { $profile.$field = value; } )+
    };
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Timer values from an engine snapshot.
    pub fn from_session(session: &SessionSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            saved_time_left: session.saved_time_left,
            saved_is_active: session.saved_is_active,
            saved_is_break: session.saved_is_break,
            saved_session_in_cycle: session.saved_session_in_cycle,
            saved_phase_total: session.saved_phase_total,
            total_completed_cycles: Some(session.completed_cycles),
            last_active: Some(now.timestamp_millis()),
            ..Self::default()
        }
    }

    /// Fold `other` into `self`; fields set in `other` win.
    pub fn merge(&mut self, other: ProfileUpdate) {
        take_newer!(
            self,
            other,
            api_key,
            image_src,
            pending_image_src,
            is_sound_enabled,
            sound_volume,
            xp,
            level,
            max_xp_for_next_level,
            total_focus_minutes,
            total_completed_cycles,
            dialogue_cache,
            today_task,
            cycle_stats,
            diary_history,
            last_active,
            saved_time_left,
            saved_is_break,
            saved_session_in_cycle,
            saved_is_active,
            saved_phase_total,
        );
    }

    pub fn apply(self, profile: &mut ProfileSnapshot) {
        apply_fields!(
            self,
            profile,
            api_key,
            is_sound_enabled,
            sound_volume,
            xp,
            level,
            max_xp_for_next_level,
            total_focus_minutes,
            total_completed_cycles,
            dialogue_cache,
            cycle_stats,
            diary_history,
        );
        if let Some(src) = self.image_src {
            profile.image_src = src;
        }
        if let Some(src) = self.pending_image_src {
            profile.pending_image_src = src;
        }
        if let Some(task) = self.today_task {
            profile.today_task = Some(task);
        }
        if self.last_active.is_some() {
            profile.last_active = self.last_active;
        }
        if self.saved_time_left.is_some() {
            profile.saved_time_left = self.saved_time_left;
        }
        if self.saved_is_break.is_some() {
            profile.saved_is_break = self.saved_is_break;
        }
        if self.saved_session_in_cycle.is_some() {
            profile.saved_session_in_cycle = self.saved_session_in_cycle;
        }
        if self.saved_is_active.is_some() {
            profile.saved_is_active = self.saved_is_active;
        }
        if self.saved_phase_total.is_some() {
            profile.saved_phase_total = self.saved_phase_total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_xp_levels_up_across_thresholds() {
        let mut profile = ProfileSnapshot::default();
        assert_eq!(profile.award_xp(90), 0);
        assert_eq!(profile.award_xp(30), 1);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.xp, 20);
        assert_eq!(profile.max_xp_for_next_level, 200);
        assert_eq!(profile.award_xp(480), 2);
        assert_eq!(profile.level, 4);
        assert_eq!(profile.xp, 0);
    }

    #[test]
    fn award_xp_stops_at_max_level() {
        let mut profile = ProfileSnapshot::default();
        profile.set_level(MAX_LEVEL);
        profile.award_xp(100_000);
        assert_eq!(profile.level, MAX_LEVEL);
        assert_eq!(profile.xp, profile.max_xp_for_next_level);
    }

    #[test]
    fn set_level_clamps_and_clears_xp() {
        let mut profile = ProfileSnapshot::default();
        profile.xp = 50;
        profile.set_level(0);
        assert_eq!(profile.level, 1);
        profile.set_level(42);
        assert_eq!(profile.level, MAX_LEVEL);
        assert_eq!(profile.xp, 0);
    }

    #[test]
    fn diary_keeps_newest_ten() {
        let mut profile = ProfileSnapshot::default();
        for i in 0..12 {
            profile.push_diary(DiaryEntry::new(
                format!("entry {i}"),
                "2026-01-01",
                CycleStats::default(),
                1,
                Utc::now(),
            ));
        }
        assert_eq!(profile.diary_history.len(), DIARY_CAPACITY);
        assert_eq!(profile.diary_history[0].content, "entry 11");
        assert_eq!(profile.diary_history[9].content, "entry 2");
    }

    #[test]
    fn update_merge_and_apply_are_partial() {
        let mut profile = ProfileSnapshot {
            name: "Miso".into(),
            pending_image_src: Some("a.png".into()),
            ..ProfileSnapshot::default()
        };
        let mut update = ProfileUpdate {
            saved_time_left: Some(100),
            ..ProfileUpdate::default()
        };
        update.merge(ProfileUpdate {
            saved_time_left: Some(99),
            pending_image_src: Some(None),
            ..ProfileUpdate::default()
        });
        update.apply(&mut profile);
        assert_eq!(profile.name, "Miso");
        assert_eq!(profile.saved_time_left, Some(99));
        assert_eq!(profile.pending_image_src, None);
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let json = r#"{"name":"Miso","favoriteColor":"teal","level":3}"#;
        let profile: ProfileSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(profile.level, 3);
        assert_eq!(profile.sound_volume, 1);
        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["favoriteColor"], "teal");
    }

    #[test]
    fn session_view_uses_saved_fields() {
        let profile = ProfileSnapshot {
            saved_time_left: Some(12),
            saved_is_break: Some(true),
            total_completed_cycles: 3,
            ..ProfileSnapshot::default()
        };
        let session = profile.session();
        assert_eq!(session.saved_time_left, Some(12));
        assert_eq!(session.saved_is_break, Some(true));
        assert_eq!(session.completed_cycles, 3);
    }
}
