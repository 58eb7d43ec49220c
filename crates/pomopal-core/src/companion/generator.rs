use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TriggerKind;
use crate::error::GenerationFailure;
use crate::profile::{DialogueStyles, ProfileSnapshot};

/// Profile details passed to the generator as generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub character_name: String,
    pub user_name: String,
    pub honorific: String,
    pub personality: Vec<String>,
    /// Relationship level, 1..=10.
    pub level: u32,
    pub dialogue_style: DialogueStyles,
    pub today_task: Option<String>,
}

impl GenerationContext {
    pub fn from_profile(profile: &ProfileSnapshot) -> Self {
        Self {
            character_name: profile.name.clone(),
            user_name: profile.user_name.clone(),
            honorific: profile.honorific.clone(),
            personality: profile.personality.clone(),
            level: profile.level,
            dialogue_style: profile.selected_dialogue_styles.clone(),
            today_task: profile.today_task.clone(),
        }
    }

    /// The style hint that matches a trigger kind.
    pub fn style_for(&self, kind: TriggerKind) -> &str {
        match kind {
            TriggerKind::Start => &self.dialogue_style.late,
            TriggerKind::Click => &self.dialogue_style.gift,
            TriggerKind::Pause | TriggerKind::Scolding => &self.dialogue_style.lazy,
        }
    }
}

/// Remote dialogue generation capability.
///
/// Implementations must be callable repeatedly with no side effects beyond
/// their own result.
#[async_trait]
pub trait LineGenerator: Send + Sync {
    /// Model label shown in operator diagnostics.
    fn model_name(&self) -> &str {
        "-"
    }

    async fn generate_line(
        &self,
        kind: TriggerKind,
        context: &GenerationContext,
    ) -> Result<String, GenerationFailure>;
}
