//! Static fallback lines.
//!
//! Used when a kind's cache is empty and the remote call is skipped or
//! fails. Every kind has a non-empty default bucket, so a pick never
//! comes back empty.

use rand::seq::SliceRandom;
use rand::Rng;

use super::TriggerKind;

/// Lines for a relationship level range, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct PhraseBucket {
    pub min_level: u32,
    pub max_level: u32,
    pub lines: &'static [&'static str],
}

impl PhraseBucket {
    fn covers(&self, level: u32) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }
}

/// All static lines for one trigger kind.
#[derive(Debug, Clone, Copy)]
pub struct PhraseTable {
    pub buckets: &'static [PhraseBucket],
    /// Level-agnostic lines.
    pub default: &'static [&'static str],
}

const START: PhraseTable = PhraseTable {
    buckets: &[
        PhraseBucket {
            min_level: 1,
            max_level: 3,
            lines: &[
                "Fine, let's get this started.",
                "Focus time. I'll be over here.",
                "You said you'd work. Prove it.",
            ],
        },
        PhraseBucket {
            min_level: 4,
            max_level: 7,
            lines: &[
                "Alright, together then. Let's go.",
                "I'll keep you company. Eyes on the task.",
                "Another round? I'm ready when you are.",
            ],
        },
        PhraseBucket {
            min_level: 8,
            max_level: 10,
            lines: &[
                "There you are. Let's make this one count.",
                "I saved you a seat. Let's focus.",
                "You and me, twenty-five minutes. Deal?",
            ],
        },
    ],
    default: &["Let's begin.", "Timer's running. Let's focus."],
};

const PAUSE: PhraseTable = PhraseTable {
    buckets: &[
        PhraseBucket {
            min_level: 1,
            max_level: 3,
            lines: &[
                "Stopping already?",
                "Paused. I'm not impressed.",
            ],
        },
        PhraseBucket {
            min_level: 4,
            max_level: 7,
            lines: &[
                "Quick breather? Don't wander off.",
                "I'll wait. Not forever, though.",
            ],
        },
        PhraseBucket {
            min_level: 8,
            max_level: 10,
            lines: &[
                "Take a second. I'll hold your place.",
                "Paused. Come back soon, okay?",
            ],
        },
    ],
    default: &["Paused.", "I'll be here when you resume."],
};

const CLICK: PhraseTable = PhraseTable {
    buckets: &[
        PhraseBucket {
            min_level: 1,
            max_level: 3,
            lines: &[
                "What? Get back to work.",
                "Poking me won't finish your task.",
                "I'm busy watching you. Focus.",
            ],
        },
        PhraseBucket {
            min_level: 4,
            max_level: 7,
            lines: &[
                "Hey, I see you. Keep going.",
                "Need a cheer? You're doing fine.",
                "Still here. Still watching.",
            ],
        },
        PhraseBucket {
            min_level: 8,
            max_level: 10,
            lines: &[
                "You called? I'm proud of you, you know.",
                "I'm right here. Almost there.",
                "Don't distract me, I'm busy being on your side.",
            ],
        },
    ],
    default: &["Hm?", "Keep going."],
};

const SCOLDING: PhraseTable = PhraseTable {
    buckets: &[
        PhraseBucket {
            min_level: 1,
            max_level: 3,
            lines: &[
                "Where did you go? The timer didn't stop.",
                "Caught you. Back to it.",
            ],
        },
        PhraseBucket {
            min_level: 4,
            max_level: 7,
            lines: &[
                "I noticed you left. Let's pretend I didn't.",
                "Welcome back. The task missed you.",
            ],
        },
        PhraseBucket {
            min_level: 8,
            max_level: 10,
            lines: &[
                "You wandered off again... I waited, though.",
                "I'm not mad. Okay, a little. Focus.",
            ],
        },
    ],
    default: &["You drifted off. Back to work.", "Eyes here, please."],
};

pub fn table(kind: TriggerKind) -> &'static PhraseTable {
    match kind {
        TriggerKind::Start => &START,
        TriggerKind::Pause => &PAUSE,
        TriggerKind::Click => &CLICK,
        TriggerKind::Scolding => &SCOLDING,
    }
}

/// Uniform pick among lines whose bucket covers `level`, falling back to
/// the kind's default bucket.
pub fn pick<R: Rng + ?Sized>(kind: TriggerKind, level: u32, rng: &mut R) -> &'static str {
    let table = table(kind);
    let matching: Vec<&'static str> = table
        .buckets
        .iter()
        .filter(|bucket| bucket.covers(level))
        .flat_map(|bucket| bucket.lines.iter().copied())
        .collect();

    let pool: &[&'static str] = if matching.is_empty() {
        table.default
    } else {
        &matching
    };
    pool.choose(rng)
        .or_else(|| table.default.first())
        .copied()
        .unwrap_or("...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    #[test]
    fn every_kind_has_a_default_bucket() {
        for kind in TriggerKind::ALL {
            assert!(!table(kind).default.is_empty(), "{kind} has no default");
            assert!(table(kind).default.iter().all(|l| !l.trim().is_empty()));
        }
    }

    #[test]
    fn pick_respects_level_bucket() {
        let mut rng = Mcg128Xsl64::seed_from_u64(7);
        for _ in 0..50 {
            let line = pick(TriggerKind::Click, 9, &mut rng);
            let bucket = CLICK.buckets.iter().find(|b| b.covers(9)).unwrap();
            assert!(bucket.lines.contains(&line));
        }
    }

    #[test]
    fn out_of_range_level_uses_default_bucket() {
        let mut rng = Mcg128Xsl64::seed_from_u64(7);
        for kind in TriggerKind::ALL {
            let line = pick(kind, 0, &mut rng);
            assert!(table(kind).default.contains(&line));
            let line = pick(kind, 99, &mut rng);
            assert!(table(kind).default.contains(&line));
        }
    }
}
