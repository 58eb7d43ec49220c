//! Companion profile commands.
//!
//! Reads and edits `profile.json` directly; the interactive timer does not
//! need to be running.

use std::path::PathBuf;

use chrono::Local;
use clap::Subcommand;
use pomopal_core::profile::{export_json, write_export, ProfileSnapshot};
use pomopal_core::{JsonProfileStore, ProfileStore};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the profile (the API key is never printed)
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved diary entries, newest first
    Diary,
    /// Export the profile without credentials
    Export {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Set a profile field
    Set {
        #[command(subcommand)]
        field: ProfileField,
    },
    /// Set the relationship level (clears XP)
    SetLevel {
        /// 1-10
        level: u32,
    },
    /// Print the profile file location
    Path,
}

#[derive(Subcommand)]
pub enum ProfileField {
    /// Companion name
    Name { value: String },
    /// Your name
    UserName { value: String },
    /// How the companion addresses you
    Honorific { value: String },
    /// Today's task, passed to the companion
    Task { value: String },
    /// Credential for the dialogue service
    ApiKey { value: String },
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonProfileStore::open_default()?;
    match action {
        ProfileAction::Show { json } => {
            let profile = store.load()?;
            if json {
                println!("{}", export_json(&profile)?);
            } else {
                print_profile(&profile);
            }
        }
        ProfileAction::Diary => {
            let profile = store.load()?;
            if profile.diary_history.is_empty() {
                println!("no diary entries yet");
            }
            for entry in &profile.diary_history {
                println!(
                    "{}  lv{}  {} distractions, {} clicks",
                    entry.date, entry.level_at_time, entry.distractions, entry.clicks
                );
                println!("    {}", entry.content);
            }
        }
        ProfileAction::Export { dir } => {
            let profile = store.load()?;
            let path = write_export(&profile, &dir, &Local::now())?;
            println!("{}", path.display());
        }
        ProfileAction::Set { field } => {
            let mut profile = store.load()?;
            match field {
                ProfileField::Name { value } => profile.name = value,
                ProfileField::UserName { value } => profile.user_name = value,
                ProfileField::Honorific { value } => profile.honorific = value,
                ProfileField::Task { value } => profile.today_task = Some(value),
                ProfileField::ApiKey { value } => profile.api_key = value,
            }
            store.replace(&profile)?;
            println!("ok");
        }
        ProfileAction::SetLevel { level } => {
            let mut profile = store.load()?;
            profile.set_level(level);
            store.replace(&profile)?;
            println!("level {}", profile.level);
        }
        ProfileAction::Path => println!("{}", store.path().display()),
    }
    Ok(())
}

fn print_profile(profile: &ProfileSnapshot) {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    println!("companion:  {}", or_dash(&profile.name));
    println!("user:       {}", or_dash(&profile.user_name));
    println!(
        "level:      {} ({}/{} xp)",
        profile.level, profile.xp, profile.max_xp_for_next_level
    );
    println!("focus:      {} minutes", profile.total_focus_minutes);
    println!("cycles:     {}", profile.total_completed_cycles);
    println!("diary:      {} entries", profile.diary_history.len());
    println!(
        "credential: {}",
        if profile.has_credential() { "set" } else { "not set" }
    );
    if let Some(task) = &profile.today_task {
        println!("today:      {task}");
    }
}
