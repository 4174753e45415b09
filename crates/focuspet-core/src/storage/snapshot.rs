//! The single persisted record.
//!
//! Every field carries `#[serde(default)]` so that snapshots written by an
//! older build, with fewer fields, still load.

use serde::{Deserialize, Serialize};

use crate::pet::Pet;
use crate::rewards::badges::{self, Badge};
use crate::rewards::{Counters, Streak, VirtualCurrency};
use crate::task::Task;

pub const SNAPSHOT_VERSION: u32 = 1;

const FREE_MAX_PETS: u32 = 1;
pub const PREMIUM_MAX_PETS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default = "default_max_pets")]
    pub max_pets: u32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub check_in_reminders: bool,
}

fn default_max_pets() -> u32 {
    FREE_MAX_PETS
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_premium: false,
            max_pets: FREE_MAX_PETS,
            notifications_enabled: true,
            check_in_reminders: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub pets: Vec<Pet>,
    #[serde(default)]
    pub streak: Streak,
    #[serde(default, deserialize_with = "badges::deserialize_lenient")]
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub current_pet_id: Option<String>,
    #[serde(default)]
    pub currency: VirtualCurrency,
    #[serde(default)]
    pub counters: Counters,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for AppSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tasks: Vec::new(),
            pets: Vec::new(),
            streak: Streak::default(),
            badges: badges::merge_with_catalog(&[]),
            settings: Settings::default(),
            current_pet_id: None,
            currency: VirtualCurrency::default(),
            counters: Counters::default(),
        }
    }
}

impl AppSnapshot {
    /// Bring a decoded snapshot up to the current catalog and version.
    pub fn normalize(mut self) -> Self {
        self.badges = badges::merge_with_catalog(&self.badges);
        self.version = SNAPSHOT_VERSION;
        self
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.active)
    }

    pub fn active_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.active)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn pet(&self, id: &str) -> Option<&Pet> {
        self.pets.iter().find(|p| p.id == id)
    }

    pub fn pet_mut(&mut self, id: &str) -> Option<&mut Pet> {
        self.pets.iter_mut().find(|p| p.id == id)
    }

    pub fn current_pet(&self) -> Option<&Pet> {
        self.current_pet_id.as_deref().and_then(|id| self.pet(id))
    }

    pub fn current_pet_mut(&mut self) -> Option<&mut Pet> {
        let id = self.current_pet_id.clone()?;
        self.pet_mut(&id)
    }
}
