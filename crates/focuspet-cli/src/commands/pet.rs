use chrono::Utc;
use clap::Subcommand;
use focuspet_core::{PetStatus, PetType};
use serde::Serialize;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum PetAction {
    /// List companions
    List,
    /// Adopt a companion
    Add {
        /// Companion name
        name: String,
        /// Companion type (cat, dog, rabbit, dragon, unicorn, phoenix, robot, alien)
        #[arg(long = "type", default_value = "cat")]
        pet_type: PetType,
    },
    /// Make a companion the current one
    Select {
        /// Pet ID
        id: String,
    },
    /// Remove a companion
    Delete {
        /// Pet ID
        id: String,
    },
    /// List companion types and prices
    Types,
}

#[derive(Serialize)]
struct PetTypeInfo {
    pet_type: PetType,
    premium: bool,
    price: String,
}

#[derive(Serialize)]
struct PetListing {
    #[serde(flatten)]
    status: PetStatus,
    current: bool,
}

pub fn run(action: PetAction) -> CliResult {
    let mut session = Session::open()?;
    let now = Utc::now();

    match action {
        PetAction::List => {
            let snapshot = session.engine.snapshot();
            let current = snapshot.current_pet_id.as_deref();
            let pets: Vec<PetListing> = snapshot
                .pets
                .iter()
                .map(|p| PetListing {
                    status: PetStatus::from(p),
                    current: current == Some(p.id.as_str()),
                })
                .collect();
            print_json(&pets)?;
        }
        PetAction::Add { name, pet_type } => {
            let pet = session.engine.add_pet(&name, pet_type, now)?;
            print_json(&PetStatus::from(&pet))?;
        }
        PetAction::Select { id } => {
            session.engine.select_pet(&id, now)?;
            print_json(&session.engine.status(now))?;
        }
        PetAction::Delete { id } => {
            session.engine.delete_pet(&id, now)?;
            println!("{{\"deleted\": \"{id}\"}}");
        }
        PetAction::Types => {
            let types: Vec<PetTypeInfo> = PetType::ALL
                .into_iter()
                .map(|t| PetTypeInfo {
                    pet_type: t,
                    premium: t.is_premium(),
                    price: t.formatted_price(),
                })
                .collect();
            print_json(&types)?;
        }
    }
    Ok(())
}
