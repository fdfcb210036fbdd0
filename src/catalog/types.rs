use serde::{Deserialize, Serialize};

/// Life status of a character, normalized from the free-text API value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterStatus {
  Alive,
  Dead,
  Unknown,
}

impl CharacterStatus {
  /// Case-insensitive parse; anything that isn't "alive" or "dead" is Unknown.
  pub fn parse(status: Option<&str>) -> Self {
    match status.map(|s| s.trim().to_lowercase()).as_deref() {
      Some("alive") => CharacterStatus::Alive,
      Some("dead") => CharacterStatus::Dead,
      _ => CharacterStatus::Unknown,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      CharacterStatus::Alive => "Alive",
      CharacterStatus::Dead => "Dead",
      CharacterStatus::Unknown => "Unknown",
    }
  }
}

impl std::fmt::Display for CharacterStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

/// Character as seen by list and detail consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
  pub id: i64,
  pub name: String,
  pub status: CharacterStatus,
  pub species: String,
  pub image: String,
}
