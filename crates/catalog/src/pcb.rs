use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boardstock_core::{Error, PcbId, Result};

/// A PCB master record. Read-only from the ledger's perspective; production
/// only ever references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pcb {
    pub id: PcbId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a PCB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPcb {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewPcb {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name cannot be empty"));
        }
        if self.code.trim().is_empty() {
            return Err(Error::validation("code cannot be empty"));
        }
        Ok(())
    }

    pub fn into_pcb(self, now: DateTime<Utc>) -> Result<Pcb> {
        self.validate()?;
        Ok(Pcb {
            id: PcbId::new(),
            name: self.name,
            code: self.code,
            description: self.description,
            created_at: now,
        })
    }
}

/// Partial update for a PCB master record.
///
/// `description` distinguishes "leave as is" (field absent) from "clear"
/// (field present as null).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
}

fn clearable<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl PcbPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::validation("name cannot be empty"));
            }
        }
        if let Some(code) = &self.code {
            if code.trim().is_empty() {
                return Err(Error::validation("code cannot be empty"));
            }
        }
        Ok(())
    }

    pub fn apply(&self, pcb: &mut Pcb) -> Result<()> {
        self.validate()?;
        if let Some(name) = &self.name {
            pcb.name = name.clone();
        }
        if let Some(code) = &self.code {
            pcb.code = code.clone();
        }
        if let Some(description) = &self.description {
            pcb.description = description.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_name_and_code() {
        let input = NewPcb {
            name: "Controller main board".to_string(),
            code: String::new(),
            description: None,
        };
        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn patch_can_clear_description() {
        let mut pcb = NewPcb {
            name: "Controller main board".to_string(),
            code: "CTRL-01".to_string(),
            description: Some("rev A".to_string()),
        }
        .into_pcb(Utc::now())
        .unwrap();

        let patch = PcbPatch {
            description: Some(None),
            ..Default::default()
        };
        patch.apply(&mut pcb).unwrap();
        assert_eq!(pcb.description, None);
        assert_eq!(pcb.code, "CTRL-01");
    }
}
