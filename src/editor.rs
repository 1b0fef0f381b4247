//! Password-gated stand editing
//!
//! The editor never touches the store directly: every operation prompts the
//! user through a [`PromptService`] and yields a [`StandEdit`] that the
//! dashboard applies, followed by a full rebuild of dependent state.
//!
//! The password gate compares against a fixed shared secret. It is a
//! placeholder that keeps casual users out of edit mode, not authentication;
//! deployments that need access control must put real credential handling in
//! front of the board.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::geometry::{GeoPoint, heading_ray, normalize_heading};
use crate::stands::{StandMap, StandRecord};

/// Length of the heading preview ray in meters
pub const HEADING_RAY_M: f64 = 80.0;

/// Degrees per wheel notch when rotating the heading preview
pub const HEADING_WHEEL_STEP: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPrompt {
    pub title: String,
    pub default_name: String,
    pub default_heading: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionAnswer {
    pub name: String,
    pub heading_deg: i32,
}

/// Dialogs shown to the user. `None` means the dialog was cancelled.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn prompt_position(&self, prompt: PositionPrompt) -> Option<PositionAnswer>;
    async fn prompt_password(&self, title: &str) -> Option<String>;
}

/// A change to the stand set
#[derive(Debug, Clone, PartialEq)]
pub enum StandEdit {
    Upsert(StandRecord),
    Replace { old_name: String, record: StandRecord },
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Wrong password; edit mode stays off
    Unauthorized,
    /// The user dismissed a dialog
    Cancelled,
    /// Stand operations require edit mode
    NotEditing,
    UnknownStand(String),
    EmptyName,
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::Unauthorized => write!(f, "Wrong password"),
            EditorError::Cancelled => write!(f, "Cancelled"),
            EditorError::NotEditing => write!(f, "Edit mode is off"),
            EditorError::UnknownStand(name) => write!(f, "Unknown stand {}", name),
            EditorError::EmptyName => write!(f, "Stand name must not be empty"),
        }
    }
}

impl std::error::Error for EditorError {}

/// A stand being placed: point plus a heading the user can rotate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingDraft {
    pub point: GeoPoint,
    pub heading_deg: u16,
}

impl HeadingDraft {
    pub fn new(point: GeoPoint, heading_deg: u16) -> Self {
        Self { point, heading_deg }
    }

    /// Rotate by wheel notches (positive is clockwise)
    pub fn rotate(&mut self, notches: i32) {
        self.heading_deg =
            normalize_heading(i32::from(self.heading_deg) + notches * HEADING_WHEEL_STEP);
    }

    pub fn ray(&self) -> [GeoPoint; 2] {
        heading_ray(self.point, self.heading_deg, HEADING_RAY_M)
    }
}

pub struct Editor {
    enabled: bool,
    password: String,
}

impl Editor {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            enabled: false,
            password: password.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Leave edit mode freely; entering it asks for the password.
    /// Returns the new state.
    pub async fn toggle(&mut self, prompts: &dyn PromptService) -> Result<bool, EditorError> {
        if self.enabled {
            self.enabled = false;
            info!("Edit mode off");
            return Ok(false);
        }

        let Some(attempt) = prompts.prompt_password("Enter edit mode").await else {
            return Err(EditorError::Cancelled);
        };
        if attempt != self.password {
            warn!("Rejected edit mode password");
            return Err(EditorError::Unauthorized);
        }

        self.enabled = true;
        info!("Edit mode on");
        Ok(true)
    }

    fn require_enabled(&self) -> Result<(), EditorError> {
        if self.enabled {
            Ok(())
        } else {
            Err(EditorError::NotEditing)
        }
    }

    /// Create a stand at `draft`, or overwrite the one with the chosen name
    pub async fn create_at(
        &self,
        draft: HeadingDraft,
        prompts: &dyn PromptService,
    ) -> Result<StandEdit, EditorError> {
        self.require_enabled()?;
        let answer = prompts
            .prompt_position(PositionPrompt {
                title: "New stand".to_string(),
                default_name: String::new(),
                default_heading: draft.heading_deg,
            })
            .await
            .ok_or(EditorError::Cancelled)?;

        let name = answer.name.trim();
        if name.is_empty() {
            return Err(EditorError::EmptyName);
        }
        Ok(StandEdit::Upsert(StandRecord::new(
            name,
            draft.point.lat,
            draft.point.lng,
            answer.heading_deg,
        )))
    }

    /// Change the heading and/or name of an existing stand, keeping its point
    pub async fn edit(
        &self,
        name: &str,
        stands: &StandMap,
        prompts: &dyn PromptService,
    ) -> Result<StandEdit, EditorError> {
        self.require_enabled()?;
        let current = stands
            .get(name)
            .ok_or_else(|| EditorError::UnknownStand(name.to_string()))?;

        let answer = prompts
            .prompt_position(PositionPrompt {
                title: format!("Edit stand {}", name),
                default_name: current.name.clone(),
                default_heading: current.heading_deg,
            })
            .await
            .ok_or(EditorError::Cancelled)?;

        let new_name = answer.name.trim();
        if new_name.is_empty() {
            return Err(EditorError::EmptyName);
        }
        Ok(StandEdit::Replace {
            old_name: name.to_string(),
            record: StandRecord::new(new_name, current.lat, current.lng, answer.heading_deg),
        })
    }

    pub fn delete(&self, name: &str, stands: &StandMap) -> Result<StandEdit, EditorError> {
        self.require_enabled()?;
        if !stands.contains_key(name) {
            return Err(EditorError::UnknownStand(name.to_string()));
        }
        Ok(StandEdit::Delete(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers in order
    struct ScriptedPrompts {
        positions: Mutex<Vec<Option<PositionAnswer>>>,
        passwords: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedPrompts {
        fn new(positions: Vec<Option<PositionAnswer>>, passwords: Vec<Option<&str>>) -> Self {
            Self {
                positions: Mutex::new(positions),
                passwords: Mutex::new(passwords.into_iter().map(|p| p.map(String::from)).collect()),
            }
        }
    }

    #[async_trait]
    impl PromptService for ScriptedPrompts {
        async fn prompt_position(&self, _prompt: PositionPrompt) -> Option<PositionAnswer> {
            self.positions.lock().unwrap().remove(0)
        }

        async fn prompt_password(&self, _title: &str) -> Option<String> {
            self.passwords.lock().unwrap().remove(0)
        }
    }

    fn answer(name: &str, heading: i32) -> Option<PositionAnswer> {
        Some(PositionAnswer {
            name: name.to_string(),
            heading_deg: heading,
        })
    }

    async fn enabled_editor() -> Editor {
        let mut editor = Editor::new("secret");
        let prompts = ScriptedPrompts::new(vec![], vec![Some("secret")]);
        assert_eq!(editor.toggle(&prompts).await, Ok(true));
        editor
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_mode_off() {
        let mut editor = Editor::new("secret");
        let prompts = ScriptedPrompts::new(vec![], vec![Some("nope"), None]);

        assert_eq!(editor.toggle(&prompts).await, Err(EditorError::Unauthorized));
        assert!(!editor.is_enabled());
        assert_eq!(editor.toggle(&prompts).await, Err(EditorError::Cancelled));
        assert!(!editor.is_enabled());
    }

    #[tokio::test]
    async fn test_leaving_edit_mode_needs_no_password() {
        let mut editor = enabled_editor().await;
        let prompts = ScriptedPrompts::new(vec![], vec![]);
        assert_eq!(editor.toggle(&prompts).await, Ok(false));
    }

    #[tokio::test]
    async fn test_create_requires_edit_mode() {
        let editor = Editor::new("secret");
        let prompts = ScriptedPrompts::new(vec![answer("1", 0)], vec![]);
        let draft = HeadingDraft::new(GeoPoint::new(0.0, 0.0), 0);
        assert_eq!(
            editor.create_at(draft, &prompts).await,
            Err(EditorError::NotEditing)
        );
    }

    #[tokio::test]
    async fn test_create_normalizes_heading() {
        let editor = enabled_editor().await;
        let prompts = ScriptedPrompts::new(vec![answer(" 50B ", -90)], vec![]);
        let draft = HeadingDraft::new(GeoPoint::new(-34.8, -58.5), 0);

        let edit = editor.create_at(draft, &prompts).await.unwrap();
        assert_eq!(
            edit,
            StandEdit::Upsert(StandRecord::new("50B", -34.8, -58.5, 270))
        );
    }

    #[tokio::test]
    async fn test_edit_renames_and_keeps_point() {
        let editor = enabled_editor().await;
        let mut stands = StandMap::new();
        stands.insert("7".into(), StandRecord::new("7", 1.0, 2.0, 90));
        let prompts = ScriptedPrompts::new(vec![answer("7A", 180), None], vec![]);

        let edit = editor.edit("7", &stands, &prompts).await.unwrap();
        assert_eq!(
            edit,
            StandEdit::Replace {
                old_name: "7".into(),
                record: StandRecord::new("7A", 1.0, 2.0, 180),
            }
        );
        assert_eq!(
            editor.edit("7", &stands, &prompts).await,
            Err(EditorError::Cancelled)
        );
        assert_eq!(
            editor.edit("8", &stands, &prompts).await,
            Err(EditorError::UnknownStand("8".into()))
        );
    }

    #[test]
    fn test_draft_rotation_wraps() {
        let mut draft = HeadingDraft::new(GeoPoint::new(0.0, 0.0), 358);
        draft.rotate(1);
        assert_eq!(draft.heading_deg, 0);
        draft.rotate(-1);
        assert_eq!(draft.heading_deg, 358);
        let [start, end] = draft.ray();
        assert_eq!(start, draft.point);
        assert!(end.lat > start.lat);
    }
}
